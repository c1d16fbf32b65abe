//! # Pyramidal Lucas-Kanade point tracking

use super::Correspondence;
use crate::prelude::v1::*;
use nalgebra as na;

/// Parameters of the sparse tracker.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SparseFlowParams {
    /// Side of the square integration window, must be odd.
    pub window: usize,
    /// Number of pyramid levels above the full resolution image.
    pub levels: usize,
    /// Iteration limit per pyramid level.
    pub max_iters: usize,
    /// Iterations stop once the update is smaller than this many pixels.
    pub epsilon: f32,
    /// Minimum eigenvalue of the window's gradient matrix, normalised by window area.
    pub min_eigen: f32,
}

impl Default for SparseFlowParams {
    fn default() -> Self {
        Self {
            window: 15,
            levels: 2,
            max_iters: 10,
            epsilon: 0.03,
            min_eigen: 1e-3,
        }
    }
}

/// Outcome of tracking a single point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackStatus {
    /// Estimated position in the next frame.
    pub pos: na::Point2<f32>,
    /// Whether the point was found again.
    pub found: bool,
}

struct Level {
    prev: GrayImage,
    next: GrayImage,
    gx: GrayImage,
    gy: GrayImage,
}

/// Sparse optical flow estimator.
#[derive(Clone, Debug, Default)]
pub struct SparseFlow {
    params: SparseFlowParams,
}

impl SparseFlow {
    pub fn new(params: SparseFlowParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SparseFlowParams {
        &self.params
    }

    /// Track points from one frame to the next.
    ///
    /// Returns one status per input point, in the same order.
    ///
    /// # Arguments
    ///
    /// * `prev` - frame the points were found in.
    /// * `next` - frame to find the points in.
    /// * `points` - positions in `prev`.
    pub fn track(
        &self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[na::Point2<f32>],
    ) -> Vec<TrackStatus> {
        if points.is_empty() || prev.is_empty() || prev.dim() != next.dim() {
            return points
                .iter()
                .map(|&pos| TrackStatus { pos, found: false })
                .collect();
        }

        let pyramid = self.pyramid(prev, next);

        points
            .iter()
            .map(|&pt| self.track_point(&pyramid, pt))
            .collect()
    }

    /// Track identified points and keep only the ones that were found.
    pub fn correspondences(
        &self,
        prev: &GrayImage,
        next: &GrayImage,
        points: &[TrackedPoint],
    ) -> Vec<Correspondence> {
        let positions = points.iter().map(|p| p.pos).collect::<Vec<_>>();

        self.track(prev, next, &positions)
            .into_iter()
            .zip(points)
            .filter(|(status, _)| status.found)
            .map(|(status, p)| Correspondence::new(p.id, p.pos, status.pos))
            .collect()
    }

    /// Build image pyramids of both frames, stopping early when a level gets smaller than the
    /// integration window.
    fn pyramid(&self, prev: &GrayImage, next: &GrayImage) -> Vec<Level> {
        let mut images = vec![(prev.clone(), next.clone())];

        for _ in 0..self.params.levels {
            let (p, n) = match images.last() {
                Some((p, n)) => (p.pyr_down(), n.pyr_down()),
                None => break,
            };

            if p.width().min(p.height()) < self.params.window {
                break;
            }

            images.push((p, n));
        }

        images
            .into_iter()
            .map(|(prev, next)| {
                let (gx, gy) = prev.sobel();
                Level {
                    gx: gx.scaled(0.125),
                    gy: gy.scaled(0.125),
                    prev,
                    next,
                }
            })
            .collect()
    }

    fn track_point(&self, pyramid: &[Level], pt: na::Point2<f32>) -> TrackStatus {
        let mut guess = na::Vector2::zeros();
        let mut found = true;

        for (lvl, level) in pyramid.iter().enumerate().rev() {
            let p = pt / (1u32 << lvl) as f32;

            match self.refine(level, p, guess) {
                Some(d) => guess = d,
                None if lvl == 0 => found = false,
                None => {}
            }

            if lvl > 0 {
                guess *= 2.0;
            }
        }

        let pos = pt + guess;

        let (w, h) = pyramid[0].prev.dim();
        found &= pos.x >= 0.0 && pos.y >= 0.0 && pos.x <= (w - 1) as f32 && pos.y <= (h - 1) as f32;

        TrackStatus { pos, found }
    }

    /// Gauss-Newton refinement of the displacement of `p` on a single pyramid level.
    ///
    /// Returns `None` when the window is too flat to be tracked or the estimate leaves the image.
    fn refine(
        &self,
        level: &Level,
        p: na::Point2<f32>,
        guess: na::Vector2<f32>,
    ) -> Option<na::Vector2<f32>> {
        let half = (self.params.window / 2) as isize;
        let area = (self.params.window * self.params.window) as f32;

        let mut patch = Vec::with_capacity(self.params.window * self.params.window);
        let (mut a11, mut a12, mut a22) = (0f32, 0f32, 0f32);

        for oy in -half..=half {
            for ox in -half..=half {
                let (ox, oy) = (ox as f32, oy as f32);
                let (x, y) = (p.x + ox, p.y + oy);

                let ix = level.gx.sample(x, y);
                let iy = level.gy.sample(x, y);

                a11 += ix * ix;
                a12 += ix * iy;
                a22 += iy * iy;

                patch.push((ox, oy, level.prev.sample(x, y), ix, iy));
            }
        }

        let det = a11 * a22 - a12 * a12;
        let min_eigen =
            (a11 + a22 - ((a11 - a22) * (a11 - a22) + 4.0 * a12 * a12).sqrt()) / (2.0 * area);

        if min_eigen < self.params.min_eigen || det < f32::EPSILON {
            return None;
        }

        let (w, h) = level.next.dim();
        let margin = half as f32;
        let eps2 = self.params.epsilon * self.params.epsilon;

        let mut d = guess;

        for _ in 0..self.params.max_iters {
            let q = p + d;

            if q.x < -margin || q.y < -margin || q.x > w as f32 + margin || q.y > h as f32 + margin
            {
                return None;
            }

            let (mut b1, mut b2) = (0f32, 0f32);

            for &(ox, oy, i0, ix, iy) in &patch {
                let it = level.next.sample(q.x + ox, q.y + oy) - i0;
                b1 += it * ix;
                b2 += it * iy;
            }

            let delta = na::Vector2::new((a12 * b2 - a22 * b1) / det, (a12 * b1 - a11 * b2) / det);

            d += delta;

            if delta.norm_squared() <= eps2 {
                break;
            }
        }

        Some(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::blobs;

    fn points() -> Vec<na::Point2<f32>> {
        vec![
            na::Point2::new(22.0, 20.0),
            na::Point2::new(40.0, 26.0),
            na::Point2::new(28.0, 40.0),
        ]
    }

    #[test]
    fn recovers_known_shift() {
        let prev = blobs(64, 64, 0.0, 0.0);
        let next = blobs(64, 64, 3.0, -2.0);

        let flow = SparseFlow::default();

        for (status, pt) in flow.track(&prev, &next, &points()).into_iter().zip(points()) {
            assert!(status.found);
            let motion = status.pos - pt;
            assert!((motion.x - 3.0).abs() < 0.2, "dx {}", motion.x);
            assert!((motion.y + 2.0).abs() < 0.2, "dy {}", motion.y);
        }
    }

    #[test]
    fn identical_frames_do_not_move() {
        let img = blobs(64, 64, 0.0, 0.0);
        let flow = SparseFlow::default();

        for (status, pt) in flow.track(&img, &img, &points()).into_iter().zip(points()) {
            assert!(status.found);
            assert!((status.pos - pt).norm() < 1e-4);
        }
    }

    #[test]
    fn flat_frames_lose_points() {
        let img = GrayImage::from_fn(48, 48, |_, _| 90.0);
        let flow = SparseFlow::default();

        let status = flow.track(&img, &img, &[na::Point2::new(24.0, 24.0)]);
        assert!(!status[0].found);
    }

    #[test]
    fn only_found_points_correspond() {
        let img = blobs(64, 64, 0.0, 0.0);
        let flat = GrayImage::from_fn(64, 64, |_, _| 0.0);
        let flow = SparseFlow::default();

        let tracked = [TrackedPoint {
            id: 7,
            pos: na::Point2::new(22.0, 20.0),
        }];

        assert_eq!(flow.correspondences(&img, &img, &tracked).len(), 1);
        assert!(flow.correspondences(&flat, &flat, &tracked).is_empty());
        // Mismatched frame sizes are never tracked.
        assert!(flow
            .correspondences(&img, &GrayImage::new(32, 32), &tracked)
            .is_empty());
    }
}
