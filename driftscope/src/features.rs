//! # Feature selection
//!
//! Shi-Tomasi corner selection used to seed the sparse tracker.

use crate::prelude::v1::*;
use nalgebra as na;

/// Below this many live points the tracking basis gets replaced.
pub const MIN_TRACKED_POINTS: usize = 10;

/// Parameters of the corner selection.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeatureParams {
    /// Maximum number of points returned.
    pub max_points: usize,
    /// Minimum corner quality, relative to the best corner of the frame.
    pub quality: f32,
    /// Minimum euclidean distance between returned points.
    pub min_distance: f32,
    /// Neighbourhood over which the structure tensor is summed.
    pub block_size: usize,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            max_points: 100,
            quality: 0.3,
            min_distance: 7.0,
            block_size: 7,
        }
    }
}

/// Image point with an identity that is stable while it is being tracked.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedPoint {
    pub id: u64,
    pub pos: na::Point2<f32>,
}

/// Selects trackable points and hands out their identities.
#[derive(Clone, Debug)]
pub struct FeatureTracker {
    params: FeatureParams,
    next_id: u64,
}

impl FeatureTracker {
    pub fn new(params: FeatureParams) -> Self {
        Self { params, next_id: 0 }
    }

    pub fn params(&self) -> &FeatureParams {
        &self.params
    }

    /// Whether a tracked set of `count` points is too sparse to keep.
    pub fn needs_reseed(count: usize) -> bool {
        count < MIN_TRACKED_POINTS
    }

    /// Detect a fresh tracking basis, assigning new identities to every point.
    pub fn seed(&mut self, img: &GrayImage) -> Vec<TrackedPoint> {
        self.detect(img)
            .into_iter()
            .map(|pos| {
                let id = self.next_id;
                self.next_id += 1;
                TrackedPoint { id, pos }
            })
            .collect()
    }

    /// Find the strongest corners of the image.
    ///
    /// Corner quality is the smaller eigenvalue of the gradient structure tensor. Only 3x3 local
    /// maxima strictly above `quality` times the best response are considered, strongest first,
    /// and a candidate closer than `min_distance` to an already accepted point is skipped.
    pub fn detect(&self, img: &GrayImage) -> Vec<na::Point2<f32>> {
        let (w, h) = img.dim();

        if w < 3 || h < 3 || self.params.max_points == 0 {
            return vec![];
        }

        let eig = min_eigen_map(img, self.params.block_size);

        let best = eig.as_slice().iter().copied().fold(0f32, f32::max);

        if best <= 0.0 {
            return vec![];
        }

        let threshold = best * self.params.quality;

        let mut candidates = vec![];

        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let v = eig.get(x, y);
                if v <= threshold {
                    continue;
                }

                let is_max = (-1..=1)
                    .flat_map(|oy| (-1..=1).map(move |ox| (ox, oy)))
                    .all(|(ox, oy)| eig.get_clamped(x as isize + ox, y as isize + oy) <= v);

                if is_max {
                    candidates.push((v, x, y));
                }
            }
        }

        // Strongest first, raster order between equals.
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then((a.2, a.1).cmp(&(b.2, b.1))));

        let min_dist2 = self.params.min_distance * self.params.min_distance;
        let mut points: Vec<na::Point2<f32>> = vec![];

        for (_, x, y) in candidates {
            let p = na::Point2::new(x as f32, y as f32);

            if points.iter().all(|o| (o - p).norm_squared() >= min_dist2) {
                points.push(p);
                if points.len() >= self.params.max_points {
                    break;
                }
            }
        }

        points
    }
}

/// Minimum eigenvalue of the structure tensor at every pixel.
fn min_eigen_map(img: &GrayImage, block_size: usize) -> GrayImage {
    let (gx, gy) = img.sobel();
    let (w, h) = img.dim();

    let xx = GrayImage::from_fn(w, h, |x, y| gx.get(x, y) * gx.get(x, y)).box_filter(block_size);
    let xy = GrayImage::from_fn(w, h, |x, y| gx.get(x, y) * gy.get(x, y)).box_filter(block_size);
    let yy = GrayImage::from_fn(w, h, |x, y| gy.get(x, y) * gy.get(x, y)).box_filter(block_size);

    GrayImage::from_fn(w, h, |x, y| {
        let (a, b, c) = (xx.get(x, y), xy.get(x, y), yy.get(x, y));
        let half_diff = (a - c) * 0.5;
        ((a + c) * 0.5 - (half_diff * half_diff + b * b).sqrt()).max(0.0)
    })
}
