//! # Hough line transforms
//!
//! Both transforms vote in a `(theta, rho)` accumulator where a line is the set of points
//! satisfying `x cos(theta) + y sin(theta) = rho`. `theta` spans `[0, pi)` and `rho` is offset so
//! that negative distances get valid bins.

use super::{canny::EdgeMap, LineSegment};
use nalgebra as na;
use rand::{seq::SliceRandom, Rng};
use std::f32::consts::PI;

/// Fixed point precision used while walking along a probabilistic line.
const SHIFT: u32 = 16;

/// Parameters shared by both transforms.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HoughParams {
    /// Distance resolution in pixels.
    pub rho: f32,
    /// Angle resolution in degrees.
    pub theta: f32,
    /// Votes a line needs to be accepted.
    pub threshold: usize,
    /// Minimum length of a probabilistic segment.
    pub min_length: f32,
    /// Maximum gap between points of a probabilistic segment.
    pub max_gap: usize,
    /// Seed of the probabilistic visiting order.
    pub seed: u64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta: 1.0,
            threshold: 100,
            min_length: 80.0,
            max_gap: 20,
            seed: 0,
        }
    }
}

struct Accumulator {
    numangle: usize,
    numrho: usize,
    /// Bin of `rho = 0`. Distances never exceed the frame diagonal, so every bin is in
    /// `0..numrho`.
    offset: usize,
    /// `(cos, sin)` of each angle, divided by the rho resolution.
    trig: Vec<(f32, f32)>,
}

impl Accumulator {
    fn new(width: usize, height: usize, params: &HoughParams) -> Self {
        let theta = params.theta.to_radians();
        let numangle = ((PI / theta).round() as usize).max(1);
        let offset = ((width as f32).hypot(height as f32) / params.rho).ceil() as usize;
        let numrho = 2 * offset + 1;
        let irho = 1.0 / params.rho;

        let trig = (0..numangle)
            .map(|n| {
                let t = n as f32 * theta;
                (t.cos() * irho, t.sin() * irho)
            })
            .collect();

        Self {
            numangle,
            numrho,
            offset,
            trig,
        }
    }

    /// Accumulator bin of point `(x, y)` at angle index `n`.
    fn bin(&self, n: usize, x: usize, y: usize) -> usize {
        let (c, s) = self.trig[n];
        let r = (x as f32 * c + y as f32 * s).round() as isize + self.offset as isize;
        r.clamp(0, self.numrho as isize - 1) as usize
    }
}

/// Standard Hough transform.
///
/// Returns lines ordered by decreasing vote count. A line is reported when it has more than
/// `threshold` votes and is a local maximum among its 4 neighbours in the accumulator.
pub fn hough_lines(edges: &EdgeMap, params: &HoughParams) -> Vec<LineSegment> {
    let (w, h) = edges.dim();
    let acc = Accumulator::new(w, h, params);
    let theta = params.theta.to_radians();

    // Padded by one bin on every side so neighbour checks need no bounds tests.
    let stride = acc.numrho + 2;
    let mut votes = vec![0usize; (acc.numangle + 2) * stride];

    for (x, y) in edges.points() {
        for n in 0..acc.numangle {
            votes[(n + 1) * stride + acc.bin(n, x, y) + 1] += 1;
        }
    }

    let mut peaks = vec![];

    for n in 0..acc.numangle {
        for r in 0..acc.numrho {
            let base = (n + 1) * stride + r + 1;
            let v = votes[base];

            if v > params.threshold
                && v > votes[base - 1]
                && v >= votes[base + 1]
                && v > votes[base - stride]
                && v >= votes[base + stride]
            {
                peaks.push((v, n, r));
            }
        }
    }

    peaks.sort_by(|a, b| b.0.cmp(&a.0));

    peaks
        .into_iter()
        .map(|(_, n, r)| LineSegment::Polar {
            rho: (r as f32 - acc.offset as f32) * params.rho,
            theta: n as f32 * theta,
        })
        .collect()
}

/// Progressive probabilistic Hough transform.
///
/// Edge points are visited in random order. Each visited point votes, and once one of its bins
/// reaches `threshold`, the corresponding line is walked in both directions through edge pixels,
/// tolerating gaps of up to `max_gap`. Walked pixels are removed from further consideration, and
/// if the resulting segment is at least `min_length` long along either axis, it is reported and
/// its votes are withdrawn.
pub fn hough_lines_p(edges: &EdgeMap, params: &HoughParams, rng: &mut impl Rng) -> Vec<LineSegment> {
    let (w, h) = edges.dim();
    let acc = Accumulator::new(w, h, params);

    // Signed, withdrawing a line also removes votes of pixels that were never visited.
    let mut votes = vec![0i32; acc.numangle * acc.numrho];
    let mut mask = vec![false; w * h];

    let mut points = edges.points().collect::<Vec<_>>();

    for &(x, y) in &points {
        mask[y * w + x] = true;
    }

    points.shuffle(rng);

    let mut lines = vec![];

    for (x, y) in points {
        if !mask[y * w + x] {
            continue;
        }

        let threshold = params.threshold as i32;
        let mut max_val = threshold - 1;
        let mut max_n = None;

        for n in 0..acc.numangle {
            let val = &mut votes[n * acc.numrho + acc.bin(n, x, y)];
            *val += 1;
            if max_val < *val {
                max_val = *val;
                max_n = Some(n);
            }
        }

        let max_n = match max_n {
            Some(n) if max_val >= threshold => n,
            _ => continue,
        };

        let walker = Walker::new(&acc, max_n, x, y);

        let mut ends = [(x, y); 2];

        for (k, end) in ends.iter_mut().enumerate() {
            let mut gap = 0;

            for (px, py) in walker.walk(k == 1, w, h) {
                if mask[py * w + px] {
                    gap = 0;
                    *end = (px, py);
                } else {
                    gap += 1;
                    if gap > params.max_gap {
                        break;
                    }
                }
            }
        }

        let good = (ends[1].0 as f32 - ends[0].0 as f32).abs() >= params.min_length
            || (ends[1].1 as f32 - ends[0].1 as f32).abs() >= params.min_length;

        for (k, &end) in ends.iter().enumerate() {
            for (px, py) in walker.walk(k == 1, w, h) {
                if mask[py * w + px] {
                    if good {
                        for n in 0..acc.numangle {
                            votes[n * acc.numrho + acc.bin(n, px, py)] -= 1;
                        }
                    }
                    mask[py * w + px] = false;
                }

                if (px, py) == end {
                    break;
                }
            }
        }

        if good {
            lines.push(LineSegment::Segment {
                start: na::Point2::new(ends[0].0 as f32, ends[0].1 as f32),
                end: na::Point2::new(ends[1].0 as f32, ends[1].1 as f32),
            });
        }
    }

    lines
}

/// Fixed point stepper along a line, advancing one pixel per step on its dominant axis.
struct Walker {
    x0: i64,
    y0: i64,
    dx: i64,
    dy: i64,
    x_major: bool,
}

impl Walker {
    fn new(acc: &Accumulator, n: usize, x: usize, y: usize) -> Self {
        let (c, s) = acc.trig[n];
        // Direction along the line is perpendicular to its normal.
        let (a, b) = (-s, c);
        let (x, y) = (x as i64, y as i64);
        let half = 1i64 << (SHIFT - 1);

        if a.abs() > b.abs() {
            Self {
                x0: x,
                y0: (y << SHIFT) + half,
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * (1i64 << SHIFT) as f32 / a.abs()).round() as i64,
                x_major: true,
            }
        } else {
            Self {
                x0: (x << SHIFT) + half,
                y0: y,
                dx: (a * (1i64 << SHIFT) as f32 / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
                x_major: false,
            }
        }
    }

    /// Pixels visited from the start point, including it, until the frame border.
    fn walk(&self, backwards: bool, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
        let (dx, dy) = if backwards {
            (-self.dx, -self.dy)
        } else {
            (self.dx, self.dy)
        };

        let (x0, y0, x_major) = (self.x0, self.y0, self.x_major);
        let (w, h) = (w as i64, h as i64);

        (0..)
            .map(move |i: i64| (x0 + dx * i, y0 + dy * i))
            .map(move |(x, y)| {
                if x_major {
                    (x, y >> SHIFT)
                } else {
                    (x >> SHIFT, y)
                }
            })
            .take_while(move |&(x, y)| x >= 0 && y >= 0 && x < w && y < h)
            .map(|(x, y)| (x as usize, y as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::canny::{canny, CannyParams};
    use crate::test_util::{step, step_rows};
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn edges_of(img: &crate::frame::GrayImage) -> EdgeMap {
        canny(img, &CannyParams::default())
    }

    #[test]
    fn standard_finds_single_vertical_line() {
        let edges = edges_of(&step(160, 160, 80));
        let lines = hough_lines(&edges, &Default::default());

        assert_eq!(lines.len(), 1);

        match lines[0] {
            LineSegment::Polar { rho, theta } => {
                assert_approx_eq!(rho, 79.0);
                assert_approx_eq!(theta, 0.0);
            }
            _ => panic!("expected a polar line"),
        }
    }

    #[test]
    fn standard_below_threshold_is_empty() {
        // Only 58 edge pixels in the column.
        let edges = edges_of(&step(60, 60, 30));
        assert!(hough_lines(&edges, &Default::default()).is_empty());
        assert!(hough_lines(&EdgeMap::new(0, 0), &Default::default()).is_empty());
    }

    #[test]
    fn coarse_rho_on_small_frame() {
        let edges = edges_of(&step(60, 40, 55));
        let params = HoughParams {
            rho: 100.0,
            threshold: 10,
            ..Default::default()
        };

        let acc = Accumulator::new(60, 40, &params);
        assert_eq!((acc.offset, acc.numrho), (1, 3));

        for (x, y) in edges.points() {
            for n in 0..acc.numangle {
                assert!(acc.bin(n, x, y) < acc.numrho);
            }
        }

        let lines = hough_lines(&edges, &params);
        assert!(lines
            .iter()
            .all(|l| matches!(l, LineSegment::Polar { rho, .. } if rho.abs() <= 100.0)));

        let mut rng = StdRng::seed_from_u64(0);
        hough_lines_p(&edges, &params, &mut rng);
    }

    #[test]
    fn probabilistic_finds_vertical_segment() {
        let edges = edges_of(&step(160, 160, 80));
        let mut rng = StdRng::seed_from_u64(0);

        let lines = hough_lines_p(&edges, &Default::default(), &mut rng);

        assert_eq!(lines.len(), 1);

        match lines[0] {
            LineSegment::Segment { start, end } => {
                assert_approx_eq!(start.x, 79.0);
                assert_approx_eq!(end.x, 79.0);
                assert_approx_eq!((end.y - start.y).abs(), 157.0);
            }
            _ => panic!("expected a segment"),
        }
    }

    #[test]
    fn probabilistic_finds_horizontal_segment() {
        let edges = edges_of(&step_rows(160, 160, 80));
        let mut rng = StdRng::seed_from_u64(7);

        let lines = hough_lines_p(&edges, &Default::default(), &mut rng);

        assert_eq!(lines.len(), 1);
        assert_approx_eq!(lines[0].angle(), 0.0);
    }

    #[test]
    fn probabilistic_rejects_short_segments() {
        let edges = edges_of(&step(160, 160, 80));
        let params = HoughParams {
            min_length: 200.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);

        assert!(hough_lines_p(&edges, &params, &mut rng).is_empty());
    }
}
