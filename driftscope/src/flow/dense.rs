//! # Farneback dense optical flow
//!
//! Each frame is locally approximated by a quadratic polynomial `x^T A x + b^T x + c`. A pure
//! translation `d` between two frames changes the linear term by `-2 A d`, so comparing the
//! expansions of both frames gives a per-pixel linear system for `d`. The systems are averaged
//! over a window, solved, and the solution is refined over several iterations and from coarse to
//! fine pyramid levels.

use crate::prelude::v1::*;
use nalgebra as na;
use rayon::prelude::*;

/// Pyramid levels below this size are skipped.
const MIN_LEVEL_SIZE: usize = 32;

/// Parameters of the dense estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DenseFlowParams {
    /// Image scale between consecutive pyramid levels.
    pub pyr_scale: f32,
    /// Number of pyramid levels, including the full resolution one.
    pub levels: usize,
    /// Averaging window size.
    pub window: usize,
    /// Iterations at each pyramid level.
    pub iterations: usize,
    /// Half size of the pixel neighbourhood used for the polynomial expansion.
    pub poly_n: usize,
    /// Standard deviation of the Gaussian weighting the polynomial expansion.
    pub poly_sigma: f32,
}

impl Default for DenseFlowParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            window: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

/// Quadratic expansion coefficients of a single pixel.
///
/// `[b.x, b.y, A11, A22, A12]`
type Poly = [f32; 5];

/// Weighted least squares projection onto the quadratic basis `1, x, y, x², y², xy`.
struct PolyBasis {
    weighted: Vec<(isize, isize, na::Vector6<f32>)>,
    inv_gram: na::Matrix6<f32>,
}

impl PolyBasis {
    fn new(poly_n: usize, sigma: f32) -> Self {
        let radius = poly_n as isize;
        let mut weighted = vec![];
        let mut gram = na::Matrix6::zeros();

        for oy in -radius..=radius {
            for ox in -radius..=radius {
                let (x, y) = (ox as f32, oy as f32);
                let w = (-(x * x + y * y) / (2.0 * sigma * sigma)).exp();
                let basis = na::Vector6::new(1.0, x, y, x * x, y * y, x * y);
                gram += basis * basis.transpose() * w;
                weighted.push((ox, oy, basis * w));
            }
        }

        Self {
            weighted,
            inv_gram: gram.try_inverse().unwrap_or_else(na::Matrix6::zeros),
        }
    }

    fn expand(&self, img: &GrayImage) -> Vec<Poly> {
        let (w, h) = img.dim();
        let mut out = vec![[0f32; 5]; w * h];

        if w == 0 {
            return out;
        }

        out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, poly) in row.iter_mut().enumerate() {
                let mut acc = na::Vector6::zeros();

                for (ox, oy, wb) in &self.weighted {
                    acc += wb * img.get_clamped(x as isize + ox, y as isize + oy);
                }

                let r = self.inv_gram * acc;
                *poly = [r[1], r[2], r[3], r[4], r[5] * 0.5];
            }
        });

        out
    }
}

/// Dense optical flow estimator.
#[derive(Clone, Debug, Default)]
pub struct DenseFlow {
    params: DenseFlowParams,
}

impl DenseFlow {
    pub fn new(params: DenseFlowParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DenseFlowParams {
        &self.params
    }

    /// Compute the displacement of every pixel of `prev` in `next`.
    ///
    /// Pixel `(x, y)` of `prev` is expected to be found at `(x, y) + flow(x, y)` in `next`.
    /// Frames of different dimensions produce an all-zero field.
    pub fn calc(&self, prev: &GrayImage, next: &GrayImage) -> FlowField {
        let (w, h) = prev.dim();

        if prev.dim() != next.dim() || w == 0 || h == 0 {
            return FlowField::new(w, h);
        }

        let basis = PolyBasis::new(self.params.poly_n, self.params.poly_sigma);

        let mut flow: Option<FlowField> = None;

        for k in (0..self.levels(w, h)).rev() {
            let scale = self.params.pyr_scale.powi(k as i32);
            let (lw, lh) = (
                ((w as f32 * scale).round() as usize).max(1),
                ((h as f32 * scale).round() as usize).max(1),
            );

            let (p, n) = if k == 0 {
                (prev.clone(), next.clone())
            } else {
                let sigma = (1.0 / scale - 1.0) * 0.5;
                (
                    prev.gaussian_blur(sigma).resize(lw, lh),
                    next.gaussian_blur(sigma).resize(lw, lh),
                )
            };

            let mut level_flow = match flow.take() {
                Some(f) => f.resized(lw, lh, 1.0 / self.params.pyr_scale),
                None => FlowField::new(lw, lh),
            };

            let r1 = basis.expand(&p);
            let r2 = basis.expand(&n);

            for _ in 0..self.params.iterations {
                let mats = self.update_matrices(&r1, &r2, &level_flow, lw, lh);
                let mats = blur_channels(&mats, lw, lh, self.params.window);
                solve_flow(&mats, &mut level_flow);
            }

            flow = Some(level_flow);
        }

        flow.unwrap_or_else(|| FlowField::new(w, h))
    }

    /// Number of usable pyramid levels for a frame of the given size.
    fn levels(&self, w: usize, h: usize) -> usize {
        let mut levels = 1;

        while levels < self.params.levels.max(1) {
            let scale = self.params.pyr_scale.powi(levels as i32);
            let smallest = (w.min(h) as f32 * scale).round() as usize;
            if smallest < MIN_LEVEL_SIZE {
                break;
            }
            levels += 1;
        }

        levels
    }

    /// Per-pixel normal equations `[G11, G12, G22, h1, h2]` of the displacement update.
    fn update_matrices(
        &self,
        r1: &[Poly],
        r2: &[Poly],
        flow: &FlowField,
        w: usize,
        h: usize,
    ) -> Vec<[f32; 5]> {
        let mut out = vec![[0f32; 5]; w * h];

        out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            for (x, m) in row.iter_mut().enumerate() {
                let d = flow.get_motion(x, y);
                let (fx, fy) = (x as f32 + d.x, y as f32 + d.y);

                if fx < 0.0 || fy < 0.0 || fx > (w - 1) as f32 || fy > (h - 1) as f32 {
                    continue;
                }

                let p1 = &r1[y * w + x];
                let p2 = sample_poly(r2, w, h, fx, fy);

                let a11 = (p1[2] + p2[2]) * 0.5;
                let a22 = (p1[3] + p2[3]) * 0.5;
                let a12 = (p1[4] + p2[4]) * 0.5;

                let b1 = -0.5 * (p2[0] - p1[0]) + a11 * d.x + a12 * d.y;
                let b2 = -0.5 * (p2[1] - p1[1]) + a12 * d.x + a22 * d.y;

                *m = [
                    a11 * a11 + a12 * a12,
                    a12 * (a11 + a22),
                    a12 * a12 + a22 * a22,
                    a11 * b1 + a12 * b2,
                    a12 * b1 + a22 * b2,
                ];
            }
        });

        out
    }
}

fn sample_poly(r: &[Poly], w: usize, h: usize, x: f32, y: f32) -> Poly {
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let mut out = [0f32; 5];
    for (i, o) in out.iter_mut().enumerate() {
        let top = r[y0 * w + x0][i] * (1.0 - fx) + r[y0 * w + x1][i] * fx;
        let bottom = r[y1 * w + x0][i] * (1.0 - fx) + r[y1 * w + x1][i] * fx;
        *o = top * (1.0 - fy) + bottom * fy;
    }
    out
}

/// Box blur every channel of the normal equations.
fn blur_channels(mats: &[[f32; 5]], w: usize, h: usize, window: usize) -> Vec<[f32; 5]> {
    let channels = (0..5)
        .into_par_iter()
        .map(|c| {
            let data = mats.iter().map(|m| m[c]).collect::<Vec<_>>();
            GrayImage::from_vec(w, h, data)
                .map(|img| img.box_filter(window))
                .unwrap_or_else(|_| GrayImage::new(w, h))
        })
        .collect::<Vec<_>>();

    (0..w * h)
        .map(|i| {
            let mut m = [0f32; 5];
            for (c, img) in channels.iter().enumerate() {
                m[c] = img.as_slice()[i];
            }
            m
        })
        .collect()
}

/// Solve the averaged 2x2 systems in place.
fn solve_flow(mats: &[[f32; 5]], flow: &mut FlowField) {
    let (w, _) = flow.dim();

    if w == 0 {
        return;
    }

    flow.as_mut_slice()
        .par_chunks_mut(2 * w)
        .zip(mats.par_chunks(w))
        .for_each(|(row, mats)| {
            for (d, m) in row.chunks_exact_mut(2).zip(mats) {
                let inv_det = 1.0 / (m[0] * m[2] - m[1] * m[1] + 1e-3);
                d[0] = (m[2] * m[3] - m[1] * m[4]) * inv_det;
                d[1] = (m[0] * m[4] - m[1] * m[3]) * inv_det;
            }
        });
}
