//! # Canny edge detection

use crate::prelude::v1::*;

/// tan(22.5°)
const TAN_22_5: f32 = 0.414_213_57;
/// tan(67.5°)
const TAN_67_5: f32 = 2.414_213_7;

/// Parameters of the edge detector.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CannyParams {
    /// Hysteresis threshold below which gradients are never edges.
    pub low: f32,
    /// Hysteresis threshold above which gradients always start an edge.
    pub high: f32,
    /// Sobel aperture. Only 3 is supported.
    pub aperture: usize,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low: 50.0,
            high: 150.0,
            aperture: 3,
        }
    }
}

/// Binary edge image.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeMap {
    width: usize,
    height: usize,
    edges: Vec<bool>,
}

impl EdgeMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            edges: vec![false; width * height],
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.edges[y * self.width + x]
    }

    fn set(&mut self, x: usize, y: usize) {
        self.edges[y * self.width + x] = true;
    }

    /// Number of edge pixels.
    pub fn count(&self) -> usize {
        self.edges.iter().filter(|&&e| e).count()
    }

    /// Iterate `(x, y)` coordinates of edge pixels in raster order.
    pub fn points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.width;
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, &e)| e)
            .map(move |(i, _)| (i % width, i / width))
    }

    /// 8-bit rendering, 255 on edges and 0 elsewhere.
    pub fn to_u8(&self) -> Vec<u8> {
        self.edges.iter().map(|&e| if e { 255 } else { 0 }).collect()
    }
}

/// Detect edges of a grayscale image.
///
/// Gradients come from the 3x3 Sobel operator with L1 magnitude. Pixels that are not maxima along
/// their quantised gradient direction are suppressed, then every pixel above `high` seeds an edge
/// that grows through 8-connected pixels above `low`. The outermost pixel ring is never an edge.
pub fn canny(img: &GrayImage, params: &CannyParams) -> EdgeMap {
    let (w, h) = img.dim();
    let mut out = EdgeMap::new(w, h);

    if w < 3 || h < 3 {
        return out;
    }

    let (gx, gy) = img.sobel();

    let mag = GrayImage::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            0.0
        } else {
            gx.get(x, y).abs() + gy.get(x, y).abs()
        }
    });

    // 0 - suppressed, 1 - weak, 2 - strong
    let mut class = vec![0u8; w * h];
    let mut stack = vec![];

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = mag.get(x, y);

            if m <= params.low {
                continue;
            }

            let (dx, dy) = (gx.get(x, y), gy.get(x, y));
            let (ax, ay) = (dx.abs(), dy.abs());

            let is_max = if ay < ax * TAN_22_5 {
                m > mag.get(x - 1, y) && m >= mag.get(x + 1, y)
            } else if ay > ax * TAN_67_5 {
                m > mag.get(x, y - 1) && m >= mag.get(x, y + 1)
            } else {
                let s: isize = if (dx < 0.0) != (dy < 0.0) { -1 } else { 1 };
                m > mag.get((x as isize - s) as usize, y - 1)
                    && m > mag.get((x as isize + s) as usize, y + 1)
            };

            if !is_max {
                continue;
            }

            if m > params.high {
                class[y * w + x] = 2;
                stack.push((x, y));
            } else {
                class[y * w + x] = 1;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        out.set(x, y);

        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                let c = &mut class[ny * w + nx];
                if *c == 1 {
                    *c = 2;
                    stack.push((nx, ny));
                }
            }
        }
    }

    out
}
