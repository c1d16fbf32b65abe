//! Synthetic images shared by the unit tests.

use crate::prelude::v1::*;

/// Checkerboard of `cell` sized squares alternating between 30 and 220.
pub fn checkerboard(w: usize, h: usize, cell: usize) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            30.0
        } else {
            220.0
        }
    })
}

/// Gaussian blobs on a dark background, with the content moved by `(sx, sy)`.
pub fn blobs(w: usize, h: usize, sx: f32, sy: f32) -> GrayImage {
    const CENTERS: [(f32, f32); 5] = [
        (20.0, 22.0),
        (42.0, 24.0),
        (30.0, 40.0),
        (12.0, 44.0),
        (50.0, 48.0),
    ];

    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as f32 - sx, y as f32 - sy);
        40.0 + CENTERS
            .iter()
            .map(|(cx, cy)| {
                let d2 = (x - cx) * (x - cx) + (y - cy) * (y - cy);
                120.0 * (-d2 / 50.0).exp()
            })
            .sum::<f32>()
    })
}

/// Smooth frame-filling sinusoidal texture, with the content moved by `(sx, sy)`.
pub fn texture(w: usize, h: usize, sx: f32, sy: f32) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as f32 - sx, y as f32 - sy);
        128.0 + 40.0 * (0.35 * x).sin() * (0.3 * y).cos() + 30.0 * (0.2 * x + 0.25 * y).sin()
    })
}

/// Dark left half, bright right half, split at column `split`.
pub fn step(w: usize, h: usize, split: usize) -> GrayImage {
    GrayImage::from_fn(w, h, |x, _| if x < split { 0.0 } else { 200.0 })
}

/// Dark top half, bright bottom half, split at row `split`.
pub fn step_rows(w: usize, h: usize, split: usize) -> GrayImage {
    GrayImage::from_fn(w, h, |_, y| if y < split { 0.0 } else { 200.0 })
}
