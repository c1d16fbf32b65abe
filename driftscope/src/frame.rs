//! # Frames and grayscale images

use crate::prelude::v1::*;
use bytemuck::{Pod, Zeroable};

/// RGBA colour structure.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RGBA {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl RGBA {
    /// Convert from a slice containing `[r, g, b]` elements.
    pub fn from_rgb_slice(rgb: &[u8]) -> Self {
        Self {
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
            a: 255,
        }
    }

    /// Convert from a slice containing [r, g, b, a] elements.
    pub fn from_rgba_slice(rgba: &[u8]) -> Self {
        Self {
            r: rgba[0],
            g: rgba[1],
            b: rgba[2],
            a: rgba[3],
        }
    }

    /// Opaque gray pixel.
    pub fn gray(v: u8) -> Self {
        Self {
            r: v,
            g: v,
            b: v,
            a: 255,
        }
    }

    /// BT.601 luma of the colour, in 0-255 range.
    pub fn luma(&self) -> f32 {
        0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32
    }
}

/// Single colour frame, as produced by a [`FrameSource`](crate::source::FrameSource).
///
/// Frames are immutable once built. The pipeline only keeps the grayscale conversion of the
/// previous frame around.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<RGBA>,
}

impl Frame {
    /// Create a frame from RGBA pixels in row-major order.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the frame.
    /// * `height` - height of the frame.
    /// * `pixels` - `width * height` pixels.
    pub fn new(width: usize, height: usize, pixels: Vec<RGBA>) -> Result<Self> {
        ensure!(
            pixels.len() == width * height,
            "frame of {}x{} needs {} pixels, got {}",
            width,
            height,
            width * height,
            pixels.len()
        );

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a frame from a tightly packed `[r, g, b]` buffer.
    pub fn from_rgb(width: usize, height: usize, rgb: &[u8]) -> Result<Self> {
        ensure!(
            rgb.len() == width * height * 3,
            "RGB buffer length {} does not match {}x{}",
            rgb.len(),
            width,
            height
        );
        Self::new(
            width,
            height,
            rgb.chunks_exact(3).map(RGBA::from_rgb_slice).collect(),
        )
    }

    /// Create a frame from an 8-bit grayscale buffer.
    pub fn from_gray(width: usize, height: usize, gray: &[u8]) -> Result<Self> {
        Self::new(width, height, gray.iter().copied().map(RGBA::gray).collect())
    }

    /// Create a frame by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> RGBA) -> Self {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();

        Self {
            width,
            height,
            pixels,
        }
    }

    /// Get width and height of the frame.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[RGBA] {
        &self.pixels
    }

    /// Raw `r, g, b, a` bytes of the frame.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Convert the frame to a grayscale image.
    pub fn to_gray(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.pixels.iter().map(RGBA::luma).collect(),
        }
    }
}

/// Single channel floating point image.
///
/// Intensities are kept in the 0-255 range of the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct GrayImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl GrayImage {
    /// Create a black image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Create an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap a row-major buffer.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        ensure!(
            data.len() == width * height,
            "image of {}x{} needs {} samples, got {}",
            width,
            height,
            width * height,
            data.len()
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Get width and height of the image.
    pub fn dim(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Get a pixel, replicating the border for out of range coordinates.
    pub fn get_clamped(&self, x: isize, y: isize) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.get(x, y)
    }

    /// Bilinearly sample the image at sub-pixel coordinates.
    ///
    /// Coordinates outside the image are clamped to the border.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.is_empty() {
            return 0.0;
        }

        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);

        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);

        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;

        top * (1.0 - fy) + bottom * fy
    }

    /// Convolve rows and then columns with the same 1-D kernel.
    ///
    /// The kernel is centered, so it must be of odd length. Borders are replicated.
    pub fn convolve_separable(&self, kernel: &[f32]) -> Self {
        let radius = (kernel.len() / 2) as isize;

        let mut tmp = Self::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = kernel
                    .iter()
                    .enumerate()
                    .map(|(i, k)| k * self.get_clamped(x as isize + i as isize - radius, y as _))
                    .sum();
                tmp.set(x, y, v);
            }
        }

        let mut out = Self::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = kernel
                    .iter()
                    .enumerate()
                    .map(|(i, k)| k * tmp.get_clamped(x as _, y as isize + i as isize - radius))
                    .sum();
                out.set(x, y, v);
            }
        }

        out
    }

    /// Gaussian blur with the given standard deviation.
    pub fn gaussian_blur(&self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self.clone();
        }
        self.convolve_separable(&gaussian_kernel(sigma))
    }

    /// Normalised box filter of `size x size` pixels.
    pub fn box_filter(&self, size: usize) -> Self {
        let size = size.max(1) | 1;
        let kernel = vec![1.0 / size as f32; size];
        self.convolve_separable(&kernel)
    }

    /// Blur with a 5-tap binomial kernel and drop every other row and column.
    pub fn pyr_down(&self) -> Self {
        let blurred = self.convolve_separable(&[0.0625, 0.25, 0.375, 0.25, 0.0625]);
        let (w, h) = ((self.width + 1) / 2, (self.height + 1) / 2);
        Self::from_fn(w, h, |x, y| blurred.get(x * 2, y * 2))
    }

    /// Bilinear resize to the given dimensions.
    pub fn resize(&self, width: usize, height: usize) -> Self {
        if (width, height) == self.dim() {
            return self.clone();
        }

        let sx = self.width as f32 / width.max(1) as f32;
        let sy = self.height as f32 / height.max(1) as f32;

        Self::from_fn(width, height, |x, y| {
            self.sample((x as f32 + 0.5) * sx - 0.5, (y as f32 + 0.5) * sy - 0.5)
        })
    }

    /// 3x3 Sobel derivatives `(gx, gy)` with replicated borders.
    ///
    /// The derivatives are not normalised, a unit intensity ramp yields 8.
    pub fn sobel(&self) -> (Self, Self) {
        let mut gx = Self::new(self.width, self.height);
        let mut gy = Self::new(self.width, self.height);

        for y in 0..self.height as isize {
            for x in 0..self.width as isize {
                let p = |ox: isize, oy: isize| self.get_clamped(x + ox, y + oy);

                let dx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
                let dy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));

                gx.set(x as usize, y as usize, dx);
                gy.set(x as usize, y as usize, dy);
            }
        }

        (gx, gy)
    }

    /// Scale every sample by a constant.
    pub fn scaled(mut self, factor: f32) -> Self {
        self.data.iter_mut().for_each(|v| *v *= factor);
        self
    }

    /// Convert to 8-bit samples, saturating out of range values.
    pub fn to_u8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect()
    }
}

/// Normalised Gaussian kernel spanning three standard deviations.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil().max(1.0) as isize;
    let kernel = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect::<Vec<_>>();
    let sum = kernel.iter().sum::<f32>();
    kernel.into_iter().map(|k| k / sum).collect()
}
