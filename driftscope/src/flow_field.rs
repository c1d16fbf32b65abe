//! # Dense flow field

use nalgebra::*;

/// Dense per-pixel displacement field.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowField {
    vf: Matrix2xX<f32>,
    width: usize,
}

impl FlowField {
    /// Create a new zero flow field.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the field.
    /// * `height` - height of the field.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            vf: Matrix2xX::repeat(width * height, 0f32),
            width,
        }
    }

    /// Get width and height of the flow field.
    pub fn dim(&self) -> (usize, usize) {
        if self.width == 0 {
            (0, 0)
        } else {
            (self.width, self.vf.ncols() / self.width)
        }
    }

    /// Number of pixels covered.
    pub fn size(&self) -> usize {
        self.vf.ncols()
    }

    /// Raw `[dx, dy]` pairs, one per pixel in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        self.vf.as_slice()
    }

    /// Mutable row-major view of the field, same layout as [`FlowField::as_slice`].
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        self.vf.as_mut_slice()
    }

    /// Set displacement at given position.
    ///
    /// # Arguments
    ///
    /// * `x` - horizontal coordinate to set at.
    /// * `y` - vertical coordinate to set at.
    /// * `motion` - displacement to set.
    pub fn set_motion(&mut self, x: usize, y: usize, motion: Vector2<f32>) {
        self.vf.set_column(self.width * y + x, &motion);
    }

    /// Get displacement at coordinates.
    ///
    /// # Arguments
    ///
    /// * `x` - horizontal coordinate.
    /// * `y` - vertical coordinate.
    pub fn get_motion(&self, x: usize, y: usize) -> Vector2<f32> {
        self.vf.column(self.width * y + x).into()
    }

    /// Average displacement over every pixel of the field.
    ///
    /// An empty field averages to zero.
    pub fn mean(&self) -> Vector2<f32> {
        if self.size() == 0 {
            Vector2::zeros()
        } else {
            self.vf.column_sum() / self.size() as f32
        }
    }

    /// Resample the field to new dimensions, multiplying displacements by `scale`.
    ///
    /// Used when moving from a coarse pyramid level to a finer one.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the resulting field.
    /// * `height` - height of the resulting field.
    /// * `scale` - factor applied to every displacement.
    pub fn resized(&self, width: usize, height: usize, scale: f32) -> Self {
        let mut out = Self::new(width, height);
        let (w, h) = self.dim();

        if w == 0 || h == 0 {
            return out;
        }

        let sx = w as f32 / width as f32;
        let sy = h as f32 / height as f32;

        for y in 0..height {
            for x in 0..width {
                let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, (w - 1) as f32);
                let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, (h - 1) as f32);
                out.set_motion(x, y, self.sample(fx, fy) * scale);
            }
        }

        out
    }

    /// Bilinearly sample the field at in-range sub-pixel coordinates.
    fn sample(&self, x: f32, y: f32) -> Vector2<f32> {
        let (w, h) = self.dim();
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);

        let top = self.get_motion(x0, y0) * (1.0 - fx) + self.get_motion(x1, y0) * fx;
        let bottom = self.get_motion(x0, y1) * (1.0 - fx) + self.get_motion(x1, y1) * fx;

        top * (1.0 - fy) + bottom * fy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn mean_of_field() {
        let mut field = FlowField::new(2, 2);
        field.set_motion(0, 0, Vector2::new(4.0, 0.0));
        field.set_motion(1, 1, Vector2::new(0.0, -2.0));

        let mean = field.mean();
        assert_approx_eq!(mean.x, 1.0);
        assert_approx_eq!(mean.y, -0.5);
        assert_eq!(FlowField::new(0, 0).mean(), Vector2::zeros());
    }

    #[test]
    fn upscale_doubles_motion() {
        let mut field = FlowField::new(4, 3);
        for y in 0..3 {
            for x in 0..4 {
                field.set_motion(x, y, Vector2::new(1.0, 0.5));
            }
        }

        let up = field.resized(8, 6, 2.0);
        assert_eq!(up.dim(), (8, 6));
        for (i, v) in up.as_slice().iter().enumerate() {
            assert_approx_eq!(*v, if i % 2 == 0 { 2.0 } else { 1.0 });
        }
    }
}
