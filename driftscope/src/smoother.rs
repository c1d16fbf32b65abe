//! # Temporal smoothing
//!
//! Exponential moving averages over the per-frame measurements, plus the motion gate deciding
//! whether a direction is reported at all.

use nalgebra as na;

/// Smoothed quantities carried from one frame to the next.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct SmootherState {
    pub smoothed_dx: f32,
    pub smoothed_dy: f32,
    pub smoothed_angle: f32,
    pub smoothed_yaw: f32,
    /// Last raw angle that went into `smoothed_angle`.
    pub previous_angle: f32,
}

/// Exponential moving average step `alpha * value + (1 - alpha) * prev`.
pub fn ema(alpha: f32, value: f32, prev: f32) -> f32 {
    alpha * value + (1.0 - alpha) * prev
}

/// Whether `angle` lies within `band` degrees of 0 or ±180.
pub fn near_axis(angle: f32, band: f32) -> bool {
    let a = angle.abs() % 360.0;
    a <= band || (180.0 - a).abs() <= band || 360.0 - a <= band
}

/// Slower yaw smoothing for near axis-parallel motion.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdaptiveSmoothing {
    /// Distance from an axis, in degrees, where the slower factor applies.
    pub band: f32,
    /// Smoothing factor used inside the band.
    pub alpha: f32,
}

impl Default for AdaptiveSmoothing {
    fn default() -> Self {
        Self {
            band: 10.0,
            alpha: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmootherParams {
    /// Nominal smoothing factor in `(0, 1]`.
    pub alpha: f32,
    /// Yaw smoothing near the axes, disabled if `None`.
    pub adaptive: Option<AdaptiveSmoothing>,
    /// Smoothed displacement magnitude the motion gate opens above.
    pub threshold: f32,
    /// Length of the reported direction vector.
    pub vector_length: f32,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            adaptive: None,
            threshold: 2.0,
            vector_length: 50.0,
        }
    }
}

/// Owns the smoothing state of one pipeline.
#[derive(Clone, Debug, Default)]
pub struct TemporalSmoother {
    params: SmootherParams,
    state: SmootherState,
}

impl TemporalSmoother {
    pub fn new(params: SmootherParams) -> Self {
        Self {
            params,
            state: Default::default(),
        }
    }

    pub fn params(&self) -> &SmootherParams {
        &self.params
    }

    pub fn state(&self) -> &SmootherState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = Default::default();
    }

    /// Feed a frame's displacement, returning the smoothed `(dx, dy)`.
    pub fn smooth_displacement(&mut self, d: na::Vector2<f32>) -> na::Vector2<f32> {
        let alpha = self.params.alpha;
        self.state.smoothed_dx = ema(alpha, d.x, self.state.smoothed_dx);
        self.state.smoothed_dy = ema(alpha, d.y, self.state.smoothed_dy);
        self.smoothed_displacement()
    }

    pub fn smoothed_displacement(&self) -> na::Vector2<f32> {
        na::Vector2::new(self.state.smoothed_dx, self.state.smoothed_dy)
    }

    /// Motion gate.
    ///
    /// Returns the smoothed displacement scaled to `vector_length` when its magnitude is strictly
    /// above the threshold, `None` otherwise.
    pub fn gate(&self) -> Option<na::Vector2<f32>> {
        let d = self.smoothed_displacement();
        let norm = d.norm();

        if norm > self.params.threshold && norm > 0.0 {
            Some(d / norm * self.params.vector_length)
        } else {
            None
        }
    }

    /// Feed a raw angle, returning the smoothed one.
    pub fn smooth_angle(&mut self, raw: f32) -> f32 {
        self.state.previous_angle = raw;
        self.state.smoothed_angle = ema(self.params.alpha, raw, self.state.smoothed_angle);
        self.state.smoothed_angle
    }

    /// Feed a raw yaw angle, returning the smoothed one.
    ///
    /// The adaptive factor, when configured, replaces the nominal one for raw yaws near the axes.
    pub fn smooth_yaw(&mut self, raw: f32) -> f32 {
        let alpha = match self.params.adaptive {
            Some(adaptive) if near_axis(raw, adaptive.band) => adaptive.alpha,
            _ => self.params.alpha,
        };

        self.state.smoothed_yaw = ema(alpha, raw, self.state.smoothed_yaw);
        self.state.smoothed_yaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn smoother(alpha: f32) -> TemporalSmoother {
        TemporalSmoother::new(SmootherParams {
            alpha,
            ..Default::default()
        })
    }

    #[test]
    fn constant_input_converges_monotonically() {
        for alpha in [0.05, 0.1, 0.3, 1.0] {
            let mut s = smoother(alpha);
            let v = 42.0;
            let mut err = v;

            for _ in 0..500 {
                if err < 1e-3 {
                    break;
                }
                let next = (s.smooth_angle(v) - v).abs();
                assert!(next < err, "alpha {alpha}: {next} >= {err}");
                err = next;
            }

            assert!(err < 1e-3, "alpha {alpha}: {err}");
        }
    }

    #[test]
    fn unit_alpha_tracks_input() {
        let mut s = smoother(1.0);
        assert_eq!(s.smooth_angle(-90.0), -90.0);
        assert_eq!(s.smooth_angle(12.5), 12.5);
        assert_eq!(s.state().previous_angle, 12.5);
    }

    #[test]
    fn displacement_step() {
        let mut s = smoother(0.3);
        let d = s.smooth_displacement(na::Vector2::new(10.0, 0.0));

        assert_approx_eq!(d.x, 3.0);
        assert_approx_eq!(d.y, 0.0);

        let d = s.smooth_displacement(na::Vector2::new(10.0, 0.0));
        assert_approx_eq!(d.x, 5.1);
    }

    #[test]
    fn gate_opens_strictly_above_threshold() {
        let mut s = TemporalSmoother::new(SmootherParams {
            alpha: 1.0,
            threshold: 2.0,
            vector_length: 50.0,
            adaptive: None,
        });

        s.smooth_displacement(na::Vector2::new(2.0, 0.0));
        assert_eq!(s.gate(), None);

        s.smooth_displacement(na::Vector2::new(0.0, -3.0));
        let v = s.gate().unwrap();
        assert_approx_eq!(v.x, 0.0);
        assert_approx_eq!(v.y, -50.0);

        s.smooth_displacement(na::Vector2::zeros());
        assert_eq!(s.gate(), None);
    }

    #[test]
    fn adaptive_yaw() {
        let mut s = TemporalSmoother::new(SmootherParams {
            alpha: 0.1,
            adaptive: Some(Default::default()),
            ..Default::default()
        });

        // Within 10 degrees of the axis, the slow factor applies.
        assert_approx_eq!(s.smooth_yaw(10.0), 0.5);
        s.reset();
        assert_approx_eq!(s.smooth_yaw(-175.0), -8.75);
        s.reset();
        assert_approx_eq!(s.smooth_yaw(45.0), 4.5);
    }

    #[test]
    fn axis_band() {
        assert!(near_axis(0.0, 10.0));
        assert!(near_axis(-10.0, 10.0));
        assert!(near_axis(170.0, 10.0));
        assert!(near_axis(-179.0, 10.0));
        assert!(!near_axis(10.5, 10.0));
        assert!(!near_axis(-90.0, 10.0));
    }
}
