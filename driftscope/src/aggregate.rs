//! # Angle aggregation
//!
//! Reductions of per-frame measurements (lines, correspondences, flow fields) into a single
//! displacement vector or angle.

use crate::prelude::v1::*;
use nalgebra as na;

/// Vectors with both components this close to zero have no defined angle.
pub const DEGENERATE_EPS: f32 = 1e-5;

/// How a displacement vector is turned into an angle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AngleConvention {
    /// `atan2(dx, dy)`: 0 straight down the image, 90 to the right.
    FromVertical,
    /// `atan2(dy, dx)`: 0 to the right, 90 straight down the image.
    FromHorizontal,
}

impl AngleConvention {
    /// Angle of `v` in degrees, or 0 if the vector is degenerate.
    pub fn angle(self, v: na::Vector2<f32>) -> f32 {
        if is_degenerate(v) {
            return 0.0;
        }

        match self {
            Self::FromVertical => v.x.atan2(v.y),
            Self::FromHorizontal => v.y.atan2(v.x),
        }
        .to_degrees()
    }
}

impl std::str::FromStr for AngleConvention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "from-vertical" => Ok(Self::FromVertical),
            "from-horizontal" => Ok(Self::FromHorizontal),
            _ => Err(anyhow!("unknown angle convention {s}")),
        }
    }
}

pub fn is_degenerate(v: na::Vector2<f32>) -> bool {
    v.x.abs() < DEGENERATE_EPS && v.y.abs() < DEGENERATE_EPS
}

/// Median of the values, averaging the two middle ones for even counts. Empty input yields 0.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);

    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

/// Arithmetic mean. Empty input yields 0.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Reduce detected lines into a single angle in degrees.
///
/// Segments are reduced with the median of their angles, polar lines with the mean.
pub fn line_angle(lines: &[LineSegment]) -> f32 {
    let segments = lines
        .iter()
        .filter(|l| matches!(l, LineSegment::Segment { .. }))
        .map(LineSegment::angle)
        .collect::<Vec<_>>();

    let polar = lines
        .iter()
        .filter(|l| matches!(l, LineSegment::Polar { .. }))
        .map(LineSegment::angle)
        .collect::<Vec<_>>();

    match (segments.is_empty(), polar.is_empty()) {
        (false, true) => median(&segments),
        (true, false) => mean(&polar),
        (true, true) => 0.0,
        // Extractors never mix representations, fall back to the mean of everything.
        (false, false) => mean(&lines.iter().map(LineSegment::angle).collect::<Vec<_>>()),
    }
}

/// Average displacement of the correspondences, zero if there are none.
pub fn mean_displacement(correspondences: &[Correspondence]) -> na::Vector2<f32> {
    if correspondences.is_empty() {
        return na::Vector2::zeros();
    }

    correspondences
        .iter()
        .map(Correspondence::motion)
        .sum::<na::Vector2<f32>>()
        / correspondences.len() as f32
}

/// Sum of the changes of center-relative point vectors.
///
/// # Arguments
///
/// * `correspondences` - tracked point pairs.
/// * `center` - rotation center, usually the middle of the frame.
pub fn relative_displacement(
    correspondences: &[Correspondence],
    center: na::Point2<f32>,
) -> na::Vector2<f32> {
    correspondences
        .iter()
        .map(|c| (c.next - center) - (c.prev - center))
        .sum()
}

/// Yaw angle from the summed center-relative displacement, in degrees.
pub fn rotation_about_center(
    correspondences: &[Correspondence],
    center: na::Point2<f32>,
    convention: AngleConvention,
) -> f32 {
    convention.angle(relative_displacement(correspondences, center))
}

/// Average displacement of a dense field.
pub fn field_mean(field: &FlowField) -> na::Vector2<f32> {
    field.mean()
}

/// Snap angles within `[-dead_zone, dead_zone]` to 0.
pub fn apply_dead_zone(angle: f32, dead_zone: Option<f32>) -> f32 {
    match dead_zone {
        Some(dz) if angle.abs() <= dz => 0.0,
        _ => angle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn corr(prev: (f32, f32), next: (f32, f32)) -> Correspondence {
        Correspondence::new(0, na::Point2::new(prev.0, prev.1), na::Point2::new(next.0, next.1))
    }

    #[test]
    fn conventions() {
        let right = na::Vector2::new(3.0, 0.0);
        let down = na::Vector2::new(0.0, 2.0);

        assert_approx_eq!(AngleConvention::FromVertical.angle(right), 90.0);
        assert_approx_eq!(AngleConvention::FromVertical.angle(down), 0.0);
        assert_approx_eq!(AngleConvention::FromHorizontal.angle(right), 0.0);
        assert_approx_eq!(AngleConvention::FromHorizontal.angle(down), 90.0);
        assert_approx_eq!(
            AngleConvention::FromHorizontal.angle(na::Vector2::new(-3.0, 0.0)),
            180.0
        );
    }

    #[test]
    fn degenerate_vectors_have_zero_angle() {
        let tiny = na::Vector2::new(-5e-6, 9e-6);
        assert_eq!(AngleConvention::FromVertical.angle(tiny), 0.0);
        assert_eq!(AngleConvention::FromHorizontal.angle(tiny), 0.0);
        assert!(!is_degenerate(na::Vector2::new(0.0, 2e-5)));
    }

    #[test]
    fn median_and_mean() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[5.0, -1.0, 3.0]), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(mean(&[]), 0.0);
        assert_approx_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }

    #[test]
    fn single_line_angle_is_unchanged() {
        let vertical = LineSegment::Segment {
            start: na::Point2::new(10.0, 100.0),
            end: na::Point2::new(10.0, 0.0),
        };
        assert_approx_eq!(line_angle(&[vertical]), -90.0);

        let polar = LineSegment::Polar {
            rho: 10.0,
            theta: 0.0,
        };
        assert_approx_eq!(line_angle(&[polar]), -90.0);

        assert_eq!(line_angle(&[]), 0.0);
    }

    #[test]
    fn segments_use_median_polar_uses_mean() {
        let seg = |dy: f32| LineSegment::Segment {
            start: na::Point2::new(0.0, 0.0),
            end: na::Point2::new(100.0, dy),
        };
        // 0, 45, and roughly 84 degrees
        let angle = line_angle(&[seg(0.0), seg(100.0), seg(1000.0)]);
        assert_approx_eq!(angle, 45.0);

        let polar = |deg: f32| LineSegment::Polar {
            rho: 0.0,
            theta: deg.to_radians(),
        };
        let angle = line_angle(&[polar(90.0), polar(100.0), polar(170.0)]);
        assert_approx_eq!(angle, 30.0, 1e-3);
    }

    #[test]
    fn mean_displacement_of_correspondences() {
        assert_eq!(mean_displacement(&[]), na::Vector2::zeros());

        let m = mean_displacement(&[corr((0.0, 0.0), (10.0, 0.0)), corr((5.0, 5.0), (15.0, 5.0))]);
        assert_approx_eq!(m.x, 10.0);
        assert_approx_eq!(m.y, 0.0);
    }

    #[test]
    fn rotation_ignores_global_translation() {
        let center = na::Point2::new(32.0, 24.0);
        let set = [
            corr((10.0, 10.0), (12.0, 9.0)),
            corr((40.0, 30.0), (41.0, 33.0)),
            corr((20.0, 44.0), (18.0, 45.0)),
        ];

        let base = rotation_about_center(&set, center, AngleConvention::FromHorizontal);

        let t = na::Vector2::new(7.0, -3.0);
        let moved = set
            .iter()
            .map(|c| Correspondence::new(c.id, c.prev + t, c.next + t))
            .collect::<Vec<_>>();

        assert_approx_eq!(
            rotation_about_center(&moved, center, AngleConvention::FromHorizontal),
            base
        );
        assert_eq!(rotation_about_center(&[], center, AngleConvention::FromHorizontal), 0.0);
    }

    #[test]
    fn dead_zone() {
        for a in [-10.0, -3.5, 0.0, 9.99, 10.0] {
            assert_eq!(apply_dead_zone(a, Some(10.0)), 0.0);
        }
        assert_eq!(apply_dead_zone(10.5, Some(10.0)), 10.5);
        assert_eq!(apply_dead_zone(-45.0, Some(10.0)), -45.0);
        assert_eq!(apply_dead_zone(3.0, None), 3.0);
    }
}
