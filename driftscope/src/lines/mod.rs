//! # Straight line extraction
//!
//! Lines are found by running the Canny edge detector and fitting either finite segments
//! (probabilistic Hough) or infinite polar lines (standard Hough) to the edges.

use crate::prelude::v1::*;
use nalgebra as na;
use rand::{rngs::StdRng, SeedableRng};

pub mod canny;
pub mod hough;

pub use canny::{canny, CannyParams, EdgeMap};
pub use hough::{hough_lines, hough_lines_p, HoughParams};

/// A detected line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineSegment {
    /// Finite segment between two points.
    Segment {
        start: na::Point2<f32>,
        end: na::Point2<f32>,
    },
    /// Infinite line `x cos(theta) + y sin(theta) = rho`, `theta` in radians.
    Polar { rho: f32, theta: f32 },
}

impl LineSegment {
    /// Orientation of the line in degrees.
    ///
    /// Segments use `atan2(dy, dx)`. Polar lines use `theta - 90`, so that a horizontal line is at
    /// 0 and a vertical line at -90.
    pub fn angle(&self) -> f32 {
        match self {
            Self::Segment { start, end } => (end.y - start.y).atan2(end.x - start.x).to_degrees(),
            Self::Polar { theta, .. } => theta.to_degrees() - 90.0,
        }
    }
}

/// Which line representation to fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum LineMode {
    Segments,
    Polar,
}

impl std::str::FromStr for LineMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "segments" => Ok(Self::Segments),
            "polar" => Ok(Self::Polar),
            _ => Err(anyhow!("unknown line mode {s}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LineParams {
    pub mode: LineMode,
    pub canny: CannyParams,
    pub hough: HoughParams,
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            mode: LineMode::Segments,
            canny: Default::default(),
            hough: Default::default(),
        }
    }
}

/// Edges and lines of a single frame.
#[derive(Clone, Debug)]
pub struct ExtractedLines {
    pub edges: EdgeMap,
    pub lines: Vec<LineSegment>,
}

/// Extracts lines from grayscale frames.
///
/// The probabilistic transform draws its visiting order from a generator seeded once per
/// extractor, so a given sequence of frames always produces the same lines.
pub struct LineExtractor {
    params: LineParams,
    rng: StdRng,
}

impl LineExtractor {
    pub fn new(params: LineParams) -> Self {
        Self {
            rng: StdRng::seed_from_u64(params.hough.seed),
            params,
        }
    }

    pub fn params(&self) -> &LineParams {
        &self.params
    }

    pub fn extract(&mut self, img: &GrayImage) -> ExtractedLines {
        let edges = canny(img, &self.params.canny);

        let lines = match self.params.mode {
            LineMode::Segments => hough_lines_p(&edges, &self.params.hough, &mut self.rng),
            LineMode::Polar => hough_lines(&edges, &self.params.hough),
        };

        ExtractedLines { edges, lines }
    }
}
