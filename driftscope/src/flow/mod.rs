//! # Optical flow
//!
//! Two interchangeable ways of measuring motion between consecutive grayscale frames:
//!
//! - [`SparseFlow`] tracks a set of points with pyramidal Lucas-Kanade and yields
//!   [`Correspondence`] pairs for the points that were found again.
//! - [`DenseFlow`] estimates a displacement for every pixel using Farneback's polynomial
//!   expansion and yields a [`FlowField`](crate::flow_field::FlowField).

use nalgebra as na;

pub mod dense;
pub mod sparse;

pub use dense::{DenseFlow, DenseFlowParams};
pub use sparse::{SparseFlow, SparseFlowParams, TrackStatus};

/// Position of one tracked point in two consecutive frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence {
    pub id: u64,
    pub prev: na::Point2<f32>,
    pub next: na::Point2<f32>,
}

impl Correspondence {
    pub fn new(id: u64, prev: na::Point2<f32>, next: na::Point2<f32>) -> Self {
        Self { id, prev, next }
    }

    /// Displacement of the point between the frames.
    pub fn motion(&self) -> na::Vector2<f32> {
        self.next - self.prev
    }
}
