//! # Camera Orientation Drift Estimation
//!
//! This library estimates how far a camera's heading drifts, frame by frame, from two kinds of
//! signals: straight lines found in the image, and optical flow between consecutive frames.
//! Measurements are smoothed over time and published by a background worker.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use driftscope::prelude::v1::*;
//! ```
//!
//! A minimal run over in-memory frames:
//!
//! ```
//! use driftscope::prelude::v1::*;
//!
//! let frames = (0..3).map(|_| Frame::from_fn(32, 32, |x, _| RGBA::gray((x * 8) as u8)));
//! let mut worker = EstimationWorker::new(
//!     Preset::LineSegments.config(),
//!     FrameQueue::new(frames),
//!     Schedule {
//!         period: std::time::Duration::from_millis(1),
//!         max_ticks: Some(3),
//!     },
//! )?;
//!
//! let rx = worker.subscribe(8);
//! worker.start()?;
//!
//! assert_eq!(worker.join().frames, 3);
//! assert_eq!(rx.try_iter().count(), 3);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! You may need [`nalgebra`](https://crates.io/crates/nalgebra) to make use of the functionality.

pub mod aggregate;
pub mod config;
pub mod estimator;
pub mod features;
pub mod flow;
pub mod flow_field;
pub mod frame;
pub mod history;
pub mod lines;
pub mod properties;
pub mod smoother;
pub mod source;
pub mod timer;
pub mod worker;

#[cfg(test)]
mod test_util;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            aggregate::*,
            config::{Algorithm, FlowAggregation, PipelineConfig, Preset},
            estimator::{
                DenseFlowEstimator, Direction, Estimate, Estimator, LineEstimator, Observation,
                Overlay, Pipeline, SparseFlowEstimator,
            },
            features::{FeatureParams, FeatureTracker, TrackedPoint, MIN_TRACKED_POINTS},
            flow::{
                Correspondence, DenseFlow, DenseFlowParams, SparseFlow, SparseFlowParams,
                TrackStatus,
            },
            flow_field::FlowField,
            frame::{Frame, GrayImage, RGBA},
            history::{AngleHistory, Sample},
            lines::{
                CannyParams, EdgeMap, ExtractedLines, HoughParams, LineExtractor, LineMode,
                LineParams, LineSegment,
            },
            properties::{BoundedProp, Properties, Property, PropertyMut},
            smoother::{AdaptiveSmoothing, SmootherParams, SmootherState, TemporalSmoother},
            source::{FrameQueue, FrameSource},
            worker::{EstimationWorker, Schedule, WorkerReport},
        };
        pub use anyhow::{anyhow, bail, ensure, Error, Result};
    }
}
