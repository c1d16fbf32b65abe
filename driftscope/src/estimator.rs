//! # Orientation estimation
//!
//! An [`Estimator`] turns consecutive grayscale frames into one raw measurement per frame. The
//! [`Pipeline`] owns an estimator together with the smoothing state and produces the published
//! [`Estimate`]s.

use crate::prelude::v1::*;
use log::*;
use nalgebra as na;

/// Raw per-frame measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    /// Orientation of the lines in the frame, in degrees.
    LineAngle(f32),
    /// Average displacement between the previous frame and this one.
    Displacement(na::Vector2<f32>),
    /// Rotation about the frame center, in degrees.
    Yaw(f32),
    /// Nothing usable in the frame: no lines, or no tracked correspondences.
    NoSignal,
}

/// Intermediate results of a frame, kept for display.
#[derive(Clone, Debug, Default)]
pub struct Overlay {
    pub edges: Option<EdgeMap>,
    pub lines: Vec<LineSegment>,
    pub correspondences: Vec<Correspondence>,
    pub flow: Option<FlowField>,
}

/// Generic orientation estimator.
pub trait Estimator: Send {
    /// Measure a single frame.
    ///
    /// Estimators may keep the previous frame, thus this function expects sequential frames.
    /// Returns `None` when there is nothing to compare the frame against yet.
    ///
    /// # Arguments
    ///
    /// * `gray` - grayscale version of the frame.
    /// * `overlay` - if set, receives the intermediate results of the frame.
    fn observe(&mut self, gray: &GrayImage, overlay: Option<&mut Overlay>) -> Option<Observation>;
}

/// Estimates orientation from straight lines.
pub struct LineEstimator {
    extractor: LineExtractor,
}

impl LineEstimator {
    pub fn new(params: LineParams) -> Self {
        Self {
            extractor: LineExtractor::new(params),
        }
    }
}

impl Estimator for LineEstimator {
    fn observe(&mut self, gray: &GrayImage, overlay: Option<&mut Overlay>) -> Option<Observation> {
        let ExtractedLines { edges, lines } = self.extractor.extract(gray);

        trace!("{} lines from {} edge pixels", lines.len(), edges.count());

        let observation = if lines.is_empty() {
            Observation::NoSignal
        } else {
            Observation::LineAngle(line_angle(&lines))
        };

        if let Some(overlay) = overlay {
            overlay.edges = Some(edges);
            overlay.lines = lines;
        }

        Some(observation)
    }
}

/// Estimates motion from sparse point tracks.
pub struct SparseFlowEstimator {
    tracker: FeatureTracker,
    flow: SparseFlow,
    aggregation: FlowAggregation,
    convention: AngleConvention,
    prev: Option<GrayImage>,
    points: Vec<TrackedPoint>,
}

impl SparseFlowEstimator {
    pub fn new(
        features: FeatureParams,
        flow: SparseFlowParams,
        aggregation: FlowAggregation,
        convention: AngleConvention,
    ) -> Self {
        Self {
            tracker: FeatureTracker::new(features),
            flow: SparseFlow::new(flow),
            aggregation,
            convention,
            prev: None,
            points: vec![],
        }
    }

    /// Current tracking basis.
    pub fn points(&self) -> &[TrackedPoint] {
        &self.points
    }
}

impl Estimator for SparseFlowEstimator {
    fn observe(&mut self, gray: &GrayImage, overlay: Option<&mut Overlay>) -> Option<Observation> {
        let prev = match self.prev.replace(gray.clone()) {
            Some(prev) if prev.dim() == gray.dim() => prev,
            prev => {
                if prev.is_some() {
                    debug!("Frame size changed to {:?}, restarting tracking", gray.dim());
                }
                self.points = self.tracker.seed(gray);
                return None;
            }
        };

        let correspondences = self.flow.correspondences(&prev, gray, &self.points);

        self.points = correspondences
            .iter()
            .map(|c| TrackedPoint {
                id: c.id,
                pos: c.next,
            })
            .collect();

        if FeatureTracker::needs_reseed(self.points.len()) {
            self.points = self.tracker.seed(gray);
            debug!(
                "{} correspondences left, re-seeded {} points",
                correspondences.len(),
                self.points.len()
            );
        }

        trace!("{} correspondences", correspondences.len());

        let observation = match self.aggregation {
            _ if correspondences.is_empty() => Observation::NoSignal,
            FlowAggregation::Translation => {
                Observation::Displacement(mean_displacement(&correspondences))
            }
            FlowAggregation::Rotation => {
                let (w, h) = gray.dim();
                let center = na::Point2::new(w as f32 * 0.5, h as f32 * 0.5);
                Observation::Yaw(rotation_about_center(
                    &correspondences,
                    center,
                    self.convention,
                ))
            }
        };

        if let Some(overlay) = overlay {
            overlay.correspondences = correspondences;
        }

        Some(observation)
    }
}

/// Estimates motion from dense flow.
pub struct DenseFlowEstimator {
    flow: DenseFlow,
    aggregation: FlowAggregation,
    convention: AngleConvention,
    prev: Option<GrayImage>,
}

impl DenseFlowEstimator {
    pub fn new(
        flow: DenseFlowParams,
        aggregation: FlowAggregation,
        convention: AngleConvention,
    ) -> Self {
        Self {
            flow: DenseFlow::new(flow),
            aggregation,
            convention,
            prev: None,
        }
    }
}

impl Estimator for DenseFlowEstimator {
    fn observe(&mut self, gray: &GrayImage, overlay: Option<&mut Overlay>) -> Option<Observation> {
        let prev = match self.prev.replace(gray.clone()) {
            Some(prev) if prev.dim() == gray.dim() => prev,
            _ => return None,
        };

        let field = self.flow.calc(&prev, gray);
        let mean = field_mean(&field);

        if let Some(overlay) = overlay {
            overlay.flow = Some(field);
        }

        Some(match self.aggregation {
            FlowAggregation::Translation => Observation::Displacement(mean),
            // Every pixel moves relative to the center by its own flow, so the sum points the
            // same way as the mean.
            FlowAggregation::Rotation => Observation::Yaw(self.convention.angle(mean)),
        })
    }
}

/// Fixed-length vector pointing along the smoothed motion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Direction {
    pub vector: na::Vector2<f32>,
    /// Angle of the motion in degrees, after the dead-zone.
    pub angle: f32,
}

/// Published result of a single frame.
#[derive(Clone, Debug)]
pub struct Estimate {
    /// Sequence number of the processed frame.
    pub frame: u64,
    /// Smoothed deviation angle in degrees.
    ///
    /// `None` when the frame produced no new angle: the first frame of flow estimation, or
    /// motion below the gate threshold.
    pub angle: Option<f32>,
    /// Motion direction, set only when the motion gate is open.
    pub direction: Option<Direction>,
    pub overlay: Option<Overlay>,
}

/// Complete per-frame estimation: measurement, aggregation, smoothing and gating.
pub struct Pipeline {
    config: PipelineConfig,
    estimator: Box<dyn Estimator>,
    smoother: TemporalSmoother,
    frame: u64,
}

impl Pipeline {
    /// Build a pipeline for the configuration.
    ///
    /// Fails if the configuration is invalid.
    pub fn new(mut config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let estimator: Box<dyn Estimator> = match config.algorithm {
            Algorithm::Lines => Box::new(LineEstimator::new(config.lines)),
            Algorithm::SparseFlow => Box::new(SparseFlowEstimator::new(
                config.features,
                config.sparse,
                config.aggregation,
                config.convention,
            )),
            Algorithm::DenseFlow => Box::new(DenseFlowEstimator::new(
                config.dense,
                config.aggregation,
                config.convention,
            )),
        };

        Ok(Self::with_estimator(config, estimator))
    }

    /// Build a pipeline around a custom estimator.
    ///
    /// Only the smoothing part of the configuration is used, and it is not validated.
    pub fn with_estimator(config: PipelineConfig, estimator: Box<dyn Estimator>) -> Self {
        Self {
            smoother: TemporalSmoother::new(config.smoothing),
            config,
            estimator,
            frame: 0,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &SmootherState {
        self.smoother.state()
    }

    /// Process the next frame.
    pub fn process(&mut self, frame: &Frame) -> Estimate {
        self.process_gray(&frame.to_gray())
    }

    /// Process the next frame, already converted to grayscale.
    pub fn process_gray(&mut self, gray: &GrayImage) -> Estimate {
        let mut overlay = self.config.overlay.then(Overlay::default);

        let observation = self.estimator.observe(gray, overlay.as_mut());

        let dead_zone = self.config.dead_zone;
        let mut direction = None;

        let angle = match observation {
            None => None,
            // Reported as neutral, the smoothing state is left for frames with signal.
            Some(Observation::NoSignal) => Some(0.0),
            Some(Observation::LineAngle(angle)) => {
                Some(self.smoother.smooth_angle(apply_dead_zone(angle, dead_zone)))
            }
            Some(Observation::Displacement(d)) => {
                let smoothed = self.smoother.smooth_displacement(d);

                if let Some(vector) = self.smoother.gate() {
                    let angle = apply_dead_zone(self.config.convention.angle(smoothed), dead_zone);
                    direction = Some(Direction { vector, angle });
                    Some(self.smoother.smooth_angle(angle))
                } else if is_degenerate(smoothed) {
                    Some(0.0)
                } else {
                    None
                }
            }
            Some(Observation::Yaw(yaw)) => {
                Some(self.smoother.smooth_yaw(apply_dead_zone(yaw, dead_zone)))
            }
        };

        let frame = self.frame;
        self.frame += 1;

        match angle {
            Some(angle) => trace!("Frame {}: Deviation angle: {:.2} degrees", frame, angle),
            None => trace!("Frame {}: no new angle", frame),
        }

        Estimate {
            frame,
            angle,
            direction,
            overlay,
        }
    }
}
