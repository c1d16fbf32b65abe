//! # Pipeline configuration
//!
//! A [`PipelineConfig`] selects the estimation algorithm and carries every tunable parameter of
//! it. Configurations are fixed once a pipeline is built. The named [`Preset`]s reproduce the
//! supported estimation variants exactly.

use crate::prelude::v1::*;

/// Signal the orientation is estimated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Algorithm {
    /// Straight lines in the frame.
    Lines,
    /// Sparse point tracking.
    SparseFlow,
    /// Dense per-pixel flow.
    DenseFlow,
}

/// How flow measurements are reduced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FlowAggregation {
    /// Average displacement, smoothed and gated before taking its angle.
    Translation,
    /// Summed displacement relative to the frame center, taken as a yaw angle.
    Rotation,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    pub algorithm: Algorithm,
    pub aggregation: FlowAggregation,
    pub convention: AngleConvention,
    /// Raw angles within this many degrees of 0 are snapped to 0.
    pub dead_zone: Option<f32>,
    /// Attach edges, lines and flow to every estimate.
    pub overlay: bool,
    pub smoothing: SmootherParams,
    pub features: FeatureParams,
    pub sparse: SparseFlowParams,
    pub dense: DenseFlowParams,
    pub lines: LineParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Preset::default().config()
    }
}

impl PipelineConfig {
    /// Check parameter bounds and combinations.
    ///
    /// Takes `&mut self` because bounds are read through the property list.
    pub fn validate(&mut self) -> Result<()> {
        self.check_bounds()?;

        ensure!(
            self.smoothing.alpha > 0.0,
            "smoothing.alpha must be above 0, got {}",
            self.smoothing.alpha
        );

        if let Some(adaptive) = self.smoothing.adaptive {
            ensure!(
                adaptive.alpha > 0.0,
                "adaptive.alpha must be above 0, got {}",
                adaptive.alpha
            );
        }

        for (name, size) in [
            ("sparse.window", self.sparse.window),
            ("dense.window", self.dense.window),
            ("features.block_size", self.features.block_size),
        ] {
            ensure!(size % 2 == 1, "{name} must be odd, got {size}");
        }

        ensure!(
            self.lines.canny.low <= self.lines.canny.high,
            "canny.low ({}) must not exceed canny.high ({})",
            self.lines.canny.low,
            self.lines.canny.high
        );

        Ok(())
    }

    /// Apply a `name=value` override.
    pub fn apply_override(&mut self, assignment: &str) -> Result<()> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected name=value, got {assignment}"))?;

        let (name, value) = (name.trim(), value.trim());

        match name {
            "algorithm" => {
                self.algorithm = match value {
                    "lines" => Algorithm::Lines,
                    "sparse-flow" => Algorithm::SparseFlow,
                    "dense-flow" => Algorithm::DenseFlow,
                    _ => bail!("unknown algorithm {value}"),
                }
            }
            "aggregation" => {
                self.aggregation = match value {
                    "translation" => FlowAggregation::Translation,
                    "rotation" => FlowAggregation::Rotation,
                    _ => bail!("unknown aggregation {value}"),
                }
            }
            "convention" => self.convention = value.parse()?,
            "lines.mode" => self.lines.mode = value.parse()?,
            "lines.seed" => self.lines.hough.seed = value.parse()?,
            "dead_zone" => {
                self.dead_zone = match value {
                    "none" => None,
                    v => Some(v.parse()?),
                }
            }
            "adaptive" => {
                self.smoothing.adaptive = match value {
                    "none" | "false" => None,
                    "true" => Some(Default::default()),
                    _ => bail!("adaptive takes true, false or none"),
                }
            }
            _ => self.set_prop(name, value)?,
        }

        Ok(())
    }
}

impl Properties for PipelineConfig {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        let mut props = vec![
            ("overlay", PropertyMut::bool(&mut self.overlay)),
            (
                "smoothing.alpha",
                PropertyMut::float(&mut self.smoothing.alpha, 0.0, 1.0),
            ),
            (
                "smoothing.threshold",
                PropertyMut::float(&mut self.smoothing.threshold, 0.0, 1000.0),
            ),
            (
                "smoothing.vector_length",
                PropertyMut::float(&mut self.smoothing.vector_length, 1.0, 10000.0),
            ),
            (
                "features.max_points",
                PropertyMut::usize(&mut self.features.max_points, 1, 10000),
            ),
            (
                "features.quality",
                PropertyMut::float(&mut self.features.quality, 0.001, 1.0),
            ),
            (
                "features.min_distance",
                PropertyMut::float(&mut self.features.min_distance, 0.0, 1000.0),
            ),
            (
                "features.block_size",
                PropertyMut::usize(&mut self.features.block_size, 3, 31),
            ),
            (
                "sparse.window",
                PropertyMut::usize(&mut self.sparse.window, 3, 101),
            ),
            (
                "sparse.levels",
                PropertyMut::usize(&mut self.sparse.levels, 0, 8),
            ),
            (
                "sparse.max_iters",
                PropertyMut::usize(&mut self.sparse.max_iters, 1, 100),
            ),
            (
                "sparse.epsilon",
                PropertyMut::float(&mut self.sparse.epsilon, 0.0, 10.0),
            ),
            (
                "sparse.min_eigen",
                PropertyMut::float(&mut self.sparse.min_eigen, 0.0, 1.0),
            ),
            (
                "dense.pyr_scale",
                PropertyMut::float(&mut self.dense.pyr_scale, 0.1, 0.9),
            ),
            (
                "dense.levels",
                PropertyMut::usize(&mut self.dense.levels, 1, 8),
            ),
            (
                "dense.window",
                PropertyMut::usize(&mut self.dense.window, 3, 101),
            ),
            (
                "dense.iterations",
                PropertyMut::usize(&mut self.dense.iterations, 1, 50),
            ),
            (
                "dense.poly_n",
                PropertyMut::usize(&mut self.dense.poly_n, 1, 15),
            ),
            (
                "dense.poly_sigma",
                PropertyMut::float(&mut self.dense.poly_sigma, 0.1, 10.0),
            ),
            (
                "canny.low",
                PropertyMut::float(&mut self.lines.canny.low, 0.0, 10000.0),
            ),
            (
                "canny.high",
                PropertyMut::float(&mut self.lines.canny.high, 0.0, 10000.0),
            ),
            (
                "canny.aperture",
                PropertyMut::usize(&mut self.lines.canny.aperture, 3, 3),
            ),
            (
                "hough.rho",
                PropertyMut::float(&mut self.lines.hough.rho, 0.1, 100.0),
            ),
            (
                "hough.theta",
                PropertyMut::float(&mut self.lines.hough.theta, 0.1, 90.0),
            ),
            (
                "hough.threshold",
                PropertyMut::usize(&mut self.lines.hough.threshold, 1, 1_000_000),
            ),
            (
                "hough.min_length",
                PropertyMut::float(&mut self.lines.hough.min_length, 0.0, 100000.0),
            ),
            (
                "hough.max_gap",
                PropertyMut::usize(&mut self.lines.hough.max_gap, 0, 10000),
            ),
        ];

        if let Some(dz) = &mut self.dead_zone {
            props.push(("dead_zone", PropertyMut::float(dz, 0.0, 180.0)));
        }

        if let Some(adaptive) = &mut self.smoothing.adaptive {
            props.push((
                "adaptive.band",
                PropertyMut::float(&mut adaptive.band, 0.0, 90.0),
            ));
            props.push((
                "adaptive.alpha",
                PropertyMut::float(&mut adaptive.alpha, 0.0, 1.0),
            ));
        }

        props
    }
}

/// Named configurations of the supported estimation variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Preset {
    /// Median angle of probabilistic Hough segments, unsmoothed.
    #[default]
    LineSegments,
    /// Mean angle of standard Hough lines, smoothed, with a dead-zone.
    LinePolar,
    /// Responsive sparse flow translation heading.
    SparseTranslation,
    /// Sparse flow yaw about the frame center with adaptive smoothing.
    SparseYaw,
    /// Dense flow translation heading.
    DenseTranslation,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::LineSegments,
        Preset::LinePolar,
        Preset::SparseTranslation,
        Preset::SparseYaw,
        Preset::DenseTranslation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LineSegments => "line-segments",
            Self::LinePolar => "line-polar",
            Self::SparseTranslation => "sparse-translation",
            Self::SparseYaw => "sparse-yaw",
            Self::DenseTranslation => "dense-translation",
        }
    }

    pub fn config(self) -> PipelineConfig {
        let base = PipelineConfig {
            algorithm: Algorithm::Lines,
            aggregation: FlowAggregation::Translation,
            convention: AngleConvention::FromVertical,
            dead_zone: Some(10.0),
            overlay: false,
            smoothing: SmootherParams::default(),
            features: Default::default(),
            sparse: Default::default(),
            dense: Default::default(),
            lines: Default::default(),
        };

        match self {
            Self::LineSegments => PipelineConfig {
                dead_zone: None,
                smoothing: SmootherParams {
                    alpha: 1.0,
                    ..Default::default()
                },
                ..base
            },
            Self::LinePolar => PipelineConfig {
                lines: LineParams {
                    mode: LineMode::Polar,
                    ..Default::default()
                },
                ..base
            },
            Self::SparseTranslation => PipelineConfig {
                algorithm: Algorithm::SparseFlow,
                smoothing: SmootherParams {
                    alpha: 0.3,
                    threshold: 2.0,
                    ..Default::default()
                },
                ..base
            },
            Self::SparseYaw => PipelineConfig {
                algorithm: Algorithm::SparseFlow,
                aggregation: FlowAggregation::Rotation,
                convention: AngleConvention::FromHorizontal,
                dead_zone: None,
                smoothing: SmootherParams {
                    alpha: 0.1,
                    adaptive: Some(Default::default()),
                    threshold: 2.0,
                    ..Default::default()
                },
                ..base
            },
            Self::DenseTranslation => PipelineConfig {
                algorithm: Algorithm::DenseFlow,
                smoothing: SmootherParams {
                    alpha: 0.1,
                    threshold: 0.2,
                    ..Default::default()
                },
                ..base
            },
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| anyhow!("unknown preset {s}"))
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for preset in Preset::ALL {
            preset.config().validate().unwrap();
            assert_eq!(preset.name().parse::<Preset>().unwrap(), preset);
        }
        assert!("sparse".parse::<Preset>().is_err());
    }

    #[test]
    fn preset_values() {
        let c = Preset::SparseYaw.config();
        assert_eq!(c.algorithm, Algorithm::SparseFlow);
        assert_eq!(c.aggregation, FlowAggregation::Rotation);
        assert_eq!(c.convention, AngleConvention::FromHorizontal);
        assert_eq!(c.smoothing.adaptive, Some(AdaptiveSmoothing::default()));
        assert_eq!(c.dead_zone, None);

        let c = Preset::DenseTranslation.config();
        assert_eq!(c.smoothing.threshold, 0.2);
        assert_eq!(c.dead_zone, Some(10.0));

        let c = Preset::LineSegments.config();
        assert_eq!(c.smoothing.alpha, 1.0);
        assert_eq!(c.lines.mode, LineMode::Segments);
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut c = PipelineConfig::default();
        c.smoothing.alpha = 0.0;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.smoothing.alpha = 1.5;
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("smoothing.alpha"), "{err}");

        let mut c = PipelineConfig::default();
        c.sparse.window = 14;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.lines.canny.low = 200.0;
        assert!(c.validate().is_err());

        let mut c = PipelineConfig::default();
        c.lines.canny.aperture = 5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn validation_leaves_values_alone() {
        let mut c = Preset::SparseYaw.config();
        c.apply_override("smoothing.alpha=0.4").unwrap();
        let before = c.clone();

        c.validate().unwrap();
        assert_eq!(c, before);

        c.sparse.window = 14;
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("sparse.window"), "{err}");
    }

    #[test]
    fn overrides() {
        let mut c = PipelineConfig::default();

        c.apply_override("smoothing.alpha=0.5").unwrap();
        c.apply_override("algorithm = dense-flow").unwrap();
        c.apply_override("convention=from-horizontal").unwrap();
        c.apply_override("dead_zone=5").unwrap();
        c.apply_override("dead_zone=7.5").unwrap();
        c.apply_override("lines.mode=polar").unwrap();

        assert_eq!(c.smoothing.alpha, 0.5);
        assert_eq!(c.algorithm, Algorithm::DenseFlow);
        assert_eq!(c.convention, AngleConvention::FromHorizontal);
        assert_eq!(c.dead_zone, Some(7.5));
        assert_eq!(c.lines.mode, LineMode::Polar);

        c.apply_override("dead_zone=none").unwrap();
        assert_eq!(c.dead_zone, None);

        assert!(c.apply_override("smoothing.alpha").is_err());
        assert!(c.apply_override("nonsense=1").is_err());
        assert!(c.apply_override("algorithm=magic").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_round_trip_with_defaults() {
        let c: PipelineConfig =
            serde_json::from_str(r#"{ "algorithm": "sparse-flow", "sparse": { "window": 21 } }"#)
                .unwrap();

        assert_eq!(c.algorithm, Algorithm::SparseFlow);
        assert_eq!(c.sparse.window, 21);
        assert_eq!(c.sparse.levels, SparseFlowParams::default().levels);

        let json = serde_json::to_string(&Preset::SparseYaw.config()).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Preset::SparseYaw.config());
    }
}
