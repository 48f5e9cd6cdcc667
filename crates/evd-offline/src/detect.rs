// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::elbow::{ElbowConfig, ElbowPass, KneeSelection};
use crate::sweep::{CostCurve, SweepConfig, SweepDetector};
use evd_core::{Diagnostics, EventError, FeatureMatrix};
use evd_costs::CostModel;

/// Combined configuration for the full detection pipeline.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EventDetectorConfig {
    pub sweep: SweepConfig,
    pub elbow: ElbowConfig,
}

/// Final output of a detection run: the selected changepoint set plus the
/// evidence used to select it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EventDetectionResult {
    /// Selected segment count k*.
    pub selected_k: usize,
    /// Interior frame indices marking event boundaries, strictly increasing.
    pub change_points: Vec<usize>,
    /// Sensitivity the elbow selection ran with.
    pub sensitivity: f64,
    /// Which pass produced the selection.
    pub pass: ElbowPass,
    /// Full cost-vs-k curve from the sweep.
    pub curve: CostCurve,
    pub diagnostics: Diagnostics,
}

/// Sweep-then-elbow event detector.
///
/// Stateless across calls: each run is a pure function of the matrix and the
/// configuration.
#[derive(Debug)]
pub struct EventDetector<C: CostModel> {
    sweep: SweepDetector<C>,
    elbow: ElbowConfig,
}

impl<C: CostModel> EventDetector<C> {
    pub fn new(cost_model: C, config: EventDetectorConfig) -> Result<Self, EventError> {
        config.elbow.validate()?;
        if let Some(fallback_k) = config.elbow.fallback_k
            && fallback_k > config.sweep.k_max
        {
            return Err(EventError::invalid_input(format!(
                "fallback_k={fallback_k} exceeds k_max={}",
                config.sweep.k_max
            )));
        }
        let sweep = SweepDetector::new(cost_model, config.sweep)?;
        Ok(Self {
            sweep,
            elbow: config.elbow,
        })
    }

    pub fn detect(&self, matrix: &FeatureMatrix) -> Result<EventDetectionResult, EventError> {
        let sweep_result = self.sweep.detect(matrix)?;
        let mut diagnostics = sweep_result.diagnostics.clone();

        let selection = match self.elbow.select(&sweep_result.curve) {
            Ok(selection) => selection,
            Err(EventError::NoKneeFound { sensitivity }) => match self.elbow.fallback_k {
                Some(k) => {
                    let warning = format!(
                        "no knee found at sensitivity={sensitivity}; using configured fallback k={k}"
                    );
                    log::warn!("{warning}");
                    diagnostics.warnings.push(warning);
                    KneeSelection {
                        k,
                        pass: ElbowPass::ConfiguredFallback,
                    }
                }
                None => return Err(EventError::NoKneeFound { sensitivity }),
            },
            Err(other) => return Err(other),
        };

        let change_points = sweep_result
            .change_points(selection.k)
            .ok_or_else(|| {
                EventError::invalid_input(format!(
                    "selected k={} outside swept range 1..={}",
                    selection.k,
                    sweep_result.curve.len()
                ))
            })?
            .to_vec();

        diagnostics
            .notes
            .push(format!("selected_k={}, pass={:?}", selection.k, selection.pass));

        Ok(EventDetectionResult {
            selected_k: selection.k,
            change_points,
            sensitivity: self.elbow.sensitivity,
            pass: selection.pass,
            curve: sweep_result.curve,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{EventDetector, EventDetectorConfig};
    use crate::elbow::{ElbowConfig, ElbowPass, ElbowStrategy};
    use crate::sweep::SweepConfig;
    use evd_core::{EventError, FeatureMatrix};
    use evd_costs::CostLinearFit;

    fn univariate(values: Vec<f64>) -> FeatureMatrix {
        let n = values.len();
        FeatureMatrix::from_row_major(vec!["x".to_string()], values, n)
            .expect("test matrix should be valid")
    }

    fn zigzag_signal(n: usize, period: usize) -> FeatureMatrix {
        // Piecewise-linear triangle wave: clear events at each direction flip.
        let values: Vec<f64> = (0..n)
            .map(|t| {
                let phase = t % (2 * period);
                if phase < period {
                    phase as f64
                } else {
                    (2 * period - phase) as f64
                }
            })
            .collect();
        univariate(values)
    }

    fn default_config() -> EventDetectorConfig {
        EventDetectorConfig {
            sweep: SweepConfig {
                k_max: 6,
                min_window: 5,
                penalty: 0.0,
            },
            elbow: ElbowConfig::default(),
        }
    }

    #[test]
    fn detects_triangle_wave_flips() {
        let detector = EventDetector::new(CostLinearFit::default(), default_config())
            .expect("valid config");
        // 60 frames, flips at 15, 30, 45: four linear segments.
        let result = detector.detect(&zigzag_signal(60, 15)).expect("detect");

        assert_eq!(result.selected_k, 4);
        assert_eq!(result.change_points, vec![15, 30, 45]);
        assert!(matches!(
            result.pass,
            ElbowPass::Refined | ElbowPass::FirstPassFallback
        ));
        assert_eq!(result.sensitivity, 1.0);
        let k4 = result.curve.point(4).expect("k=4 swept");
        assert!(k4.fit_cost < 1e-6);
    }

    #[test]
    fn no_knee_propagates_without_fallback() {
        let detector = EventDetector::new(CostLinearFit::default(), default_config())
            .expect("valid config");
        // Constant signal: flat cost curve, no bend anywhere.
        let err = detector
            .detect(&univariate(vec![1.0; 60]))
            .expect_err("flat curve should have no knee");
        assert!(matches!(err, EventError::NoKneeFound { .. }));
    }

    #[test]
    fn configured_fallback_replaces_missing_knee_with_warning() {
        let mut config = default_config();
        config.elbow.fallback_k = Some(1);
        let detector =
            EventDetector::new(CostLinearFit::default(), config).expect("valid config");

        let result = detector
            .detect(&univariate(vec![1.0; 60]))
            .expect("fallback should apply");
        assert_eq!(result.selected_k, 1);
        assert!(result.change_points.is_empty());
        assert_eq!(result.pass, ElbowPass::ConfiguredFallback);
        assert!(
            result
                .diagnostics
                .warnings
                .iter()
                .any(|w| w.contains("configured fallback"))
        );
    }

    #[test]
    fn fallback_beyond_k_max_is_rejected_at_construction() {
        let mut config = default_config();
        config.elbow.fallback_k = Some(10);
        let err = EventDetector::new(CostLinearFit::default(), config)
            .expect_err("fallback beyond sweep range must fail");
        assert!(err.to_string().contains("exceeds k_max"));
    }

    #[test]
    fn single_pass_strategy_is_honored() {
        let mut config = default_config();
        config.elbow.strategy = ElbowStrategy::SinglePass;
        let detector =
            EventDetector::new(CostLinearFit::default(), config).expect("valid config");

        let result = detector.detect(&zigzag_signal(60, 15)).expect("detect");
        assert_eq!(result.pass, ElbowPass::Single);
        assert_eq!(result.selected_k, 4);
    }

    #[test]
    fn detection_is_deterministic_end_to_end() {
        let detector = EventDetector::new(CostLinearFit::default(), default_config())
            .expect("valid config");
        let matrix = zigzag_signal(60, 15);

        let first = detector.detect(&matrix).expect("first run");
        let second = detector.detect(&matrix).expect("second run");
        assert_eq!(first.selected_k, second.selected_k);
        assert_eq!(first.change_points, second.change_points);
        assert_eq!(first.curve, second.curve);
    }
}
