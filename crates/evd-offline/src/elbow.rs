// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::sweep::CostCurve;
use evd_core::EventError;

pub const DEFAULT_SENSITIVITY: f64 = 1.0;
pub const DEFAULT_REFINE_RADIUS: usize = 5;

/// Which pass of elbow selection produced the chosen k.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElbowPass {
    /// Single kneedle application over the full curve.
    Single,
    /// Second kneedle application over the refined sub-range.
    Refined,
    /// Second pass found no knee; the first-pass estimate was kept.
    FirstPassFallback,
    /// No knee anywhere; the configured fallback k was used.
    ConfiguredFallback,
}

/// Selected segment count plus which pass produced it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KneeSelection {
    pub k: usize,
    pub pass: ElbowPass,
}

/// Elbow selection strategy.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElbowStrategy {
    SinglePass,
    TwoPass { radius: usize },
}

/// Configuration for elbow selection.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElbowConfig {
    /// Kneedle sensitivity S; larger is stricter.
    pub sensitivity: f64,
    pub strategy: ElbowStrategy,
    /// Segment count to report when no knee clears the threshold anywhere.
    /// `None` propagates [`EventError::NoKneeFound`] to the caller.
    pub fallback_k: Option<usize>,
}

impl Default for ElbowConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            strategy: ElbowStrategy::TwoPass {
                radius: DEFAULT_REFINE_RADIUS,
            },
            fallback_k: None,
        }
    }
}

impl ElbowConfig {
    pub fn validate(&self) -> Result<(), EventError> {
        if !self.sensitivity.is_finite() || self.sensitivity <= 0.0 {
            return Err(EventError::invalid_input(format!(
                "sensitivity must be finite and > 0; got {}",
                self.sensitivity
            )));
        }
        if let ElbowStrategy::TwoPass { radius } = self.strategy
            && radius == 0
        {
            return Err(EventError::invalid_input(
                "two-pass refinement radius must be >= 1",
            ));
        }
        if let Some(k) = self.fallback_k
            && k == 0
        {
            return Err(EventError::invalid_input("fallback_k must be >= 1"));
        }
        Ok(())
    }

    /// Applies the configured strategy to a cost curve.
    ///
    /// Selection assumes a weakly decreasing `total_cost` curve (penalty
    /// zero or small relative to the fit costs); a penalty large enough to
    /// make the totals rise with k leaves no knee to find.
    pub fn select(&self, curve: &CostCurve) -> Result<KneeSelection, EventError> {
        self.validate()?;
        match self.strategy {
            ElbowStrategy::SinglePass => {
                let k = kneedle_elbow_detection(curve, self.sensitivity)?;
                Ok(KneeSelection {
                    k,
                    pass: ElbowPass::Single,
                })
            }
            ElbowStrategy::TwoPass { radius } => {
                two_pass_elbow_detection(curve, self.sensitivity, radius)
            }
        }
    }
}

/// Single-pass kneedle knee detection over a cost-vs-k curve.
///
/// Both axes are normalized to [0, 1]; for the (weakly decreasing) cost
/// curve the difference series is `d = (1 - y_norm) - x_norm`. Local maxima
/// of `d` are candidate knees; a candidate is confirmed when `d` later falls
/// below `d(candidate) - S * mean(|consecutive d difference|)` before another
/// local maximum appears. The first confirmed candidate is the knee.
pub fn kneedle_elbow_detection(
    curve: &CostCurve,
    sensitivity: f64,
) -> Result<usize, EventError> {
    if !sensitivity.is_finite() || sensitivity <= 0.0 {
        return Err(EventError::invalid_input(format!(
            "sensitivity must be finite and > 0; got {sensitivity}"
        )));
    }

    let len = curve.len();
    if len < 3 {
        // Too few points to hold an interior bend.
        return Err(EventError::NoKneeFound { sensitivity });
    }

    for point in &curve.points {
        if !point.total_cost.is_finite() {
            return Err(EventError::numerical_issue(format!(
                "non-finite cost at k={}", point.k
            )));
        }
    }

    let x_first = curve.points[0].k as f64;
    let x_last = curve.points[len - 1].k as f64;
    let x_span = x_last - x_first;
    if x_span <= 0.0 {
        return Err(EventError::invalid_input(
            "curve segment counts must be strictly increasing",
        ));
    }

    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for point in &curve.points {
        y_min = y_min.min(point.total_cost);
        y_max = y_max.max(point.total_cost);
    }
    let y_span = y_max - y_min;
    if y_span <= f64::EPSILON * y_max.abs().max(1.0) {
        // Flat curve: no bend to find.
        return Err(EventError::NoKneeFound { sensitivity });
    }

    let difference: Vec<f64> = curve
        .points
        .iter()
        .map(|point| {
            let x_norm = (point.k as f64 - x_first) / x_span;
            let y_norm = (point.total_cost - y_min) / y_span;
            (1.0 - y_norm) - x_norm
        })
        .collect();

    let average_step = difference
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .sum::<f64>()
        / (len - 1) as f64;

    let is_local_max = |i: usize| {
        i > 0 && i + 1 < len && difference[i] > difference[i - 1] && difference[i] >= difference[i + 1]
    };

    for i in 1..len - 1 {
        if !is_local_max(i) {
            continue;
        }
        let threshold = difference[i] - sensitivity * average_step;
        for j in (i + 1)..len {
            if is_local_max(j) {
                break;
            }
            if difference[j] < threshold {
                return Ok(curve.points[i].k);
            }
        }
    }

    Err(EventError::NoKneeFound { sensitivity })
}

/// Two-pass kneedle: a coarse full-range pass followed by a refinement pass
/// over `[k0 - radius, k0 + radius]`, re-normalized.
///
/// Refinement corrects the coarse estimate's bias toward large k when the
/// curve extends far past the true knee. A second-pass miss degrades to the
/// first-pass estimate instead of failing; a first-pass miss propagates.
pub fn two_pass_elbow_detection(
    curve: &CostCurve,
    sensitivity: f64,
    radius: usize,
) -> Result<KneeSelection, EventError> {
    if radius == 0 {
        return Err(EventError::invalid_input(
            "two-pass refinement radius must be >= 1",
        ));
    }

    let coarse_k = kneedle_elbow_detection(curve, sensitivity)?;

    let low = coarse_k.saturating_sub(radius);
    let high = coarse_k + radius;
    let sub_curve = CostCurve {
        points: curve
            .points
            .iter()
            .filter(|point| point.k >= low && point.k <= high)
            .copied()
            .collect(),
    };

    match kneedle_elbow_detection(&sub_curve, sensitivity) {
        Ok(k) => Ok(KneeSelection {
            k,
            pass: ElbowPass::Refined,
        }),
        Err(EventError::NoKneeFound { .. }) => Ok(KneeSelection {
            k: coarse_k,
            pass: ElbowPass::FirstPassFallback,
        }),
        Err(other) => Err(other),
    }
}
