// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use evd_core::EventError;
use std::collections::BTreeMap;

/// A single feature emitted by a [`SignalGenerator`] for one frame.
///
/// Scalar features flow straight into the feature matrix; array features
/// (one value per particle, bond, neighbor pair, ...) must be collapsed to
/// scalars by an [`ArrayReducer`] before they can be aggregated.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    Scalar(f64),
    Array(Vec<f64>),
}

/// Computes named features from one trajectory frame.
///
/// Implementations are expected to be pure per frame: the aggregator may
/// evaluate frames in any order, or in parallel.
pub trait SignalGenerator<F>: Send + Sync {
    /// Features for `frame`, keyed by feature name. Keys must be stable
    /// across frames.
    fn generate(&self, frame: &F) -> Result<BTreeMap<String, FeatureValue>, EventError>;
}

/// Collapses a per-element array feature into one or more named scalars.
///
/// Each reduced scalar is published under `"{feature}-{name}"`, where `name`
/// is the key returned here.
pub trait ArrayReducer: Send + Sync {
    fn reduce(&self, values: &[f64]) -> Result<BTreeMap<String, f64>, EventError>;
}

/// Reduces an array to its minimum and maximum, published as `min` / `max`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtremaReducer;

impl ArrayReducer for ExtremaReducer {
    fn reduce(&self, values: &[f64]) -> Result<BTreeMap<String, f64>, EventError> {
        if values.is_empty() {
            return Err(EventError::invalid_input(
                "cannot reduce an empty array feature",
            ));
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in values {
            if !value.is_finite() {
                return Err(EventError::numerical_issue(format!(
                    "array feature contains non-finite value {value}"
                )));
            }
            min = min.min(value);
            max = max.max(value);
        }
        Ok(BTreeMap::from([
            ("min".to_string(), min),
            ("max".to_string(), max),
        ]))
    }
}

/// Reduces an array to its arithmetic mean, published as `mean`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanReducer;

impl ArrayReducer for MeanReducer {
    fn reduce(&self, values: &[f64]) -> Result<BTreeMap<String, f64>, EventError> {
        if values.is_empty() {
            return Err(EventError::invalid_input(
                "cannot reduce an empty array feature",
            ));
        }
        let mut sum = 0.0;
        for &value in values {
            if !value.is_finite() {
                return Err(EventError::numerical_issue(format!(
                    "array feature contains non-finite value {value}"
                )));
            }
            sum += value;
        }
        Ok(BTreeMap::from([(
            "mean".to_string(),
            sum / values.len() as f64,
        )]))
    }
}
