// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use evd_core::{EventError, FeatureMatrix};

/// Contract for segment cost models used by sweep detectors.
///
/// A model is validated against a matrix once, precomputes an immutable
/// per-matrix cache, and then answers window-cost queries against that cache.
/// Queries are pure; recomputation is idempotent.
pub trait CostModel {
    type Cache;

    /// Short stable identifier used in diagnostics.
    fn name(&self) -> &'static str;

    /// Smallest window `[start, end)` this model accepts; `end - start`
    /// below this fails with [`EventError::InsufficientWindow`].
    fn min_window(&self) -> usize;

    /// Checks that the matrix is usable with this model.
    fn validate(&self, matrix: &FeatureMatrix) -> Result<(), EventError>;

    /// Builds the per-matrix cache consumed by [`CostModel::segment_cost`].
    fn precompute(&self, matrix: &FeatureMatrix) -> Result<Self::Cache, EventError>;

    /// Cost of modeling `[start, end)` with a single local fit.
    fn segment_cost(
        &self,
        cache: &Self::Cache,
        start: usize,
        end: usize,
    ) -> Result<f64, EventError>;
}
