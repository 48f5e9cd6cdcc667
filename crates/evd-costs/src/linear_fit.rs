// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::model::CostModel;
use evd_core::{EventError, FeatureMatrix, prefix_sum_squares, prefix_sums};

pub const DEFAULT_MIN_WINDOW: usize = 2;

/// Piecewise-linear least-squares segment cost.
///
/// Per feature column, fits an ordinary least-squares line against the frame
/// index and charges the residual sum of squares; the segment cost is the sum
/// across features. With `normalize` set, each window cost is divided by its
/// length so windows of different sizes are comparable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostLinearFit {
    min_window: usize,
    normalize: bool,
}

impl CostLinearFit {
    pub fn new(min_window: usize, normalize: bool) -> Result<Self, EventError> {
        if min_window < 2 {
            return Err(EventError::invalid_input(format!(
                "CostLinearFit requires min_window >= 2 to fit a line; got {min_window}"
            )));
        }
        Ok(Self {
            min_window,
            normalize,
        })
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }
}

impl Default for CostLinearFit {
    fn default() -> Self {
        Self {
            min_window: DEFAULT_MIN_WINDOW,
            normalize: false,
        }
    }
}

/// Prefix-stat cache for O(1) linear-trend cost queries.
///
/// Per-dimension prefixes are stored contiguously, offset by `(n + 1) * dim`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearFitCache {
    prefix_t: Vec<f64>,
    prefix_t_sq: Vec<f64>,
    prefix_x: Vec<f64>,
    prefix_x_sq: Vec<f64>,
    prefix_t_x: Vec<f64>,
    n: usize,
    d: usize,
}

impl LinearFitCache {
    fn dim_offset(&self, dim: usize) -> usize {
        dim * (self.n + 1)
    }
}

fn time_variance_tolerance(sum_t: f64, sum_t_sq: f64, m: f64) -> f64 {
    let cross = if m > 0.0 { (sum_t * sum_t) / m } else { 0.0 };
    let scale = sum_t_sq.abs().max(cross.abs()).max(1.0);
    32.0 * f64::EPSILON * scale
}

fn mean_only_sse(sum_x: f64, sum_x_sq: f64, m: f64) -> f64 {
    let centered = sum_x_sq - (sum_x * sum_x) / m;
    centered.max(0.0)
}

impl CostModel for CostLinearFit {
    type Cache = LinearFitCache;

    fn name(&self) -> &'static str {
        "linear_fit"
    }

    fn min_window(&self) -> usize {
        self.min_window
    }

    fn validate(&self, matrix: &FeatureMatrix) -> Result<(), EventError> {
        // FeatureMatrix guarantees n >= 1, d >= 1 and finite values; the only
        // model-level requirement is that at least one full window fits.
        if matrix.n() < self.min_window {
            return Err(EventError::invalid_input(format!(
                "CostLinearFit requires n >= min_window; got n={}, min_window={}",
                matrix.n(),
                self.min_window
            )));
        }
        Ok(())
    }

    fn precompute(&self, matrix: &FeatureMatrix) -> Result<Self::Cache, EventError> {
        let n = matrix.n();
        let d = matrix.d();

        let t_values: Vec<f64> = (0..n).map(|t| t as f64).collect();
        let t_sq_values: Vec<f64> = t_values.iter().map(|t| t * t).collect();
        let prefix_t = prefix_sums(&t_values);
        let prefix_t_sq = prefix_sums(&t_sq_values);

        let total_prefix_len = (n + 1)
            .checked_mul(d)
            .ok_or_else(|| EventError::invalid_input("cache size overflow"))?;
        let mut prefix_x = Vec::with_capacity(total_prefix_len);
        let mut prefix_x_sq = Vec::with_capacity(total_prefix_len);
        let mut prefix_t_x = Vec::with_capacity(total_prefix_len);

        for dim in 0..d {
            let series: Vec<f64> = matrix.column(dim).collect();
            let series_t_x: Vec<f64> = series
                .iter()
                .zip(&t_values)
                .map(|(x, t)| t * x)
                .collect();

            prefix_x.extend_from_slice(&prefix_sums(&series));
            prefix_x_sq.extend_from_slice(&prefix_sum_squares(&series));
            prefix_t_x.extend_from_slice(&prefix_sums(&series_t_x));
        }

        Ok(LinearFitCache {
            prefix_t,
            prefix_t_sq,
            prefix_x,
            prefix_x_sq,
            prefix_t_x,
            n,
            d,
        })
    }

    fn segment_cost(
        &self,
        cache: &Self::Cache,
        start: usize,
        end: usize,
    ) -> Result<f64, EventError> {
        if start >= end || end > cache.n {
            return Err(EventError::invalid_input(format!(
                "segment bounds out of range: [{start}, {end}) over n={}",
                cache.n
            )));
        }
        if end - start < self.min_window {
            return Err(EventError::InsufficientWindow {
                start,
                end,
                min_window: self.min_window,
            });
        }

        let m = (end - start) as f64;
        let sum_t = cache.prefix_t[end] - cache.prefix_t[start];
        let sum_t_sq = cache.prefix_t_sq[end] - cache.prefix_t_sq[start];
        let time_centered_ss = sum_t_sq - (sum_t * sum_t) / m;
        let time_tol = time_variance_tolerance(sum_t, sum_t_sq, m);

        let mut total = 0.0;
        for dim in 0..cache.d {
            let base = cache.dim_offset(dim);
            let sum_x = cache.prefix_x[base + end] - cache.prefix_x[base + start];
            let sum_x_sq = cache.prefix_x_sq[base + end] - cache.prefix_x_sq[base + start];
            let base_sse = mean_only_sse(sum_x, sum_x_sq, m);

            // Degenerate time variance: fall back to the mean-only residual.
            if time_centered_ss <= time_tol {
                total += base_sse;
                continue;
            }

            let sum_t_x = cache.prefix_t_x[base + end] - cache.prefix_t_x[base + start];
            let cov_t_x = sum_t_x - (sum_t * sum_x) / m;
            let explained = (cov_t_x * cov_t_x) / time_centered_ss;
            total += (base_sse - explained).max(0.0);
        }

        let cost = total.max(0.0);
        Ok(if self.normalize { cost / m } else { cost })
    }
}
