// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use evd_core::{Diagnostics, EventError, FeatureMatrix};
use evd_costs::CostModel;
use std::borrow::Cow;
use std::time::Instant;

/// Relative tolerance for the weak-monotonicity check on the fit-cost curve.
const MONOTONICITY_TOLERANCE: f64 = 1e-9;

/// Configuration for [`SweepDetector`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepConfig {
    /// Upper bound on the number of segments searched (inclusive).
    pub k_max: usize,
    /// Smallest admissible segment length.
    pub min_window: usize,
    /// Fixed cost charged per changepoint; zero leaves all complexity
    /// trade-off to elbow selection.
    pub penalty: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            k_max: 10,
            min_window: 2,
            penalty: 0.0,
        }
    }
}

impl SweepConfig {
    fn validate(&self) -> Result<(), EventError> {
        if self.k_max == 0 {
            return Err(EventError::invalid_input("k_max must be >= 1"));
        }
        if self.min_window < 2 {
            return Err(EventError::invalid_input(format!(
                "min_window must be >= 2; got {}",
                self.min_window
            )));
        }
        if !self.penalty.is_finite() || self.penalty < 0.0 {
            return Err(EventError::invalid_input(format!(
                "penalty must be finite and >= 0; got {}",
                self.penalty
            )));
        }
        Ok(())
    }
}

/// One point on the cost-vs-segment-count curve.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurvePoint {
    /// Segment count.
    pub k: usize,
    /// Minimal sum of per-segment fit costs over all partitions into `k`
    /// segments.
    pub fit_cost: f64,
    /// `fit_cost` plus `penalty * (k - 1)`.
    pub total_cost: f64,
}

/// Minimal-cost curve over k = 1..=k_max, weakly non-increasing in
/// `fit_cost`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CostCurve {
    pub points: Vec<CurvePoint>,
}

impl CostCurve {
    /// Builds a curve from bare total costs for k = 1, 2, ... (no penalty
    /// split); useful for callers selecting an elbow on an external curve.
    pub fn from_costs(costs: impl IntoIterator<Item = f64>) -> Self {
        let points = costs
            .into_iter()
            .enumerate()
            .map(|(idx, cost)| CurvePoint {
                k: idx + 1,
                fit_cost: cost,
                total_cost: cost,
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point for segment count `k`, if within the swept range.
    pub fn point(&self, k: usize) -> Option<&CurvePoint> {
        self.points.iter().find(|p| p.k == k)
    }
}

/// Output of a sweep: the cost curve plus the optimal changepoint set for
/// every swept segment count.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SweepResult {
    pub curve: CostCurve,
    change_points_by_k: Vec<Vec<usize>>,
    pub diagnostics: Diagnostics,
}

impl SweepResult {
    /// Interior changepoints of the optimal partition into `k` segments.
    pub fn change_points(&self, k: usize) -> Option<&[usize]> {
        if k == 0 {
            return None;
        }
        self.change_points_by_k.get(k - 1).map(Vec::as_slice)
    }
}

/// Exact dynamic-programming sweep over segment counts.
///
/// For every k in 1..=k_max, finds the globally optimal partition of the
/// matrix rows into k contiguous segments under the configured cost model.
/// Ties between split points are broken toward the smallest index, making
/// results reproducible on degenerate inputs.
#[derive(Debug)]
pub struct SweepDetector<C: CostModel> {
    cost_model: C,
    config: SweepConfig,
}

impl<C: CostModel> SweepDetector<C> {
    pub fn new(cost_model: C, config: SweepConfig) -> Result<Self, EventError> {
        config.validate()?;
        if config.min_window < cost_model.min_window() {
            return Err(EventError::invalid_input(format!(
                "min_window={} is below the cost model's minimum of {}",
                config.min_window,
                cost_model.min_window()
            )));
        }
        Ok(Self { cost_model, config })
    }

    pub fn cost_model(&self) -> &C {
        &self.cost_model
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Runs the sweep, producing the cost curve and per-k changepoint sets.
    pub fn detect(&self, matrix: &FeatureMatrix) -> Result<SweepResult, EventError> {
        let started_at = Instant::now();
        let n = matrix.n();
        let k_max = self.config.k_max;
        let min_window = self.config.min_window;

        // Fail fast, before validation builds any cache or evaluates a cost.
        let required = k_max
            .checked_mul(min_window)
            .ok_or_else(|| EventError::invalid_input("k_max * min_window overflow"))?;
        if required > n {
            return Err(EventError::InfeasibleSegmentation {
                k_max,
                min_window,
                n,
            });
        }

        self.cost_model.validate(matrix)?;
        let cache = self.cost_model.precompute(matrix)?;

        let sweep = self.run_sweep(&cache, n)?;

        let mut change_points_by_k = Vec::with_capacity(k_max);
        for k in 1..=k_max {
            change_points_by_k.push(reconstruct_change_points(&sweep.backpointers, k, n)?);
        }

        let mut points = Vec::with_capacity(k_max);
        for (idx, &fit_cost) in sweep.fit_cost_by_k.iter().enumerate() {
            let k = idx + 1;
            let total_cost = fit_cost + self.config.penalty * (k - 1) as f64;
            if !total_cost.is_finite() {
                return Err(EventError::numerical_issue(format!(
                    "non-finite total cost at k={k}: fit_cost={fit_cost}"
                )));
            }
            points.push(CurvePoint {
                k,
                fit_cost,
                total_cost,
            });
        }
        let curve = CostCurve { points };

        let mut warnings = vec![];
        check_monotonicity(&curve, &mut warnings);

        let runtime_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let diagnostics = Diagnostics {
            n,
            d: matrix.d(),
            runtime_ms: Some(runtime_ms),
            notes: vec![
                format!(
                    "k_max={k_max}, min_window={min_window}, penalty={}",
                    self.config.penalty
                ),
                "tie_break=smallest_split".to_string(),
            ],
            warnings,
            algorithm: Cow::Borrowed("sweep"),
            cost_model: Cow::Borrowed(self.cost_model.name()),
        };

        Ok(SweepResult {
            curve,
            change_points_by_k,
            diagnostics,
        })
    }

    fn run_sweep(&self, cache: &C::Cache, n: usize) -> Result<SweepState, EventError> {
        let k_max = self.config.k_max;
        let min_window = self.config.min_window;
        let inf = f64::INFINITY;

        // dp_prev[t] holds the minimal cost of covering [0, t) with the
        // previous row's segment count; backpointers recover the argmin
        // splits afterwards.
        let mut backpointers = vec![vec![usize::MAX; n + 1]; k_max + 1];
        let mut fit_cost_by_k = vec![inf; k_max];
        let mut dp_prev = vec![inf; n + 1];
        dp_prev[0] = 0.0;

        for k in 1..=k_max {
            let mut dp_curr = vec![inf; n + 1];
            let first_end = k * min_window;

            for end in first_end..=n {
                let mut best_cost = inf;
                let mut best_split = usize::MAX;

                for split in ((k - 1) * min_window)..=(end - min_window) {
                    if !dp_prev[split].is_finite() {
                        continue;
                    }

                    let segment_cost = self.cost_model.segment_cost(cache, split, end)?;
                    if !segment_cost.is_finite() {
                        return Err(EventError::numerical_issue(format!(
                            "non-finite segment cost at [{split}, {end}): {segment_cost}"
                        )));
                    }

                    let candidate = dp_prev[split] + segment_cost;
                    // Deterministic tie-break: the smallest split wins.
                    let is_better = candidate < best_cost
                        || (candidate == best_cost && split < best_split);
                    if is_better {
                        best_cost = candidate;
                        best_split = split;
                    }
                }

                if best_split != usize::MAX {
                    dp_curr[end] = best_cost;
                    backpointers[k][end] = best_split;
                }
            }

            fit_cost_by_k[k - 1] = dp_curr[n];
            dp_prev = dp_curr;
        }

        for (idx, &fit_cost) in fit_cost_by_k.iter().enumerate() {
            if !fit_cost.is_finite() {
                return Err(EventError::numerical_issue(format!(
                    "sweep produced no finite partition at k={}",
                    idx + 1
                )));
            }
        }

        Ok(SweepState {
            backpointers,
            fit_cost_by_k,
        })
    }
}

struct SweepState {
    backpointers: Vec<Vec<usize>>,
    fit_cost_by_k: Vec<f64>,
}

fn reconstruct_change_points(
    backpointers: &[Vec<usize>],
    k: usize,
    n: usize,
) -> Result<Vec<usize>, EventError> {
    if k == 1 {
        return Ok(vec![]);
    }

    let mut splits_reversed = Vec::with_capacity(k - 1);
    let mut cursor = n;
    for current_k in (2..=k).rev() {
        let split = backpointers[current_k][cursor];
        if split == usize::MAX || split == 0 || split >= n {
            return Err(EventError::invalid_input(format!(
                "backtracking failed at k={current_k}, end={cursor}"
            )));
        }
        splits_reversed.push(split);
        cursor = split;
    }
    splits_reversed.reverse();
    Ok(splits_reversed)
}

fn check_monotonicity(curve: &CostCurve, warnings: &mut Vec<String>) {
    for window in curve.points.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        let tolerance = MONOTONICITY_TOLERANCE * prev.fit_cost.abs().max(1.0);
        if next.fit_cost > prev.fit_cost + tolerance {
            let warning = format!(
                "cost curve not non-increasing: fit_cost(k={}) = {} > fit_cost(k={}) = {}",
                next.k, next.fit_cost, prev.k, prev.fit_cost
            );
            log::warn!("{warning}");
            warnings.push(warning);
        }
    }
}
