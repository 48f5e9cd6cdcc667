// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error type for the event-detection crates.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EventError {
    /// Malformed input data or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cost window shorter than the configured minimum was requested.
    ///
    /// Indicates a detector bug or misconfiguration, not a recoverable
    /// condition.
    #[error(
        "insufficient window: [{start}, {end}) is shorter than min_window={min_window}"
    )]
    InsufficientWindow {
        start: usize,
        end: usize,
        min_window: usize,
    },

    /// The requested segment count cannot cover the series under the
    /// minimum-window constraint.
    #[error(
        "infeasible segmentation: k_max={k_max} segments of min_window={min_window} cannot fit into {n} rows"
    )]
    InfeasibleSegmentation {
        k_max: usize,
        min_window: usize,
        n: usize,
    },

    /// No bend on the cost curve cleared the sensitivity threshold.
    #[error("no knee found on cost curve at sensitivity={sensitivity}")]
    NoKneeFound { sensitivity: f64 },

    /// A non-finite intermediate value was produced during search.
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
}

impl EventError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn numerical_issue(message: impl Into<String>) -> Self {
        Self::NumericalIssue(message.into())
    }
}
