// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod matrix;
pub mod stats;

pub use diagnostics::Diagnostics;
pub use error::EventError;
pub use matrix::FeatureMatrix;
pub use stats::{prefix_sum_squares, prefix_sums};

/// Core shared types for event detection.
pub fn crate_name() -> &'static str {
    "evd-core"
}
