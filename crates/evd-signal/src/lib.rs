// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod generator;

pub use aggregate::{AggregatedSignals, SignalAggregator};
pub use generator::{ArrayReducer, ExtremaReducer, FeatureValue, MeanReducer, SignalGenerator};

/// Signal namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = evd_core::crate_name();
    "evd-signal"
}
