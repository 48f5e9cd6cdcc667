// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod detect;
pub mod elbow;
pub mod sweep;

pub use detect::{EventDetectionResult, EventDetector, EventDetectorConfig};
pub use elbow::{
    DEFAULT_REFINE_RADIUS, DEFAULT_SENSITIVITY, ElbowConfig, ElbowPass, ElbowStrategy,
    KneeSelection, kneedle_elbow_detection, two_pass_elbow_detection,
};
pub use sweep::{CostCurve, CurvePoint, SweepConfig, SweepDetector, SweepResult};

/// Offline detector namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = (evd_core::crate_name(), evd_costs::crate_name());
    "evd-offline"
}
