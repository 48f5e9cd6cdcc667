// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod linear_fit;
pub mod model;

pub use linear_fit::{CostLinearFit, LinearFitCache};
pub use model::CostModel;

/// Built-in cost model namespace placeholder.
pub fn crate_name() -> &'static str {
    let _ = evd_core::crate_name();
    "evd-costs"
}
