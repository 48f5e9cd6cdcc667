// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Neumaier-compensated prefix sums; output length is `values.len() + 1`
/// with a leading zero, so `out[b] - out[a]` is the sum over `[a, b)`.
///
/// The branch on magnitudes keeps the compensation valid when an addend
/// exceeds the running sum, which plain Kahan loses on alternating-sign
/// large-magnitude inputs.
pub fn prefix_sums(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len() + 1);
    out.push(0.0);
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for &value in values {
        let t = sum + value;
        if sum.abs() >= value.abs() {
            compensation += (sum - t) + value;
        } else {
            compensation += (value - t) + sum;
        }
        sum = t;
        out.push(sum + compensation);
    }
    out
}

/// Compensated prefix sums of squared values, same layout as [`prefix_sums`].
pub fn prefix_sum_squares(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len() + 1);
    out.push(0.0);
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for &value in values {
        let squared = value * value;
        let t = sum + squared;
        if sum.abs() >= squared.abs() {
            compensation += (sum - t) + squared;
        } else {
            compensation += (squared - t) + sum;
        }
        sum = t;
        out.push(sum + compensation);
    }
    out
}
