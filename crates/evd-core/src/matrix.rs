// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::EventError;

/// Immutable multivariate signal extracted from a trajectory.
///
/// Rows are time-ordered simulation frames, columns are named scalar
/// features. Dense row-major `f64` storage; validated once at construction
/// and read-only afterwards. Missing or non-finite values are a contract
/// violation of the upstream producer and are rejected here.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f64>,
    names: Vec<String>,
    n: usize,
    d: usize,
}

impl FeatureMatrix {
    /// Builds a matrix from row-major values with one name per column.
    pub fn from_row_major(
        names: Vec<String>,
        values: Vec<f64>,
        n: usize,
    ) -> Result<Self, EventError> {
        let d = names.len();
        if n == 0 {
            return Err(EventError::invalid_input("FeatureMatrix requires n >= 1"));
        }
        if d == 0 {
            return Err(EventError::invalid_input(
                "FeatureMatrix requires at least one feature column",
            ));
        }

        let expected_len = n
            .checked_mul(d)
            .ok_or_else(|| EventError::invalid_input("n*d overflow while validating shape"))?;
        if values.len() != expected_len {
            return Err(EventError::invalid_input(format!(
                "value length mismatch: got {}, expected {expected_len} (n={n}, d={d})",
                values.len()
            )));
        }

        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(EventError::invalid_input(format!(
                "non-finite value in feature '{}' at frame {}; upstream producer must supply complete signals",
                names[idx % d],
                idx / d
            )));
        }

        Ok(Self { values, names, n, d })
    }

    /// Builds a matrix from per-frame rows.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, EventError> {
        let d = names.len();
        for (t, row) in rows.iter().enumerate() {
            if row.len() != d {
                return Err(EventError::invalid_input(format!(
                    "frame {t} has {} features, expected {d}",
                    row.len()
                )));
            }
        }
        let values = rows.iter().flatten().copied().collect();
        Self::from_row_major(names, values, rows.len())
    }

    /// Number of frames (rows).
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of features (columns).
    pub fn d(&self) -> usize {
        self.d
    }

    /// Column names, in storage order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Value at frame `t`, feature `dim`.
    #[inline]
    pub fn value(&self, t: usize, dim: usize) -> f64 {
        assert!(t < self.n, "frame index out of bounds: t={t}, n={}", self.n);
        assert!(
            dim < self.d,
            "feature index out of bounds: dim={dim}, d={}",
            self.d
        );
        self.values[t * self.d + dim]
    }

    /// Iterates one feature column over all frames.
    pub fn column(&self, dim: usize) -> impl Iterator<Item = f64> + '_ {
        assert!(
            dim < self.d,
            "feature index out of bounds: dim={dim}, d={}",
            self.d
        );
        self.values.iter().skip(dim).step_by(self.d).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureMatrix;
    use crate::EventError;

    fn names(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn from_row_major_valid_shape_and_accessors() {
        let matrix = FeatureMatrix::from_row_major(
            names(&["a", "b"]),
            vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0],
            3,
        )
        .expect("valid matrix should build");

        assert_eq!(matrix.n(), 3);
        assert_eq!(matrix.d(), 2);
        assert_eq!(matrix.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(matrix.value(1, 0), 2.0);
        assert_eq!(matrix.value(2, 1), 30.0);
        assert_eq!(matrix.column(1).collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn from_rows_matches_row_major() {
        let from_rows =
            FeatureMatrix::from_rows(names(&["a", "b"]), &[vec![1.0, 10.0], vec![2.0, 20.0]])
                .expect("rows should build");
        let from_flat =
            FeatureMatrix::from_row_major(names(&["a", "b"]), vec![1.0, 10.0, 2.0, 20.0], 2)
                .expect("flat should build");
        assert_eq!(from_rows, from_flat);
    }

    #[test]
    fn empty_shapes_are_rejected() {
        let err = FeatureMatrix::from_row_major(names(&["a"]), vec![], 0)
            .expect_err("n=0 must fail");
        assert!(matches!(err, EventError::InvalidInput(_)));

        let err =
            FeatureMatrix::from_row_major(vec![], vec![], 3).expect_err("d=0 must fail");
        assert!(err.to_string().contains("at least one feature"));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = FeatureMatrix::from_row_major(names(&["a", "b"]), vec![1.0, 2.0, 3.0], 2)
            .expect_err("wrong length must fail");
        assert!(err.to_string().contains("value length mismatch"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = FeatureMatrix::from_rows(names(&["a", "b"]), &[vec![1.0, 2.0], vec![3.0]])
            .expect_err("ragged rows must fail");
        assert!(err.to_string().contains("frame 1"));
    }

    #[test]
    fn non_finite_values_name_the_offending_feature_and_frame() {
        let err = FeatureMatrix::from_row_major(
            names(&["a", "b"]),
            vec![1.0, 2.0, f64::NAN, 4.0],
            2,
        )
        .expect_err("NaN must be rejected");
        let message = err.to_string();
        assert!(message.contains("feature 'a'"));
        assert!(message.contains("frame 1"));

        let err = FeatureMatrix::from_row_major(
            names(&["a"]),
            vec![1.0, f64::INFINITY],
            2,
        )
        .expect_err("infinity must be rejected");
        assert!(err.to_string().contains("non-finite"));
    }

    #[test]
    #[should_panic(expected = "frame index out of bounds")]
    fn value_panics_on_row_overflow() {
        let matrix =
            FeatureMatrix::from_row_major(names(&["a"]), vec![1.0, 2.0], 2).expect("valid");
        let _ = matrix.value(2, 0);
    }
}
