// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::generator::{ArrayReducer, FeatureValue, SignalGenerator};
use evd_core::{EventError, FeatureMatrix};
use std::collections::BTreeMap;

struct GeneratorEntry<F> {
    generator: Box<dyn SignalGenerator<F>>,
    reducers: Vec<Box<dyn ArrayReducer>>,
}

/// Accumulates generator output across a trajectory into per-frame feature
/// rows.
///
/// Each registered generator carries its own reducer list; array features
/// from a generator with no reducers are an input error, since they cannot
/// land in a scalar feature matrix.
pub struct SignalAggregator<F> {
    entries: Vec<GeneratorEntry<F>>,
}

impl<F> Default for SignalAggregator<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> SignalAggregator<F> {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    /// Registers a generator together with the reducers applied to its array
    /// features.
    pub fn with_generator(
        mut self,
        generator: Box<dyn SignalGenerator<F>>,
        reducers: Vec<Box<dyn ArrayReducer>>,
    ) -> Self {
        self.entries.push(GeneratorEntry {
            generator,
            reducers,
        });
        self
    }

    pub fn generator_count(&self) -> usize {
        self.entries.len()
    }

    /// Evaluates every registered generator on one frame and flattens the
    /// result into a scalar feature row.
    fn signals_for_frame(&self, frame: &F) -> Result<BTreeMap<String, f64>, EventError> {
        let mut row = BTreeMap::new();
        for entry in &self.entries {
            let features = entry.generator.generate(frame)?;
            for (key, value) in features {
                match value {
                    FeatureValue::Scalar(scalar) => {
                        insert_unique(&mut row, key, scalar)?;
                    }
                    FeatureValue::Array(values) => {
                        if entry.reducers.is_empty() {
                            return Err(EventError::invalid_input(format!(
                                "array feature '{key}' has no reducer registered"
                            )));
                        }
                        for reducer in &entry.reducers {
                            for (name, scalar) in reducer.reduce(&values)? {
                                insert_unique(&mut row, format!("{key}-{name}"), scalar)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(row)
    }

    /// Runs every generator over the frames in order.
    pub fn accumulate(&self, frames: &[F]) -> Result<AggregatedSignals, EventError> {
        let rows = frames
            .iter()
            .map(|frame| self.signals_for_frame(frame))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "accumulated {} frames across {} generators",
            rows.len(),
            self.entries.len()
        );
        Ok(AggregatedSignals { rows })
    }

    /// Parallel variant of [`Self::accumulate`]. Output is identical to the
    /// serial path.
    #[cfg(feature = "rayon")]
    pub fn accumulate_parallel(&self, frames: &[F]) -> Result<AggregatedSignals, EventError>
    where
        F: Sync,
    {
        use rayon::prelude::*;

        let rows = frames
            .par_iter()
            .map(|frame| self.signals_for_frame(frame))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "accumulated {} frames across {} generators (parallel)",
            rows.len(),
            self.entries.len()
        );
        Ok(AggregatedSignals { rows })
    }
}

fn insert_unique(
    row: &mut BTreeMap<String, f64>,
    key: String,
    value: f64,
) -> Result<(), EventError> {
    if row.contains_key(&key) {
        return Err(EventError::invalid_input(format!(
            "duplicate feature name '{key}' across generators"
        )));
    }
    row.insert(key, value);
    Ok(())
}

/// Per-frame scalar feature rows produced by a [`SignalAggregator`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedSignals {
    rows: Vec<BTreeMap<String, f64>>,
}

impl AggregatedSignals {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[BTreeMap<String, f64>] {
        &self.rows
    }

    /// Assembles the rows into a feature matrix with lexicographically
    /// ordered columns.
    ///
    /// Every frame must have produced exactly the same feature set; a
    /// generator that emits frame-dependent keys is an input error.
    pub fn to_matrix(&self) -> Result<FeatureMatrix, EventError> {
        let first = self.rows.first().ok_or_else(|| {
            EventError::invalid_input("cannot build a matrix from zero frames")
        })?;
        let names: Vec<String> = first.keys().cloned().collect();

        let mut values = Vec::with_capacity(self.rows.len() * names.len());
        for (frame_idx, row) in self.rows.iter().enumerate() {
            if row.len() != names.len() || !row.keys().eq(names.iter()) {
                return Err(EventError::invalid_input(format!(
                    "frame {frame_idx} produced a different feature set than frame 0"
                )));
            }
            values.extend(row.values().copied());
        }

        FeatureMatrix::from_row_major(names, values, self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregatedSignals, SignalAggregator};
    use crate::generator::{ExtremaReducer, FeatureValue, MeanReducer, SignalGenerator};
    use evd_core::EventError;
    use std::collections::BTreeMap;

    /// Toy frame: a handful of per-particle displacements plus a scalar
    /// energy.
    struct Frame {
        energy: f64,
        displacements: Vec<f64>,
    }

    struct EnergyGenerator;

    impl SignalGenerator<Frame> for EnergyGenerator {
        fn generate(
            &self,
            frame: &Frame,
        ) -> Result<BTreeMap<String, FeatureValue>, EventError> {
            Ok(BTreeMap::from([(
                "energy".to_string(),
                FeatureValue::Scalar(frame.energy),
            )]))
        }
    }

    struct DisplacementGenerator;

    impl SignalGenerator<Frame> for DisplacementGenerator {
        fn generate(
            &self,
            frame: &Frame,
        ) -> Result<BTreeMap<String, FeatureValue>, EventError> {
            Ok(BTreeMap::from([(
                "displacement".to_string(),
                FeatureValue::Array(frame.displacements.clone()),
            )]))
        }
    }

    fn frames() -> Vec<Frame> {
        vec![
            Frame {
                energy: -3.0,
                displacements: vec![0.1, 0.4, 0.2],
            },
            Frame {
                energy: -2.5,
                displacements: vec![0.3, 0.6, 0.5],
            },
            Frame {
                energy: -2.0,
                displacements: vec![0.2, 0.9, 0.7],
            },
        ]
    }

    fn aggregator() -> SignalAggregator<Frame> {
        SignalAggregator::new()
            .with_generator(Box::new(EnergyGenerator), vec![])
            .with_generator(
                Box::new(DisplacementGenerator),
                vec![Box::new(ExtremaReducer), Box::new(MeanReducer)],
            )
    }

    #[test]
    fn reduced_features_are_named_key_dash_reducer_output() {
        let signals = aggregator().accumulate(&frames()).expect("accumulate");
        assert_eq!(signals.len(), 3);

        let row = &signals.rows()[0];
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "displacement-max",
                "displacement-mean",
                "displacement-min",
                "energy"
            ]
        );
        assert_eq!(row.get("displacement-min"), Some(&0.1));
        assert_eq!(row.get("displacement-max"), Some(&0.4));
        assert_eq!(row.get("energy"), Some(&-3.0));
    }

    #[test]
    fn to_matrix_orders_columns_lexicographically() {
        let matrix = aggregator()
            .accumulate(&frames())
            .expect("accumulate")
            .to_matrix()
            .expect("matrix");

        assert_eq!(matrix.n(), 3);
        assert_eq!(matrix.d(), 4);
        assert_eq!(
            matrix.names(),
            &[
                "displacement-max".to_string(),
                "displacement-mean".to_string(),
                "displacement-min".to_string(),
                "energy".to_string()
            ]
        );
        assert_eq!(matrix.value(1, 3), -2.5);
        assert_eq!(matrix.value(2, 0), 0.9);
    }

    #[test]
    fn array_feature_without_reducer_is_rejected() {
        let aggregator: SignalAggregator<Frame> =
            SignalAggregator::new().with_generator(Box::new(DisplacementGenerator), vec![]);
        let err = aggregator
            .accumulate(&frames())
            .expect_err("array without reducer must fail");
        assert!(err.to_string().contains("no reducer registered"));
    }

    #[test]
    fn duplicate_feature_names_are_rejected() {
        let aggregator = SignalAggregator::new()
            .with_generator(Box::new(EnergyGenerator), vec![])
            .with_generator(Box::new(EnergyGenerator), vec![]);
        let err = aggregator
            .accumulate(&frames())
            .expect_err("two generators emitting 'energy' must fail");
        assert!(err.to_string().contains("duplicate feature name"));
    }

    #[test]
    fn inconsistent_feature_sets_fail_at_matrix_assembly() {
        struct FlakyGenerator;

        impl SignalGenerator<Frame> for FlakyGenerator {
            fn generate(
                &self,
                frame: &Frame,
            ) -> Result<BTreeMap<String, FeatureValue>, EventError> {
                let mut out = BTreeMap::from([(
                    "energy".to_string(),
                    FeatureValue::Scalar(frame.energy),
                )]);
                if frame.energy > -2.6 {
                    out.insert("extra".to_string(), FeatureValue::Scalar(1.0));
                }
                Ok(out)
            }
        }

        let aggregator: SignalAggregator<Frame> =
            SignalAggregator::new().with_generator(Box::new(FlakyGenerator), vec![]);
        let signals = aggregator.accumulate(&frames()).expect("accumulate");
        let err = signals
            .to_matrix()
            .expect_err("frame-dependent feature sets must fail");
        assert!(err.to_string().contains("different feature set"));
    }

    #[test]
    fn zero_frames_cannot_become_a_matrix() {
        let signals = aggregator().accumulate(&[]).expect("empty accumulate");
        assert!(signals.is_empty());
        let err = signals.to_matrix().expect_err("zero frames must fail");
        assert!(matches!(err, EventError::InvalidInput(_)));
    }

    #[test]
    fn generator_errors_propagate() {
        struct FailingGenerator;

        impl SignalGenerator<Frame> for FailingGenerator {
            fn generate(
                &self,
                _frame: &Frame,
            ) -> Result<BTreeMap<String, FeatureValue>, EventError> {
                Err(EventError::numerical_issue("neighbor query diverged"))
            }
        }

        let aggregator: SignalAggregator<Frame> =
            SignalAggregator::new().with_generator(Box::new(FailingGenerator), vec![]);
        let err = aggregator
            .accumulate(&frames())
            .expect_err("generator failure must propagate");
        assert!(matches!(err, EventError::NumericalIssue(_)));
    }

    #[test]
    fn default_signals_are_empty() {
        let signals = AggregatedSignals::default();
        assert_eq!(signals.len(), 0);
        assert!(signals.rows().is_empty());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_accumulation_matches_serial() {
        let frames = frames();
        let aggregator = aggregator();
        let serial = aggregator.accumulate(&frames).expect("serial");
        let parallel = aggregator
            .accumulate_parallel(&frames)
            .expect("parallel");
        assert_eq!(serial, parallel);
    }
}
