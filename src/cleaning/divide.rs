//! Train/test partitioning strategy

use super::{CleaningOutput, DataStrategy};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings for [`DataDivideStrategy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivideConfig {
    /// Column used as the regression target
    pub target_column: String,
    /// Fraction of rows assigned to the test partition
    pub test_size: f64,
    /// Seed for the row shuffle
    pub random_state: u64,
}

impl Default for DivideConfig {
    fn default() -> Self {
        Self {
            target_column: "review_score".to_string(),
            test_size: 0.2,
            random_state: 100,
        }
    }
}

impl DivideConfig {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            ..Self::default()
        }
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Train/test partition of features and target
#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Series,
    pub y_test: Series,
    /// Input row positions that landed in the training partition
    pub train_indices: Vec<usize>,
    /// Input row positions that landed in the test partition
    pub test_indices: Vec<usize>,
}

impl Split {
    pub fn n_train(&self) -> usize {
        self.x_train.height()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.height()
    }

    /// Unpack into `(x_train, x_test, y_train, y_test)`
    pub fn into_parts(self) -> (DataFrame, DataFrame, Series, Series) {
        (self.x_train, self.x_test, self.y_train, self.y_test)
    }
}

/// Splits a cleaned dataset into features/target and train/test rows
#[derive(Debug, Clone, Default)]
pub struct DataDivideStrategy {
    config: DivideConfig,
}

impl DataDivideStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DivideConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DivideConfig {
        &self.config
    }

    /// Partition `data` into a [`Split`]
    pub fn divide(&self, data: &DataFrame) -> Result<Split> {
        let target = &self.config.target_column;
        let test_size = self.config.test_size;

        let y = data
            .column(target)
            .map_err(|_| PipelineError::missing_column(target))?
            .as_materialized_series()
            .clone();
        let x = data.drop(target)?;

        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(PipelineError::InvalidInputError(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let n_samples = data.height();
        let n_test = (n_samples as f64 * test_size).ceil() as usize;
        let n_train = n_samples.saturating_sub(n_test);
        if n_train == 0 || n_test == 0 {
            return Err(PipelineError::InvalidInputError(format!(
                "cannot split {} rows with test_size {} into non-empty partitions",
                n_samples, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);

        let test_indices = indices[..n_test].to_vec();
        let train_indices = indices[n_test..].to_vec();

        let train_idx = to_idx(&train_indices);
        let test_idx = to_idx(&test_indices);

        let split = Split {
            x_train: x.take(&train_idx)?,
            x_test: x.take(&test_idx)?,
            y_train: y.take(&train_idx)?,
            y_test: y.take(&test_idx)?,
            train_indices,
            test_indices,
        };

        info!(
            target = %target,
            n_train = split.n_train(),
            n_test = split.n_test(),
            seed = self.config.random_state,
            "Data divided into train and test"
        );
        Ok(split)
    }
}

impl DataStrategy for DataDivideStrategy {
    fn name(&self) -> &'static str {
        "divide"
    }

    fn handle_data(&self, data: &DataFrame) -> Result<CleaningOutput> {
        self.divide(data).map(CleaningOutput::Split)
    }
}

fn to_idx(indices: &[usize]) -> IdxCa {
    IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn frame(n: usize) -> DataFrame {
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let target: Vec<f64> = (0..n).map(|i| 2.0 * i as f64).collect();
        df!("a" => &a, "target" => &target).unwrap()
    }

    #[test]
    fn test_row_counts_preserved() {
        let strategy = DataDivideStrategy::with_config(DivideConfig::new("target"));
        let split = strategy.divide(&frame(10)).unwrap();

        assert_eq!(split.n_train(), 8);
        assert_eq!(split.n_test(), 2);
        assert_eq!(split.y_train.len(), split.n_train());
        assert_eq!(split.y_test.len(), split.n_test());
        assert!(split.x_train.column("target").is_err());
    }

    #[test]
    fn test_partitions_are_disjoint() {
        let strategy = DataDivideStrategy::with_config(DivideConfig::new("target"));
        let split = strategy.divide(&frame(37)).unwrap();

        let train: HashSet<usize> = split.train_indices.iter().copied().collect();
        let test: HashSet<usize> = split.test_indices.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 37);
    }

    #[test]
    fn test_rows_stay_aligned() {
        let strategy = DataDivideStrategy::with_config(DivideConfig::new("target"));
        let split = strategy.divide(&frame(20)).unwrap();

        let a = split.x_train.column("a").unwrap().f64().unwrap();
        let y = split.y_train.f64().unwrap();
        for i in 0..split.n_train() {
            assert_eq!(y.get(i).unwrap(), 2.0 * a.get(i).unwrap());
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let config = DivideConfig::new("target").with_random_state(7);
        let first = DataDivideStrategy::with_config(config.clone()).divide(&frame(50)).unwrap();
        let second = DataDivideStrategy::with_config(config).divide(&frame(50)).unwrap();
        assert_eq!(first.test_indices, second.test_indices);
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let strategy = DataDivideStrategy::with_config(DivideConfig::new("review_score"));
        let err = strategy.divide(&frame(5)).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(_)));
    }

    #[test]
    fn test_bad_test_size_rejected() {
        let config = DivideConfig::new("target").with_test_size(1.5);
        let err = DataDivideStrategy::with_config(config).divide(&frame(5)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInputError(_)));
    }

    #[test]
    fn test_single_row_cannot_be_split() {
        let strategy = DataDivideStrategy::with_config(DivideConfig::new("target"));
        let err = strategy.divide(&frame(1)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInputError(_)));
    }
}
