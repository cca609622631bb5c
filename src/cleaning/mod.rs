//! Data cleaning strategies
//!
//! A [`DataStrategy`] turns a dataset into either a new dataset or a
//! train/test [`Split`]. [`DataCleaning`] binds a dataset to one strategy
//! and runs it.
//!
//! - [`DataPreProcessStrategy`] - column pruning, imputation, numeric projection
//! - [`DataDivideStrategy`] - feature/target separation and seeded train/test split

mod divide;
mod preprocess;

pub use divide::{DataDivideStrategy, DivideConfig, Split};
pub use preprocess::{DataPreProcessStrategy, PreprocessConfig, NO_REVIEW};

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::error;

/// Result of applying a cleaning strategy
#[derive(Debug, Clone)]
pub enum CleaningOutput {
    Dataset(DataFrame),
    Split(Split),
}

impl CleaningOutput {
    /// Unwrap a dataset result
    pub fn into_dataset(self) -> Result<DataFrame> {
        match self {
            CleaningOutput::Dataset(df) => Ok(df),
            CleaningOutput::Split(_) => Err(PipelineError::InvalidInputError(
                "expected a dataset, strategy produced a split".to_string(),
            )),
        }
    }

    /// Unwrap a split result
    pub fn into_split(self) -> Result<Split> {
        match self {
            CleaningOutput::Split(split) => Ok(split),
            CleaningOutput::Dataset(_) => Err(PipelineError::InvalidInputError(
                "expected a split, strategy produced a dataset".to_string(),
            )),
        }
    }
}

/// Strategy for handling data
///
/// Implementations read only their argument and return new values.
pub trait DataStrategy {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn handle_data(&self, data: &DataFrame) -> Result<CleaningOutput>;
}

/// Applies a bound strategy to a dataset
pub struct DataCleaning<'a> {
    data: &'a DataFrame,
    strategy: Box<dyn DataStrategy + 'a>,
}

impl<'a> DataCleaning<'a> {
    pub fn new(data: &'a DataFrame, strategy: impl DataStrategy + 'a) -> Self {
        Self {
            data,
            strategy: Box::new(strategy),
        }
    }

    /// Run the strategy, propagating its error unchanged
    pub fn handle_data(&self) -> Result<CleaningOutput> {
        self.strategy.handle_data(self.data).map_err(|e| {
            error!(strategy = self.strategy.name(), error = %e, "Error in handling data");
            e
        })
    }
}
