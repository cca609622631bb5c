//! Preprocessing strategy for the raw orders table

use super::{CleaningOutput, DataStrategy};
use crate::error::{PipelineError, Result};
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Sentinel written into empty review messages
pub const NO_REVIEW: &str = "No Review";

/// Column lists driving [`DataPreProcessStrategy`]
///
/// The defaults describe the Olist orders export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Timestamp and identifier columns removed up front
    pub drop_columns: Vec<String>,
    /// Numeric columns whose missing entries get the column median
    pub median_impute_columns: Vec<String>,
    /// Free-text column whose missing entries get [`PreprocessConfig::text_fill_value`]
    pub text_column: String,
    /// Value written into missing text entries
    pub text_fill_value: String,
    /// Numeric columns with no predictive value, removed after the numeric projection
    pub drop_numeric_columns: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            drop_columns: vec![
                "order_approved_at".to_string(),
                "order_delivered_carrier_date".to_string(),
                "order_delivered_customer_date".to_string(),
                "order_estimated_delivery_date".to_string(),
                "order_purchase_timestamp".to_string(),
            ],
            median_impute_columns: vec![
                "product_weight_g".to_string(),
                "product_length_cm".to_string(),
                "product_height_cm".to_string(),
                "product_width_cm".to_string(),
            ],
            text_column: "review_comment_message".to_string(),
            text_fill_value: NO_REVIEW.to_string(),
            drop_numeric_columns: vec![
                "customer_zip_code_prefix".to_string(),
                "order_item_id".to_string(),
            ],
        }
    }
}

impl PreprocessConfig {
    /// Create a configuration with the default column lists
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the columns dropped up front
    pub fn with_drop_columns<S: Into<String>>(mut self, cols: impl IntoIterator<Item = S>) -> Self {
        self.drop_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the median-imputed columns
    pub fn with_median_impute_columns<S: Into<String>>(
        mut self,
        cols: impl IntoIterator<Item = S>,
    ) -> Self {
        self.median_impute_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the free-text column
    pub fn with_text_column(mut self, col: impl Into<String>) -> Self {
        self.text_column = col.into();
        self
    }

    /// Replace the numeric columns dropped after projection
    pub fn with_drop_numeric_columns<S: Into<String>>(
        mut self,
        cols: impl IntoIterator<Item = S>,
    ) -> Self {
        self.drop_numeric_columns = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Every column the strategy expects to find in its input
    pub fn expected_columns(&self) -> impl Iterator<Item = &str> {
        self.drop_columns
            .iter()
            .chain(self.median_impute_columns.iter())
            .chain(std::iter::once(&self.text_column))
            .chain(self.drop_numeric_columns.iter())
            .map(String::as_str)
    }
}

/// Prunes, imputes and projects a raw dataset to numeric features
#[derive(Debug, Clone, Default)]
pub struct DataPreProcessStrategy {
    config: PreprocessConfig,
}

impl DataPreProcessStrategy {
    /// Strategy with the default column lists
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategy with custom column lists
    pub fn with_config(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run the preprocessing steps and return the cleaned frame
    pub fn preprocess(&self, data: &DataFrame) -> Result<DataFrame> {
        self.check_schema(data)?;

        let mut df = data.clone();
        for col in &self.config.drop_columns {
            df = df.drop(col)?;
        }

        for col in &self.config.median_impute_columns {
            let filled = fill_with_median(df.column(col)?.as_materialized_series())?;
            df.with_column(filled)?;
        }

        let filled = fill_text(
            df.column(&self.config.text_column)?.as_materialized_series(),
            &self.config.text_fill_value,
        )?;
        df.with_column(filled)?;

        let numeric: Vec<PlSmallStr> = df
            .get_columns()
            .iter()
            .filter(|c| is_numeric_dtype(c.dtype()))
            .map(|c| c.name().clone())
            .collect();
        let mut df = df.select(numeric)?;

        for col in &self.config.drop_numeric_columns {
            df = df.drop(col)?;
        }

        info!(
            rows = df.height(),
            input_columns = data.width(),
            output_columns = df.width(),
            "Preprocessing complete"
        );
        Ok(df)
    }

    fn check_schema(&self, data: &DataFrame) -> Result<()> {
        for col in self.config.expected_columns() {
            if data.column(col).is_err() {
                return Err(PipelineError::missing_column(col));
            }
        }

        // Numeric-only columns dropped at the end must survive the projection.
        for col in &self.config.drop_numeric_columns {
            let dtype = data.column(col)?.dtype().clone();
            if !is_numeric_dtype(&dtype) {
                return Err(PipelineError::SchemaError(format!(
                    "column '{}' should be numeric, found {}",
                    col, dtype
                )));
            }
        }
        Ok(())
    }
}

impl DataStrategy for DataPreProcessStrategy {
    fn name(&self) -> &'static str {
        "preprocess"
    }

    fn handle_data(&self, data: &DataFrame) -> Result<CleaningOutput> {
        self.preprocess(data).map(CleaningOutput::Dataset)
    }
}

/// Fill missing entries of a numeric column with the median of its present values
fn fill_with_median(series: &Series) -> Result<Series> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::SchemaError(format!(
            "column '{}' must be numeric for median imputation, found {}",
            series.name(),
            series.dtype()
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    let Some(median) = ca.median() else {
        // Nothing to compute a median from; a fully empty column stays empty.
        debug!(column = %series.name(), "No values present, skipping median imputation");
        return Ok(series.clone());
    };

    debug!(column = %series.name(), median, nulls = ca.null_count(), "Imputing median");
    let filled: Float64Chunked = ca
        .into_iter()
        .map(|v| Some(v.unwrap_or(median)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

/// Fill missing entries of a text column with a constant
fn fill_text(series: &Series, value: &str) -> Result<Series> {
    let ca = series.str().map_err(|_| {
        PipelineError::SchemaError(format!(
            "column '{}' must be text, found {}",
            series.name(),
            series.dtype()
        ))
    })?;

    let filled: StringChunked = ca
        .into_iter()
        .map(|v| Some(v.unwrap_or(value)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> PreprocessConfig {
        PreprocessConfig::new()
            .with_drop_columns(["ts"])
            .with_median_impute_columns(["weight"])
            .with_text_column("comment")
            .with_drop_numeric_columns(["zip"])
    }

    fn small_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("ts".into(), &["2017-10-02", "2017-10-03", "2017-10-04", "2017-10-05"]),
            Column::new("weight".into(), &[Some(1.0), None, Some(3.0), Some(10.0)]),
            Column::new("comment".into(), &[Some("ok"), None, None, Some("great")]),
            Column::new("zip".into(), &[1000i64, 2000, 3000, 4000]),
            Column::new("price".into(), &[9.5, 12.0, 7.25, 3.0]),
            Column::new("review_score".into(), &[5i64, 4, 1, 3]),
        ])
        .unwrap()
    }

    #[test]
    fn test_median_imputation() {
        let strategy = DataPreProcessStrategy::with_config(small_config());
        let out = strategy.preprocess(&small_frame()).unwrap();

        let weight = out.column("weight").unwrap().f64().unwrap();
        assert_eq!(weight.null_count(), 0);
        // median of [1, 3, 10]
        assert_eq!(weight.get(1), Some(3.0));
    }

    #[test]
    fn test_output_is_numeric_without_dropped_columns() {
        let strategy = DataPreProcessStrategy::with_config(small_config());
        let out = strategy.preprocess(&small_frame()).unwrap();

        let names = crate::utils::column_names(&out);
        assert_eq!(names, vec!["weight", "price", "review_score"]);
        assert!(out.get_columns().iter().all(|c| is_numeric_dtype(c.dtype())));
    }

    #[test]
    fn test_input_is_not_modified() {
        let df = small_frame();
        let strategy = DataPreProcessStrategy::with_config(small_config());
        strategy.preprocess(&df).unwrap();
        assert_eq!(df.width(), 6);
        assert_eq!(df.column("weight").unwrap().null_count(), 1);
    }

    #[test]
    fn test_fill_text_sentinel() {
        let s = Series::new("comment".into(), &[Some("fine"), None]);
        let filled = fill_text(&s, NO_REVIEW).unwrap();
        assert_eq!(filled.str().unwrap().get(1), Some(NO_REVIEW));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = small_frame().drop("zip").unwrap();
        let strategy = DataPreProcessStrategy::with_config(small_config());
        let err = strategy.preprocess(&df).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(ref m) if m.contains("zip")));
    }

    #[test]
    fn test_text_impute_column_must_be_numeric() {
        let config = small_config().with_median_impute_columns(["comment"]);
        let strategy = DataPreProcessStrategy::with_config(config);
        let err = strategy.preprocess(&small_frame()).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(_)));
    }

    #[test]
    fn test_default_config_columns() {
        let config = PreprocessConfig::default();
        assert_eq!(config.drop_columns.len(), 5);
        assert_eq!(config.median_impute_columns.len(), 4);
        assert_eq!(config.text_fill_value, NO_REVIEW);
        assert_eq!(config.expected_columns().count(), 12);
    }
}
