//! Shared DataFrame helpers

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Whether a polars dtype is a primitive numeric type
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Column names of a frame as owned strings, in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Read a column as `f64` values, failing on missing entries.
///
/// `what` names the caller's view of the data in error messages
/// (e.g. "feature", "target").
pub fn column_to_f64(df: &DataFrame, name: &str, what: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::missing_column(name))?;
    series_to_f64(column.as_materialized_series(), what)
}

/// Convert a numeric series to `f64` values, failing on missing entries
pub fn series_to_f64(series: &Series, what: &str) -> Result<Vec<f64>> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(PipelineError::SchemaError(format!(
            "{} column '{}' has non-numeric type {}",
            what,
            series.name(),
            series.dtype()
        )));
    }
    if series.null_count() > 0 {
        return Err(PipelineError::InvalidInputError(format!(
            "{} column '{}' contains {} missing values",
            what,
            series.name(),
            series.null_count()
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.into_no_null_iter().collect())
}

/// Extract named columns into a row-major matrix
pub fn frame_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_to_f64(df, name, "feature"))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

/// Convert a target series into a vector
pub fn series_to_array1(series: &Series) -> Result<Array1<f64>> {
    Ok(Array1::from(series_to_f64(series, "target")?))
}
