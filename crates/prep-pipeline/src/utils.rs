//! Shared utilities for the transform library.
//!
//! Column extraction and reassembly live here so every transform applies the
//! same input checks and produces `Float64` output columns.

use crate::error::{PrepError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
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

// =============================================================================
// Column Extraction
// =============================================================================

/// A named column materialized as plain `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    pub name: PlSmallStr,
    pub values: Vec<f64>,
}

impl NumericColumn {
    pub fn new(name: impl Into<PlSmallStr>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Extract every column of `df` as finite `f64` values.
///
/// Fails with a transform error attributed to `step` when the table is empty,
/// a column is not numeric, or a cell is missing or non-finite.
pub fn numeric_columns(df: &DataFrame, step: &str) -> Result<Vec<NumericColumn>> {
    if df.width() == 0 {
        return Err(PrepError::transform(step, "table has no columns"));
    }
    if df.height() == 0 {
        return Err(PrepError::transform(step, "table has no rows"));
    }

    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let name = column.name().clone();
        if !is_numeric_dtype(column.dtype()) {
            return Err(PrepError::transform(
                step,
                format!("column '{}' is not numeric ({})", name, column.dtype()),
            ));
        }
        let missing = column.null_count();
        if missing > 0 {
            return Err(PrepError::transform(
                step,
                format!("column '{}' contains {} missing values", name, missing),
            ));
        }

        let series = column.as_materialized_series().cast(&DataType::Float64)?;
        let values: Vec<f64> = series.f64()?.into_no_null_iter().collect();
        if let Some(row) = values.iter().position(|v| !v.is_finite()) {
            return Err(PrepError::transform(
                step,
                format!("column '{}' has a non-finite value at row {}", name, row),
            ));
        }
        columns.push(NumericColumn { name, values });
    }

    Ok(columns)
}

/// Reassemble transformed columns into a DataFrame.
pub fn frame_from_columns(columns: Vec<NumericColumn>) -> Result<DataFrame> {
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|c| Series::new(c.name, c.values).into_column())
        .collect();
    Ok(DataFrame::new(columns)?)
}

// =============================================================================
// Statistics
// =============================================================================

/// Arithmetic mean. Callers guarantee a non-empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`), as used when fitting a scaler.
pub fn population_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Minimum and maximum of a non-empty slice.
pub fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}
