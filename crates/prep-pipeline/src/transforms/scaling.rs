//! Column scaling: `stand` and `norm`.

use crate::error::{PrepError, Result};
use crate::step::StepKind;
use crate::utils::{NumericColumn, frame_from_columns, mean, min_max, numeric_columns, population_std};
use polars::prelude::*;
use tracing::debug;

/// Standardize every column to mean 0 and population standard deviation 1.
///
/// A column whose values are all equal has zero variance and is rejected.
pub fn standardize(df: &DataFrame) -> Result<DataFrame> {
    let step = StepKind::Standardize.as_str();
    let columns = numeric_columns(df, step)?;

    let mut scaled = Vec::with_capacity(columns.len());
    for column in columns {
        let (lo, hi) = min_max(&column.values);
        if lo == hi {
            return Err(PrepError::transform(
                step,
                format!("column '{}' has zero variance", column.name),
            ));
        }
        let m = mean(&column.values);
        let std = population_std(&column.values);
        debug!("stand '{}': mean={:.6}, std={:.6}", column.name, m, std);

        let values = column.values.iter().map(|v| (v - m) / std).collect();
        scaled.push(NumericColumn::new(column.name, values));
    }

    frame_from_columns(scaled)
}

/// Rescale every column so its observed minimum maps to `min` and its
/// observed maximum maps to `max`.
///
/// A constant column maps entirely to `min`.
pub fn normalize(df: &DataFrame, min: f64, max: f64) -> Result<DataFrame> {
    let step = StepKind::Normalize.as_str();
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(PrepError::transform(
            step,
            format!("min must be less than max (got min={}, max={})", min, max),
        ));
    }
    let columns = numeric_columns(df, step)?;

    let scaled = columns
        .into_iter()
        .map(|column| {
            let (lo, hi) = min_max(&column.values);
            let range = hi - lo;
            let values = column
                .values
                .iter()
                .map(|&v| {
                    if range == 0.0 {
                        return min;
                    }
                    // Interpolating this way hits both endpoints exactly.
                    let t = (v - lo) / range;
                    min * (1.0 - t) + max * t
                })
                .collect();
            NumericColumn::new(column.name, values)
        })
        .collect();

    frame_from_columns(scaled)
}
