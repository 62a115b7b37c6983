//! Row-wise smoothing and differencing: `moving_avg_filter` and `dif_trans`.
//!
//! Both transforms drop the leading rows whose value would be undefined, so
//! the output is shorter than the input and every remaining row stays aligned
//! across columns.

use crate::error::{PrepError, Result};
use crate::step::StepKind;
use crate::utils::{NumericColumn, frame_from_columns, numeric_columns};
use polars::prelude::*;

/// Trailing simple moving average over `window` rows.
///
/// The first `window - 1` rows are dropped.
pub fn moving_average(df: &DataFrame, window: usize) -> Result<DataFrame> {
    let step = StepKind::MovingAverage.as_str();
    if window == 0 {
        return Err(PrepError::transform(step, "window size must be at least 1"));
    }
    let columns = numeric_columns(df, step)?;
    if window > df.height() {
        return Err(PrepError::transform(
            step,
            format!(
                "window size {} is larger than the table ({} rows)",
                window,
                df.height()
            ),
        ));
    }

    let width = window as f64;
    let smoothed = columns
        .into_iter()
        .map(|column| {
            let values = column
                .values
                .windows(window)
                .map(|w| w.iter().sum::<f64>() / width)
                .collect();
            NumericColumn::new(column.name, values)
        })
        .collect();

    frame_from_columns(smoothed)
}

/// First-order difference `x[i] - x[i - 1]`; the first row is dropped.
pub fn difference(df: &DataFrame) -> Result<DataFrame> {
    let step = StepKind::Difference.as_str();
    let columns = numeric_columns(df, step)?;
    if df.height() < 2 {
        return Err(PrepError::transform(step, "needs at least 2 rows"));
    }

    let differenced = columns
        .into_iter()
        .map(|column| {
            let values = column.values.windows(2).map(|p| p[1] - p[0]).collect();
            NumericColumn::new(column.name, values)
        })
        .collect();

    frame_from_columns(differenced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_moving_average_window_three() {
        let df = df!("x" => [1.0f64, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let out = moving_average(&df, 3).unwrap();
        assert_eq!(column(&out, "x"), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_moving_average_keeps_columns_aligned() {
        let df = df!(
            "a" => [1.0f64, 3.0, 5.0, 7.0],
            "b" => [10i32, 20, 30, 40]
        )
        .unwrap();
        let out = moving_average(&df, 2).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(column(&out, "a"), vec![2.0, 4.0, 6.0]);
        assert_eq!(column(&out, "b"), vec![15.0, 25.0, 35.0]);
    }

    #[test]
    fn test_moving_average_window_one_is_identity() {
        let df = df!("x" => [4.0f64, -1.0, 2.5]).unwrap();
        let out = moving_average(&df, 1).unwrap();
        assert_eq!(column(&out, "x"), vec![4.0, -1.0, 2.5]);
    }

    #[test]
    fn test_moving_average_window_equal_to_rows() {
        let df = df!("x" => [1.0f64, 2.0, 6.0]).unwrap();
        let out = moving_average(&df, 3).unwrap();
        assert_eq!(column(&out, "x"), vec![3.0]);
    }

    #[test]
    fn test_moving_average_rejects_oversized_window() {
        let df = df!("x" => [1.0f64, 2.0]).unwrap();
        let err = moving_average(&df, 3).unwrap_err();
        assert!(err.to_string().contains("larger than the table"));
    }

    #[test]
    fn test_difference() {
        let df = df!("x" => [1.0f64, 3.0, 6.0, 10.0]).unwrap();
        let out = difference(&df).unwrap();
        assert_eq!(column(&out, "x"), vec![2.0, 3.0, 4.0]);
        assert_eq!(out.height(), df.height() - 1);
    }

    #[test]
    fn test_difference_rejects_single_row() {
        let df = df!("x" => [1.0f64]).unwrap();
        assert!(difference(&df).is_err());
    }
}
