//! Power transforms: `box-cox` and `y-j`.
//!
//! Each column gets its own lambda, chosen by maximizing the profile
//! log-likelihood of the transformed column, and the result is standardized
//! per column. The lambda search starts on `[-5, 5]` and widens while the
//! optimum sits on the edge of the bracket, up to `[-LAMBDA_BOUND, LAMBDA_BOUND]`.

use crate::config::PowerColumnNaming;
use crate::error::{PrepError, Result};
use crate::step::StepKind;
use crate::utils::{NumericColumn, frame_from_columns, mean, min_max, numeric_columns, population_std, population_variance};
use polars::prelude::*;
use tracing::debug;

/// Largest half-width the lambda search interval may grow to.
pub const LAMBDA_BOUND: f64 = 100.0;

const INITIAL_BRACKET: f64 = 5.0;
const EDGE_TOLERANCE: f64 = 1e-6;
const LAMBDA_EPS: f64 = 1e-12;
const SEARCH_TOLERANCE: f64 = 1e-9;
const SEARCH_MAX_ITER: usize = 200;

/// Box-Cox transform of the whole table.
///
/// All values are first mapped into `[1, 2]` with a single linear map built
/// from the table's global minimum and maximum, which makes every input
/// strictly positive.
pub fn box_cox(df: &DataFrame, naming: PowerColumnNaming) -> Result<DataFrame> {
    let step = StepKind::BoxCox.as_str();
    let columns = numeric_columns(df, step)?;

    let (lo, hi) = columns
        .iter()
        .map(|c| min_max(&c.values))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), (lo, hi)| {
            (a.min(lo), b.max(hi))
        });
    if lo == hi {
        return Err(PrepError::transform(
            step,
            "all values are equal; cannot rescale to [1, 2]",
        ));
    }
    let span = hi - lo;

    let mut transformed = Vec::with_capacity(columns.len());
    for column in columns {
        ensure_not_constant(step, &column)?;
        let shifted: Vec<f64> = column.values.iter().map(|v| 1.0 + (v - lo) / span).collect();

        let lambda = fit_box_cox_lambda(&shifted);
        debug!("box-cox '{}': lambda={:.6}", column.name, lambda);

        let values: Vec<f64> = shifted.iter().map(|&x| box_cox_value(x, lambda)).collect();
        transformed.push(NumericColumn::new(column.name, standardize_fitted(&values)));
    }

    frame_from_columns(apply_naming(transformed, naming))
}

/// Yeo-Johnson transform of the whole table; accepts values of any sign.
pub fn yeo_johnson(df: &DataFrame, naming: PowerColumnNaming) -> Result<DataFrame> {
    let step = StepKind::YeoJohnson.as_str();
    let columns = numeric_columns(df, step)?;

    let mut transformed = Vec::with_capacity(columns.len());
    for column in columns {
        ensure_not_constant(step, &column)?;

        let lambda = fit_yeo_johnson_lambda(&column.values);
        debug!("y-j '{}': lambda={:.6}", column.name, lambda);

        let values: Vec<f64> = column
            .values
            .iter()
            .map(|&x| yeo_johnson_value(x, lambda))
            .collect();
        transformed.push(NumericColumn::new(column.name, standardize_fitted(&values)));
    }

    frame_from_columns(apply_naming(transformed, naming))
}

fn ensure_not_constant(step: &str, column: &NumericColumn) -> Result<()> {
    let (lo, hi) = min_max(&column.values);
    if lo == hi {
        return Err(PrepError::transform(
            step,
            format!("column '{}' is constant; cannot fit lambda", column.name),
        ));
    }
    Ok(())
}

fn apply_naming(columns: Vec<NumericColumn>, naming: PowerColumnNaming) -> Vec<NumericColumn> {
    match naming {
        PowerColumnNaming::Preserve => columns,
        PowerColumnNaming::Positional => columns
            .into_iter()
            .enumerate()
            .map(|(i, c)| NumericColumn::new(i.to_string(), c.values))
            .collect(),
    }
}

/// Center and scale a column; a zero-variance column is only centered.
fn standardize_fitted(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let std = population_std(values);
    let scale = if std > 0.0 { std } else { 1.0 };
    values.iter().map(|v| (v - m) / scale).collect()
}

fn box_cox_value(x: f64, lambda: f64) -> f64 {
    if lambda.abs() < LAMBDA_EPS {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

fn yeo_johnson_value(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < LAMBDA_EPS {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < LAMBDA_EPS {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Maximum-likelihood lambda for strictly positive values.
pub(crate) fn fit_box_cox_lambda(values: &[f64]) -> f64 {
    fit_lambda(|lambda| box_cox_log_likelihood(values, lambda))
}

/// Maximum-likelihood lambda for values of any sign.
pub(crate) fn fit_yeo_johnson_lambda(values: &[f64]) -> f64 {
    fit_lambda(|lambda| yeo_johnson_log_likelihood(values, lambda))
}

fn box_cox_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let log_sum: f64 = values.iter().map(|x| x.ln()).sum();
    let transformed: Vec<f64> = values.iter().map(|&x| box_cox_value(x, lambda)).collect();
    (lambda - 1.0) * log_sum - n / 2.0 * population_variance(&transformed).ln()
}

fn yeo_johnson_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let signed_log_sum: f64 = values.iter().map(|x| x.signum() * x.abs().ln_1p()).sum();
    let transformed: Vec<f64> = values
        .iter()
        .map(|&x| yeo_johnson_value(x, lambda))
        .collect();
    (lambda - 1.0) * signed_log_sum - n / 2.0 * population_variance(&transformed).ln()
}

/// Maximize `log_likelihood`, doubling the symmetric bracket while the
/// optimum lands on its edge and the bracket is below [`LAMBDA_BOUND`].
fn fit_lambda(log_likelihood: impl Fn(f64) -> f64) -> f64 {
    let mut bound = INITIAL_BRACKET;
    loop {
        let lambda = golden_section_max(&log_likelihood, -bound, bound);
        if bound >= LAMBDA_BOUND || bound - lambda.abs() > EDGE_TOLERANCE {
            return lambda;
        }
        bound = (bound * 2.0).min(LAMBDA_BOUND);
    }
}

/// Golden-section search for the maximum of a unimodal function on `[a, b]`.
///
/// Non-finite evaluations count as negative infinity.
fn golden_section_max(f: impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> f64 {
    let eval = |x: f64| {
        let y = f(x);
        if y.is_finite() { y } else { f64::NEG_INFINITY }
    };
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;

    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = eval(c);
    let mut fd = eval(d);

    for _ in 0..SEARCH_MAX_ITER {
        if (b - a).abs() < SEARCH_TOLERANCE {
            break;
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = eval(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = eval(d);
        }
    }

    (a + b) / 2.0
}
