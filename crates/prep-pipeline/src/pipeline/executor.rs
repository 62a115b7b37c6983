//! Step dispatch: maps a decoded [`Step`] to its transform.

use crate::config::PowerColumnNaming;
use crate::error::Result;
use crate::step::Step;
use crate::transforms;
use polars::prelude::*;

/// Executes single steps against a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepExecutor {
    power_column_naming: PowerColumnNaming,
}

impl StepExecutor {
    pub fn new(power_column_naming: PowerColumnNaming) -> Self {
        Self {
            power_column_naming,
        }
    }

    /// Apply one step. The input table is left untouched.
    pub fn execute(&self, df: &DataFrame, step: &Step) -> Result<DataFrame> {
        match step {
            Step::Standardize => transforms::standardize(df),
            Step::Normalize { min, max } => transforms::normalize(df, *min, *max),
            Step::MovingAverage { window } => transforms::moving_average(df, *window),
            Step::Difference => transforms::difference(df),
            Step::BoxCox => transforms::box_cox(df, self.power_column_naming),
            Step::YeoJohnson => transforms::yeo_johnson(df, self.power_column_naming),
            Step::PassThrough { .. } => Ok(df.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_returns_equal_table() {
        let df = df!("x" => [1.0f64, 2.0]).unwrap();
        let out = StepExecutor::default()
            .execute(&df, &Step::PassThrough { name: "smooth".to_string() })
            .unwrap();
        assert!(out.equals(&df));
    }

    #[test]
    fn test_executor_uses_configured_naming() {
        let df = df!("x" => [1.0f64, 2.0, 4.0], "y" => [3.0f64, -1.0, 0.5]).unwrap();
        let out = StepExecutor::new(PowerColumnNaming::Positional)
            .execute(&df, &Step::YeoJohnson)
            .unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["0", "1"]);
    }
}
