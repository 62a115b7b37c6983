use crate::error::PrepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A raw step instruction as it appears in the external step list.
///
/// ```json
/// { "name": "norm", "inputs": [0, 1] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub name: String,
    #[serde(default, alias = "parameters")]
    pub inputs: Vec<f64>,
}

impl StepDescriptor {
    pub fn new(name: impl Into<String>, inputs: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            inputs,
        }
    }

    /// A descriptor for a step that takes no parameters.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

/// Opaque reference to a table, resolved by a [`TableSource`](crate::io::TableSource).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableRef(String);

impl TableRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TableRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Record of one step executed on one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedStep {
    /// Step name from the vocabulary (e.g. "moving_avg_filter").
    pub step: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns: usize,
    pub duration_ms: u64,
}

/// Code and message of a failed table, detached from the error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub code: String,
    pub message: String,
}

impl From<&PrepError> for ErrorSummary {
    fn from(error: &PrepError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Outcome of processing a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Succeeded {
        rows_before: usize,
        rows_after: usize,
        columns: usize,
        /// Where the sink wrote the table.
        output: String,
        steps: Vec<AppliedStep>,
    },
    Failed {
        error: ErrorSummary,
    },
}

/// Per-table entry of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    /// Position of the table in the input list.
    pub index: usize,
    pub table: TableRef,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

impl TableReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TableOutcome::Succeeded { .. })
    }

    /// Error summary when the table failed.
    pub fn error(&self) -> Option<&ErrorSummary> {
        match &self.outcome {
            TableOutcome::Failed { error } => Some(error),
            TableOutcome::Succeeded { .. } => None,
        }
    }
}

/// Aggregated result of a batch run, tables in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Step names in execution order.
    pub steps: Vec<String>,
    pub tables: Vec<TableReport>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn new(
        started_at: DateTime<Utc>,
        duration_ms: u64,
        steps: Vec<String>,
        tables: Vec<TableReport>,
    ) -> Self {
        let succeeded = tables.iter().filter(|t| t.is_success()).count();
        let failed = tables.len() - succeeded;
        Self {
            started_at,
            duration_ms,
            steps,
            tables,
            succeeded,
            failed,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TableReport> {
        self.tables.iter().filter(|t| !t.is_success())
    }
}
