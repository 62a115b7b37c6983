//! Step Pipeline Library
//!
//! A small engine for numeric time-series preparation built with Rust and Polars.
//!
//! # Overview
//!
//! A pipeline is an ordered list of named steps. Each step transforms every
//! column of a numeric table; the output of one step is the input of the next.
//!
//! - **Scaling**: `stand` (zero mean, unit variance) and `norm` (rescale to `[min, max]`)
//! - **Smoothing**: `moving_avg_filter` (trailing window mean) and `dif_trans` (first difference)
//! - **Power transforms**: `box-cox` and `y-j` (Yeo-Johnson), lambda fitted per column
//! - **Batch runs**: one step list over many tables, isolated or fail-fast
//! - **Progress Reporting**: per-table progress updates with cancellation support
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prep_pipeline::{BatchRunner, CsvTableSink, CsvTableSource, Pipeline};
//! use prep_pipeline::io::{parse_step_list, parse_table_list};
//!
//! let steps = parse_step_list(r#"[{"name": "moving_avg_filter", "inputs": [3]}, {"name": "stand"}]"#)?;
//! let tables = parse_table_list(r#"["sensor_a.csv", "sensor_b.csv"]"#)?;
//!
//! let pipeline = Pipeline::builder()
//!     .steps(steps)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let report = BatchRunner::new(&pipeline).run(
//!     &tables,
//!     &CsvTableSource,
//!     &CsvTableSink::to_dir("outputs").with_prefix("prep_"),
//! )?;
//!
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! ```
//!
//! # Configuration
//!
//! Use [`PipelineConfig`] to customize engine behavior:
//!
//! ```rust,ignore
//! use prep_pipeline::config::*;
//!
//! let config = PipelineConfig::builder()
//!     .unknown_step_policy(UnknownStepPolicy::PassThrough) // Skip unrecognized steps
//!     .power_column_naming(PowerColumnNaming::Positional)  // Name power outputs "0", "1", ...
//!     .batch_policy(BatchPolicy::FailFast)                 // Abort the batch on first failure
//!     .max_workers(4)
//!     .build()?;
//! ```
//!
//! # Single tables
//!
//! [`Pipeline::apply`] runs the step list over one in-memory table:
//!
//! ```rust,ignore
//! let output = pipeline.apply(df)?;
//! for step in &output.steps {
//!     println!("{}: {} -> {} rows", step.step, step.rows_before, step.rows_after);
//! }
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod step;
pub mod transforms;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    BatchPolicy, ConfigValidationError, PipelineConfig, PipelineConfigBuilder, PowerColumnNaming,
    UnknownStepPolicy,
};
pub use error::{PrepError, Result as PrepResult, ResultExt};
pub use io::{
    CsvTableSink, CsvTableSource, MemoryTableSink, MemoryTableSource, TableSink, TableSource,
};
pub use pipeline::{
    BatchRunner, CancellationToken, ClosureProgressReporter, Pipeline, PipelineBuilder,
    PipelineOutput, PipelineStage, ProgressReporter, ProgressUpdate, StepExecutor,
};
pub use step::{Step, StepKind, decode_steps};
pub use types::{
    AppliedStep, BatchReport, ErrorSummary, StepDescriptor, TableOutcome, TableRef, TableReport,
};
pub use utils::is_numeric_dtype;
