//! Pipeline module.
//!
//! This module provides the step pipeline engine, the batch runner that
//! drives it over many tables, and related components.

mod batch;
mod builder;
mod executor;
pub mod progress;

pub use batch::BatchRunner;
pub use builder::{Pipeline, PipelineBuilder, PipelineOutput};
pub use executor::StepExecutor;
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
