//! Pipeline engine.
//!
//! This module provides the `Pipeline` struct, which folds a decoded step
//! sequence over a single table, and its builder.

use crate::config::PipelineConfig;
use crate::error::{PrepError, Result};
use crate::pipeline::StepExecutor;
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::step::{Step, decode_steps};
use crate::types::{AppliedStep, StepDescriptor};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// The step pipeline engine.
///
/// Use [`Pipeline::builder()`] to create a new pipeline. The step list is
/// decoded once at build time and replayed unchanged for every table.
///
/// # Example
///
/// ```rust,ignore
/// use prep_pipeline::{Pipeline, StepDescriptor};
///
/// let pipeline = Pipeline::builder()
///     .steps(vec![
///         StepDescriptor::new("moving_avg_filter", vec![3.0]),
///         StepDescriptor::bare("stand"),
///     ])
///     .build()?;
///
/// let output = pipeline.apply(df)?;
/// println!("{:?}", output.data.shape());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    steps: Vec<Step>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    executor: StepExecutor,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

/// A transformed table plus a record of every step applied to it.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub data: DataFrame,
    pub steps: Vec<AppliedStep>,
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decoded steps in execution order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps().iter().map(|s| s.name().to_string()).collect()
    }

    /// Apply every step, in order, to `df`.
    ///
    /// The output of each step is the sole input of the next. The first
    /// failing step aborts the run; the error names the step's position.
    pub fn apply(&self, df: DataFrame) -> Result<PipelineOutput> {
        self.apply_labeled(None, df)
    }

    /// Like [`apply`](Self::apply), tagging progress updates with `table`.
    pub(crate) fn apply_labeled(&self, table: Option<&str>, df: DataFrame) -> Result<PipelineOutput> {
        let total = self.steps.len();
        let mut current = df;
        let mut applied = Vec::with_capacity(total);

        for (i, step) in self.steps.iter().enumerate() {
            self.check_cancelled()?;

            let started = Instant::now();
            let rows_before = current.height();
            let next = self
                .executor
                .execute(&current, step)
                .map_err(|e| e.with_context(format!("step {} of {} ('{}')", i + 1, total, step.name())))?;

            debug!(
                "{} '{}': {:?} -> {:?}",
                table.unwrap_or("table"),
                step.name(),
                current.shape(),
                next.shape()
            );
            applied.push(AppliedStep {
                step: step.name().to_string(),
                rows_before,
                rows_after: next.height(),
                columns: next.width(),
                duration_ms: started.elapsed().as_millis() as u64,
            });

            let mut update = ProgressUpdate::step(step.name(), i + 1, total);
            if let Some(table) = table {
                update = update.for_table(table);
            }
            self.report_progress(update);

            current = next;
        }

        Ok(PipelineOutput {
            data: current,
            steps: applied,
        })
    }

    /// Check if cancellation has been requested.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PrepError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    pub(crate) fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for creating a [`Pipeline`] instance.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    steps: Vec<StepDescriptor>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the step list, in execution order.
    pub fn steps(mut self, steps: Vec<StepDescriptor>) -> Self {
        self.steps = steps;
        self
    }

    /// Append one step to the step list.
    pub fn step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Fails if the configuration is invalid or any step descriptor violates
    /// its parameter contract; no table has been touched at that point.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let steps = decode_steps(&self.steps, config.unknown_step_policy)?;
        let executor = StepExecutor::new(config.power_column_naming);

        Ok(Pipeline {
            config,
            steps,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            executor,
        })
    }
}
