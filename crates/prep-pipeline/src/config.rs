//! Configuration types for the step pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a step name outside the supported vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UnknownStepPolicy {
    /// Reject the step list before any table is processed
    #[default]
    Fail,
    /// Pass the table through unchanged and log a warning
    PassThrough,
}

/// How `box-cox` and `y-j` name their output columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PowerColumnNaming {
    /// Keep the input column names
    #[default]
    Preserve,
    /// Rename columns to their position ("0", "1", ...)
    Positional,
}

/// How the batch runner reacts to a failing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BatchPolicy {
    /// Record the failure and keep processing the other tables
    #[default]
    Isolate,
    /// Stop the batch at the first failing table
    FailFast,
}

/// Configuration for the step pipeline and batch runner.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use prep_pipeline::config::{BatchPolicy, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .batch_policy(BatchPolicy::FailFast)
///     .max_workers(4)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Handling of unrecognized step names.
    /// Default: Fail
    pub unknown_step_policy: UnknownStepPolicy,

    /// Output column naming for power transforms.
    /// Default: Preserve
    pub power_column_naming: PowerColumnNaming,

    /// Failure handling across tables of a batch.
    /// Default: Isolate
    pub batch_policy: BatchPolicy,

    /// Upper bound on tables processed concurrently.
    /// Default: available parallelism
    pub max_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            unknown_step_policy: UnknownStepPolicy::default(),
            power_column_naming: PowerColumnNaming::default(),
            batch_policy: BatchPolicy::default(),
            max_workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigValidationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigValidationError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: PipelineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigValidationError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_workers == 0 {
            return Err(ConfigValidationError::InvalidWorkers(self.max_workers));
        }
        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid worker count: {0} (must be at least 1)")]
    InvalidWorkers(usize),

    #[error("Failed to load configuration from '{path}': {reason}")]
    Load { path: String, reason: String },
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    unknown_step_policy: Option<UnknownStepPolicy>,
    power_column_naming: Option<PowerColumnNaming>,
    batch_policy: Option<BatchPolicy>,
    max_workers: Option<usize>,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration, e.g. one loaded from a file.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            unknown_step_policy: Some(config.unknown_step_policy),
            power_column_naming: Some(config.power_column_naming),
            batch_policy: Some(config.batch_policy),
            max_workers: Some(config.max_workers),
        }
    }

    /// Set the handling of unrecognized step names.
    pub fn unknown_step_policy(mut self, policy: UnknownStepPolicy) -> Self {
        self.unknown_step_policy = Some(policy);
        self
    }

    /// Set the output column naming for `box-cox` and `y-j`.
    pub fn power_column_naming(mut self, naming: PowerColumnNaming) -> Self {
        self.power_column_naming = Some(naming);
        self
    }

    /// Set the failure handling across tables.
    pub fn batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = Some(policy);
        self
    }

    /// Set the maximum number of tables processed concurrently.
    ///
    /// Only honoured under [`BatchPolicy::Isolate`]; fail-fast batches
    /// always run sequentially.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            unknown_step_policy: self.unknown_step_policy.unwrap_or_default(),
            power_column_naming: self.power_column_naming.unwrap_or_default(),
            batch_policy: self.batch_policy.unwrap_or_default(),
            max_workers: self.max_workers.unwrap_or_else(default_workers),
        };

        config.validate()?;
        Ok(config)
    }
}
