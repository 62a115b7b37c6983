//! Error types for the step pipeline.
//!
//! Every failure the engine can report is a [`PrepError`]. Errors carry a
//! stable code (see [`PrepError::error_code`]) and serialize as
//! `{ "code", "message" }` so batch reports can be emitted as JSON.

use crate::config::ConfigValidationError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the step pipeline.
#[derive(Error, Debug)]
pub enum PrepError {
    /// Malformed step list or table list.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A step could not be computed on the table it was given.
    #[error("Step '{step}' failed: {reason}")]
    Transform { step: String, reason: String },

    /// The step list names a step outside the supported vocabulary.
    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    /// Invalid pipeline configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigValidationError),

    /// The run was cancelled through its cancellation token.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// Internal error (e.g., worker pool construction failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    /// Shorthand for a [`PrepError::Transform`].
    pub fn transform(step: impl Into<String>, reason: impl Into<String>) -> Self {
        PrepError::Transform {
            step: step.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PrepError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "PARSE_ERROR",
            Self::Transform { .. } => "TRANSFORM_ERROR",
            Self::UnknownStep(_) => "UNKNOWN_STEP",
            Self::Config(_) => "INVALID_CONFIG",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &PrepError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PrepError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PrepError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PrepError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PrepError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(PrepError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            PrepError::transform("stand", "zero variance").error_code(),
            "TRANSFORM_ERROR"
        );
        assert_eq!(
            PrepError::UnknownStep("smooth".to_string()).error_code(),
            "UNKNOWN_STEP"
        );
    }

    #[test]
    fn test_transform_message_names_step() {
        let error = PrepError::transform("norm", "min must be less than max");
        assert_eq!(
            error.to_string(),
            "Step 'norm' failed: min must be less than max"
        );
    }

    #[test]
    fn test_is_cancelled_through_context() {
        assert!(PrepError::Cancelled.is_cancelled());
        assert!(PrepError::Cancelled.with_context("table a.csv").is_cancelled());
        assert!(!PrepError::Parse("bad".to_string()).is_cancelled());
    }

    #[test]
    fn test_error_serialization() {
        let error = PrepError::UnknownStep("smooth".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("UNKNOWN_STEP"));
        assert!(json.contains("smooth"));
    }

    #[test]
    fn test_with_context() {
        let error = PrepError::transform("dif_trans", "needs at least 2 rows")
            .with_context("step 2");
        assert!(error.to_string().contains("step 2"));
        assert_eq!(error.error_code(), "TRANSFORM_ERROR");
        assert!(matches!(error.root(), PrepError::Transform { .. }));
    }
}
