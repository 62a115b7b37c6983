//! Progress reporting and cancellation support for pipeline runs.
//!
//! Updates are emitted per table: once when it is loaded, once per step and
//! once when it is written. A [`CancellationToken`] is checked before each
//! table and between steps.
//!
//! # Example
//!
//! ```rust,ignore
//! use prep_pipeline::{CancellationToken, Pipeline};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let pipeline = Pipeline::builder()
//!     .steps(steps)
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages a single table moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading the table from its source
    Loading,
    /// Applying the step sequence
    Transforming,
    /// Handing the result to the sink
    Writing,
    /// Table finished successfully
    Complete,
    /// Table processing was cancelled
    Cancelled,
    /// Table processing failed
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::Transforming => "Transforming",
            Self::Writing => "Writing",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of a table's processing attributed to this stage.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.1,
            Self::Transforming => 0.8,
            Self::Writing => 0.1,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    ///
    /// Summed from the preceding stages' weights so that a stage's start
    /// equals the previous stage's end exactly in `f32`.
    pub fn base_progress(&self) -> f32 {
        let preceding: &[PipelineStage] = match self {
            Self::Loading | Self::Cancelled | Self::Failed => &[],
            Self::Transforming => &[Self::Loading],
            Self::Writing => &[Self::Loading, Self::Transforming],
            Self::Complete => return 1.0,
        };
        preceding.iter().map(|s| s.weight()).sum()
    }
}

/// Progress of one table through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Table the update refers to, when running through the batch runner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Step being applied during [`PipelineStage::Transforming`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    /// Progress for the table (0.0 - 1.0)
    pub progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage.
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress.clamp(0.0, 1.0));
        Self {
            stage,
            table: None,
            step: None,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates an update for step `current` of `total` on a table.
    pub fn step(step: impl Into<String>, current: usize, total: usize) -> Self {
        let step = step.into();
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            1.0
        };
        let mut update = Self::new(
            PipelineStage::Transforming,
            stage_progress,
            format!("Applied '{}' ({}/{})", step, current, total),
        );
        update.step = Some(step);
        update.items_processed = Some(current);
        update.items_total = Some(total);
        update
    }

    /// Creates the update announcing that `table` entered `stage`.
    pub fn begin(stage: PipelineStage, table: impl Into<String>) -> Self {
        let table = table.into();
        Self::new(stage, 0.0, format!("{} {}", stage.display_name(), table)).for_table(table)
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    /// Creates a cancelled progress update.
    pub fn cancelled() -> Self {
        Self::new(PipelineStage::Cancelled, 0.0, "Pipeline cancelled by user")
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, 0.0, message)
    }

    /// Attach the table the update refers to.
    pub fn for_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Trait for receiving progress updates.
///
/// Implementations must be `Send + Sync`: under the isolating batch policy
/// updates arrive from several worker threads at once.
pub trait ProgressReporter: Send + Sync {
    /// Called for every update; keep it cheap and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running pipeline.
///
/// Clones share the same flag. Call [`cancel()`](Self::cancel) from any
/// thread; the pipeline returns
/// [`PrepError::Cancelled`](crate::error::PrepError::Cancelled) at its next
/// check.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the cancellation flag so the token can be reused.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(!token2.is_cancelled());

        token1.cancel();
        assert!(token2.is_cancelled());

        token2.reset();
        assert!(!token1.is_cancelled());
    }

    #[test]
    fn test_step_update_progress() {
        let update = ProgressUpdate::step("dif_trans", 2, 4).for_table("a.csv");
        assert_eq!(update.stage, PipelineStage::Transforming);
        assert_eq!(update.step.as_deref(), Some("dif_trans"));
        assert_eq!(update.table.as_deref(), Some("a.csv"));
        assert!((update.progress - 0.5).abs() < 1e-6);
        assert_eq!(update.items_processed, Some(2));
        assert_eq!(update.items_total, Some(4));
    }

    #[test]
    fn test_stage_weights_cover_a_table() {
        let total: f32 = [
            PipelineStage::Loading,
            PipelineStage::Transforming,
            PipelineStage::Writing,
        ]
        .iter()
        .map(|s| s.weight())
        .sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert_eq!(ProgressUpdate::complete("done").progress, 1.0);
    }

    #[test]
    fn test_progress_never_decreases_across_stages() {
        let last_step = ProgressUpdate::step("stand", 3, 3);
        let writing = ProgressUpdate::begin(PipelineStage::Writing, "a.csv");
        let complete = ProgressUpdate::complete("done");
        assert!(writing.progress >= last_step.progress);
        assert!(complete.progress >= writing.progress);

        let first_step = ProgressUpdate::step("stand", 0, 3);
        let loading = ProgressUpdate::begin(PipelineStage::Loading, "a.csv");
        assert_eq!(first_step.progress, PipelineStage::Loading.weight());
        assert!(loading.progress <= first_step.progress);
    }

    #[test]
    fn test_begin_names_stage_and_table() {
        let update = ProgressUpdate::begin(PipelineStage::Loading, "a.csv");
        assert_eq!(update.message, "Loading a.csv");
        assert_eq!(update.table.as_deref(), Some("a.csv"));
        assert_eq!(update.progress, 0.0);
    }

    #[test]
    fn test_progress_update_json() {
        let json = serde_json::to_string(&ProgressUpdate::step("y-j", 1, 1)).unwrap();
        assert!(json.contains("\"stage\":\"transforming\""));
        assert!(json.contains("\"step\":\"y-j\""));
        assert!(!json.contains("\"table\""));
    }

    #[test]
    fn test_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let reporter = reporter.clone();
                std::thread::spawn(move || reporter.report(ProgressUpdate::complete("done")))
            })
            .collect();
        for handle in handles {
            handle.join().expect("Thread should not panic");
        }

        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }
}
