//! Batch runner: one step sequence, many independent tables.

use crate::config::BatchPolicy;
use crate::error::{PrepError, Result, ResultExt};
use crate::io::{TableSink, TableSource};
use crate::pipeline::Pipeline;
use crate::pipeline::progress::{PipelineStage, ProgressUpdate};
use crate::types::{BatchReport, ErrorSummary, TableOutcome, TableRef, TableReport};
use chrono::Utc;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{error, info, warn};

/// Applies a [`Pipeline`] to every table of a batch.
///
/// Tables share nothing but the pipeline itself, so under
/// [`BatchPolicy::Isolate`] they run on a bounded worker pool and one
/// table's failure never affects another. Under [`BatchPolicy::FailFast`]
/// tables run in input order and the first failure aborts the batch.
pub struct BatchRunner<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> BatchRunner<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Run the batch.
    ///
    /// A table is written to `sink` only after its whole step sequence
    /// succeeded. Under the isolating policy per-table failures are recorded
    /// in the returned report rather than returned as `Err`.
    pub fn run(
        &self,
        tables: &[TableRef],
        source: &dyn TableSource,
        sink: &dyn TableSink,
    ) -> Result<BatchReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let config = self.pipeline.config();

        info!(
            "Processing {} table(s) with steps {:?} ({:?})",
            tables.len(),
            self.pipeline.step_names(),
            config.batch_policy
        );

        let reports = match config.batch_policy {
            BatchPolicy::Isolate => self.run_isolated(tables, source, sink)?,
            BatchPolicy::FailFast => self.run_fail_fast(tables, source, sink)?,
        };

        let report = BatchReport::new(
            started_at,
            start.elapsed().as_millis() as u64,
            self.pipeline.step_names(),
            reports,
        );
        info!(
            "Batch finished: {} succeeded, {} failed in {} ms",
            report.succeeded, report.failed, report.duration_ms
        );
        Ok(report)
    }

    fn run_isolated(
        &self,
        tables: &[TableRef],
        source: &dyn TableSource,
        sink: &dyn TableSink,
    ) -> Result<Vec<TableReport>> {
        let workers = self.pipeline.config().max_workers.min(tables.len());
        if workers <= 1 {
            return Ok(tables
                .iter()
                .enumerate()
                .map(|(i, table)| self.isolated_table(i, table, source, sink))
                .collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("prep-worker-{}", i))
            .build()
            .map_err(|e| PrepError::Internal(format!("failed to start worker pool: {}", e)))?;

        // Indexed collect keeps input order regardless of completion order.
        Ok(pool.install(|| {
            tables
                .par_iter()
                .enumerate()
                .map(|(i, table)| self.isolated_table(i, table, source, sink))
                .collect()
        }))
    }

    fn run_fail_fast(
        &self,
        tables: &[TableRef],
        source: &dyn TableSource,
        sink: &dyn TableSink,
    ) -> Result<Vec<TableReport>> {
        let mut reports = Vec::with_capacity(tables.len());
        for (i, table) in tables.iter().enumerate() {
            let outcome = self
                .process_table(table, source, sink)
                .inspect_err(|e| self.report_failure(table, e))
                .context(format!("table {} ('{}')", i + 1, table))?;
            reports.push(TableReport {
                index: i,
                table: table.clone(),
                outcome,
            });
        }
        Ok(reports)
    }

    fn isolated_table(
        &self,
        index: usize,
        table: &TableRef,
        source: &dyn TableSource,
        sink: &dyn TableSink,
    ) -> TableReport {
        let outcome = match self.process_table(table, source, sink) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_failure(table, &e);
                TableOutcome::Failed {
                    error: ErrorSummary::from(&e),
                }
            }
        };
        TableReport {
            index,
            table: table.clone(),
            outcome,
        }
    }

    fn process_table(
        &self,
        table: &TableRef,
        source: &dyn TableSource,
        sink: &dyn TableSink,
    ) -> Result<TableOutcome> {
        let pipeline = self.pipeline;
        pipeline.check_cancelled()?;

        pipeline.report_progress(ProgressUpdate::begin(PipelineStage::Loading, table.as_str()));
        let df = source.load(table)?;
        let (rows_before, _) = df.shape();
        info!("Loaded {}: {:?}", table, df.shape());

        let output = pipeline.apply_labeled(Some(table.as_str()), df)?;
        pipeline.check_cancelled()?;

        let (rows_after, columns) = output.data.shape();
        pipeline.report_progress(ProgressUpdate::begin(PipelineStage::Writing, table.as_str()));
        let written = sink.write(table, output.data)?;

        pipeline.report_progress(
            ProgressUpdate::complete(format!("{} -> {}", table, written)).for_table(table.as_str()),
        );
        Ok(TableOutcome::Succeeded {
            rows_before,
            rows_after,
            columns,
            output: written,
            steps: output.steps,
        })
    }

    fn report_failure(&self, table: &TableRef, e: &PrepError) {
        if e.is_cancelled() {
            warn!("Cancelled before finishing {}", table);
            self.pipeline
                .report_progress(ProgressUpdate::cancelled().for_table(table.as_str()));
        } else {
            error!("Table {} failed: {}", table, e);
            self.pipeline
                .report_progress(ProgressUpdate::failed(e.to_string()).for_table(table.as_str()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::io::{MemoryTableSink, MemoryTableSource};
    use crate::pipeline::CancellationToken;
    use crate::types::StepDescriptor;
    use polars::prelude::*;

    fn pipeline(policy: BatchPolicy, workers: usize) -> Pipeline {
        Pipeline::builder()
            .config(
                PipelineConfig::builder()
                    .batch_policy(policy)
                    .max_workers(workers)
                    .build()
                    .unwrap(),
            )
            .steps(vec![StepDescriptor::bare("dif_trans"), StepDescriptor::bare("stand")])
            .build()
            .unwrap()
    }

    fn source() -> MemoryTableSource {
        MemoryTableSource::new()
            .with_table("good", df!("x" => [1.0f64, 3.0, 6.0, 10.0]).unwrap())
            // differences are constant, so `stand` fails on zero variance
            .with_table("flat", df!("x" => [1.0f64, 2.0, 3.0, 4.0]).unwrap())
            .with_table("also_good", df!("x" => [5.0f64, 1.0, 7.0]).unwrap())
    }

    fn tables() -> Vec<TableRef> {
        vec!["good".into(), "flat".into(), "also_good".into()]
    }

    #[test]
    fn test_isolate_records_failure_and_writes_siblings() {
        for workers in [1, 3] {
            let sink = MemoryTableSink::new();
            let report = BatchRunner::new(&pipeline(BatchPolicy::Isolate, workers))
                .run(&tables(), &source(), &sink)
                .unwrap();

            assert_eq!(report.succeeded, 2);
            assert_eq!(report.failed, 1);
            let indices: Vec<usize> = report.tables.iter().map(|t| t.index).collect();
            assert_eq!(indices, vec![0, 1, 2]);
            assert_eq!(report.tables[1].error().unwrap().code, "TRANSFORM_ERROR");

            assert_eq!(sink.len(), 2);
            assert!(sink.get(&"flat".into()).is_none());
        }
    }

    #[test]
    fn test_isolated_result_matches_solo_run() {
        let solo_sink = MemoryTableSink::new();
        BatchRunner::new(&pipeline(BatchPolicy::Isolate, 1))
            .run(&["good".into()], &source(), &solo_sink)
            .unwrap();

        let batch_sink = MemoryTableSink::new();
        BatchRunner::new(&pipeline(BatchPolicy::Isolate, 3))
            .run(&tables(), &source(), &batch_sink)
            .unwrap();

        let table: TableRef = "good".into();
        assert!(solo_sink.get(&table).unwrap().equals(&batch_sink.get(&table).unwrap()));
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let sink = MemoryTableSink::new();
        let err = BatchRunner::new(&pipeline(BatchPolicy::FailFast, 4))
            .run(&tables(), &source(), &sink)
            .unwrap_err();

        assert_eq!(err.error_code(), "TRANSFORM_ERROR");
        assert!(err.to_string().contains("table 2 ('flat')"));
        assert_eq!(sink.len(), 1);
        assert!(sink.get(&"also_good".into()).is_none());
    }

    #[test]
    fn test_missing_table_is_reported() {
        let sink = MemoryTableSink::new();
        let report = BatchRunner::new(&pipeline(BatchPolicy::Isolate, 2))
            .run(&["good".into(), "nowhere".into()], &source(), &sink)
            .unwrap();
        assert_eq!(report.tables[1].error().unwrap().code, "IO_ERROR");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_cancelled_batch_writes_nothing() {
        let token = CancellationToken::new();
        let pipeline = Pipeline::builder()
            .step(StepDescriptor::bare("dif_trans"))
            .cancellation_token(token.clone())
            .build()
            .unwrap();
        token.cancel();

        let sink = MemoryTableSink::new();
        let report = BatchRunner::new(&pipeline).run(&tables(), &source(), &sink).unwrap();
        assert_eq!(report.failed, 3);
        assert!(report.failures().all(|t| t.error().unwrap().code == "CANCELLED"));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_succeeded_outcome_counts_rows() {
        let sink = MemoryTableSink::new();
        let report = BatchRunner::new(&pipeline(BatchPolicy::Isolate, 1))
            .run(&["good".into()], &source(), &sink)
            .unwrap();
        match &report.tables[0].outcome {
            TableOutcome::Succeeded {
                rows_before,
                rows_after,
                steps,
                ..
            } => {
                assert_eq!((*rows_before, *rows_after), (4, 3));
                assert_eq!(steps.len(), 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
