//! CLI entry point for the step pipeline.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use prep_pipeline::io::{parse_step_list, parse_table_list};
use prep_pipeline::{
    BatchPolicy, BatchReport, BatchRunner, CsvTableSink, CsvTableSource, Pipeline, PipelineConfig,
    PipelineConfigBuilder, PowerColumnNaming, TableOutcome, UnknownStepPolicy,
};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Apply an ordered list of numeric transforms to a batch of CSV tables",
    long_about = "Apply an ordered list of numeric transforms to a batch of CSV tables.\n\n\
                  STEPS:\n  \
                  stand                     zero mean, unit variance\n  \
                  norm [min, max]           rescale to [min, max]\n  \
                  moving_avg_filter [w]     trailing mean over w rows\n  \
                  dif_trans                 first difference\n  \
                  box-cox                   Box-Cox power transform\n  \
                  y-j                       Yeo-Johnson power transform\n\n\
                  EXAMPLES:\n  \
                  # Smooth then standardize two files in place\n  \
                  prep-pipeline '[\"a.csv\", \"b.csv\"]' \\\n    \
                  '[{\"name\": \"moving_avg_filter\", \"inputs\": [3]}, {\"name\": \"stand\"}]'\n\n  \
                  # Write prefixed copies and a JSON report\n  \
                  prep-pipeline '[\"a.csv\"]' --steps-file steps.json -o out/ --prefix prep_ --json"
)]
struct Args {
    /// JSON array of input CSV paths
    files: String,

    /// JSON array of steps: [{"name": "norm", "inputs": [0, 1]}, ...]
    #[arg(required_unless_present = "steps_file", conflicts_with = "steps_file")]
    steps: Option<String>,

    /// Read the step list from a JSON file instead of the command line
    #[arg(long)]
    steps_file: Option<String>,

    /// Write results into this directory instead of overwriting the inputs
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Prefix for output file names
    #[arg(long, default_value = "")]
    prefix: String,

    /// Maximum number of tables processed concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Stop at the first failing table
    #[arg(long)]
    fail_fast: bool,

    /// Pass tables through unrecognized steps instead of rejecting the step list
    #[arg(long)]
    allow_unknown_steps: bool,

    /// Name power transform outputs by position ("0", "1", ...)
    #[arg(long)]
    positional_names: bool,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the batch report as JSON to stdout instead of a summary
    ///
    /// Disables all logs; only the report is written to stdout.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    // Load .env before logging so RUST_LOG can come from it
    dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    let tables = parse_table_list(&args.files)?;
    let steps = match (&args.steps, &args.steps_file) {
        (Some(json), _) => parse_step_list(json)?,
        (None, Some(path)) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read step file: {}", path))?;
            parse_step_list(&json)?
        }
        (None, None) => return Err(anyhow!("No step list given")),
    };

    let config = build_config(&args)?;
    info!("Configuration: {:?}", config);

    let pipeline = Pipeline::builder().config(config).steps(steps).build()?;
    debug!("Decoded steps: {:?}", pipeline.steps());

    let sink = match &args.output_dir {
        Some(dir) => CsvTableSink::to_dir(dir),
        None => CsvTableSink::in_place(),
    }
    .with_prefix(&args.prefix);

    let report = BatchRunner::new(&pipeline).run(&tables, &CsvTableSource, &sink)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human_readable_summary(&report);
    }

    if report.failed > 0 {
        error!("{} of {} table(s) failed", report.failed, report.tables.len());
        return Err(anyhow!(
            "{} of {} table(s) failed",
            report.failed,
            report.tables.len()
        ));
    }
    Ok(())
}

/// Merge the optional config file with CLI flags; flags win.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let base = match &args.config {
        Some(path) => {
            let config = PipelineConfig::from_json_file(path)?;
            info!("Loaded configuration from: {}", path);
            config
        }
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineConfigBuilder::from_config(&base);
    if args.fail_fast {
        builder = builder.batch_policy(BatchPolicy::FailFast);
    }
    if args.allow_unknown_steps {
        builder = builder.unknown_step_policy(UnknownStepPolicy::PassThrough);
    }
    if args.positional_names {
        builder = builder.power_column_naming(PowerColumnNaming::Positional);
    }
    if let Some(workers) = args.workers {
        builder = builder.max_workers(workers);
    }

    Ok(builder.build()?)
}

/// Print a human-readable summary of the batch.
///
/// Uses `println!` rather than logging so the summary is visible at any
/// log level.
fn print_human_readable_summary(report: &BatchReport) {
    println!();
    println!("{}", "=".repeat(80));
    if report.all_succeeded() {
        println!("BATCH COMPLETE");
    } else {
        println!("BATCH COMPLETE WITH FAILURES");
    }
    println!("{}", "=".repeat(80));
    println!();

    println!("Steps: {}", report.steps.join(" -> "));
    println!(
        "Tables: {} succeeded, {} failed ({}ms)",
        report.succeeded, report.failed, report.duration_ms
    );
    println!();

    for table in &report.tables {
        match &table.outcome {
            TableOutcome::Succeeded {
                rows_before,
                rows_after,
                columns,
                output,
                ..
            } => println!(
                "  ok    {} ({} -> {} rows, {} columns) -> {}",
                table.table, rows_before, rows_after, columns, output
            ),
            TableOutcome::Failed { error } => {
                println!("  FAIL  {} [{}] {}", table.table, error.code, error.message)
            }
        }
    }
    println!();
}
