//! Table sources and sinks.
//!
//! The engine never opens files itself: the batch runner resolves each
//! [`TableRef`] through a [`TableSource`] and hands each finished table to a
//! [`TableSink`]. CSV and in-memory implementations are provided.

use crate::error::{PrepError, Result, ResultExt};
use crate::types::{StepDescriptor, TableRef};
use parking_lot::Mutex;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolves table references to DataFrames.
pub trait TableSource: Send + Sync {
    fn load(&self, table: &TableRef) -> Result<DataFrame>;
}

/// Receives each successfully transformed table.
pub trait TableSink: Send + Sync {
    /// Write `df` for `table`, returning where it was written.
    fn write(&self, table: &TableRef, df: DataFrame) -> Result<String>;
}

/// Parse a JSON array of table locations: `["a.csv", "b.csv"]`.
pub fn parse_table_list(json: &str) -> Result<Vec<TableRef>> {
    serde_json::from_str::<Vec<TableRef>>(json)
        .map_err(|e| PrepError::Parse(format!("invalid table list: {}", e)))
}

/// Parse a JSON array of step descriptors: `[{"name": "norm", "inputs": [0, 1]}]`.
pub fn parse_step_list(json: &str) -> Result<Vec<StepDescriptor>> {
    serde_json::from_str::<Vec<StepDescriptor>>(json)
        .map_err(|e| PrepError::Parse(format!("invalid step list: {}", e)))
}

// =============================================================================
// CSV
// =============================================================================

/// Reads CSV files with a header row; the table reference is the file path.
#[derive(Debug, Clone, Default)]
pub struct CsvTableSource;

impl TableSource for CsvTableSource {
    fn load(&self, table: &TableRef) -> Result<DataFrame> {
        let path = table.as_path();
        if !path.exists() {
            return Err(PrepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input file not found: {}", path.display()),
            )));
        }

        // Full-length schema inference: a float appearing late in an
        // integer-looking column must not fail the read.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .context(format!("opening {}", path.display()))?
            .finish()
            .context(format!("reading {}", path.display()))?;

        debug!("Loaded {}: {:?}", path.display(), df.shape());
        Ok(df)
    }
}

/// Writes CSV files with a header row.
///
/// Without an output directory the table is written next to its source,
/// which with an empty prefix overwrites the input in place. Each target
/// file is written at most once per sink, and is replaced only after the
/// whole CSV has been staged next to it.
#[derive(Debug, Default)]
pub struct CsvTableSink {
    output_dir: Option<PathBuf>,
    prefix: String,
    written: Mutex<HashSet<PathBuf>>,
}

impl CsvTableSink {
    /// Overwrite each input file in place.
    pub fn in_place() -> Self {
        Self::default()
    }

    /// Write into `dir`, keeping each input's file name.
    pub fn to_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Prepend `prefix` to every output file name.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Where `table` will be written.
    pub fn target_path(&self, table: &TableRef) -> Result<PathBuf> {
        let source = table.as_path();
        let file_name = source
            .file_name()
            .ok_or_else(|| PrepError::Parse(format!("table reference '{}' has no file name", table)))?
            .to_string_lossy();
        let name = format!("{}{}", self.prefix, file_name);

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => source.parent().map(PathBuf::from).unwrap_or_default(),
        };
        Ok(dir.join(name))
    }
}

impl TableSink for CsvTableSink {
    fn write(&self, table: &TableRef, mut df: DataFrame) -> Result<String> {
        let path = self.target_path(table)?;

        if let Some(dir) = &self.output_dir
            && !dir.exists()
        {
            std::fs::create_dir_all(dir)?;
            info!("Created output directory: {}", dir.display());
        }

        let key = canonical_target(&path)?;
        if !self.written.lock().insert(key) {
            return Err(PrepError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} was already written in this run", path.display()),
            )));
        }

        // The target only changes once the full CSV is on disk.
        let partial = partial_path(&path);
        let written = File::create(&partial)
            .map_err(PrepError::from)
            .and_then(|mut file| {
                CsvWriter::new(&mut file)
                    .include_header(true)
                    .with_separator(b',')
                    .with_quote_char(b'"')
                    .finish(&mut df)
                    .context(format!("writing {}", path.display()))
            })
            .and_then(|()| std::fs::rename(&partial, &path).map_err(PrepError::from));
        if let Err(e) = written {
            std::fs::remove_file(&partial).ok();
            return Err(e);
        }

        info!("Saved {}: {:?}", path.display(), df.shape());
        Ok(path.display().to_string())
    }
}

/// `path` with its parent directory resolved, so that `a.csv` and
/// `./a.csv` name the same target.
fn canonical_target(path: &Path) -> Result<PathBuf> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| PrepError::Parse(format!("'{}' has no file name", path.display())))?;
    let parent = std::fs::canonicalize(parent)
        .map_err(PrepError::from)
        .context(format!("resolving {}", parent.display()))?;
    Ok(parent.join(file_name))
}

/// Sibling file the CSV is staged in before replacing `path`.
fn partial_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", file_name))
}

// =============================================================================
// In-memory
// =============================================================================

/// Serves tables from memory, keyed by reference.
#[derive(Debug, Default)]
pub struct MemoryTableSource {
    tables: HashMap<TableRef, DataFrame>,
}

impl MemoryTableSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<TableRef>, df: DataFrame) -> Self {
        self.tables.insert(table.into(), df);
        self
    }
}

impl TableSource for MemoryTableSource {
    fn load(&self, table: &TableRef) -> Result<DataFrame> {
        self.tables.get(table).cloned().ok_or_else(|| {
            PrepError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no table registered as '{}'", table),
            ))
        })
    }
}

/// Collects written tables in memory.
#[derive(Debug, Default)]
pub struct MemoryTableSink {
    tables: Mutex<Vec<(TableRef, DataFrame)>>,
}

impl MemoryTableSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table written for `table`, if any.
    pub fn get(&self, table: &TableRef) -> Option<DataFrame> {
        self.tables
            .lock()
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, df)| df.clone())
    }

    /// Number of writes received.
    pub fn len(&self) -> usize {
        self.tables.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TableSink for MemoryTableSink {
    fn write(&self, table: &TableRef, df: DataFrame) -> Result<String> {
        self.tables.lock().push((table.clone(), df));
        Ok(table.to_string())
    }
}
