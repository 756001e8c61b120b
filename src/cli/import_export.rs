use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::export::{ExportOptions, ExportRouter, ExportSummary, EDGE_FILE_PREFIX};
use crate::import::source::{carries_sentinels, read_edges, read_vertices};
use crate::import::{FileFormat, ImportOptions, ImportRun, LoadStats};
use crate::report::{ReportEvent, Reporter};
use crate::storage::{GraphStore, LabelInfo, SqliteStore, StoreError, StoreOptions, Synchronous};
use crate::types::{ErrorScope, LabelKind, TransferError};

/// Configuration for importing a file or directory into a database.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Path to the database file.
    pub db_path: PathBuf,
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,
    /// Durability level for committed batches.
    pub synchronous: Synchronous,
    /// Interchange file, or a directory of them.
    pub input: PathBuf,
    /// Engine options.
    pub options: ImportOptions,
}

/// Configuration for exporting a database into a directory.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Path to the database file.
    pub db_path: PathBuf,
    /// Output directory, created when missing.
    pub out_dir: PathBuf,
    /// Engine options.
    pub options: ExportOptions,
}

/// Error type for CLI import/export operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Engine error that ended the run.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// Storage layer error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<&str> for CliError {
    fn from(value: &str) -> Self {
        CliError::Message(value.to_string())
    }
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}

/// An interchange file and what it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    /// File path.
    pub path: PathBuf,
    /// Label derived from the file stem.
    pub label: String,
    /// Vertex or edge file.
    pub kind: LabelKind,
    /// CSV or JSON.
    pub format: FileFormat,
}

/// Outcome of one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// File path.
    pub path: PathBuf,
    /// Label loaded.
    pub label: String,
    /// Vertex or edge file.
    pub kind: LabelKind,
    /// Counters, when the file loaded.
    pub stats: Option<LoadStats>,
    /// Why the file was abandoned.
    pub error: Option<String>,
}

/// Summary of a directory import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// Per-file outcomes, vertex files first.
    pub files: Vec<FileReport>,
    /// Vertices committed.
    pub vertices: usize,
    /// Edges committed.
    pub edges: usize,
    /// Records skipped across files.
    pub skipped: usize,
}

impl ImportSummary {
    /// Files that were abandoned.
    pub fn failures(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    fn record(&mut self, file: &SourceFile, outcome: Result<LoadStats, TransferError>) {
        let (stats, error) = match outcome {
            Ok(stats) => {
                match file.kind {
                    LabelKind::Vertex => self.vertices += stats.committed,
                    LabelKind::Edge => self.edges += stats.committed,
                }
                self.skipped += stats.skipped;
                (Some(stats), None)
            }
            Err(err) => (None, Some(err.to_string())),
        };
        self.files.push(FileReport {
            path: file.path.clone(),
            label: file.label.clone(),
            kind: file.kind,
            stats,
            error,
        });
    }
}

/// Classifies one path; `None` when it is not an interchange file.
///
/// A stem starting with `edge_` marks an edge file labelled by the rest of
/// the stem. Otherwise a file whose header (or first object) carries both
/// sentinels is an edge file labelled by the whole stem.
pub fn classify(path: &Path) -> Option<SourceFile> {
    let format = FileFormat::from_path(path)?;
    let stem = path.file_stem()?.to_str()?;
    let (label, kind) = match stem.strip_prefix(EDGE_FILE_PREFIX) {
        Some(rest) if !rest.is_empty() => (rest, LabelKind::Edge),
        _ => {
            // Unreadable files are classified as vertices; loading reports the error.
            let kind = if carries_sentinels(path, format).unwrap_or(false) {
                LabelKind::Edge
            } else {
                LabelKind::Vertex
            };
            (stem, kind)
        }
    };
    Some(SourceFile {
        path: path.to_path_buf(),
        label: label.to_string(),
        kind,
        format,
    })
}

/// Lists interchange files under `input`, sorted by path.
///
/// `input` may be a single file. Files without a `.csv` or `.json`
/// extension are ignored.
pub fn discover(input: &Path) -> Result<Vec<SourceFile>, CliError> {
    if input.is_file() {
        return classify(input).map(|file| vec![file]).ok_or_else(|| {
            CliError::Message(format!(
                "{} is not a .csv or .json file",
                input.display()
            ))
        });
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    let files: Vec<SourceFile> = paths.iter().filter_map(|path| classify(path)).collect();
    debug!(input = %input.display(), files = files.len(), "import.discovered");
    Ok(files)
}

/// Imports every interchange file under `input` into `store`.
///
/// Vertex files load before any edge file. A file-scoped failure is
/// recorded in the summary and the remaining files still load; a run-scoped
/// failure aborts the whole import.
pub fn import_path<S: GraphStore + ?Sized>(
    store: &mut S,
    reporter: &mut dyn Reporter,
    input: &Path,
    options: ImportOptions,
) -> Result<ImportSummary, CliError> {
    let files = discover(input)?;
    let (vertices, edges): (Vec<_>, Vec<_>) =
        files.into_iter().partition(|f| f.kind == LabelKind::Vertex);

    let policy = options.cell_policy;
    let mut run = ImportRun::new(options);
    let mut summary = ImportSummary::default();
    for file in &vertices {
        let outcome = read_vertices(&file.path, file.format, policy)
            .and_then(|records| run.load_vertices(store, reporter, &file.label, records));
        absorb_file_outcome(reporter, &mut summary, file, outcome)?;
    }
    run.begin_edges()?;
    for file in &edges {
        let outcome = read_edges(&file.path, file.format, policy)
            .and_then(|records| run.load_edges(store, reporter, &file.label, records));
        absorb_file_outcome(reporter, &mut summary, file, outcome)?;
    }
    run.finish()?;
    info!(
        input = %input.display(),
        vertices = summary.vertices,
        edges = summary.edges,
        skipped = summary.skipped,
        failed_files = summary.failures(),
        "import.completed"
    );
    Ok(summary)
}

fn absorb_file_outcome(
    reporter: &mut dyn Reporter,
    summary: &mut ImportSummary,
    file: &SourceFile,
    outcome: Result<LoadStats, TransferError>,
) -> Result<(), CliError> {
    match outcome {
        Err(err) if err.scope() == ErrorScope::Run => Err(err.into()),
        outcome => {
            if let Err(err) = &outcome {
                reporter.report(ReportEvent::FileFailed {
                    path: file.path.clone(),
                    reason: err.to_string(),
                });
            }
            summary.record(file, outcome);
            Ok(())
        }
    }
}

/// Opens (or creates) the database and imports `cfg.input` into it.
pub fn run_import(cfg: &ImportConfig, reporter: &mut dyn Reporter) -> Result<ImportSummary, CliError> {
    let opts = StoreOptions {
        create_if_missing: cfg.create_if_missing,
        synchronous: cfg.synchronous,
    };
    let mut store = SqliteStore::open(&cfg.db_path, &opts)?;
    import_path(&mut store, reporter, &cfg.input, cfg.options.clone())
}

/// Exports every label of an existing database into `cfg.out_dir`.
pub fn run_export(cfg: &ExportConfig, reporter: &mut dyn Reporter) -> Result<ExportSummary, CliError> {
    let store = SqliteStore::open(&cfg.db_path, &StoreOptions::default())?;
    let summary = ExportRouter::new(&store, reporter, &cfg.options).export_all(&cfg.out_dir)?;
    Ok(summary)
}

/// Label catalog of an existing database, in id order.
pub fn list_labels(db_path: &Path) -> Result<Vec<LabelInfo>, CliError> {
    let store = SqliteStore::open(db_path, &StoreOptions::default())?;
    let mut labels = store.labels()?;
    labels.sort_by_key(|info| info.id);
    Ok(labels)
}
