//! Load orchestrator
//!
//! Drives one run: ensures the target table once, discovers input files, and
//! for each file resolves the header, streams batches into the sink, and
//! records how far the file got. Per-file failures are isolated; only
//! run-fatal errors (sink connection lost, schema setup failed, root missing)
//! stop the run. The sink is closed exactly once, whatever the outcome.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn, Instrument};

use crate::batch::{BatchIterator, FileStats};
use crate::convert::RowConverter;
use crate::discovery::discover_files;
use crate::error::IngestError;
use crate::header::ColumnIndices;
use crate::reader::{DelimitedReader, Dialect};
use crate::schema::RowSchema;
use crate::sink::TableSink;
use crate::skip_log::SkipLog;

/// Everything the orchestrator needs for one run
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub table: String,
    pub schema: RowSchema,
    pub root_dir: PathBuf,
    pub extension: String,
    pub batch_size: usize,
    pub dialect: Dialect,
    /// Skip log location, excluded from discovery when it lives under the root
    pub skip_log_path: Option<PathBuf>,
}

/// Per-file lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Init,
    HeaderResolved,
    Streaming,
    Done,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Init => "init",
            FileState::HeaderResolved => "header_resolved",
            FileState::Streaming => "streaming",
            FileState::Done => "done",
            FileState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub state: FileState,
    pub lines_read: u64,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub batches_inserted: u64,
    pub skip_log_failures: u64,
    pub error: Option<String>,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: FileState::Init,
            lines_read: 0,
            rows_inserted: 0,
            rows_skipped: 0,
            batches_inserted: 0,
            skip_log_failures: 0,
            error: None,
        }
    }

    fn absorb(&mut self, stats: &FileStats) {
        self.lines_read = stats.lines_read;
        self.rows_skipped = stats.rows_skipped;
        self.skip_log_failures = stats.skip_log_failures;
    }

    fn fail(&mut self, err: &IngestError) {
        self.state = FileState::Failed;
        self.error = Some(err.to_string());
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn files_done(&self) -> usize {
        self.count(FileState::Done)
    }

    pub fn files_failed(&self) -> usize {
        self.count(FileState::Failed)
    }

    pub fn rows_inserted(&self) -> u64 {
        self.files.iter().map(|f| f.rows_inserted).sum()
    }

    pub fn rows_skipped(&self) -> u64 {
        self.files.iter().map(|f| f.rows_skipped).sum()
    }

    pub fn batches_inserted(&self) -> u64 {
        self.files.iter().map(|f| f.batches_inserted).sum()
    }

    pub fn skip_log_failures(&self) -> u64 {
        self.files.iter().map(|f| f.skip_log_failures).sum()
    }

    /// True when at least one file did not reach `Done`
    pub fn has_failures(&self) -> bool {
        self.files.iter().any(|f| f.state != FileState::Done)
    }

    fn count(&self, state: FileState) -> usize {
        self.files.iter().filter(|f| f.state == state).count()
    }
}

pub struct LoadOrchestrator<S: TableSink, L: SkipLog> {
    settings: LoadSettings,
    sink: S,
    skip_log: L,
    summary: RunSummary,
}

impl<S: TableSink, L: SkipLog> LoadOrchestrator<S, L> {
    pub fn new(settings: LoadSettings, sink: S, skip_log: L) -> Self {
        Self {
            settings,
            sink,
            skip_log,
            summary: RunSummary::default(),
        }
    }

    pub fn settings(&self) -> &LoadSettings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn skip_log(&self) -> &L {
        &self.skip_log
    }

    /// Reports of the last run so far. After an aborted run this lists the
    /// files processed before the abort, the aborting file last.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_parts(self) -> (S, L) {
        (self.sink, self.skip_log)
    }

    /// Run the full load. The sink is closed before this returns.
    pub async fn run(&mut self) -> Result<RunSummary, IngestError> {
        self.summary = RunSummary::default();
        let result = self.run_inner().await;
        self.sink.close().await;

        let summary = &self.summary;
        match result {
            Ok(()) => {
                info!(
                    files_done = summary.files_done(),
                    files_failed = summary.files_failed(),
                    rows_inserted = summary.rows_inserted(),
                    rows_skipped = summary.rows_skipped(),
                    "Load run complete"
                );
                Ok(summary.clone())
            },
            Err(err) => {
                for file in &summary.files {
                    warn!(
                        path = %file.path.display(),
                        state = %file.state,
                        rows_inserted = file.rows_inserted,
                        batches_inserted = file.batches_inserted,
                        "Processed before abort"
                    );
                }
                error!(
                    error = %err,
                    files_processed = summary.files.len(),
                    rows_inserted = summary.rows_inserted(),
                    "Load run aborted"
                );
                Err(err)
            },
        }
    }

    async fn run_inner(&mut self) -> Result<(), IngestError> {
        info!(
            table = %self.settings.table,
            root = %self.settings.root_dir.display(),
            batch_size = self.settings.batch_size,
            "Starting load run"
        );

        self.sink
            .ensure_schema(&self.settings.table, &self.settings.schema)
            .await?;

        let exclude: Vec<PathBuf> = self.settings.skip_log_path.iter().cloned().collect();
        let files = discover_files(&self.settings.root_dir, &self.settings.extension, &exclude)?;

        if files.is_empty() {
            warn!(
                root = %self.settings.root_dir.display(),
                extension = %self.settings.extension,
                "No input files found"
            );
        } else {
            info!(count = files.len(), "Found input files");
        }

        for path in files {
            let span = info_span!("file", path = %path.display());
            let (report, fatal) = self.load_file(&path).instrument(span).await;
            self.summary.files.push(report);
            if let Some(err) = fatal {
                return Err(err);
            }
        }

        Ok(())
    }

    /// Load one file. The error is returned only when it is run-fatal;
    /// everything else is recorded in the report.
    async fn load_file(&mut self, path: &Path) -> (FileReport, Option<IngestError>) {
        let mut report = FileReport::new(path);

        match self.stream_file(path, &mut report).await {
            Ok(()) => {
                report.state = FileState::Done;
                info!(
                    rows_inserted = report.rows_inserted,
                    rows_skipped = report.rows_skipped,
                    batches = report.batches_inserted,
                    "File loaded"
                );
            },
            Err(err) if err.is_run_fatal() => {
                report.fail(&err);
                return (report, Some(err));
            },
            Err(err) => {
                error!(state = %report.state, error = %err, "File failed");
                report.fail(&err);
            },
        }

        (report, None)
    }

    async fn stream_file(&mut self, path: &Path, report: &mut FileReport) -> Result<(), IngestError> {
        let Self {
            settings,
            sink,
            skip_log,
            ..
        } = self;

        let file = File::open(path)?;
        let mut reader = DelimitedReader::new(file, settings.dialect);
        report.lines_read = 1;

        let header = reader.read_header()?;
        let indices = ColumnIndices::resolve(&header, &settings.schema)?;
        report.state = FileState::HeaderResolved;

        let columns = settings.schema.names();
        let converter = RowConverter::new(&settings.schema, indices);
        let mut batches = BatchIterator::new(
            reader,
            converter,
            &mut *skip_log,
            path.display().to_string(),
            settings.batch_size,
        );
        report.state = FileState::Streaming;

        let outcome = loop {
            let batch = match batches.take_next_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };

            if let Err(err) = sink.bulk_insert(&settings.table, &columns, &batch).await {
                break Err(IngestError::from(err));
            }

            report.batches_inserted += 1;
            report.rows_inserted += batch.len() as u64;
        };

        report.absorb(batches.stats());
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, ColumnType};
    use crate::sink::{MemorySink, SinkError};
    use crate::skip_log::MemorySkipLog;
    use std::fs;
    use tempfile::TempDir;

    fn settings(root: &Path, batch_size: usize) -> LoadSettings {
        LoadSettings {
            table: "rows".to_string(),
            schema: RowSchema::new(vec![
                ColumnSpec::new("id", ColumnType::Integer),
                ColumnSpec::new("name", ColumnType::String),
            ])
            .unwrap(),
            root_dir: root.to_path_buf(),
            extension: "txt".to_string(),
            batch_size,
            dialect: Dialect::default(),
            skip_log_path: None,
        }
    }

    #[test]
    fn test_summary_failures() {
        let mut summary = RunSummary::default();
        assert!(!summary.has_failures());

        let mut done = FileReport::new(Path::new("a.txt"));
        done.state = FileState::Done;
        done.rows_inserted = 3;
        summary.files.push(done);
        assert!(!summary.has_failures());

        let mut failed = FileReport::new(Path::new("b.txt"));
        failed.state = FileState::Failed;
        summary.files.push(failed);
        assert!(summary.has_failures());
        assert_eq!(summary.files_done(), 1);
        assert_eq!(summary.files_failed(), 1);
        assert_eq!(summary.rows_inserted(), 3);
    }

    #[tokio::test]
    async fn test_empty_root_is_a_successful_run() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator =
            LoadOrchestrator::new(settings(dir.path(), 10), MemorySink::new(), MemorySkipLog::new());

        let summary = orchestrator.run().await.unwrap();
        assert!(summary.files.is_empty());
        assert!(!summary.has_failures());
        assert_eq!(orchestrator.sink().ensure_calls(), 1);
        assert_eq!(orchestrator.sink().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal_and_closes_sink() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = LoadOrchestrator::new(
            settings(&dir.path().join("absent"), 10),
            MemorySink::new(),
            MemorySkipLog::new(),
        );

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, IngestError::RootNotFound(_)));
        assert_eq!(orchestrator.sink().close_calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_fails_only_that_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "id;name\n1;x\n").unwrap();

        let mut orchestrator =
            LoadOrchestrator::new(settings(dir.path(), 10), MemorySink::new(), MemorySkipLog::new());
        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.files[0].state, FileState::Failed);
        assert!(summary.files[0].error.as_deref().unwrap().contains("empty"));
        assert_eq!(summary.files[1].state, FileState::Done);
        assert_eq!(orchestrator.sink().row_count(), 1);
    }

    #[tokio::test]
    async fn test_schema_failure_is_fatal() {
        struct NoSchema(MemorySink);

        #[async_trait::async_trait]
        impl TableSink for NoSchema {
            async fn ensure_schema(&mut self, _: &str, _: &RowSchema) -> Result<(), SinkError> {
                Err(SinkError::Schema("permission denied".into()))
            }

            async fn bulk_insert(
                &mut self,
                table: &str,
                columns: &[&str],
                batch: &[crate::schema::ConvertedRow],
            ) -> Result<(), SinkError> {
                self.0.bulk_insert(table, columns, batch).await
            }

            async fn close(&mut self) {
                self.0.close().await
            }
        }

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "id;name\n1;x\n").unwrap();

        let mut orchestrator = LoadOrchestrator::new(
            settings(dir.path(), 10),
            NoSchema(MemorySink::new()),
            MemorySkipLog::new(),
        );

        let err = orchestrator.run().await.unwrap_err();
        assert!(err.is_run_fatal());
        assert_eq!(orchestrator.sink().0.insert_calls(), 0);
        assert_eq!(orchestrator.sink().0.close_calls(), 1);
    }
}
