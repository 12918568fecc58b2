//! Ingestion pipeline
//!
//! Chunks a payload, hands the chunks to a [`JobOrchestrator`], and turns the
//! outcome into a [`RunReport`]. Lifecycle failures during the run do not
//! surface as errors: they become an aborted report, so the caller always
//! learns how far the run got.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::cancel::CancelToken;
use crate::chunker::{self, ChunkError, Payload, DEFAULT_CHUNK_SIZE};
use crate::client::ApiClient;
use crate::clock::{Clock, SystemClock};
use crate::job::{JobOrchestrator, OrchestratorConfig};
use crate::loader::{self, LoadError};
use crate::report::{ExitCode, RunOutcome, RunPlan, RunReport};

/// Pipeline errors; raised before any job is opened
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::Config
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Records per chunk (default: 250)
    pub chunk_size: usize,
    pub orchestrator: OrchestratorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if self.chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize.into());
        }
        if self.orchestrator.chunks_per_job == 0 {
            return Err(PipelineError::Config("chunks_per_job must be at least 1".to_string()));
        }
        if self.orchestrator.poll.interval.is_zero() {
            return Err(PipelineError::Config("poll interval must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Outcome for one file of a multi-file upload
#[derive(Debug)]
pub struct FileRun {
    pub path: PathBuf,
    pub result: PipelineResult<RunReport>,
}

impl FileRun {
    pub fn exit_code(&self) -> ExitCode {
        match &self.result {
            Ok(report) => report.exit_code(),
            Err(e) => e.exit_code(),
        }
    }
}

/// Chunked upload of payloads through one API client
pub struct IngestionPipeline<'a> {
    client: &'a ApiClient,
    config: PipelineConfig,
    cancel: CancelToken,
    clock: Arc<dyn Clock>,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(client: &'a ApiClient, config: PipelineConfig, cancel: CancelToken) -> Self {
        Self {
            client,
            config,
            cancel,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for run and job timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Upload one payload
    pub fn run(&self, payload: Payload) -> PipelineResult<RunReport> {
        self.run_with_source(payload, None)
    }

    fn run_with_source(&self, payload: Payload, source: Option<String>) -> PipelineResult<RunReport> {
        self.config.validate()?;

        let data_type = payload.meta.data_type.clone();
        let chunks = chunker::chunk(payload, self.config.chunk_size)?;
        let plan = RunPlan {
            source,
            data_type,
            chunk_size: self.config.chunk_size,
            chunks_per_job: self.config.orchestrator.chunks_per_job,
            chunks_planned: chunks.len() as u64,
        };
        let jobs_planned = plan.jobs_planned();
        tracing::info!(
            data_type = %plan.data_type,
            chunks = plan.chunks_planned,
            jobs = jobs_planned,
            "uploading payload"
        );

        let started_at = self.clock.now().with_timezone(&Utc);
        let timer = Instant::now();
        let mut orchestrator = JobOrchestrator::new(self.client, self.config.orchestrator, self.cancel.clone())
            .with_clock(Arc::clone(&self.clock));
        let result = orchestrator.run(chunks);
        let job_index = orchestrator.job_index().max(1);
        if let Err(e) = &result {
            tracing::error!(error = %e, job_index, jobs_planned, "run did not complete");
        }

        let outcome = RunOutcome::from_result(&result, job_index, jobs_planned);
        let report = RunReport::new(
            plan,
            started_at,
            timer.elapsed().as_millis() as u64,
            orchestrator.into_summary(),
            outcome,
        );
        tracing::info!(run_id = %report.run_id, exit_code = report.exit_code().as_i32(), "{}", report.human_summary());
        Ok(report)
    }

    /// Load and upload one payload file
    pub fn run_file(&self, path: &Path) -> PipelineResult<RunReport> {
        let payload = loader::load_payload(path)?;
        self.run_with_source(payload, Some(path.display().to_string()))
    }

    /// Upload several files in order, one run per file.
    ///
    /// A file that fails to load is reported and skipped. Cancellation stops
    /// the batch; files after the cancelled one are not attempted.
    pub fn run_files<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileRun> {
        let mut runs = Vec::with_capacity(paths.len());
        for path in paths {
            if self.cancel.is_cancelled() {
                tracing::warn!(path = %path.as_ref().display(), "skipping file after cancellation");
                break;
            }
            let path = path.as_ref();
            tracing::info!(path = %path.display(), "loading payload file");
            let result = self.run_file(path);
            if let Err(e) = &result {
                tracing::error!(path = %path.display(), error = %e, "file skipped");
            }
            runs.push(FileRun {
                path: path.to_path_buf(),
                result,
            });
        }
        runs
    }
}
