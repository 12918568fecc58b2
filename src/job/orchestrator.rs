//! Chunked-upload job orchestrator
//!
//! Groups an ordered chunk stream into sequential server-side jobs:
//!
//! 1. On the first chunk, and whenever the submitted-chunk count is an exact
//!    multiple of `chunks_per_job`, the open job (if any) is stopped and
//!    polled to a terminal status, then a new job is opened.
//! 2. Each chunk is posted to the open job. A rejected chunk is recorded and
//!    the run continues.
//! 3. After the last chunk the open job is stopped and polled.
//!
//! Any lifecycle failure aborts the run. Before the error is returned a
//! best-effort stop of the open job is attempted, so no job is left open.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hound_protocol::JobStatus;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::chunker::Chunk;
use crate::client::{ApiClient, ApiError, ChunkUpload};
use crate::clock::{Clock, SystemClock};

use super::poller::{JobPoller, PollError, PollPolicy};
use super::state::{JobStateError, OrchestratorState, StateMachine};

/// Default number of chunks grouped into one job
pub const DEFAULT_CHUNKS_PER_JOB: u32 = 50;

/// Orchestrator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Chunks per job (must be at least 1)
    pub chunks_per_job: u32,
    pub poll: PollPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            chunks_per_job: DEFAULT_CHUNKS_PER_JOB,
            poll: PollPolicy::default(),
        }
    }
}

/// Orchestrator errors; every variant aborts the run
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("could not start a new job: {0}")]
    JobStart(#[source] ApiError),

    #[error("could not stop job {job_id}: {source}")]
    JobStop {
        job_id: i64,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Poll(PollError),

    #[error("chunk {ordinal} could not be submitted to job {job_id}: {source}")]
    Submit {
        ordinal: u64,
        job_id: i64,
        #[source]
        source: ApiError,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] JobStateError),
}

impl From<PollError> for OrchestratorError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Cancelled { .. } => OrchestratorError::Cancelled,
            other => OrchestratorError::Poll(other),
        }
    }
}

impl OrchestratorError {
    /// Whether the failure was connection-level
    pub fn is_network(&self) -> bool {
        match self {
            OrchestratorError::JobStart(e) => e.is_network(),
            OrchestratorError::JobStop { source, .. } => source.is_network(),
            OrchestratorError::Submit { source, .. } => source.is_network(),
            OrchestratorError::Poll(e) => e.is_network(),
            OrchestratorError::Cancelled | OrchestratorError::State(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled)
    }
}

/// The job currently accepting chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: i64,
    pub opened_at: DateTime<Utc>,
    pub chunk_count: u32,
}

impl JobHandle {
    fn open(job_id: i64, opened_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            opened_at,
            chunk_count: 0,
        }
    }
}

/// A chunk the server did not accept
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub ordinal: u64,
    pub job_id: i64,
    pub status: u16,
    pub message: String,
}

/// What happened to one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    /// 1-based position within the run
    pub index: u32,
    pub job_id: i64,
    pub opened_at: DateTime<Utc>,
    pub chunks_submitted: u32,
    pub chunks_rejected: u32,
    /// Whether the server answered 200 to the end call
    pub stop_acknowledged: bool,
    /// Terminal status, once observed
    pub final_status: Option<JobStatus>,
    pub status_message: String,
}

impl JobRecord {
    /// Ended and observed complete
    pub fn is_complete(&self) -> bool {
        self.final_status.is_some_and(|s| s.is_complete())
    }
}

/// Progress of one orchestrator run, complete or not
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorSummary {
    pub jobs: Vec<JobRecord>,
    pub chunk_failures: Vec<ChunkFailure>,
    pub chunks_submitted: u64,
    pub records_submitted: u64,
}

/// Drives one run of chunks through sequential jobs
pub struct JobOrchestrator<'a> {
    client: &'a ApiClient,
    config: OrchestratorConfig,
    cancel: CancelToken,
    clock: Arc<dyn Clock>,
    machine: StateMachine,
    open: Option<JobHandle>,
    jobs_attempted: u32,
    summary: OrchestratorSummary,
}

impl<'a> JobOrchestrator<'a> {
    pub fn new(client: &'a ApiClient, config: OrchestratorConfig, cancel: CancelToken) -> Self {
        Self {
            client,
            config: OrchestratorConfig {
                chunks_per_job: config.chunks_per_job.max(1),
                ..config
            },
            cancel,
            clock: Arc::new(SystemClock),
            machine: StateMachine::new(),
            open: None,
            jobs_attempted: 0,
            summary: OrchestratorSummary::default(),
        }
    }

    /// Replace the clock used for job timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.machine.state()
    }

    /// The job currently accepting chunks, if any
    pub fn open_job(&self) -> Option<&JobHandle> {
        self.open.as_ref()
    }

    pub fn summary(&self) -> &OrchestratorSummary {
        &self.summary
    }

    pub fn into_summary(self) -> OrchestratorSummary {
        self.summary
    }

    /// 1-based index of the job opened (or being opened) most recently;
    /// 0 before the first start
    pub fn job_index(&self) -> u32 {
        self.jobs_attempted
    }

    /// Submit every chunk, then close and observe the final job.
    ///
    /// On error the summary still holds everything done before the failure.
    pub fn run<I>(&mut self, chunks: I) -> Result<(), OrchestratorError>
    where
        I: IntoIterator<Item = Chunk>,
    {
        for chunk in chunks {
            if self.cancel.is_cancelled() {
                return self.abort(OrchestratorError::Cancelled);
            }

            let boundary = self.summary.chunks_submitted % u64::from(self.config.chunks_per_job) == 0;
            if boundary {
                if self.open.is_some() {
                    self.close_open_job()?;
                }
                self.start_job()?;
            }

            self.submit(chunk)?;
        }

        if self.open.is_some() {
            self.close_open_job()?;
        }
        Ok(())
    }

    fn start_job(&mut self) -> Result<(), OrchestratorError> {
        self.jobs_attempted += 1;
        match self.client.start_job() {
            Ok(job_id) => {
                self.machine.transition(OrchestratorState::JobOpen)?;
                let handle = JobHandle::open(job_id, self.clock.now().with_timezone(&Utc));
                self.summary.jobs.push(JobRecord {
                    index: self.jobs_attempted,
                    job_id,
                    opened_at: handle.opened_at,
                    chunks_submitted: 0,
                    chunks_rejected: 0,
                    stop_acknowledged: false,
                    final_status: None,
                    status_message: String::new(),
                });
                tracing::info!(job_id, index = self.job_index(), "started job");
                self.open = Some(handle);
                Ok(())
            }
            Err(e) => self.abort(OrchestratorError::JobStart(e)),
        }
    }

    fn submit(&mut self, chunk: Chunk) -> Result<(), OrchestratorError> {
        let Some(job_id) = self.open.as_ref().map(|h| h.job_id) else {
            return self.abort(OrchestratorError::State(JobStateError::InvalidTransition {
                from: self.machine.state(),
                to: OrchestratorState::JobOpen,
            }));
        };
        if !self.machine.state().accepts_chunks() {
            return self.abort(OrchestratorError::State(JobStateError::InvalidTransition {
                from: self.machine.state(),
                to: OrchestratorState::JobOpen,
            }));
        }

        let upload = match self.client.upload_chunk(job_id, &chunk.body()) {
            Ok(upload) => upload,
            Err(source) => {
                return self.abort(OrchestratorError::Submit {
                    ordinal: chunk.ordinal,
                    job_id,
                    source,
                })
            }
        };

        self.summary.chunks_submitted += 1;
        self.summary.records_submitted += chunk.record_count() as u64;
        if let Some(handle) = self.open.as_mut() {
            handle.chunk_count += 1;
        }
        let record = self.current_record();

        match upload {
            ChunkUpload::Accepted => {
                tracing::debug!(job_id, ordinal = chunk.ordinal, records = chunk.record_count(), "chunk accepted");
                if let Some(record) = record {
                    record.chunks_submitted += 1;
                }
            }
            ChunkUpload::Rejected { status, message } => {
                tracing::warn!(job_id, ordinal = chunk.ordinal, status, message = %message, "chunk rejected");
                if let Some(record) = record {
                    record.chunks_submitted += 1;
                    record.chunks_rejected += 1;
                }
                self.summary.chunk_failures.push(ChunkFailure {
                    ordinal: chunk.ordinal,
                    job_id,
                    status,
                    message,
                });
            }
        }
        Ok(())
    }

    /// Stop the open job and wait for it to reach a terminal status
    fn close_open_job(&mut self) -> Result<(), OrchestratorError> {
        let Some(handle) = self.open.take() else {
            return Ok(());
        };
        let job_id = handle.job_id;
        self.machine.transition(OrchestratorState::JobStopping)?;

        let acknowledged = match self.client.end_job(job_id) {
            Ok(acknowledged) => acknowledged,
            Err(source) => {
                self.machine.transition(OrchestratorState::JobFailed)?;
                return Err(OrchestratorError::JobStop { job_id, source });
            }
        };
        tracing::info!(job_id, chunks = handle.chunk_count, acknowledged, "stopped job");
        if let Some(record) = self.current_record() {
            record.stop_acknowledged = acknowledged;
        }

        self.machine.transition(OrchestratorState::JobPolling)?;
        let poller = JobPoller::new(self.client, self.config.poll, self.cancel.clone());
        match poller.wait_for_terminal(job_id) {
            Ok(job) => {
                if let Some(record) = self.current_record() {
                    record.final_status = Some(job.status);
                    record.status_message = job.status_message;
                }
                if !job.status.is_complete() {
                    tracing::warn!(job_id, status = %job.status, "job finished without completing");
                }
                self.machine.transition(OrchestratorState::JobComplete)?;
                Ok(())
            }
            Err(e) => {
                self.machine.transition(OrchestratorState::JobFailed)?;
                Err(e.into())
            }
        }
    }

    fn current_record(&mut self) -> Option<&mut JobRecord> {
        self.summary.jobs.last_mut()
    }

    /// Best-effort stop of the open job, then fail with `err`
    fn abort<T>(&mut self, err: OrchestratorError) -> Result<T, OrchestratorError> {
        if let Some(handle) = self.open.take() {
            match self.client.end_job(handle.job_id) {
                Ok(acknowledged) => {
                    tracing::warn!(job_id = handle.job_id, acknowledged, "stopped open job before aborting");
                    if let Some(record) = self.current_record() {
                        record.stop_acknowledged = acknowledged;
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = handle.job_id, error = %e, "could not stop open job while aborting");
                }
            }
        }
        if !self.machine.state().is_failed() {
            self.machine.transition(OrchestratorState::JobFailed)?;
        }
        Err(err)
    }
}
