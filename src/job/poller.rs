//! Job status polling
//!
//! After a job is ended the server ingests it asynchronously. The poller
//! lists jobs until the one it is waiting on leaves the waiting statuses
//! (pending, running, ingesting), the deadline passes, or the run is
//! cancelled.

use std::time::Duration;

use hound_protocol::ops::upload::FileUploadJob;
use hound_protocol::JobStatus;

use crate::cancel::CancelToken;
use crate::client::{ApiClient, ApiError};
use crate::timeout::{Deadline, TimeoutConfig};

/// Shortest sleep between status checks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll cadence and upper bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for PollPolicy {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_wait: config.poll_max_wait(),
        }
    }
}

/// Polling errors
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("job {job_id} is missing from the job listing")]
    JobNotFound { job_id: i64 },

    #[error("job {job_id} still {last_status} after {}s", waited.as_secs())]
    PollTimeout {
        job_id: i64,
        waited: Duration,
        last_status: JobStatus,
    },

    #[error("cancelled while waiting for job {job_id}")]
    Cancelled { job_id: i64 },

    #[error("status check for job {job_id} failed: {source}")]
    Api {
        job_id: i64,
        #[source]
        source: ApiError,
    },
}

impl PollError {
    pub fn is_network(&self) -> bool {
        matches!(self, PollError::Api { source, .. } if source.is_network())
    }
}

/// Waits for jobs to reach a terminal status
pub struct JobPoller<'a> {
    client: &'a ApiClient,
    policy: PollPolicy,
    cancel: CancelToken,
}

impl<'a> JobPoller<'a> {
    pub fn new(client: &'a ApiClient, policy: PollPolicy, cancel: CancelToken) -> Self {
        Self {
            client,
            policy: PollPolicy {
                interval: policy.interval.max(MIN_POLL_INTERVAL),
                ..policy
            },
            cancel,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Current listing entry for `job_id`
    pub fn status(&self, job_id: i64) -> Result<FileUploadJob, PollError> {
        let jobs = self
            .client
            .list_jobs()
            .map_err(|source| PollError::Api { job_id, source })?;
        jobs.into_iter()
            .find(|job| job.id == job_id)
            .ok_or(PollError::JobNotFound { job_id })
    }

    /// Block until `job_id` reaches a terminal status.
    ///
    /// The status is checked before the first sleep, so an already-finished
    /// job returns immediately. The returned entry may be any non-waiting
    /// status, including `Timeout`; judging it is up to the caller.
    pub fn wait_for_terminal(&self, job_id: i64) -> Result<FileUploadJob, PollError> {
        tracing::info!(job_id, "waiting for job to finish ingesting");
        let deadline = Deadline::new(self.policy.max_wait);
        let mut checks: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PollError::Cancelled { job_id });
            }

            let job = self.status(job_id)?;
            checks += 1;
            if job.status.is_terminal() {
                tracing::info!(
                    job_id,
                    status = %job.status,
                    message = %job.status_message,
                    checks,
                    "job reached terminal status"
                );
                return Ok(job);
            }

            if deadline.is_expired() {
                return Err(PollError::PollTimeout {
                    job_id,
                    waited: deadline.elapsed(),
                    last_status: job.status,
                });
            }

            tracing::debug!(job_id, status = %job.status, checks, "job still in progress");
            let nap = self.policy.interval.min(deadline.remaining());
            if self.cancel.sleep(nap) {
                return Err(PollError::Cancelled { job_id });
            }
        }
    }
}
