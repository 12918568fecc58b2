//! Run reports and stable exit codes
//!
//! A [`RunReport`] describes one upload run: what was submitted, what the
//! server rejected, how every job ended, and whether the run completed or was
//! aborted part-way.

use chrono::{DateTime, Utc};
use hound_protocol::JobStatus;
use serde::{Deserialize, Serialize};

use crate::job::{ChunkFailure, JobRecord, OrchestratorError, OrchestratorSummary};

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    /// Everything succeeded
    #[default]
    Success = 0,
    /// Configuration or payload file error
    Config = 1,
    /// Run completed but chunks were rejected or a job did not complete
    CompletedWithFailures = 2,
    /// Connection-level failure
    Network = 20,
    /// Run aborted by a lifecycle failure
    Aborted = 30,
    /// Query found nothing
    NoResults = 40,
    /// Run was cancelled
    Cancelled = 80,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            1 => Some(ExitCode::Config),
            2 => Some(ExitCode::CompletedWithFailures),
            20 => Some(ExitCode::Network),
            30 => Some(ExitCode::Aborted),
            40 => Some(ExitCode::NoResults),
            80 => Some(ExitCode::Cancelled),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every chunk was submitted and every job observed to a terminal status
    Completed,
    /// A lifecycle failure stopped the run at job `job_index` of `jobs_planned`
    Aborted {
        job_index: u32,
        jobs_planned: u32,
        reason: String,
        network: bool,
    },
    /// Cancelled at job `job_index` of `jobs_planned`
    Cancelled { job_index: u32, jobs_planned: u32 },
}

impl RunOutcome {
    /// Outcome for an orchestrator result
    pub fn from_result(result: &Result<(), OrchestratorError>, job_index: u32, jobs_planned: u32) -> Self {
        match result {
            Ok(()) => RunOutcome::Completed,
            Err(e) if e.is_cancelled() => RunOutcome::Cancelled {
                job_index,
                jobs_planned,
            },
            Err(e) => RunOutcome::Aborted {
                job_index,
                jobs_planned,
                reason: e.to_string(),
                network: e.is_network(),
            },
        }
    }
}

/// Report for one upload run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Payload file, when the run came from one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub data_type: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub chunk_size: usize,
    pub chunks_per_job: u32,
    pub chunks_planned: u64,
    pub chunks_submitted: u64,
    pub records_submitted: u64,
    pub chunk_failures: Vec<ChunkFailure>,
    pub jobs: Vec<JobRecord>,
    pub outcome: RunOutcome,
}

/// Fields of a report that are known before the run starts
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub source: Option<String>,
    pub data_type: String,
    pub chunk_size: usize,
    pub chunks_per_job: u32,
    pub chunks_planned: u64,
}

impl RunPlan {
    /// Number of jobs the run needs
    pub fn jobs_planned(&self) -> u32 {
        let per_job = u64::from(self.chunks_per_job.max(1));
        self.chunks_planned.div_ceil(per_job) as u32
    }
}

/// New lowercase ULID run identifier
pub fn new_run_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

impl RunReport {
    pub fn new(
        plan: RunPlan,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        summary: OrchestratorSummary,
        outcome: RunOutcome,
    ) -> Self {
        Self {
            run_id: new_run_id(),
            source: plan.source,
            data_type: plan.data_type,
            started_at,
            duration_ms,
            chunk_size: plan.chunk_size,
            chunks_per_job: plan.chunks_per_job,
            chunks_planned: plan.chunks_planned,
            chunks_submitted: summary.chunks_submitted,
            records_submitted: summary.records_submitted,
            chunk_failures: summary.chunk_failures,
            jobs: summary.jobs,
            outcome,
        }
    }

    /// Jobs whose terminal status was something other than complete
    pub fn incomplete_jobs(&self) -> Vec<&JobRecord> {
        self.jobs
            .iter()
            .filter(|j| j.final_status.is_some_and(|s| s != JobStatus::Complete))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.exit_code().is_success()
    }

    pub fn exit_code(&self) -> ExitCode {
        match &self.outcome {
            RunOutcome::Completed => {
                if self.chunk_failures.is_empty() && self.incomplete_jobs().is_empty() {
                    ExitCode::Success
                } else {
                    ExitCode::CompletedWithFailures
                }
            }
            RunOutcome::Aborted { network: true, .. } => ExitCode::Network,
            RunOutcome::Aborted { .. } => ExitCode::Aborted,
            RunOutcome::Cancelled { .. } => ExitCode::Cancelled,
        }
    }

    /// One-line human summary
    pub fn human_summary(&self) -> String {
        let label = if self.data_type.is_empty() {
            String::new()
        } else {
            format!("[{}] ", self.data_type)
        };

        match &self.outcome {
            RunOutcome::Completed => {
                let mut line = format!(
                    "{}Uploaded {} chunks of {} objects each to API ({} records, {} job(s))",
                    label,
                    self.chunks_submitted,
                    self.chunk_size,
                    self.records_submitted,
                    self.jobs.len()
                );
                if !self.chunk_failures.is_empty() {
                    line.push_str(&format!("; completed with {} chunk failure(s)", self.chunk_failures.len()));
                }
                let incomplete = self.incomplete_jobs();
                if !incomplete.is_empty() {
                    let ids: Vec<String> = incomplete
                        .iter()
                        .map(|j| match j.final_status {
                            Some(status) => format!("{} ({})", j.job_id, status),
                            None => j.job_id.to_string(),
                        })
                        .collect();
                    line.push_str(&format!("; job(s) not complete: {}", ids.join(", ")));
                }
                line
            }
            RunOutcome::Aborted {
                job_index,
                jobs_planned,
                reason,
                ..
            } => format!(
                "{}Run aborted at job {} of {} after {} of {} chunks: {}",
                label, job_index, jobs_planned, self.chunks_submitted, self.chunks_planned, reason
            ),
            RunOutcome::Cancelled {
                job_index,
                jobs_planned,
            } => format!(
                "{}Run cancelled at job {} of {} after {} of {} chunks",
                label, job_index, jobs_planned, self.chunks_submitted, self.chunks_planned
            ),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Exit code for a batch of runs: cancellation wins, then the first failure
pub fn aggregate_exit_code<'a>(codes: impl IntoIterator<Item = &'a ExitCode>) -> ExitCode {
    let mut first_failure = None;
    for code in codes {
        if *code == ExitCode::Cancelled {
            return ExitCode::Cancelled;
        }
        if first_failure.is_none() && !code.is_success() {
            first_failure = Some(*code);
        }
    }
    first_failure.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PollError;

    fn plan(chunks_planned: u64) -> RunPlan {
        RunPlan {
            source: Some("users.json".into()),
            data_type: "users".into(),
            chunk_size: 250,
            chunks_per_job: 2,
            chunks_planned,
        }
    }

    fn job(index: u32, status: Option<JobStatus>) -> JobRecord {
        JobRecord {
            index,
            job_id: i64::from(index),
            opened_at: Utc::now(),
            chunks_submitted: 2,
            chunks_rejected: 0,
            stop_acknowledged: true,
            final_status: status,
            status_message: String::new(),
        }
    }

    fn summary(jobs: Vec<JobRecord>, failures: Vec<ChunkFailure>) -> OrchestratorSummary {
        OrchestratorSummary {
            chunks_submitted: 3,
            records_submitted: 620,
            jobs,
            chunk_failures: failures,
        }
    }

    #[test]
    fn test_jobs_planned() {
        assert_eq!(plan(3).jobs_planned(), 2);
        assert_eq!(plan(4).jobs_planned(), 2);
        assert_eq!(plan(0).jobs_planned(), 0);
    }

    #[test]
    fn test_completed_success() {
        let report = RunReport::new(
            plan(3),
            Utc::now(),
            10,
            summary(vec![job(1, Some(JobStatus::Complete)), job(2, Some(JobStatus::Complete))], vec![]),
            RunOutcome::Completed,
        );
        assert_eq!(report.exit_code(), ExitCode::Success);
        assert_eq!(
            report.human_summary(),
            "[users] Uploaded 3 chunks of 250 objects each to API (620 records, 2 job(s))"
        );
        assert_eq!(report.run_id.len(), 26);
    }

    #[test]
    fn test_completed_with_failures() {
        let failure = ChunkFailure {
            ordinal: 2,
            job_id: 1,
            status: 400,
            message: "bad".into(),
        };
        let report = RunReport::new(
            plan(3),
            Utc::now(),
            10,
            summary(vec![job(1, Some(JobStatus::Complete)), job(2, Some(JobStatus::Timeout))], vec![failure]),
            RunOutcome::Completed,
        );
        assert_eq!(report.exit_code(), ExitCode::CompletedWithFailures);
        let line = report.human_summary();
        assert!(line.contains("completed with 1 chunk failure(s)"));
        assert!(line.contains("2 (timeout(4))"));
    }

    #[test]
    fn test_aborted_report() {
        let result: Result<(), OrchestratorError> =
            Err(OrchestratorError::Poll(PollError::JobNotFound { job_id: 2 }));
        let outcome = RunOutcome::from_result(&result, 2, 2);
        let report = RunReport::new(plan(3), Utc::now(), 10, summary(vec![job(1, None)], vec![]), outcome);

        assert_eq!(report.exit_code(), ExitCode::Aborted);
        assert!(report
            .human_summary()
            .starts_with("[users] Run aborted at job 2 of 2 after 3 of 3 chunks: job 2 is missing"));
    }

    #[test]
    fn test_cancelled_report() {
        let result: Result<(), OrchestratorError> = Err(OrchestratorError::Cancelled);
        let outcome = RunOutcome::from_result(&result, 1, 2);
        assert_eq!(
            outcome,
            RunOutcome::Cancelled {
                job_index: 1,
                jobs_planned: 2
            }
        );
        let report = RunReport::new(plan(3), Utc::now(), 10, summary(vec![], vec![]), outcome);
        assert_eq!(report.exit_code(), ExitCode::Cancelled);
    }

    #[test]
    fn test_report_serializes_outcome_tag() {
        let report = RunReport::new(plan(0), Utc::now(), 0, OrchestratorSummary::default(), RunOutcome::Completed);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["outcome"]["kind"], "completed");
        assert_eq!(value["source"], "users.json");
    }

    #[test]
    fn test_exit_code_round_trip_values() {
        for code in [0, 1, 2, 20, 30, 40, 80] {
            assert_eq!(ExitCode::from_i32(code).unwrap().as_i32(), code);
        }
        assert_eq!(ExitCode::from_i32(99), None);
    }

    #[test]
    fn test_aggregate_exit_code() {
        assert_eq!(aggregate_exit_code(&[]), ExitCode::Success);
        assert_eq!(
            aggregate_exit_code(&[ExitCode::Success, ExitCode::CompletedWithFailures, ExitCode::Network]),
            ExitCode::CompletedWithFailures
        );
        assert_eq!(
            aggregate_exit_code(&[ExitCode::Aborted, ExitCode::Cancelled]),
            ExitCode::Cancelled
        );
    }
}
