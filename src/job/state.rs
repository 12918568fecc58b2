//! Orchestrator state machine
//!
//! NO_JOB → JOB_OPEN → JOB_STOPPING → JOB_POLLING → {JOB_COMPLETE | JOB_FAILED}
//! with JOB_COMPLETE cycling back to JOB_OPEN for the next group of chunks.

use serde::{Deserialize, Serialize};

/// Where the orchestrator is in the job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    /// No job has been opened yet
    NoJob,
    /// A job is accepting chunks
    JobOpen,
    /// End of the open job has been requested
    JobStopping,
    /// Waiting for the stopped job to reach a terminal status
    JobPolling,
    /// The last job reached a terminal status
    JobComplete,
    /// A lifecycle call failed or the run was cancelled
    JobFailed,
}

impl OrchestratorState {
    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: OrchestratorState) -> bool {
        use OrchestratorState::*;

        match (self, target) {
            (NoJob, JobOpen) => true,
            (NoJob, JobFailed) => true, // start failed

            (JobOpen, JobStopping) => true,
            (JobOpen, JobFailed) => true, // submit failed, cleanup already attempted

            (JobStopping, JobPolling) => true,
            (JobStopping, JobFailed) => true,

            (JobPolling, JobComplete) => true,
            (JobPolling, JobFailed) => true,

            (JobComplete, JobOpen) => true,
            (JobComplete, JobFailed) => true, // next start failed

            _ => false,
        }
    }

    /// Whether chunks may be submitted in this state
    pub fn accepts_chunks(&self) -> bool {
        matches!(self, OrchestratorState::JobOpen)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OrchestratorState::JobFailed)
    }
}

/// Errors for state operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobStateError {
    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: OrchestratorState,
        to: OrchestratorState,
    },
}

/// Current state plus guarded transitions
#[derive(Debug, Clone, Copy)]
pub struct StateMachine {
    state: OrchestratorState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: OrchestratorState::NoJob,
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn transition(&mut self, target: OrchestratorState) -> Result<(), JobStateError> {
        if !self.state.can_transition_to(target) {
            return Err(JobStateError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        tracing::trace!(from = ?self.state, to = ?target, "orchestrator transition");
        self.state = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestratorState::*;

    #[test]
    fn test_full_cycle() {
        let mut machine = StateMachine::new();
        for target in [JobOpen, JobStopping, JobPolling, JobComplete, JobOpen, JobStopping, JobPolling, JobComplete] {
            machine.transition(target).unwrap();
        }
        assert_eq!(machine.state(), JobComplete);
    }

    #[test]
    fn test_cannot_skip_stop() {
        assert!(!JobOpen.can_transition_to(JobPolling));
        assert!(!JobOpen.can_transition_to(JobComplete));
        assert!(!JobOpen.can_transition_to(JobOpen));
        assert!(!NoJob.can_transition_to(JobStopping));
    }

    #[test]
    fn test_failed_is_terminal() {
        for target in [NoJob, JobOpen, JobStopping, JobPolling, JobComplete, JobFailed] {
            assert!(!JobFailed.can_transition_to(target));
        }
    }

    #[test]
    fn test_invalid_transition_error() {
        let mut machine = StateMachine::new();
        let err = machine.transition(JobPolling).unwrap_err();
        assert_eq!(
            err,
            JobStateError::InvalidTransition {
                from: NoJob,
                to: JobPolling
            }
        );
        assert_eq!(machine.state(), NoJob);
    }

    #[test]
    fn test_only_open_accepts_chunks() {
        assert!(JobOpen.accepts_chunks());
        for state in [NoJob, JobStopping, JobPolling, JobComplete, JobFailed] {
            assert!(!state.accepts_chunks());
        }
    }
}
