//! Job lifecycle: state machine, status poller, and the orchestrator that
//! groups chunks into sequential server-side jobs.

pub mod orchestrator;
pub mod poller;
pub mod state;

pub use orchestrator::{
    ChunkFailure, JobHandle, JobOrchestrator, JobRecord, OrchestratorConfig, OrchestratorError,
    OrchestratorSummary, DEFAULT_CHUNKS_PER_JOB,
};
pub use poller::{JobPoller, PollError, PollPolicy, MIN_POLL_INTERVAL};
pub use state::{JobStateError, OrchestratorState, StateMachine};
