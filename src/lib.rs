//! hound-ingest - signed client for a BloodHound-style graph API
//!
//! Uploads collector output in chunks grouped into sequential server-side
//! jobs, and runs shortest-path attack path queries. Every request is signed
//! with the three-link HMAC chain implemented in `hound-protocol`.

pub mod cancel;
pub mod chunker;
pub mod client;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod job;
pub mod loader;
pub mod mock;
pub mod pipeline;
pub mod query;
pub mod relationships;
pub mod report;
pub mod signal;
pub mod timeout;
pub mod transport;

pub use cancel::CancelToken;
pub use chunker::{chunk, Chunk, Payload};
pub use client::{ApiClient, ApiError};
pub use config::{ConfigError, EffectiveConfig, Settings};
pub use credentials::{Credentials, Endpoint};
pub use job::{JobOrchestrator, OrchestratorError, OrchestratorState};
pub use pipeline::{IngestionPipeline, PipelineConfig, PipelineError};
pub use query::{query_attack_path, AttackPath, QueryError};
pub use report::{ExitCode, RunOutcome, RunReport};
pub use transport::{Transport, TransportError};
