//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::job::DEFAULT_CHUNKS_PER_JOB;
use crate::timeout::TimeoutConfig;

/// Built-in default configuration values
///
/// Server host and credentials have no default and must come from a later
/// layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// URL scheme (default: "https")
    pub scheme: String,

    /// Server port (default: 443)
    pub port: u16,

    /// Records per chunk (default: 250)
    pub chunk_size: u64,

    /// Chunks per job (default: 50)
    pub chunks_per_job: u64,

    /// Certificate validation (default: true)
    pub tls_verify: bool,

    pub timeouts: TimeoutConfig,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            port: 443,
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
            chunks_per_job: u64::from(DEFAULT_CHUNKS_PER_JOB),
            tls_verify: true,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "server": {
                "scheme": self.scheme,
                "port": self.port
            },
            "upload": {
                "chunk_size": self.chunk_size,
                "chunks_per_job": self.chunks_per_job
            },
            "timeouts": {
                "request_seconds": self.timeouts.request_timeout_seconds,
                "poll_interval_seconds": self.timeouts.poll_interval_seconds,
                "poll_max_wait_seconds": self.timeouts.poll_max_wait_seconds
            },
            "tls": {
                "verify": self.tls_verify
            }
        })
    }
}
