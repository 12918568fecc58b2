//! File-upload job types.
//!
//! A job is opened with `start`, filled with chunk uploads, closed with
//! `end`, and then processed asynchronously by the server. Its progress is
//! reported as an integer status code in the job listing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-side status of a file-upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum JobStatus {
    /// Created, not yet picked up (0)
    Pending,
    /// Accepting or receiving uploads (1)
    Running,
    /// Ingested (2)
    Complete,
    /// Server gave up on the job (4)
    Timeout,
    /// Closed and still being ingested (6)
    Ingesting,
    /// Any other code
    Other(i64),
}

impl JobStatus {
    /// Numeric wire code
    pub fn code(&self) -> i64 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Complete => 2,
            JobStatus::Timeout => 4,
            JobStatus::Ingesting => 6,
            JobStatus::Other(code) => *code,
        }
    }

    /// Whether a poller should keep waiting on this status.
    pub fn is_waiting(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running | JobStatus::Ingesting)
    }

    /// Whether polling ends on this status.
    pub fn is_terminal(&self) -> bool {
        !self.is_waiting()
    }

    /// Whether the job finished ingesting successfully.
    pub fn is_complete(&self) -> bool {
        matches!(self, JobStatus::Complete)
    }
}

impl From<i64> for JobStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Complete,
            4 => JobStatus::Timeout,
            6 => JobStatus::Ingesting,
            other => JobStatus::Other(other),
        }
    }
}

impl From<JobStatus> for i64 {
    fn from(status: JobStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending(0)"),
            JobStatus::Running => write!(f, "running(1)"),
            JobStatus::Complete => write!(f, "complete(2)"),
            JobStatus::Timeout => write!(f, "timeout(4)"),
            JobStatus::Ingesting => write!(f, "ingesting(6)"),
            JobStatus::Other(code) => write!(f, "other({})", code),
        }
    }
}

/// `POST /api/v2/file-upload/start` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub id: i64,
}

/// One entry of `GET /api/v2/file-upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadJob {
    pub id: i64,
    pub status: JobStatus,
    #[serde(default)]
    pub status_message: String,
}

fn default_methods() -> Value {
    Value::from(0)
}

fn default_version() -> Value {
    Value::from("")
}

/// The `meta` block of a collector payload and of each uploaded chunk.
///
/// `count` is the number of records in the accompanying `data` array.
/// Fields the client does not interpret are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMeta {
    #[serde(default = "default_methods")]
    pub methods: Value,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default = "default_version")]
    pub version: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for UploadMeta {
    fn default() -> Self {
        Self {
            methods: default_methods(),
            data_type: String::new(),
            count: 0,
            version: default_version(),
            extra: Map::new(),
        }
    }
}

impl UploadMeta {
    /// Shallow copy with `count` replaced
    pub fn with_count(&self, count: u64) -> Self {
        Self {
            count,
            ..self.clone()
        }
    }
}

/// Body of `POST /api/v2/file-upload/{job_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadBody<'a> {
    pub data: &'a [Value],
    pub meta: &'a UploadMeta,
}
