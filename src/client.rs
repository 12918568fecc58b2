//! Typed API client
//!
//! One method per endpoint. Responses are checked for the status each
//! endpoint is expected to return and parsed into protocol types.

use hound_protocol::ops::domains::Domain;
use hound_protocol::ops::path::GraphResponse;
use hound_protocol::ops::search::SearchResult;
use hound_protocol::ops::upload::{FileUploadJob, StartJobResponse};
use hound_protocol::ops::version::VersionResponse;
use hound_protocol::ops::{self, Envelope};
use hound_protocol::{Method, UploadBody};

use crate::transport::{ApiResponse, Transport, TransportError};

/// Status returned when a chunk is accepted for asynchronous processing
pub const CHUNK_ACCEPTED: u16 = 202;

/// Status returned when a job is closed
pub const JOB_ENDED: u16 = 200;

/// API client errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no results found for '{query}'")]
    NoResultsFound { query: String },

    #[error("no path found from '{start}' to '{end}'")]
    NoPathFound { start: String, end: String },

    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Transport(e) if e.is_network())
    }
}

/// Result type for API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// API and server versions
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ApiVersion {
    pub api_version: String,
    pub server_version: String,
}

/// Outcome of a chunk upload that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkUpload {
    Accepted,
    Rejected { status: u16, message: String },
}

/// Typed client over a signed [`Transport`]
pub struct ApiClient {
    transport: Transport,
}

impl ApiClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn get(&self, uri: &str) -> ApiResult<ApiResponse> {
        Ok(self.transport.execute(Method::Get, uri, None)?)
    }

    /// API and server version; doubles as a credential check
    pub fn get_version(&self) -> ApiResult<ApiVersion> {
        let response = self.get(ops::VERSION_PATH)?.expect_success()?;
        let envelope: Envelope<VersionResponse> = response.json()?;
        Ok(ApiVersion {
            api_version: envelope.data.api.current_version,
            server_version: envelope.data.server_version,
        })
    }

    /// Domains known to the server
    pub fn get_domains(&self) -> ApiResult<Vec<Domain>> {
        let response = self.get(ops::DOMAINS_PATH)?.expect_success()?;
        let envelope: Envelope<Vec<Domain>> = response.json()?;
        Ok(envelope.data)
    }

    /// Search nodes by name; an empty result set is an error
    pub fn search(&self, query: &str) -> ApiResult<Vec<SearchResult>> {
        let response = self.get(&ops::search_uri(query))?.expect_success()?;
        let envelope: Envelope<Option<Vec<SearchResult>>> = response.json()?;
        match envelope.data {
            Some(results) if !results.is_empty() => Ok(results),
            _ => Err(ApiError::NoResultsFound {
                query: query.to_string(),
            }),
        }
    }

    /// Shortest path between two object ids over `relationship_kinds`
    ///
    /// The server answers 404 when no path exists.
    pub fn shortest_path(
        &self,
        start_node: &str,
        end_node: &str,
        relationship_kinds: &[&str],
    ) -> ApiResult<GraphResponse> {
        let uri = ops::shortest_path_uri(start_node, end_node, relationship_kinds);
        let response = self.get(&uri)?;
        if response.status == 404 {
            return Err(ApiError::NoPathFound {
                start: start_node.to_string(),
                end: end_node.to_string(),
            });
        }
        let envelope: Envelope<GraphResponse> = response.expect_success()?.json()?;
        if envelope.data.edges.is_empty() {
            return Err(ApiError::NoPathFound {
                start: start_node.to_string(),
                end: end_node.to_string(),
            });
        }
        Ok(envelope.data)
    }

    /// Open a new file-upload job and return its id
    pub fn start_job(&self) -> ApiResult<i64> {
        let response = self
            .transport
            .execute(Method::Post, ops::FILE_UPLOAD_START_PATH, None)?
            .expect_success()?;
        let envelope: Envelope<StartJobResponse> = response.json()?;
        Ok(envelope.data.id)
    }

    /// Close a job for writes.
    ///
    /// Returns `Ok(false)` when the server answered with anything but 200;
    /// the job may already be closed server-side.
    pub fn end_job(&self, job_id: i64) -> ApiResult<bool> {
        let response = self
            .transport
            .execute(Method::Post, &ops::file_upload_end_uri(job_id), None)?;
        if response.status == JOB_ENDED {
            Ok(true)
        } else {
            tracing::warn!(
                job_id,
                status = response.status,
                message = %response.error_message(),
                "job end was not acknowledged"
            );
            Ok(false)
        }
    }

    /// All jobs, most recent first
    pub fn list_jobs(&self) -> ApiResult<Vec<FileUploadJob>> {
        let response = self.get(ops::FILE_UPLOAD_LIST_PATH)?.expect_success()?;
        let envelope: Envelope<Option<Vec<FileUploadJob>>> = response.json()?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Upload one chunk into an open job.
    ///
    /// A response other than 202 is reported as `Rejected`, not as an
    /// error; only transport failures are errors.
    pub fn upload_chunk(&self, job_id: i64, body: &UploadBody<'_>) -> ApiResult<ChunkUpload> {
        let bytes = serde_json::to_vec(body)?;
        let response = self
            .transport
            .execute(Method::Post, &ops::file_upload_chunk_uri(job_id), Some(bytes))?;
        if response.status == CHUNK_ACCEPTED {
            Ok(ChunkUpload::Accepted)
        } else {
            Ok(ChunkUpload::Rejected {
                status: response.status,
                message: response.error_message(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockServer, Route};
    use hound_protocol::JobStatus;
    use serde_json::json;

    fn client() -> (MockServer, ApiClient) {
        let server = MockServer::new();
        let client = server.client();
        (server, client)
    }

    #[test]
    fn test_get_version() {
        let (_server, client) = client();
        let version = client.get_version().unwrap();
        assert_eq!(version.api_version, "v2");
        assert_eq!(version.server_version, "v5.8.0");
    }

    #[test]
    fn test_get_version_bad_key_is_unexpected_status() {
        let server = MockServer::new();
        let client = server.client_with_key("wrong-key");
        let err = client.get_version().unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::UnexpectedStatus { status: 401, .. })));
    }

    #[test]
    fn test_get_domains() {
        let (server, client) = client();
        server.add_domain(json!({"name": "ABSALOM.ORG", "id": "S-1-5-21-1", "type": "active-directory", "collected": true, "impactValue": 3}));
        let domains = client.get_domains().unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].name, "ABSALOM.ORG");
    }

    #[test]
    fn test_search_no_results() {
        let (_server, client) = client();
        let err = client.search("nobody@absalom.org").unwrap_err();
        assert!(matches!(err, ApiError::NoResultsFound { ref query } if query == "nobody@absalom.org"));
    }

    #[test]
    fn test_search_finds_node() {
        let (server, client) = client();
        server.add_node("JASPER@ABSALOM.ORG", "S-1-5-21-1-1104", "User");
        let results = client.search("jasper@absalom.org").unwrap();
        assert_eq!(results[0].objectid, "S-1-5-21-1-1104");
    }

    #[test]
    fn test_search_malformed_is_not_no_results() {
        let (server, client) = client();
        server.inject_raw(Route::Search, 200, "{\"data\": 7");
        let err = client.search("x").unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::MalformedResponse { .. })));
    }

    #[test]
    fn test_job_lifecycle_calls() {
        let (server, client) = client();
        let job_id = client.start_job().unwrap();
        assert_eq!(job_id, 1);

        let data = vec![json!({"ObjectIdentifier": "a"})];
        let meta = hound_protocol::UploadMeta::default().with_count(1);
        let upload = client.upload_chunk(job_id, &UploadBody { data: &data, meta: &meta }).unwrap();
        assert_eq!(upload, ChunkUpload::Accepted);

        assert!(client.end_job(job_id).unwrap());
        let jobs = client.list_jobs().unwrap();
        assert_eq!(jobs[0].id, job_id);
        assert_ne!(jobs[0].status, JobStatus::Running);
        assert_eq!(server.chunks_for(job_id), vec![1]);
    }

    #[test]
    fn test_upload_rejected_is_not_error() {
        let (server, client) = client();
        let job_id = client.start_job().unwrap();
        server.inject_status(Route::UploadChunk, 400, "bad chunk");

        let meta = hound_protocol::UploadMeta::default();
        let upload = client.upload_chunk(job_id, &UploadBody { data: &[], meta: &meta }).unwrap();
        assert_eq!(
            upload,
            ChunkUpload::Rejected {
                status: 400,
                message: "bad chunk".to_string()
            }
        );
    }

    #[test]
    fn test_end_job_unacknowledged() {
        let (server, client) = client();
        let job_id = client.start_job().unwrap();
        server.inject_status(Route::EndJob, 500, "boom");
        assert!(!client.end_job(job_id).unwrap());
    }

    #[test]
    fn test_start_job_failure_is_error() {
        let (server, client) = client();
        server.inject_status(Route::StartJob, 503, "unavailable");
        assert!(client.start_job().is_err());
    }
}
