//! Mock API server
//!
//! In-process stand-in for the graph API. Verifies every request's signature
//! chain, tracks file-upload jobs, and serves search and shortest-path
//! fixtures.

use std::sync::{Arc, Mutex};

use hound_protocol::ops::path::GraphResponse;
use hound_protocol::ops::search::SearchResult;
use hound_protocol::{
    signature, JobStatus, Method, ServerError, AUTH_SCHEME, HEADER_AUTHORIZATION, HEADER_REQUEST_DATE,
    HEADER_SIGNATURE,
};
use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::credentials::{Credentials, Endpoint};
use crate::transport::{HttpBackend, PreparedRequest, RawResponse, Transport, TransportError};

use super::failure::{FailureConfig, FailureInjector, FailureMode};
use super::state::{MockEvent, MockState};

/// Token id the mock server accepts
pub const MOCK_TOKEN_ID: &str = "token-id";

/// Token key the mock server verifies signatures with
pub const MOCK_TOKEN_KEY: &str = "token-key";

/// API routes the mock server understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Version,
    Domains,
    Search,
    ShortestPath,
    StartJob,
    EndJob,
    ListJobs,
    UploadChunk,
}

impl Route {
    /// Resolve a request line to a route and, for job routes, the job id
    pub fn resolve(method: Method, uri: &str) -> Option<(Route, Option<i64>)> {
        let path = uri.split('?').next().unwrap_or_default();
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (Method::Get, ["api", "version"]) => Some((Route::Version, None)),
            (Method::Get, ["api", "v2", "available-domains"]) => Some((Route::Domains, None)),
            (Method::Get, ["api", "v2", "search"]) => Some((Route::Search, None)),
            (Method::Get, ["api", "v2", "graphs", "shortest-path"]) => Some((Route::ShortestPath, None)),
            (Method::Get, ["api", "v2", "file-upload"]) => Some((Route::ListJobs, None)),
            (Method::Post, ["api", "v2", "file-upload", "start"]) => Some((Route::StartJob, None)),
            (Method::Post, ["api", "v2", "file-upload", id, "end"]) => {
                id.parse().ok().map(|id| (Route::EndJob, Some(id)))
            }
            (Method::Post, ["api", "v2", "file-upload", id]) => {
                id.parse().ok().map(|id| (Route::UploadChunk, Some(id)))
            }
            _ => None,
        }
    }
}

/// Decoded value of query parameter `name`
fn query_param(uri: &str, name: &str) -> Option<String> {
    let (_, query) = uri.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

fn error_response(status: u16, message: &str) -> RawResponse {
    let body = serde_json::to_string(&ServerError::new(status, message)).unwrap_or_default();
    RawResponse::new(status, body)
}

fn data_response(status: u16, data: Value) -> RawResponse {
    RawResponse::json(status, &json!({ "data": data }))
}

/// Configurable mock API server
///
/// Clones share state, so a test can hand one clone to the client under test
/// and keep another for configuration and assertions.
#[derive(Clone)]
pub struct MockServer {
    token_key: Vec<u8>,
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
    requests: Arc<Mutex<Vec<PreparedRequest>>>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            token_key: MOCK_TOKEN_KEY.as_bytes().to_vec(),
            state: Arc::new(Mutex::new(MockState::new())),
            failures: Arc::new(Mutex::new(FailureInjector::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Endpoint clients are pointed at
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("http", "mock.local", 8080)
    }

    /// Transport signing with the accepted credentials
    pub fn transport(&self) -> Transport {
        self.transport_with_key(MOCK_TOKEN_KEY)
    }

    pub fn transport_with_key(&self, token_key: &str) -> Transport {
        Transport::new(
            Arc::new(self.clone()),
            Credentials::new(MOCK_TOKEN_ID, token_key),
            self.endpoint(),
        )
    }

    /// API client with the accepted credentials
    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.transport())
    }

    /// API client signing with some other key
    pub fn client_with_key(&self, token_key: &str) -> ApiClient {
        ApiClient::new(self.transport_with_key(token_key))
    }

    // === Fixtures ===

    pub fn add_domain(&self, domain: Value) {
        self.state.lock().unwrap().domains.push(domain);
    }

    pub fn add_node(&self, name: &str, objectid: &str, kind: &str) {
        self.state.lock().unwrap().nodes.push(SearchResult {
            name: name.to_string(),
            distinguishedname: None,
            objectid: objectid.to_string(),
            kind: kind.to_string(),
        });
    }

    /// Serve `graph` for paths from `start` to `end` (object ids)
    pub fn set_path(&self, start: &str, end: &str, graph: GraphResponse) {
        self.state
            .lock()
            .unwrap()
            .paths
            .insert((start.to_string(), end.to_string()), graph);
    }

    /// Statuses every job reports after it is ended, one per listing
    pub fn set_default_progression(&self, statuses: Vec<JobStatus>) {
        self.state.lock().unwrap().default_progression = statuses;
    }

    /// Statuses job `job_id` reports after it is ended
    pub fn set_job_progression(&self, job_id: i64, statuses: Vec<JobStatus>) {
        self.state.lock().unwrap().progressions.insert(job_id, statuses);
    }

    /// Leave a job out of every listing; may be called before it exists
    pub fn hide_job(&self, job_id: i64) {
        self.state.lock().unwrap().hidden.insert(job_id);
    }

    // === Failure injection ===

    pub fn inject(&self, route: Route, config: FailureConfig) {
        self.failures.lock().unwrap().inject(route, config);
    }

    /// Answer `route` with `status` and a server error envelope
    pub fn inject_status(&self, route: Route, status: u16, message: &str) {
        self.inject(route, FailureConfig::status(status, message));
    }

    /// Answer `route` with `status` and a verbatim body
    pub fn inject_raw(&self, route: Route, status: u16, body: &str) {
        self.inject(route, FailureConfig::raw(status, body));
    }

    /// Fail `route` at the connection level
    pub fn inject_network_error(&self, route: Route, message: &str) {
        self.inject(route, FailureConfig::network(message));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    // === Assertions ===

    /// Record counts of the chunks accepted into `job_id`
    pub fn chunks_for(&self, job_id: i64) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(&job_id)
            .map(|job| job.chunks.clone())
            .unwrap_or_default()
    }

    /// Ids of every job started, in order
    pub fn job_ids(&self) -> Vec<i64> {
        self.state.lock().unwrap().jobs.keys().copied().collect()
    }

    /// Whether `job_id` has been ended
    pub fn is_ended(&self, job_id: i64) -> bool {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(&job_id)
            .is_some_and(|job| !job.open)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Every request received, including rejected ones
    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_relationship_kinds(&self) -> Option<Vec<String>> {
        self.state.lock().unwrap().last_relationship_kinds.clone()
    }

    // === Request handling ===

    fn authenticate(&self, request: &PreparedRequest) -> Result<(), RawResponse> {
        let expected_auth = format!("{} {}", AUTH_SCHEME, MOCK_TOKEN_ID);
        if request.header(HEADER_AUTHORIZATION) != Some(expected_auth.as_str()) {
            return Err(error_response(401, "unknown token"));
        }
        let (Some(date), Some(sig)) = (
            request.header(HEADER_REQUEST_DATE),
            request.header(HEADER_SIGNATURE),
        ) else {
            return Err(error_response(401, "missing signature headers"));
        };
        if signature::verify(
            request.method,
            &request.uri,
            &self.token_key,
            date,
            request.body.as_deref(),
            sig,
        ) {
            Ok(())
        } else {
            Err(error_response(401, "signature mismatch"))
        }
    }

    /// Handle one request the way the real server would
    pub fn handle(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let Some((route, job_id)) = Route::resolve(request.method, &request.uri) else {
            return Ok(error_response(404, "no such route"));
        };

        if let Some(mode) = self.failures.lock().unwrap().check(route) {
            return match mode {
                FailureMode::Respond { status, body } => Ok(RawResponse::new(status, body)),
                FailureMode::Network(message) => Err(TransportError::Network(message)),
            };
        }

        if let Err(response) = self.authenticate(request) {
            return Ok(response);
        }

        let mut state = self.state.lock().unwrap();
        let response = match route {
            Route::Version => data_response(
                200,
                json!({ "API": { "current_version": "v2" }, "server_version": "v5.8.0" }),
            ),
            Route::Domains => data_response(200, Value::Array(state.domains.clone())),
            Route::Search => {
                let query = query_param(&request.uri, "q").unwrap_or_default();
                data_response(200, json!(state.search(&query)))
            }
            Route::ShortestPath => {
                let start = query_param(&request.uri, "start_node").unwrap_or_default();
                let end = query_param(&request.uri, "end_node").unwrap_or_default();
                state.last_relationship_kinds = query_param(&request.uri, "relationship_kinds").map(|kinds| {
                    kinds
                        .trim_start_matches("in:")
                        .split(',')
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect()
                });
                match state.paths.get(&(start, end)) {
                    Some(graph) => data_response(200, json!(graph)),
                    None => error_response(404, "path not found"),
                }
            }
            Route::StartJob => {
                let id = state.start_job();
                data_response(201, json!({ "id": id }))
            }
            Route::EndJob => {
                if job_id.is_some_and(|id| state.end_job(id)) {
                    RawResponse::new(200, "")
                } else {
                    error_response(400, "job is not running")
                }
            }
            Route::ListJobs => data_response(200, json!(state.list_jobs())),
            Route::UploadChunk => {
                let count = request
                    .body
                    .as_deref()
                    .and_then(|b| serde_json::from_slice::<Value>(b).ok())
                    .and_then(|body| body.get("data").and_then(Value::as_array).map(|d| d.len() as u64));
                match (job_id, count) {
                    (Some(id), Some(count)) if state.accept_chunk(id, count) => RawResponse::new(202, ""),
                    (_, None) => error_response(400, "body is not a chunk"),
                    _ => error_response(400, "job is not running"),
                }
            }
        };
        Ok(response)
    }
}

impl HttpBackend for MockServer {
    fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_routes() {
        assert_eq!(Route::resolve(Method::Get, "/api/version"), Some((Route::Version, None)));
        assert_eq!(
            Route::resolve(Method::Get, "/api/v2/file-upload?skip=0&limit=0&sort_by=-id"),
            Some((Route::ListJobs, None))
        );
        assert_eq!(
            Route::resolve(Method::Post, "/api/v2/file-upload/start"),
            Some((Route::StartJob, None))
        );
        assert_eq!(
            Route::resolve(Method::Post, "/api/v2/file-upload/12/end"),
            Some((Route::EndJob, Some(12)))
        );
        assert_eq!(
            Route::resolve(Method::Post, "/api/v2/file-upload/12"),
            Some((Route::UploadChunk, Some(12)))
        );
        assert_eq!(Route::resolve(Method::Post, "/api/version"), None);
        assert_eq!(Route::resolve(Method::Post, "/api/v2/file-upload/x"), None);
    }

    #[test]
    fn test_query_param_decodes() {
        assert_eq!(
            query_param("/api/v2/search?q=Domain%20Admins%40absalom.org", "q").as_deref(),
            Some("Domain Admins@absalom.org")
        );
        assert_eq!(query_param("/api/v2/search", "q"), None);
    }

    #[test]
    fn test_rejects_bad_signature() {
        let server = MockServer::new();
        let response = server
            .transport_with_key("other")
            .execute(Method::Get, "/api/version", None)
            .unwrap();
        assert_eq!(response.status, 401);
        assert!(response.error_message().contains("signature"));
    }

    #[test]
    fn test_records_requests() {
        let server = MockServer::new();
        server.transport().execute(Method::Get, "/api/version", None).unwrap();
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].uri, "/api/version");
    }

    #[test]
    fn test_network_injection() {
        let server = MockServer::new();
        server.inject_network_error(Route::Version, "connection reset");
        let err = server.transport().execute(Method::Get, "/api/version", None).unwrap_err();
        assert!(err.is_network());
    }

    #[test]
    fn test_upload_to_closed_job_is_400() {
        let server = MockServer::new();
        let transport = server.transport();
        transport.execute(Method::Post, "/api/v2/file-upload/start", None).unwrap();
        transport.execute(Method::Post, "/api/v2/file-upload/1/end", None).unwrap();

        let body = br#"{"data":[1],"meta":{"count":1}}"#.to_vec();
        let response = transport
            .execute(Method::Post, "/api/v2/file-upload/1", Some(body))
            .unwrap();
        assert_eq!(response.status, 400);
        assert!(server.chunks_for(1).is_empty());
    }
}
