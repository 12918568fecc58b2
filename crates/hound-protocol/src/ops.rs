//! API endpoints and their payload types.
//!
//! Every successful response wraps its payload in a `data` field.

pub mod domains;
pub mod path;
pub mod search;
pub mod upload;
pub mod version;

use serde::{Deserialize, Serialize};

/// `{ "data": ... }` response wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// `GET` API and server version.
pub const VERSION_PATH: &str = "/api/version";

/// `GET` domains known to the server.
pub const DOMAINS_PATH: &str = "/api/v2/available-domains";

/// `POST` open a new file-upload job.
pub const FILE_UPLOAD_START_PATH: &str = "/api/v2/file-upload/start";

/// `GET` every file-upload job, most recent first.
pub const FILE_UPLOAD_LIST_PATH: &str = "/api/v2/file-upload?skip=0&limit=0&sort_by=-id";

/// `GET` node search.
pub fn search_uri(query: &str) -> String {
    format!("/api/v2/search?q={}", urlencoding::encode(query))
}

/// `GET` shortest path between two nodes over the given relationship kinds.
pub fn shortest_path_uri(start_node: &str, end_node: &str, relationship_kinds: &[&str]) -> String {
    format!(
        "/api/v2/graphs/shortest-path?start_node={}&end_node={}&relationship_kinds=in:{}",
        urlencoding::encode(start_node),
        urlencoding::encode(end_node),
        relationship_kinds.join(",")
    )
}

/// `POST` close a job for writes.
pub fn file_upload_end_uri(job_id: i64) -> String {
    format!("/api/v2/file-upload/{}/end", job_id)
}

/// `POST` one chunk into an open job.
pub fn file_upload_chunk_uri(job_id: i64) -> String {
    format!("/api/v2/file-upload/{}", job_id)
}
