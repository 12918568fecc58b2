//! Version endpoint types.

use serde::{Deserialize, Serialize};

/// API version block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersionInfo {
    pub current_version: String,
}

/// `GET /api/version` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    #[serde(rename = "API")]
    pub api: ApiVersionInfo,
    pub server_version: String,
}
