//! Server error envelope.
//!
//! Non-2xx responses carry a JSON body listing one or more errors. Only the
//! messages are surfaced to callers.

use serde::{Deserialize, Serialize};

/// A single error entry from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorDetail {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub message: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<ServerErrorDetail>,
}

impl ServerError {
    /// Create an envelope with a single error message.
    pub fn new(http_status: u16, message: impl Into<String>) -> Self {
        Self {
            http_status: Some(http_status),
            request_id: None,
            errors: vec![ServerErrorDetail {
                context: String::new(),
                message: message.into(),
            }],
        }
    }

    /// Parse an error body, tolerating anything that is not an envelope.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// First non-empty message in the envelope.
    pub fn first_message(&self) -> Option<&str> {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .find(|m| !m.is_empty())
    }
}
