//! Signed request transport
//!
//! [`Transport`] signs each call with the token credentials and hands a
//! fully prepared request to an [`HttpBackend`]:
//! - `ReqwestBackend`: real HTTP(S) client
//! - `MockServer` (see `crate::mock`): in-process fake API for tests

mod http;

pub use http::{HttpConfig, ReqwestBackend, TlsPolicy};

use std::sync::Arc;

use hound_protocol::{Method, ServerError, SignedRequest, SigningError};
use serde::de::DeserializeOwned;

use crate::clock::{Clock, SystemClock};
use crate::credentials::{Credentials, Endpoint};

/// Client identifier sent as `User-Agent` on every request
pub const CLIENT_ID: &str = concat!("hound-ingest/", env!("CARGO_PKG_VERSION"));

/// Longest body excerpt quoted in error messages
const BODY_EXCERPT_LEN: usize = 200;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{method} {uri} returned HTTP {status}: {message}")]
    UnexpectedStatus {
        method: Method,
        uri: String,
        status: u16,
        message: String,
    },

    #[error("malformed response from {method} {uri}: {reason}")]
    MalformedResponse {
        method: Method,
        uri: String,
        reason: String,
    },

    #[error("request signing failed: {0}")]
    Signing(#[from] SigningError),
}

impl TransportError {
    /// HTTP status for `UnexpectedStatus`, if that is what this is
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request never produced an HTTP response
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// A signed request ready to put on the wire
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    /// Path and query as signed
    pub uri: String,
    /// Absolute URL
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
}

impl PreparedRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body as received from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }
}

/// Sends prepared requests over some wire
pub trait HttpBackend: Send + Sync {
    /// Send one request; only connection-level failures are errors
    fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Normalized response from [`Transport::execute`]
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: Method,
    pub uri: String,
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::MalformedResponse {
            method: self.method,
            uri: self.uri.clone(),
            reason: e.to_string(),
        })
    }

    /// Require exactly `expected`
    pub fn expect_status(self, expected: u16) -> Result<Self, TransportError> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(self.into_status_error())
        }
    }

    /// Require any 2xx
    pub fn expect_success(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_status_error())
        }
    }

    /// Best human-readable description of a failed response
    pub fn error_message(&self) -> String {
        if let Some(message) = ServerError::parse(&self.body)
            .as_ref()
            .and_then(|e| e.first_message())
        {
            return message.to_string();
        }
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.is_empty() {
            "no response body".to_string()
        } else {
            text.chars().take(BODY_EXCERPT_LEN).collect()
        }
    }

    pub fn into_status_error(self) -> TransportError {
        TransportError::UnexpectedStatus {
            message: self.error_message(),
            method: self.method,
            uri: self.uri,
            status: self.status,
        }
    }
}

/// Signs and executes API calls against one endpoint
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    credentials: Credentials,
    endpoint: Endpoint,
    clock: Arc<dyn Clock>,
}

impl Transport {
    /// Create a transport that signs with the system clock
    pub fn new(backend: Arc<dyn HttpBackend>, credentials: Credentials, endpoint: Endpoint) -> Self {
        Self {
            backend,
            credentials,
            endpoint,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the signing clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sign a request without sending it
    pub fn prepare(
        &self,
        method: Method,
        uri: &str,
        body: Option<Vec<u8>>,
    ) -> Result<PreparedRequest, TransportError> {
        let signed = SignedRequest::new(
            method,
            uri,
            self.credentials.token_key(),
            &self.clock.now(),
            body,
        )?;
        let headers = signed.headers(CLIENT_ID, self.credentials.token_id());

        Ok(PreparedRequest {
            method,
            url: self.endpoint.url_for(uri),
            uri: signed.uri,
            headers,
            body: signed.body,
        })
    }

    /// Sign and send one request
    ///
    /// Any HTTP status is returned as a response; callers decide which
    /// statuses are acceptable.
    pub fn execute(
        &self,
        method: Method,
        uri: &str,
        body: Option<Vec<u8>>,
    ) -> Result<ApiResponse, TransportError> {
        let request = self.prepare(method, uri, body)?;
        tracing::debug!(
            method = %method,
            uri = %uri,
            body_bytes = request.body.as_ref().map_or(0, |b| b.len()),
            "sending request"
        );

        let raw = self.backend.send(&request)?;
        tracing::debug!(method = %method, uri = %uri, status = raw.status, "received response");

        Ok(ApiResponse {
            method,
            uri: request.uri,
            status: raw.status,
            body: raw.body,
        })
    }
}
