//! HTTP backend built on `reqwest`'s blocking client

use std::time::Duration;

use hound_protocol::Method;

use super::{HttpBackend, PreparedRequest, RawResponse, TransportError};

/// Certificate validation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Validate server certificates (production)
    #[default]
    Strict,
    /// Accept any certificate. Only for lab servers with self-signed certs;
    /// must be chosen explicitly.
    AcceptInvalidCerts,
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 30)
    pub request_timeout_seconds: u64,
    /// Certificate validation policy (default: strict)
    pub tls: TlsPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            tls: TlsPolicy::Strict,
        }
    }
}

/// Real HTTP(S) backend
pub struct ReqwestBackend {
    client: reqwest::blocking::Client,
}

impl ReqwestBackend {
    /// Build the underlying client
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds));

        if config.tls == TlsPolicy::AcceptInvalidCerts {
            tracing::warn!("TLS certificate validation is DISABLED for this session");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(format!("{} {} timed out: {}", request.method, request.uri, e))
            } else {
                TransportError::Network(format!("{} {}: {}", request.method, request.uri, e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError::Network(format!("failed to read response body: {}", e)))?;

        Ok(RawResponse::new(status, body.to_vec()))
    }
}
