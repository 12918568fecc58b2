//! API credentials and target endpoint

use std::fmt;

/// Token credentials for request signing
///
/// The key never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token_id: String,
    token_key: Vec<u8>,
}

impl Credentials {
    pub fn new(token_id: impl Into<String>, token_key: impl Into<Vec<u8>>) -> Self {
        Self {
            token_id: token_id.into(),
            token_key: token_key.into(),
        }
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn token_key(&self) -> &[u8] {
        &self.token_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token_id", &self.token_id)
            .field("token_key", &"[REDACTED]")
            .finish()
    }
}

/// Endpoint parse errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("URL must include a scheme, e.g. https://host:443 (got '{0}')")]
    MissingScheme(String),

    #[error("unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("URL must include an explicit port, e.g. https://host:443 (got '{0}')")]
    MissingPort(String),

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("URL has an empty host")]
    EmptyHost,
}

/// Scheme, host, and port of the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse `scheme://host:port`. Scheme and port are both required; a
    /// trailing path is ignored.
    // Not `reqwest::Url::parse`: it drops a default port such as `:443`, so a
    // missing port could not be told apart from an explicit one.
    pub fn parse(url: &str) -> Result<Self, EndpointError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| EndpointError::MissingScheme(url.to_string()))?;
        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(EndpointError::UnsupportedScheme(scheme));
        }

        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port) = authority
            .rsplit_once(':')
            .filter(|(_, port)| !port.ends_with(']'))
            .ok_or_else(|| EndpointError::MissingPort(url.to_string()))?;
        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        let port: u16 = port
            .parse()
            .map_err(|_| EndpointError::InvalidPort(port.to_string()))?;

        Ok(Self::new(scheme, host, port))
    }

    /// `scheme://host:port`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Absolute URL for an API path
    pub fn url_for(&self, uri: &str) -> String {
        format!("{}/{}", self.base_url(), uri.trim_start_matches('/'))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}
