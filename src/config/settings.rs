//! Typed settings validated from the merged configuration

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::ConfigError;
use crate::client::ApiClient;
use crate::credentials::{Credentials, Endpoint};
use crate::job::{OrchestratorConfig, PollPolicy};
use crate::pipeline::PipelineConfig;
use crate::timeout::TimeoutConfig;
use crate::transport::{HttpConfig, ReqwestBackend, TlsPolicy, Transport, TransportError};

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: RawServer,
    #[serde(default)]
    auth: RawAuth,
    upload: RawUpload,
    timeouts: RawTimeouts,
    tls: RawTls,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    scheme: String,
    host: Option<String>,
    port: u16,
}

#[derive(Debug, Default, Deserialize)]
struct RawAuth {
    token_id: Option<String>,
    token_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpload {
    chunk_size: u64,
    chunks_per_job: u64,
}

#[derive(Debug, Deserialize)]
struct RawTimeouts {
    request_seconds: u64,
    poll_interval_seconds: u64,
    poll_max_wait_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RawTls {
    verify: bool,
}

/// Everything needed to talk to one server
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub pipeline: PipelineConfig,
    pub timeouts: TimeoutConfig,
    pub tls: TlsPolicy,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub(crate) fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_value(value.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let scheme = raw.server.scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::Invalid(format!(
                "server.scheme must be http or https, got '{}'",
                raw.server.scheme
            )));
        }
        let host = non_empty(raw.server.host).ok_or(ConfigError::Missing {
            key: "server.host",
            hint: "--url, HOUND_URL or [server] host",
        })?;
        let token_id = non_empty(raw.auth.token_id).ok_or(ConfigError::Missing {
            key: "auth.token_id",
            hint: "--token-id, HOUND_TOKEN_ID or [auth] token_id",
        })?;
        let token_key = non_empty(raw.auth.token_key).ok_or(ConfigError::Missing {
            key: "auth.token_key",
            hint: "--token-key, HOUND_TOKEN_KEY or [auth] token_key",
        })?;

        if raw.upload.chunk_size == 0 {
            return Err(ConfigError::Invalid("upload.chunk_size must be at least 1".to_string()));
        }
        let chunk_size = usize::try_from(raw.upload.chunk_size)
            .map_err(|_| ConfigError::Invalid("upload.chunk_size is too large".to_string()))?;
        let chunks_per_job = u32::try_from(raw.upload.chunks_per_job)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "upload.chunks_per_job must be in [1, {}], got {}",
                    u32::MAX,
                    raw.upload.chunks_per_job
                ))
            })?;

        let timeouts = TimeoutConfig {
            request_timeout_seconds: raw.timeouts.request_seconds,
            poll_interval_seconds: raw.timeouts.poll_interval_seconds,
            poll_max_wait_seconds: raw.timeouts.poll_max_wait_seconds,
        };
        timeouts.validate()?;

        let tls = if raw.tls.verify {
            TlsPolicy::Strict
        } else {
            TlsPolicy::AcceptInvalidCerts
        };

        Ok(Self {
            endpoint: Endpoint::new(scheme, host, raw.server.port),
            credentials: Credentials::new(token_id, token_key.into_bytes()),
            pipeline: PipelineConfig {
                chunk_size,
                orchestrator: OrchestratorConfig {
                    chunks_per_job,
                    poll: PollPolicy::from(&timeouts),
                },
            },
            timeouts,
            tls,
        })
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            request_timeout_seconds: self.timeouts.request_timeout_seconds,
            tls: self.tls,
        }
    }

    /// API client over a real HTTP backend
    pub fn build_client(&self) -> Result<ApiClient, TransportError> {
        let backend = ReqwestBackend::new(&self.http_config())?;
        let transport = Transport::new(Arc::new(backend), self.credentials.clone(), self.endpoint.clone());
        Ok(ApiClient::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuiltinDefaults, deep_merge};
    use serde_json::json;

    fn with(overlay: Value) -> Value {
        let base = deep_merge(
            BuiltinDefaults::default().to_value(),
            json!({"server": {"host": "bh.lab"}, "auth": {"token_id": "id", "token_key": "key"}}),
        );
        deep_merge(base, overlay)
    }

    #[test]
    fn test_defaults_produce_settings() {
        let settings = Settings::from_value(&with(json!({}))).unwrap();
        assert_eq!(settings.endpoint.base_url(), "https://bh.lab:443");
        assert_eq!(settings.credentials.token_id(), "id");
        assert_eq!(settings.pipeline.chunk_size, 250);
        assert_eq!(settings.pipeline.orchestrator.chunks_per_job, 50);
        assert_eq!(settings.pipeline.orchestrator.poll.max_wait.as_secs(), 1800);
        assert_eq!(settings.tls, TlsPolicy::Strict);
    }

    #[test]
    fn test_missing_host() {
        let value = deep_merge(BuiltinDefaults::default().to_value(), json!({}));
        let err = Settings::from_value(&value).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "server.host", .. }));
    }

    #[test]
    fn test_blank_token_key_is_missing() {
        let err = Settings::from_value(&with(json!({"auth": {"token_key": "  "}}))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "auth.token_key", .. }));
    }

    #[test]
    fn test_zero_chunk_values_rejected() {
        assert!(Settings::from_value(&with(json!({"upload": {"chunk_size": 0}}))).is_err());
        assert!(Settings::from_value(&with(json!({"upload": {"chunks_per_job": 0}}))).is_err());
    }

    #[test]
    fn test_timeout_bounds_checked() {
        let err = Settings::from_value(&with(json!({"timeouts": {"poll_max_wait_seconds": 0}}))).unwrap_err();
        assert!(matches!(err, ConfigError::Timeout(_)));
    }

    #[test]
    fn test_tls_verify_off() {
        let settings = Settings::from_value(&with(json!({"tls": {"verify": false}}))).unwrap();
        assert_eq!(settings.tls, TlsPolicy::AcceptInvalidCerts);
        assert_eq!(settings.http_config().tls, TlsPolicy::AcceptInvalidCerts);
    }

    #[test]
    fn test_bad_scheme() {
        assert!(matches!(
            Settings::from_value(&with(json!({"server": {"scheme": "ftp"}}))),
            Err(ConfigError::Invalid(_))
        ));
    }
}
