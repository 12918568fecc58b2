//! Environment and CLI override layers
//!
//! Both layers carry the same set of settings, so both are built from an
//! [`Overrides`] value. Only fields that are set end up in the layer.

use serde_json::{json, Map, Value};

use super::ConfigError;
use crate::credentials::Endpoint;

/// Prefix of every environment variable read as configuration
pub const ENV_PREFIX: &str = "HOUND_";

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "HOUND_CONFIG";

/// Settings that can be overridden above the file layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// `scheme://host:port`; split into its parts when layered
    pub url: Option<String>,
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub token_id: Option<String>,
    pub token_key: Option<String>,
    pub chunk_size: Option<u64>,
    pub chunks_per_job: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
    pub poll_interval_seconds: Option<u64>,
    pub poll_max_wait_seconds: Option<u64>,
    /// Accept invalid TLS certificates
    pub insecure: Option<bool>,
}

fn insert<T: Into<Value>>(map: &mut Map<String, Value>, section: &str, key: &str, value: Option<T>) {
    if let Some(value) = value {
        let entry = map.entry(section).or_insert_with(|| json!({}));
        if let Value::Object(section) = entry {
            section.insert(key.to_string(), value.into());
        }
    }
}

impl Overrides {
    /// Layer value, or `None` when nothing is set
    pub fn to_value(&self) -> Result<Option<Value>, ConfigError> {
        let mut map = Map::new();

        if let Some(url) = &self.url {
            let endpoint = Endpoint::parse(url)?;
            insert(&mut map, "server", "scheme", Some(endpoint.scheme));
            insert(&mut map, "server", "host", Some(endpoint.host));
            insert(&mut map, "server", "port", Some(endpoint.port));
        }
        insert(&mut map, "server", "scheme", self.scheme.clone());
        insert(&mut map, "server", "host", self.host.clone());
        insert(&mut map, "server", "port", self.port);
        insert(&mut map, "auth", "token_id", self.token_id.clone());
        insert(&mut map, "auth", "token_key", self.token_key.clone());
        insert(&mut map, "upload", "chunk_size", self.chunk_size);
        insert(&mut map, "upload", "chunks_per_job", self.chunks_per_job);
        insert(&mut map, "timeouts", "request_seconds", self.request_timeout_seconds);
        insert(&mut map, "timeouts", "poll_interval_seconds", self.poll_interval_seconds);
        insert(&mut map, "timeouts", "poll_max_wait_seconds", self.poll_max_wait_seconds);
        insert(&mut map, "tls", "verify", self.insecure.map(|insecure| !insecure));

        if map.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Object(map)))
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        message: format!("expected a non-negative integer, got '{}'", value),
    })
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Env {
            var: var.to_string(),
            message: format!("expected true or false, got '{}'", value),
        }),
    }
}

/// Collect `HOUND_*` variables into overrides.
///
/// Takes the variables as pairs so tests need not touch the process
/// environment.
pub fn env_overrides<I, K, V>(vars: I) -> Result<Overrides, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut overrides = Overrides::default();
    for (name, value) in vars {
        let (name, value) = (name.as_ref(), value.as_ref());
        let Some(key) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        match key {
            "URL" => overrides.url = Some(value.to_string()),
            "SCHEME" => overrides.scheme = Some(value.to_ascii_lowercase()),
            "HOST" => overrides.host = Some(value.to_string()),
            "PORT" => overrides.port = Some(parse_number(name, value)?),
            "TOKEN_ID" => overrides.token_id = Some(value.to_string()),
            "TOKEN_KEY" => overrides.token_key = Some(value.to_string()),
            "CHUNK_SIZE" => overrides.chunk_size = Some(parse_number(name, value)?),
            "CHUNKS_PER_JOB" => overrides.chunks_per_job = Some(parse_number(name, value)?),
            "REQUEST_TIMEOUT" => overrides.request_timeout_seconds = Some(parse_number(name, value)?),
            "POLL_INTERVAL" => overrides.poll_interval_seconds = Some(parse_number(name, value)?),
            "POLL_MAX_WAIT" => overrides.poll_max_wait_seconds = Some(parse_number(name, value)?),
            "INSECURE" => overrides.insecure = Some(parse_bool(name, value)?),
            "CONFIG" => {}
            _ => tracing::debug!(var = name, "ignoring unknown environment variable"),
        }
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_overrides_have_no_layer() {
        assert_eq!(Overrides::default().to_value().unwrap(), None);
    }

    #[test]
    fn test_url_is_split() {
        let overrides = Overrides {
            url: Some("http://bh.lab:8080".into()),
            ..Default::default()
        };
        let value = overrides.to_value().unwrap().unwrap();
        assert_eq!(value["server"]["scheme"], "http");
        assert_eq!(value["server"]["host"], "bh.lab");
        assert_eq!(value["server"]["port"], 8080);
    }

    #[test]
    fn test_url_without_port_rejected() {
        let overrides = Overrides {
            url: Some("https://bh.lab".into()),
            ..Default::default()
        };
        assert!(matches!(overrides.to_value(), Err(ConfigError::Endpoint(_))));
    }

    #[test]
    fn test_insecure_flips_verify() {
        let overrides = Overrides {
            insecure: Some(true),
            ..Default::default()
        };
        assert_eq!(overrides.to_value().unwrap().unwrap()["tls"]["verify"], false);
    }

    #[test]
    fn test_env_overrides() {
        let vars = [
            ("HOUND_TOKEN_ID", "abc"),
            ("HOUND_CHUNK_SIZE", "100"),
            ("HOUND_INSECURE", "yes"),
            ("HOUND_CONFIG", "/etc/hound.toml"),
            ("PATH", "/usr/bin"),
        ];
        let overrides = env_overrides(vars).unwrap();
        assert_eq!(overrides.token_id.as_deref(), Some("abc"));
        assert_eq!(overrides.chunk_size, Some(100));
        assert_eq!(overrides.insecure, Some(true));
        assert_eq!(overrides.url, None);
    }

    #[test]
    fn test_env_bad_number() {
        let err = env_overrides([("HOUND_CHUNKS_PER_JOB", "many")]).unwrap_err();
        assert!(err.to_string().contains("HOUND_CHUNKS_PER_JOB"));
    }
}
