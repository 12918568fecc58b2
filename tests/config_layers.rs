//! Configuration layering: builtin < file < env < CLI

use std::io::Write;

use hound_ingest::config::{env_overrides, ConfigError, ConfigOrigin, EffectiveConfig, Overrides, REDACTED};
use hound_ingest::transport::TlsPolicy;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const FILE: &str = r#"
[server]
scheme = "https"
host = "bloodhound.file"
port = 8443

[auth]
token_id = "file-id"
token_key = "file-key"

[upload]
chunk_size = 500
chunks_per_job = 20
"#;

#[test]
fn test_cli_beats_env_beats_file() {
    let file = config_file(FILE);
    let env = env_overrides([
        ("HOUND_URL", "https://bloodhound.env:443"),
        ("HOUND_CHUNK_SIZE", "400"),
        ("HOUND_TOKEN_KEY", "env-key"),
    ])
    .unwrap()
    .to_value()
    .unwrap();
    let cli = Overrides {
        chunk_size: Some(300),
        ..Default::default()
    }
    .to_value()
    .unwrap();

    let effective = EffectiveConfig::build(Some(file.path()), env, cli).unwrap();
    let settings = effective.settings().unwrap();

    assert_eq!(settings.pipeline.chunk_size, 300);
    assert_eq!(settings.pipeline.orchestrator.chunks_per_job, 20);
    assert_eq!(settings.endpoint.base_url(), "https://bloodhound.env:443");
    assert_eq!(settings.credentials.token_id(), "file-id");
    assert_eq!(settings.credentials.token_key(), b"env-key");

    let origins: Vec<ConfigOrigin> = effective.sources.iter().map(|s| s.origin).collect();
    assert_eq!(
        origins,
        vec![ConfigOrigin::Builtin, ConfigOrigin::File, ConfigOrigin::Env, ConfigOrigin::Cli]
    );
}

#[test]
fn test_builtin_defaults_fill_gaps() {
    let cli = Overrides {
        url: Some("http://localhost:8080".into()),
        token_id: Some("id".into()),
        token_key: Some("key".into()),
        ..Default::default()
    }
    .to_value()
    .unwrap();

    let settings = EffectiveConfig::build(None, None, cli).unwrap().settings().unwrap();

    assert_eq!(settings.pipeline.chunk_size, 250);
    assert_eq!(settings.pipeline.orchestrator.chunks_per_job, 50);
    assert_eq!(settings.timeouts.poll_interval_seconds, 3);
    assert_eq!(settings.timeouts.poll_max_wait_seconds, 1800);
    assert_eq!(settings.timeouts.request_timeout_seconds, 30);
    assert_eq!(settings.tls, TlsPolicy::Strict);
}

#[test]
fn test_token_key_redacted_in_dump() {
    let file = config_file(FILE);
    let effective = EffectiveConfig::build(Some(file.path()), None, None).unwrap();

    let dump = effective.to_json().unwrap();
    assert!(!dump.contains("file-key"));
    assert!(dump.contains(REDACTED));
    assert!(dump.contains("file-id"));
    assert_eq!(effective.redactions, vec!["auth.token_key".to_string()]);
    assert_eq!(effective.settings().unwrap().credentials.token_key(), b"file-key");
}

#[test]
fn test_file_digest_recorded() {
    let file = config_file(FILE);
    let effective = EffectiveConfig::build(Some(file.path()), None, None).unwrap();

    let source = &effective.sources[1];
    let expected = file.path().to_string_lossy().to_string();
    assert_eq!(source.path.as_deref(), Some(expected.as_str()));
    let digest = source.digest.as_deref().unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_insecure_from_env() {
    let file = config_file(FILE);
    let env = env_overrides([("HOUND_INSECURE", "1")]).unwrap().to_value().unwrap();
    let settings = EffectiveConfig::build(Some(file.path()), env, None)
        .unwrap()
        .settings()
        .unwrap();
    assert_eq!(settings.tls, TlsPolicy::AcceptInvalidCerts);
}

#[test]
fn test_missing_credentials_reported() {
    let cli = Overrides {
        url: Some("https://bloodhound.lab:443".into()),
        ..Default::default()
    }
    .to_value()
    .unwrap();
    let err = EffectiveConfig::build(None, None, cli).unwrap().settings().unwrap_err();
    assert!(matches!(err, ConfigError::Missing { key: "auth.token_id", .. }));
    assert!(err.to_string().contains("HOUND_TOKEN_ID"));
}

#[test]
fn test_poll_interval_above_max_wait_rejected() {
    let file = config_file(FILE);
    let cli = Overrides {
        poll_interval_seconds: Some(120),
        poll_max_wait_seconds: Some(60),
        ..Default::default()
    }
    .to_value()
    .unwrap();
    let err = EffectiveConfig::build(Some(file.path()), None, cli)
        .unwrap()
        .settings()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Timeout(_)));
}
