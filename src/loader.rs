//! Collector payload loading
//!
//! Reads one JSON file into a [`Payload`]. Files written on Windows often
//! start with a UTF-8 byte order mark; it is skipped.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::chunker::Payload;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Loader errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} does not look like collector output: {reason}", path.display())]
    InvalidShape { path: PathBuf, reason: String },
}

/// Strip a leading UTF-8 BOM, if present
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Parse and validate payload bytes; `path` is only used in errors
pub fn parse_payload(path: &Path, bytes: &[u8]) -> Result<Payload, LoadError> {
    let value: Value = serde_json::from_slice(strip_bom(bytes)).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: &str| LoadError::InvalidShape {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let object = value.as_object().ok_or_else(|| invalid("top level is not an object"))?;
    match object.get("data") {
        Some(Value::Array(_)) => {}
        Some(_) => return Err(invalid("\"data\" is not an array")),
        None => {
            return Err(invalid(
                "missing \"data\" (older collectors used \"computers\", \"users\", ...)",
            ))
        }
    }
    match object.get("meta") {
        Some(Value::Object(_)) => {}
        Some(_) => return Err(invalid("\"meta\" is not an object")),
        None => return Err(invalid("missing \"meta\"")),
    }

    serde_json::from_value(value).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and validate one payload file
pub fn load_payload(path: &Path) -> Result<Payload, LoadError> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let payload = parse_payload(path, &bytes)?;
    tracing::debug!(
        path = %path.display(),
        records = payload.data.len(),
        data_type = %payload.meta.data_type,
        "loaded payload"
    );
    Ok(payload)
}
