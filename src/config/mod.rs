//! Layered configuration
//!
//! Four layers, later layers winning:
//! 1. Built-in defaults
//! 2. TOML config file (`--config` or `HOUND_CONFIG`)
//! 3. `HOUND_*` environment variables
//! 4. CLI flags
//!
//! Layers are merged as JSON values, recorded with their provenance in an
//! [`EffectiveConfig`], and then validated into typed [`Settings`].

mod defaults;
mod effective;
mod merge;
mod overrides;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigOrigin, ConfigSource, EffectiveConfig, REDACTED};
pub use merge::{deep_merge, merge_layers};
pub use overrides::{env_overrides, Overrides, CONFIG_ENV_VAR, ENV_PREFIX};
pub use settings::Settings;

use std::path::PathBuf;

use crate::credentials::EndpointError;
use crate::report::ExitCode;
use crate::timeout::TimeoutValidationError;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {var}: {message}")]
    Env { var: String, message: String },

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Timeout(#[from] TimeoutValidationError),

    #[error("missing {key} (set it with {hint})")]
    Missing { key: &'static str, hint: &'static str },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::Config
    }
}
