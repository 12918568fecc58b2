//! Failure injection for the mock API server
//!
//! Lets tests force a route to answer with an arbitrary status or body, or
//! to fail at the connection level, optionally only for the first N calls.

use std::collections::HashMap;

use hound_protocol::ServerError;

use super::Route;

/// What an injected failure does to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Answer with this status and body instead of the normal handler
    Respond { status: u16, body: String },
    /// Never answer; the transport sees a network error
    Network(String),
}

/// Failure configuration for one route
#[derive(Debug, Clone)]
pub struct FailureConfig {
    pub mode: FailureMode,
    /// Number of calls to fail before the route recovers (None = always)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Server error envelope with `message` and `status`
    pub fn status(status: u16, message: &str) -> Self {
        let body = serde_json::to_string(&ServerError::new(status, message)).unwrap_or_default();
        Self::raw(status, body)
    }

    /// Verbatim status and body
    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Respond {
                status,
                body: body.into(),
            },
            fail_count: None,
        }
    }

    /// Connection-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            mode: FailureMode::Network(message.into()),
            fail_count: None,
        }
    }

    /// Fail only the first `count` calls
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Per-route failure table
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Route, FailureConfig>,
    call_counts: HashMap<Route, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, route: Route, config: FailureConfig) {
        self.configs.insert(route, config);
        self.call_counts.insert(route, 0);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_route(&mut self, route: Route) {
        self.configs.remove(&route);
        self.call_counts.remove(&route);
    }

    /// Failure to apply to this call of `route`, if any
    pub fn check(&mut self, route: Route) -> Option<FailureMode> {
        let config = self.configs.get(&route)?;
        let count = self.call_counts.entry(route).or_insert(0);
        *count += 1;

        if let Some(limit) = config.fail_count {
            if *count > limit {
                return None;
            }
        }
        Some(config.mode.clone())
    }
}
