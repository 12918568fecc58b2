//! Timeouts for API calls and job polling
//!
//! - `request_timeout_seconds`: per HTTP call (enforced by the backend)
//! - `poll_interval_seconds`: sleep between job status checks
//! - `poll_max_wait_seconds`: longest wait for one job to reach a terminal status
//!
//! Polling is client-driven; the server has no notion of a poll deadline.
//! When `poll_max_wait_seconds` runs out the poller fails with `PollTimeout`.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-request timeout (default: 30)
    pub request_timeout_seconds: u64,

    /// Sleep between status checks (default: 3)
    pub poll_interval_seconds: u64,

    /// Maximum wait for one job (default: 1800 = 30 min)
    pub poll_max_wait_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            poll_interval_seconds: 3,
            poll_max_wait_seconds: 1800,
        }
    }
}

impl TimeoutConfig {
    /// Validate bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        // request_timeout_seconds must be in (0, 300]
        if self.request_timeout_seconds == 0 || self.request_timeout_seconds > 300 {
            return Err(TimeoutValidationError::RequestOutOfBounds {
                value: self.request_timeout_seconds,
            });
        }

        // poll_max_wait_seconds must be in (0, 86400]
        if self.poll_max_wait_seconds == 0 || self.poll_max_wait_seconds > 86400 {
            return Err(TimeoutValidationError::MaxWaitOutOfBounds {
                value: self.poll_max_wait_seconds,
            });
        }

        // poll_interval_seconds must be in (0, poll_max_wait_seconds]
        if self.poll_interval_seconds == 0 || self.poll_interval_seconds > self.poll_max_wait_seconds {
            return Err(TimeoutValidationError::IntervalOutOfBounds {
                value: self.poll_interval_seconds,
                max: self.poll_max_wait_seconds,
            });
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn poll_max_wait(&self) -> Duration {
        Duration::from_secs(self.poll_max_wait_seconds)
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeoutValidationError {
    #[error("request_timeout_seconds must be in (0, 300], got {value}")]
    RequestOutOfBounds { value: u64 },

    #[error("poll_max_wait_seconds must be in (0, 86400], got {value}")]
    MaxWaitOutOfBounds { value: u64 },

    #[error("poll_interval_seconds must be in (0, {max}], got {value}")]
    IntervalOutOfBounds { value: u64, max: u64 },
}

/// Wall-clock deadline for one wait
///
/// The deadline does not sleep or cancel anything itself; the caller checks
/// it between status checks.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    /// Start counting `limit` from now
    pub fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timeout_config_default() {
        let config = TimeoutConfig::default();
        assert_eq!(config.request_timeout_seconds, 30);
        assert_eq!(config.poll_interval_seconds, 3);
        assert_eq!(config.poll_max_wait_seconds, 1800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_request_bounds() {
        for value in [0, 301] {
            let config = TimeoutConfig {
                request_timeout_seconds: value,
                ..Default::default()
            };
            assert_eq!(
                config.validate(),
                Err(TimeoutValidationError::RequestOutOfBounds { value })
            );
        }
    }

    #[test]
    fn test_validation_max_wait_bounds() {
        for value in [0, 86401] {
            let config = TimeoutConfig {
                poll_max_wait_seconds: value,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(TimeoutValidationError::MaxWaitOutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_validation_interval_exceeds_max_wait() {
        let config = TimeoutConfig {
            poll_interval_seconds: 120,
            poll_max_wait_seconds: 60,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(TimeoutValidationError::IntervalOutOfBounds { value: 120, max: 60 })
        );
    }

    #[test]
    fn test_durations() {
        let config = TimeoutConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.poll_max_wait(), Duration::from_secs(1800));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_deadline_expires() {
        let deadline = Deadline::new(Duration::from_millis(30));
        assert!(!deadline.is_expired());
        sleep(Duration::from_millis(40));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_zero_deadline_is_expired() {
        assert!(Deadline::new(Duration::ZERO).is_expired());
    }
}
