//! Retry and timeout configuration for a session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the session engine.
///
/// Deserializable from any serde format; missing fields take their
/// defaults, durations are given in milliseconds:
///
/// ```json
/// { "retry_count": 5, "command_timeout": 60000, "suppress_syntax_errors": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Attempts of the prompt-wait loop and of each mode-convergence loop.
    pub retry_count: u32,

    /// Read granularity, and the base of the prompt-wait backoff.
    #[serde(with = "millis")]
    pub poll_interval: Duration,

    /// Upper bound of a whole command/response exchange.
    #[serde(with = "millis")]
    pub command_timeout: Duration,

    /// Report device error markers in the response instead of failing.
    pub suppress_syntax_errors: bool,

    /// Log connectivity failures and return a failed response instead.
    pub suppress_connection_errors: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            retry_count: 10,
            poll_interval: Duration::from_millis(100),
            command_timeout: Duration::from_secs(30),
            suppress_syntax_errors: false,
            suppress_connection_errors: false,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
