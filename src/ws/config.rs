#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_millis(3000);
const DEFAULT_HANDSHAKE_TIMEOUT_DURATION: Duration = Duration::from_secs(20);
const DEFAULT_PATH: &str = "/socket.io/";

/// Configuration for a real-time connection.
///
/// ```
/// use std::time::Duration;
///
/// use floodwatch_client::ws::config::{Config, ReconnectConfig};
///
/// let config = Config::builder()
///     .reconnect(ReconnectConfig::default().with_delay(Duration::from_millis(500)))
///     .build();
/// assert_eq!(config.reconnect.max_attempts, Some(5));
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Upper bound for the Engine.IO open + Socket.IO connect exchange
    #[builder(default = DEFAULT_HANDSHAKE_TIMEOUT_DURATION)]
    pub handshake_timeout: Duration,
    /// Server path the Socket.IO endpoint is mounted on
    #[builder(into, default = DEFAULT_PATH.to_owned())]
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT_DURATION,
            path: DEFAULT_PATH.to_owned(),
        }
    }
}

/// Configuration for automatic reconnection behavior.
///
/// Attempts are spaced by a fixed delay rather than an exponential backoff so
/// that recovery timing is predictable for dashboard users.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Whether the transport retries on its own after an unexpected drop
    pub enabled: bool,
    /// Maximum number of consecutive failed attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            delay: DEFAULT_RECONNECT_DELAY_DURATION,
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns `true` once `failures` consecutive attempts exhaust this policy.
    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        if !self.enabled {
            return failures > 0;
        }
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

impl From<ReconnectConfig> for Constant {
    fn from(config: ReconnectConfig) -> Self {
        Constant::new(config.delay)
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn defaults_match_dashboard_policy() {
        let config = Config::default();

        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, Some(5));
        assert_eq!(config.reconnect.delay, Duration::from_millis(3000));
        assert_eq!(config.path, "/socket.io/");
    }

    #[test]
    fn builder_defaults_match_default() {
        let built = Config::builder().build();
        let default = Config::default();

        assert_eq!(built.reconnect.max_attempts, default.reconnect.max_attempts);
        assert_eq!(built.reconnect.delay, default.reconnect.delay);
        assert_eq!(built.handshake_timeout, default.handshake_timeout);
        assert_eq!(built.path, default.path);
    }

    #[test]
    fn constant_backoff_never_grows() {
        let mut backoff: Constant = ReconnectConfig::default().into();

        for _ in 0..10 {
            assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(3000)));
        }
    }

    #[test]
    fn exhausted_after_max_attempts() {
        let config = ReconnectConfig::default();

        assert!(!config.exhausted(4));
        assert!(config.exhausted(5));
    }

    #[test]
    fn disabled_reconnect_gives_up_after_first_failure() {
        let config = ReconnectConfig::default().with_enabled(false);

        assert!(!config.exhausted(0));
        assert!(config.exhausted(1));
    }

    #[test]
    fn unbounded_attempts_never_exhaust() {
        let config = ReconnectConfig::default().with_max_attempts(None);

        assert!(!config.exhausted(u32::MAX));
    }
}
