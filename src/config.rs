//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every key has a default, so an empty
//! environment yields a working hub.

use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::MAX_QUEUE_CAPACITY;
use crate::error::HubError;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Slots in each connection's outbound queue.
    pub outbound_queue_capacity: usize,

    /// Period between heartbeat monitor sweeps.
    pub heartbeat_interval: Duration,

    /// Silence after which a connection is considered dead.
    pub heartbeat_timeout: Duration,

    /// Upper bound on a single socket write.
    pub write_timeout: Duration,

    /// Upper bound between accepting an upgrade and receiving the socket.
    pub handshake_timeout: Duration,

    /// Time allowed for connections to flush during shutdown.
    pub shutdown_grace: Duration,

    /// Timeout applied to plain REST requests.
    pub http_request_timeout: Duration,

    /// Tracing output format.
    pub log_format: LogFormat,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            outbound_queue_capacity: 64,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            write_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            http_request_timeout: Duration::from_secs(30),
            log_format: LogFormat::Text,
        }
    }
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set or cannot be
    /// parsed. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidConfig`] if `LISTEN_ADDR` is set but is not
    /// a valid socket address, or if the resulting values fail
    /// [`HubConfig::validate`].
    pub fn from_env() -> Result<Self, HubError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match std::env::var("LISTEN_ADDR") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| HubError::InvalidConfig(format!("LISTEN_ADDR {raw:?}: {e}")))?,
            Err(_) => defaults.listen_addr,
        };

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let config = Self {
            listen_addr,
            outbound_queue_capacity: parse_env(
                "HUB_OUTBOUND_QUEUE_CAPACITY",
                defaults.outbound_queue_capacity,
            ),
            heartbeat_interval: parse_env_secs(
                "HUB_HEARTBEAT_INTERVAL_SECS",
                defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_secs("HUB_HEARTBEAT_TIMEOUT_SECS", defaults.heartbeat_timeout),
            write_timeout: parse_env_secs("HUB_WRITE_TIMEOUT_SECS", defaults.write_timeout),
            handshake_timeout: parse_env_secs(
                "HUB_HANDSHAKE_TIMEOUT_SECS",
                defaults.handshake_timeout,
            ),
            shutdown_grace: parse_env_secs("HUB_SHUTDOWN_GRACE_SECS", defaults.shutdown_grace),
            http_request_timeout: parse_env_secs(
                "HTTP_REQUEST_TIMEOUT_SECS",
                defaults.http_request_timeout,
            ),
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values are mutually consistent.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidConfig`] for a zero-sized queue or one
    /// above [`MAX_QUEUE_CAPACITY`], a zero interval or timeout, or a
    /// heartbeat timeout shorter than one probe interval.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.outbound_queue_capacity == 0 {
            return Err(HubError::InvalidConfig(
                "outbound queue capacity must be positive".to_string(),
            ));
        }
        if self.outbound_queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(HubError::InvalidConfig(format!(
                "outbound queue capacity must not exceed {MAX_QUEUE_CAPACITY}"
            )));
        }
        if self.heartbeat_interval.is_zero() || self.heartbeat_timeout.is_zero() {
            return Err(HubError::InvalidConfig(
                "heartbeat interval and timeout must be positive".to_string(),
            ));
        }
        if self.heartbeat_timeout < self.heartbeat_interval {
            return Err(HubError::InvalidConfig(
                "heartbeat timeout must be at least one probe interval".to_string(),
            ));
        }
        if self.write_timeout.is_zero() || self.handshake_timeout.is_zero() {
            return Err(HubError::InvalidConfig(
                "write and handshake timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of consecutive unanswered probes that add up to the timeout.
    #[must_use]
    pub fn max_missed_probes(&self) -> u32 {
        let interval = self.heartbeat_interval.as_millis().max(1);
        let probes = self.heartbeat_timeout.as_millis().div_ceil(interval);
        u32::try_from(probes).unwrap_or(u32::MAX)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable holding whole seconds.
fn parse_env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.outbound_queue_capacity, 64);
        assert_eq!(config.max_missed_probes(), 3);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = HubConfig {
            outbound_queue_capacity: 0,
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_capacity_rejected() {
        let config = HubConfig {
            outbound_queue_capacity: usize::MAX,
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());

        let at_ceiling = HubConfig {
            outbound_queue_capacity: MAX_QUEUE_CAPACITY,
            ..HubConfig::default()
        };
        assert!(at_ceiling.validate().is_ok());
    }

    #[test]
    fn timeout_shorter_than_interval_rejected() {
        let config = HubConfig {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missed_probes_rounds_up() {
        let config = HubConfig {
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(100),
            ..HubConfig::default()
        };
        assert_eq!(config.max_missed_probes(), 4);
    }
}
