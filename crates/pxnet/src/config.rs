//! Connector configuration.
//!
//! Every type here is `serde`-enabled with field defaults so hosts can load a
//! partial configuration from whatever format they already use.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use pxnet_transport_traits::{LimitsConfig, TimeoutConfig};

use crate::error::{ConnectorError, ConnectorResult};

/// Chunk size for every transport read, handshake and framing alike.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default number of reconnect attempts per `connect` call.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Buffered notifications per `subscribe` receiver.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Reconnection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Number of open + handshake attempts per `connect` call (at least 1)
    pub max_attempts: u32,

    /// Delay before the second attempt; zero retries immediately
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Exponential backoff factor applied per further attempt
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Immediate retries, `max_attempts` times.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Exponential backoff starting at `initial_delay`.
    pub fn exponential(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier: 2.0,
        }
    }

    /// Delay to wait before the 1-indexed `attempt`.
    ///
    /// The first attempt never waits; attempt `k` waits
    /// `initial_delay * multiplier^(k-2)`, capped at `max_delay`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn validate(&self) -> ConnectorResult<()> {
        if self.max_attempts == 0 {
            return Err(ConnectorError::Configuration(
                "reconnect.max_attempts must be at least 1".into(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConnectorError::Configuration(format!(
                "reconnect.backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Full connector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Reconnect budget and backoff
    pub reconnect: ReconnectConfig,

    /// Connect, handshake, read and write timeouts
    pub timeouts: TimeoutConfig,

    /// Handshake, message and send size limits
    pub limits: LimitsConfig,

    /// Bytes requested per transport read
    pub read_chunk_size: usize,

    /// Buffered notifications per subscriber
    pub event_capacity: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ConnectorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reconnect budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.reconnect.max_attempts = max_attempts;
        self
    }

    /// Set reconnection configuration
    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// Set timeout configuration
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set size limits
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Set the per-read chunk size
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the per-subscriber notification buffer
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check the configuration for values the connector cannot run with.
    pub fn validate(&self) -> ConnectorResult<()> {
        self.reconnect.validate()?;
        if self.read_chunk_size == 0 {
            return Err(ConnectorError::Configuration(
                "read_chunk_size must be at least 1".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConnectorError::Configuration(
                "event_capacity must be at least 1".into(),
            ));
        }
        if self.limits.max_handshake_size == 0 {
            return Err(ConnectorError::Configuration(
                "limits.max_handshake_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
