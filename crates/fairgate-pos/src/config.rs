//! # POS Service Configuration
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults, and injected into service constructors - there is no
//! process-wide secret.
//!
//! The HMAC secret and both time constants MUST be identical across every
//! terminal and server instance: the secret feeds PIN hashes and offline
//! session tokens, and the constants define what both sides accept.

use std::env;

/// Replay window for terminal handshakes, in seconds (±).
pub const DEFAULT_REPLAY_WINDOW_SECS: i64 = 300;

/// Employee session lifetime: 12 hours.
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 12 * 60 * 60;

/// POS service configuration.
#[derive(Debug, Clone)]
pub struct PosConfig {
    /// Shared secret for HMAC operations (PIN hashes, offline tokens).
    pub hmac_secret: String,

    /// Maximum allowed |now - timestamp| on a handshake.
    pub replay_window_secs: i64,

    /// Session lifetime added at login and on each refresh.
    pub session_lifetime_secs: i64,
}

impl PosConfig {
    /// Creates a configuration with the given secret and default constants.
    pub fn new(hmac_secret: impl Into<String>) -> Self {
        PosConfig {
            hmac_secret: hmac_secret.into(),
            replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS,
            session_lifetime_secs: DEFAULT_SESSION_LIFETIME_SECS,
        }
    }

    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = PosConfig {
            hmac_secret: env::var("FAIRGATE_POS_SECRET").unwrap_or_else(|_| {
                // Development fallback.
                // In production this MUST be set via environment variable.
                "fairgate-dev-secret-change-in-production".to_string()
            }),

            replay_window_secs: env::var("FAIRGATE_REPLAY_WINDOW_SECS")
                .unwrap_or_else(|_| DEFAULT_REPLAY_WINDOW_SECS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FAIRGATE_REPLAY_WINDOW_SECS".into()))?,

            session_lifetime_secs: env::var("FAIRGATE_SESSION_LIFETIME_SECS")
                .unwrap_or_else(|_| DEFAULT_SESSION_LIFETIME_SECS.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FAIRGATE_SESSION_LIFETIME_SECS".into()))?,
        };

        if config.replay_window_secs <= 0 || config.session_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "time constants must be positive".into(),
            ));
        }

        Ok(config)
    }

    /// Sets the replay window.
    pub fn replay_window_secs(mut self, secs: i64) -> Self {
        self.replay_window_secs = secs;
        self
    }

    /// Sets the session lifetime.
    pub fn session_lifetime_secs(mut self, secs: i64) -> Self {
        self.session_lifetime_secs = secs;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
