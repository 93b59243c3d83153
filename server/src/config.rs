//! Relay configuration from environment variables.
//!
//! `from_env` reads the process environment; `from_lookup` takes any
//! key → value lookup so parsing is testable without touching process state.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
/// Frames buffered per client before the relay starts dropping for it.
pub const DEFAULT_CLIENT_QUEUE: usize = 256;
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_host: IpAddr,
    pub port: u16,
    pub client_queue: usize,
    pub max_message_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST,
            port: DEFAULT_PORT,
            client_queue: DEFAULT_CLIENT_QUEUE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl RelayConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Unset or blank variables take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but does not parse, or
    /// if a size is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bind_host: parse_var(&lookup, "BIND_HOST", defaults.bind_host)?,
            port: parse_var(&lookup, "PORT", defaults.port)?,
            client_queue: parse_var(&lookup, "CLIENT_QUEUE", defaults.client_queue)?,
            max_message_bytes: parse_var(&lookup, "MAX_MESSAGE_BYTES", defaults.max_message_bytes)?,
        };
        if config.client_queue == 0 {
            return Err(ConfigError::Zero { var: "CLIENT_QUEUE" });
        }
        if config.max_message_bytes == 0 {
            return Err(ConfigError::Zero { var: "MAX_MESSAGE_BYTES" });
        }
        Ok(config)
    }

    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed.parse().map_err(|_| ConfigError::Invalid { var, value: raw.clone() })
}
