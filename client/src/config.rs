//! Configuration management for the client.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Binaries call `dotenvy::dotenv()` first so a local `.env` file applies.

use crate::error::ConfigError;
use crate::reconnect::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const SERVER_URL: &str = "TICKETLINE_SERVER_URL";
const USERNAME: &str = "TICKETLINE_USERNAME";
const LOGIN_TIMEOUT_SECS: &str = "TICKETLINE_LOGIN_TIMEOUT_SECS";
const BROADCAST_CAPACITY: &str = "TICKETLINE_BROADCAST_CAPACITY";
const RECONNECT_MAX_ATTEMPTS: &str = "TICKETLINE_RECONNECT_MAX_ATTEMPTS";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Queue server endpoint
    pub server_url: String,
    /// Name used for login (may be empty until the user picks one)
    pub username: String,
    /// Seconds to wait for the server's answer to a login
    pub login_timeout_secs: u64,
    /// Capacity of each store's action broadcast channel
    pub broadcast_capacity: usize,
    /// Reconnect attempts before giving up
    pub reconnect_max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8080/ws".to_string(),
            username: String::new(),
            login_timeout_secs: 10,
            broadcast_capacity: 64,
            reconnect_max_attempts: 10,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable is set but
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable is set but
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            server_url: lookup(SERVER_URL).unwrap_or(defaults.server_url),
            username: lookup(USERNAME).unwrap_or(defaults.username),
            login_timeout_secs: parse(&lookup, LOGIN_TIMEOUT_SECS, defaults.login_timeout_secs)?,
            broadcast_capacity: parse(&lookup, BROADCAST_CAPACITY, defaults.broadcast_capacity)?,
            reconnect_max_attempts: parse(
                &lookup,
                RECONNECT_MAX_ATTEMPTS,
                defaults.reconnect_max_attempts,
            )?,
        })
    }

    /// Login timeout as a `Duration`
    #[must_use]
    pub const fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// Reconnect policy honouring `reconnect_max_attempts`
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::builder()
            .max_attempts(self.reconnect_max_attempts)
            .build()
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
    }
}
