//! Configuration for the relayer.

use std::time::Duration;

use crate::relay::{FanoutPolicy, DEFAULT_OUTBOUND_BUFFER};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("FANOUT_POLICY: {0}")]
    FanoutPolicy(String),
}

/// Relayer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub fanout_policy: FanoutPolicy,
    /// `0` disables keepalive pings.
    pub ping_interval_secs: u64,
    pub outbound_buffer: usize,
    pub bridge_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = get("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);
        let fanout_policy = match get("FANOUT_POLICY") {
            Some(v) => v.parse().map_err(ConfigError::FanoutPolicy)?,
            None => FanoutPolicy::Scoped,
        };
        let ping_interval_secs = get("PING_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let outbound_buffer = get("OUTBOUND_BUFFER")
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_OUTBOUND_BUFFER);
        let bridge_api_key = get("BRIDGE_API_KEY").filter(|k| !k.is_empty());

        Ok(Self {
            host,
            port,
            fanout_policy,
            ping_interval_secs,
            outbound_buffer,
            bridge_api_key,
        })
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }

    /// Loopback config with pings off and an open bridge.
    pub fn for_test() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            fanout_policy: FanoutPolicy::Scoped,
            ping_interval_secs: 0,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            bridge_api_key: None,
        }
    }
}
