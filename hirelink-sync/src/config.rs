use std::time::Duration;

use tracing::{info, warn};

const DEFAULT_WS_URL: &str = "ws://localhost:9001";
const DEFAULT_API_URL: &str = "http://localhost:9002/";
const DEFAULT_ACK_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
const DEFAULT_NOTIFY_CAPACITY: usize = 64;

/// Runtime settings for the transport, snapshot client and coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub ws_url: String,
    pub api_base_url: String,
    /// Upper bound on waiting for a send acknowledgment.
    pub ack_timeout: Duration,
    pub fetch_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Reload inbox and active thread after the transport reconnects.
    pub resync_on_reconnect: bool,
    pub notify_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            ack_timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            resync_on_reconnect: true,
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Load settings from the environment (and `.env` if present).
    ///
    /// URLs follow build-time env -> runtime env -> default; everything else
    /// is runtime env -> default.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!(path = %path.display(), "Loaded .env file");
        }

        let build_time_ws = option_env!("HIRELINK_WS_URL");
        let build_time_api = option_env!("HIRELINK_API_URL");

        Self::from_lookup(|key| match key {
            "HIRELINK_WS_URL" if build_time_ws.is_some() => build_time_ws.map(String::from),
            "HIRELINK_API_URL" if build_time_api.is_some() => build_time_api.map(String::from),
            _ => std::env::var(key).ok(),
        })
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let config = Self {
            ws_url: lookup("HIRELINK_WS_URL").unwrap_or(defaults.ws_url),
            api_base_url: lookup("HIRELINK_API_URL").unwrap_or(defaults.api_base_url),
            ack_timeout: millis(&lookup, "HIRELINK_ACK_TIMEOUT_MS").unwrap_or(defaults.ack_timeout),
            fetch_timeout: millis(&lookup, "HIRELINK_FETCH_TIMEOUT_MS")
                .unwrap_or(defaults.fetch_timeout),
            reconnect_delay: millis(&lookup, "HIRELINK_RECONNECT_DELAY_MS")
                .unwrap_or(defaults.reconnect_delay),
            resync_on_reconnect: flag(&lookup, "HIRELINK_RESYNC_ON_RECONNECT")
                .unwrap_or(defaults.resync_on_reconnect),
            notify_capacity: defaults.notify_capacity,
        };

        info!(
            ws_url = %config.ws_url,
            api_base_url = %config.api_base_url,
            ack_timeout_ms = config.ack_timeout.as_millis() as u64,
            resync_on_reconnect = config.resync_on_reconnect,
            "Sync configuration"
        );

        config
    }
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid duration, using default");
            None
        }
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid flag, using default");
            None
        }
    }
}
