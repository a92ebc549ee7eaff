//! Client configuration

use std::time::Duration;

/// Default WebSocket endpoint of the dashboard's data server
const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";

/// How long a single connection attempt may take before it is failed
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between outbound heartbeat probes while connected
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Gap since the last inbound frame after which the connection is unhealthy
const LIVENESS_THRESHOLD: Duration = Duration::from_secs(90);

/// Reconnect delay base
const RECONNECT_DELAY_BASE: Duration = Duration::from_secs(1);

/// Max reconnect attempts
const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Configuration for [`FeedClient`](crate::FeedClient)
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket URL of the data server
    pub url: String,
    /// Timeout for one connection attempt
    pub connect_timeout: Duration,
    /// Interval between heartbeat probe frames
    pub heartbeat_interval: Duration,
    /// Liveness threshold for `is_healthy()`
    pub liveness_threshold: Duration,
    /// Base delay of the exponential reconnect backoff
    pub base_delay: Duration,
    /// Reconnect attempts before the client gives up with a terminal error
    pub max_attempts: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            liveness_threshold: LIVENESS_THRESHOLD,
            base_delay: RECONNECT_DELAY_BASE,
            max_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl FeedConfig {
    /// Default configuration with the endpoint taken from `MARKETFEED_WS_URL`
    /// when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("MARKETFEED_WS_URL") {
            config.url = url;
        }
        config
    }

    /// Replace the endpoint URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}
