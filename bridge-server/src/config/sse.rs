use serde::Deserialize;
use sse_session::SessionOptions;
use std::time::Duration;

/// Configuration for streaming sessions
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SseConfig {
    /// Path clients post messages to, announced in the first stream event (default: /message)
    pub endpoint: String,

    /// Interval between keep-alive comments in seconds (default: 15)
    pub keep_alive: u64,

    /// Outbound messages buffered per session (default: 64)
    pub channel_capacity: usize,

    /// Posted messages queued per session before posts answer 429 (default: 64)
    pub inbound_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            endpoint: "/message".to_string(),
            keep_alive: 15,
            channel_capacity: 64,
            inbound_capacity: 64,
        }
    }
}

impl SseConfig {
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive.max(1))
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            channel_capacity: self.channel_capacity,
            inbound_capacity: self.inbound_capacity,
        }
    }
}
