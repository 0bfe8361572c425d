//! Client timing and queue configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectPolicy;

/// Tunables for the connection manager and the conversation store.
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub reconnect: ReconnectPolicy,
    /// Frames held while disconnected; newer frames are dropped past this.
    pub send_queue_capacity: usize,
    /// Quiet period before the "thinking" indicator appears.
    pub loading_indicator_delay_ms: u64,
    /// Watchdog that clears the "creating session" state.
    pub session_create_timeout_ms: u64,
    pub project_status_updating_ms: u64,
    pub project_status_success_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            send_queue_capacity: 256,
            loading_indicator_delay_ms: 200,
            session_create_timeout_ms: 3_000,
            project_status_updating_ms: 500,
            project_status_success_ms: 2_000,
        }
    }
}

impl ClientConfig {
    pub fn loading_indicator_delay(&self) -> Duration {
        Duration::from_millis(self.loading_indicator_delay_ms)
    }

    pub fn session_create_timeout(&self) -> Duration {
        Duration::from_millis(self.session_create_timeout_ms)
    }

    pub fn project_status_updating(&self) -> Duration {
        Duration::from_millis(self.project_status_updating_ms)
    }

    pub fn project_status_success(&self) -> Duration {
        Duration::from_millis(self.project_status_success_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"reconnect":{"max_attempts":0},"send_queue_capacity":8}"#)
                .expect("parse partial config");
        assert_eq!(config.send_queue_capacity, 8);
        assert_eq!(config.reconnect.max_attempts, 0);
        assert_eq!(config.reconnect.base_delay_ms, 3_000);
        assert_eq!(config.loading_indicator_delay(), Duration::from_millis(200));
        assert_eq!(config.session_create_timeout(), Duration::from_secs(3));
    }
}
