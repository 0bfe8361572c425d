//! Reconnection backoff policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded exponential backoff: `min(base * multiplier^attempt, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Consecutive retries before giving up. `0` retries forever.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 3_000,
            multiplier: 1.5,
            max_delay_ms: 30_000,
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the retry that follows `attempt` consecutive failures.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        if !millis.is_finite() || millis >= self.max_delay_ms as f64 {
            return Duration::from_millis(self.max_delay_ms);
        }
        Duration::from_millis(millis.round() as u64)
    }

    /// Whether `attempts` retries have used up the budget.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }
}
