use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// How long to wait for every broker to report, in minutes.
    #[serde(default = "default_wait_timeout_min")]
    pub wait_timeout_min: u64,
}

fn default_wait_timeout_min() -> u64 {
    std::env::var("WS_BROKER_WAIT_TIMEOUT_MIN")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3)
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            wait_timeout_min: default_wait_timeout_min(),
        }
    }
}

impl BrokerConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_min * 60)
    }
}
