use serde::Deserialize;
use ws_runtime::StopDetectorConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct JanitorConfig {
    /// Base URL of the workspace API, e.g. `http://che-host:8080/api`.
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    #[serde(default = "default_api_token")]
    pub api_token: Option<String>,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_events_retry_delay")]
    pub events_retry_delay_ms: u64,

    /// How often running containers are (re)registered for stop detection.
    #[serde(default = "default_tracking_interval")]
    pub tracking_interval_secs: u64,

    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
}

fn default_api_endpoint() -> String {
    std::env::var("WS_JANITOR_API_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:8080/api".to_string())
}

fn default_api_token() -> Option<String> {
    std::env::var("WS_JANITOR_API_TOKEN")
        .ok()
        .filter(|token| !token.is_empty())
}

fn default_cleanup_interval() -> u64 {
    std::env::var("WS_JANITOR_CLEANUP_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3600) // 1 hour
}

fn default_events_retry_delay() -> u64 {
    std::env::var("WS_JANITOR_EVENTS_RETRY_DELAY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000)
}

fn default_tracking_interval() -> u64 {
    std::env::var("WS_JANITOR_TRACKING_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30)
}

fn default_docker_binary() -> String {
    std::env::var("WS_JANITOR_DOCKER_BINARY").unwrap_or_else(|_| "docker".to_string())
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            api_token: default_api_token(),
            cleanup_interval_secs: default_cleanup_interval(),
            events_retry_delay_ms: default_events_retry_delay(),
            tracking_interval_secs: default_tracking_interval(),
            docker_binary: default_docker_binary(),
        }
    }
}

impl JanitorConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn stop_detector(&self) -> StopDetectorConfig {
        StopDetectorConfig {
            retry_delay_ms: self.events_retry_delay_ms,
            ..StopDetectorConfig::default()
        }
    }
}
