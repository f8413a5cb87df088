use std::time::Duration;

/// Connection settings for one Marathon endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ClientConfig {
    /// Config for `endpoint` with default timeout and no credentials.
    /// A trailing `/` on the endpoint is dropped.
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(30),
            username: None,
            password: None,
        }
    }
}

/// Poll budget for waiting on a scheduler condition: fixed interval, bounded
/// number of checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(3),
        }
    }
}
