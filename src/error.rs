use crate::sync::Condition;

/// Errors produced while converging a Marathon application.
///
/// Every remote-facing variant carries the app id and the scheduler endpoint so
/// a failure can always be traced back to the workload it concerned.
#[derive(Debug, thiserror::Error)]
pub enum ConvergeError {
    #[error("scheduler {endpoint} rejected request for app {app_id} (HTTP {status}): {message}")]
    Remote {
        app_id: String,
        endpoint: String,
        status: u16,
        message: String,
        details: Vec<serde_json::Value>,
    },

    #[error("app {app_id} on {endpoint} did not become {condition} after {attempts} checks")]
    Timeout {
        app_id: String,
        endpoint: String,
        condition: Condition,
        attempts: u32,
    },

    #[error("app {app_id} on {endpoint}: {reason}")]
    Precondition {
        app_id: String,
        endpoint: String,
        reason: String,
    },

    #[error("invalid input: {0}")]
    Input(String),

    #[error("transport error talking to {endpoint} about app {app_id}: {source}")]
    Transport {
        app_id: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http client setup: {0}")]
    ClientSetup(#[source] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConvergeError {
    /// Process exit code for this failure. Bad invocations exit 2, everything
    /// that reached the scheduler exits 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvergeError::Input(_) => 2,
            _ => 1,
        }
    }

    /// Structured details from the scheduler, empty for non-remote failures.
    pub fn details(&self) -> &[serde_json::Value] {
        match self {
            ConvergeError::Remote { details, .. } => details,
            _ => &[],
        }
    }
}
