use async_trait::async_trait;

use crate::document::{AppId, ApplicationSpec, DeploymentAck, LiveApp};
use crate::error::ConvergeError;

/// Read/write access to the scheduler's application resource.
///
/// A read never fails for a missing application: "not found" is `Ok(None)`.
/// Writes perform no idempotence checks of their own; callers read first.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Endpoint this accessor talks to, used in error reports.
    fn endpoint(&self) -> &str;

    async fn read(&self, id: &AppId) -> Result<Option<LiveApp>, ConvergeError>;

    /// Create the application. Fails if the scheduler rejects the definition
    /// or an application with this id already exists.
    async fn create(&self, spec: &ApplicationSpec) -> Result<LiveApp, ConvergeError>;

    /// Replace the live configuration. `force` overrides a deployment lock.
    async fn update(
        &self,
        spec: &ApplicationSpec,
        force: bool,
    ) -> Result<DeploymentAck, ConvergeError>;

    /// Delete the application. `force` overrides a deployment lock.
    async fn delete(&self, id: &AppId, force: bool) -> Result<DeploymentAck, ConvergeError>;
}
