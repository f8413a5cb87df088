use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::compare::{render_canonical, unified_diff, Comparator, DiffStyle};
use crate::config::{ClientConfig, SyncPolicy};
use crate::document::{AppId, ApplicationSpec, LiveApp};
use crate::error::ConvergeError;
use crate::marathon_client::MarathonClient;
use crate::scheduler::Scheduler;
use crate::sync::{Condition, StatusSync};

/// What the caller wants the application to look like after this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Goal {
    /// Create if missing; never touch an existing app.
    Present,
    /// Delete if present.
    Absent,
    /// Create if missing, update if the definition drifted.
    Updated,
    /// Render live and desired definitions without changing anything.
    #[value(alias = "test")]
    Diff,
    /// Return the live definition; fail if missing.
    Get,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Goal::Present => "present",
            Goal::Absent => "absent",
            Goal::Updated => "updated",
            Goal::Diff => "diff",
            Goal::Get => "get",
        };
        f.write_str(name)
    }
}

/// The application a run acts on: a full definition, or only its id.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Spec(ApplicationSpec),
    Id(AppId),
}

impl Target {
    pub fn id(&self) -> &AppId {
        match self {
            Target::Spec(spec) => spec.id(),
            Target::Id(id) => id,
        }
    }
}

/// One validated request to the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub goal: Goal,
    pub target: Target,
    pub force: bool,
    pub diff_style: DiffStyle,
}

/// Canonical renderings of live (`before`) and desired (`after`) state, and
/// the line diff between them. `differs` is informational: it reports drift
/// in update-relevant attributes, not a change made to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub before: String,
    pub after: String,
    pub lines: Vec<String>,
    pub differs: bool,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Converged { document: Value, changed: bool },
    Diff(DiffReport),
}

impl Outcome {
    /// Whether the scheduler's state was mutated. Always false for a diff.
    pub fn changed(&self) -> bool {
        match self {
            Outcome::Converged { changed, .. } => *changed,
            Outcome::Diff(_) => false,
        }
    }

    fn unchanged(document: Value) -> Self {
        Outcome::Converged {
            document,
            changed: false,
        }
    }

    fn changed_to(document: Value) -> Self {
        Outcome::Converged {
            document,
            changed: true,
        }
    }
}

/// Decides and executes the single action that converges one application.
///
/// Every run starts from a fresh read of the scheduler; nothing is cached
/// between runs.
pub struct Reconciler {
    scheduler: Arc<dyn Scheduler>,
    comparator: Comparator,
    sync: StatusSync,
}

impl Reconciler {
    pub fn new(scheduler: Arc<dyn Scheduler>, comparator: Comparator, sync: StatusSync) -> Self {
        Self {
            scheduler,
            comparator,
            sync,
        }
    }

    /// Reconciler over a Marathon endpoint with the default comparator.
    pub fn connect(config: &ClientConfig, policy: SyncPolicy) -> Result<Self, ConvergeError> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(MarathonClient::new(config)?);
        let sync = StatusSync::new(scheduler.clone(), policy);
        Ok(Self::new(scheduler, Comparator::default(), sync))
    }

    pub fn endpoint(&self) -> &str {
        self.scheduler.endpoint()
    }

    pub async fn reconcile(&self, invocation: &Invocation) -> Result<Outcome, ConvergeError> {
        let Invocation {
            goal,
            target,
            force,
            diff_style,
        } = invocation;
        info!(app = %target.id(), endpoint = %self.endpoint(), %goal, force, "reconciling");

        match (goal, target) {
            (Goal::Present, Target::Spec(spec)) => self.ensure_present(spec).await,
            (Goal::Updated, Target::Spec(spec)) => self.ensure_updated(spec, *force).await,
            (Goal::Diff, Target::Spec(spec)) => self.diff(spec, *diff_style).await.map(Outcome::Diff),
            (Goal::Absent, target) => self.ensure_absent(target.id(), *force).await,
            (Goal::Get, target) => self.get(target.id()).await,
            (goal, Target::Id(id)) => Err(ConvergeError::Input(format!(
                "goal '{goal}' needs an application definition, only app id {id} was given"
            ))),
        }
    }

    /// Create the app if it does not exist. An existing app is left alone
    /// even if its definition differs.
    pub async fn ensure_present(&self, spec: &ApplicationSpec) -> Result<Outcome, ConvergeError> {
        match self.scheduler.read(spec.id()).await? {
            None => self.create_and_wait(spec).await.map(Outcome::changed_to),
            Some(live) => {
                info!(app = %spec.id(), "app already present");
                Ok(Outcome::unchanged(live.into_document()))
            }
        }
    }

    /// Delete the app if it exists and wait until the scheduler forgets it.
    pub async fn ensure_absent(&self, id: &AppId, force: bool) -> Result<Outcome, ConvergeError> {
        if self.scheduler.read(id).await?.is_none() {
            info!(app = %id, "app already absent");
            return Ok(Outcome::unchanged(Value::Null));
        }

        info!(app = %id, force, "deleting app");
        let record = self.scheduler.delete(id, force).await?;
        self.sync.await_condition(id, Condition::Absent).await?;
        Ok(Outcome::changed_to(record.into_document()))
    }

    /// Create the app if missing, otherwise update it when an update-relevant
    /// attribute drifted. Updates are not followed by a deployment wait.
    pub async fn ensure_updated(
        &self,
        spec: &ApplicationSpec,
        force: bool,
    ) -> Result<Outcome, ConvergeError> {
        match self.scheduler.read(spec.id()).await? {
            None => self.create_and_wait(spec).await.map(Outcome::changed_to),
            Some(live) => self.update_existing(spec, live, force).await,
        }
    }

    /// Render live and desired state and diff them line by line. Never writes.
    pub async fn diff(
        &self,
        spec: &ApplicationSpec,
        style: DiffStyle,
    ) -> Result<DiffReport, ConvergeError> {
        let live = self.scheduler.read(spec.id()).await?;
        let differs = match &live {
            Some(app) => !self.comparator.equivalent(spec.document(), app.document()),
            None => true,
        };
        let before = match &live {
            Some(app) => render_canonical(app.document()),
            None => render_canonical(&Value::Object(serde_json::Map::new())),
        };
        let after = render_canonical(spec.document());
        Ok(DiffReport {
            lines: unified_diff(&before, &after, style),
            before,
            after,
            differs,
        })
    }

    /// The live definition, unmodified.
    pub async fn get(&self, id: &AppId) -> Result<Outcome, ConvergeError> {
        let live = self.fail_if_not_running(id).await?;
        Ok(Outcome::unchanged(live.into_document()))
    }

    /// Create-only flow: refuse if the app already exists.
    pub async fn create_strict(&self, spec: &ApplicationSpec) -> Result<Outcome, ConvergeError> {
        self.fail_if_running(spec.id()).await?;
        self.create_and_wait(spec).await.map(Outcome::changed_to)
    }

    /// Update-only flow: refuse if the app does not exist.
    pub async fn update_strict(
        &self,
        spec: &ApplicationSpec,
        force: bool,
    ) -> Result<Outcome, ConvergeError> {
        let live = self.fail_if_not_running(spec.id()).await?;
        self.update_existing(spec, live, force).await
    }

    pub async fn fail_if_running(&self, id: &AppId) -> Result<(), ConvergeError> {
        match self.scheduler.read(id).await? {
            None => Ok(()),
            Some(live) => Err(self.precondition(
                id,
                format!("application already exists: {}", live.document()),
            )),
        }
    }

    pub async fn fail_if_not_running(&self, id: &AppId) -> Result<LiveApp, ConvergeError> {
        self.scheduler
            .read(id)
            .await?
            .ok_or_else(|| self.precondition(id, "application could not be found".to_string()))
    }

    async fn create_and_wait(&self, spec: &ApplicationSpec) -> Result<Value, ConvergeError> {
        info!(app = %spec.id(), "creating app");
        let created = self.scheduler.create(spec).await?;
        self.sync
            .await_condition(spec.id(), Condition::Deployed)
            .await?;
        let current = self.scheduler.read(spec.id()).await?;
        Ok(current.map_or_else(|| created.into_document(), LiveApp::into_document))
    }

    /// Compare and, on drift, issue one update. Returns the live definition
    /// as it was before the update.
    async fn update_existing(
        &self,
        spec: &ApplicationSpec,
        live: LiveApp,
        force: bool,
    ) -> Result<Outcome, ConvergeError> {
        let drifted = self
            .comparator
            .differing_attributes(spec.document(), live.document());
        if drifted.is_empty() {
            info!(app = %spec.id(), "app up to date");
            return Ok(Outcome::unchanged(live.into_document()));
        }

        info!(app = %spec.id(), ?drifted, force, "updating app");
        self.scheduler.update(spec, force).await?;
        Ok(Outcome::changed_to(live.into_document()))
    }

    fn precondition(&self, id: &AppId, reason: String) -> ConvergeError {
        ConvergeError::Precondition {
            app_id: id.to_string(),
            endpoint: self.endpoint().to_string(),
            reason,
        }
    }
}
