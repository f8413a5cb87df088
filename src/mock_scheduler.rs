use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::document::{AppId, ApplicationSpec, DeploymentAck, FieldPath, LiveApp};
use crate::error::ConvergeError;
use crate::scheduler::Scheduler;

const FIRST_SERVICE_PORT: u64 = 10000;

/// Per-method call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub reads: u32,
    pub creates: u32,
    pub updates: u32,
    pub deletes: u32,
}

impl CallCounts {
    pub fn writes(&self) -> u32 {
        self.creates + self.updates + self.deletes
    }
}

#[derive(Default)]
struct MockState {
    apps: HashMap<String, Value>,
    /// Apps deleted but still visible for this many more reads.
    lingering: HashMap<String, u32>,
    calls: CallCounts,
    last_force: Option<bool>,
    next_service_port: u64,
}

/// In-memory scheduler for testing. Behaves like Marathon where it matters
/// for convergence: assigns `servicePort` to port mappings, stamps a
/// `version`, reports `tasksRunning`, and rejects duplicate creates.
/// Tracks calls for verification.
pub struct MockScheduler {
    endpoint: String,
    state: Mutex<MockState>,
    never_deploys: bool,
    delete_lag: u32,
    reject_create: Option<String>,
}

impl MockScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: "mock://marathon".to_string(),
            state: Mutex::new(MockState {
                next_service_port: FIRST_SERVICE_PORT,
                ..MockState::default()
            }),
            never_deploys: false,
            delete_lag: 0,
            reject_create: None,
        }
    }

    /// Created apps keep `tasksRunning: 0` forever.
    #[must_use]
    pub fn never_deploys(mut self) -> Self {
        self.never_deploys = true;
        self
    }

    /// Deleted apps stay readable for `reads` more reads.
    #[must_use]
    pub fn with_delete_lag(mut self, reads: u32) -> Self {
        self.delete_lag = reads;
        self
    }

    /// Every create fails with a 422 carrying `message`.
    #[must_use]
    pub fn rejecting_creates(mut self, message: &str) -> Self {
        self.reject_create = Some(message.to_string());
        self
    }

    /// Seed a live app as if it had been created earlier.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned or `doc` has no string `id`.
    pub fn insert(&self, doc: Value) {
        let key = doc["id"]
            .as_str()
            .map(|id| id.trim_start_matches('/').to_string())
            .expect("seeded app needs a string id");
        self.state.lock().unwrap().apps.insert(key, doc);
    }

    /// Current stored document for `id`, bypassing call counting.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn app(&self, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .apps
            .get(id.trim_start_matches('/'))
            .cloned()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    /// `force` flag of the most recent update or delete.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn last_force(&self) -> Option<bool> {
        self.state.lock().unwrap().last_force
    }

    /// Echo `desired` back the way Marathon stores it: resources as floats,
    /// a `servicePort` on every port mapping, task counters and a version.
    fn materialize(&self, state: &mut MockState, desired: &Value) -> Value {
        let mut doc = desired.clone();
        for mappings in ["container.docker.portMappings", "container.portMappings"] {
            if let Some(Value::Array(items)) = FieldPath::parse(mappings).resolve_mut(&mut doc) {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    let assigned = item.get("servicePort").and_then(Value::as_u64).unwrap_or(0);
                    if assigned == 0 {
                        item.insert("servicePort".to_string(), json!(state.next_service_port));
                        state.next_service_port += 1;
                    }
                }
            }
        }

        if let Some(map) = doc.as_object_mut() {
            for resource in ["cpus", "mem", "disk"] {
                if let Some(amount) = map.get(resource).and_then(Value::as_f64) {
                    map.insert(resource.to_string(), json!(amount));
                }
            }
        }

        let instances = doc.get("instances").and_then(Value::as_u64).unwrap_or(1);
        let running = if self.never_deploys { 0 } else { instances };
        if let Some(map) = doc.as_object_mut() {
            map.entry("instances").or_insert(json!(instances));
            map.insert("tasksRunning".to_string(), json!(running));
            map.insert("tasksStaged".to_string(), json!(0));
            map.insert(
                "version".to_string(),
                json!(format!("2024-01-01T00:00:{:02}.000Z", state.calls.writes())),
            );
        }
        doc
    }

    fn rejection(&self, id: &AppId, status: u16, message: String) -> ConvergeError {
        ConvergeError::Remote {
            app_id: id.to_string(),
            endpoint: self.endpoint.clone(),
            status,
            message,
            details: Vec::new(),
        }
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn read(&self, id: &AppId) -> Result<Option<LiveApp>, ConvergeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.reads += 1;
        let key = id.path_segment();

        match state.lingering.get(key).copied() {
            Some(remaining) if remaining > 0 => {
                state.lingering.insert(key.to_string(), remaining - 1);
                return Ok(Some(LiveApp::new(json!({"id": id.as_str(), "tasksRunning": 0}))));
            }
            Some(_) => {
                state.lingering.remove(key);
            }
            None => {}
        }
        Ok(state.apps.get(key).cloned().map(LiveApp::new))
    }

    async fn create(&self, spec: &ApplicationSpec) -> Result<LiveApp, ConvergeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.creates += 1;
        let key = spec.id().path_segment().to_string();

        if let Some(message) = &self.reject_create {
            return Err(self.rejection(spec.id(), 422, message.clone()));
        }
        if state.apps.contains_key(&key) {
            return Err(self.rejection(
                spec.id(),
                409,
                format!("An app with id [/{key}] already exists."),
            ));
        }
        let doc = self.materialize(&mut state, spec.document());
        state.apps.insert(key, doc.clone());
        Ok(LiveApp::new(doc))
    }

    async fn update(
        &self,
        spec: &ApplicationSpec,
        force: bool,
    ) -> Result<DeploymentAck, ConvergeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.updates += 1;
        state.last_force = Some(force);
        let key = spec.id().path_segment().to_string();

        let doc = self.materialize(&mut state, spec.document());
        let version = doc["version"].clone();
        state.apps.insert(key, doc);
        Ok(DeploymentAck::new(json!({"deploymentId": "mock-deployment", "version": version})))
    }

    async fn delete(&self, id: &AppId, force: bool) -> Result<DeploymentAck, ConvergeError> {
        let mut state = self.state.lock().unwrap();
        state.calls.deletes += 1;
        state.last_force = Some(force);
        let key = id.path_segment().to_string();

        if state.apps.remove(&key).is_none() {
            return Err(self.rejection(id, 404, format!("App '/{key}' does not exist")));
        }
        if self.delete_lag > 0 {
            state.lingering.insert(key, self.delete_lag);
        }
        Ok(DeploymentAck::new(json!({
            "deploymentId": "mock-deployment",
            "version": format!("2024-01-01T00:00:{:02}.000Z", state.calls.writes()),
        })))
    }
}
