use serde_json::Value;
use std::fmt;

use crate::error::ConvergeError;

/// Identifier of one Marathon application, e.g. `/web` or `web`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(id: &str) -> Result<Self, ConvergeError> {
        if id.trim_matches('/').is_empty() {
            return Err(ConvergeError::Input(format!("invalid app id: {id:?}")));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as it appears in `/v2/apps/{id}` paths, without leading slashes.
    pub fn path_segment(&self) -> &str {
        self.0.trim_start_matches('/')
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sequence of object keys addressing a node inside a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a dotted path such as `container.docker.portMappings`.
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Walk the path. Returns `None` as soon as a segment is missing or the
    /// current node is not an object. A present `null` is returned as
    /// `Some(Value::Null)`.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(doc, |node, key| node.as_object()?.get(key))
    }

    pub fn resolve_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        self.0
            .iter()
            .try_fold(doc, |node, key| node.as_object_mut()?.get_mut(key))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Desired configuration of one application, as supplied by the caller.
/// Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSpec {
    id: AppId,
    doc: Value,
}

impl ApplicationSpec {
    /// Build a spec from a parsed document. The document must be an object
    /// with a string `id`.
    pub fn from_value(doc: Value) -> Result<Self, ConvergeError> {
        if !doc.is_object() {
            return Err(ConvergeError::Input(
                "application definition must be a JSON object".to_string(),
            ));
        }
        let id = match doc.get("id") {
            Some(Value::String(s)) => AppId::new(s)?,
            Some(other) => {
                return Err(ConvergeError::Input(format!(
                    "application id must be a string, got {other}"
                )))
            }
            None => {
                return Err(ConvergeError::Input(
                    "application definition has no 'id' field".to_string(),
                ))
            }
        };
        Ok(Self { id, doc })
    }

    /// Parse a JSON or YAML definition.
    pub fn parse(raw: &str) -> Result<Self, ConvergeError> {
        let doc: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            // YAML is a superset of JSON; only reach for it when JSON fails
            Err(_) => serde_yaml::from_str(raw)?,
        };
        Self::from_value(doc)
    }

    pub fn id(&self) -> &AppId {
        &self.id
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }
}

/// The scheduler's current view of an application, including injected fields
/// and runtime counters.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveApp {
    doc: Value,
}

impl LiveApp {
    pub fn new(doc: Value) -> Self {
        Self { doc }
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    pub fn into_document(self) -> Value {
        self.doc
    }

    /// Number of running task instances; a missing counter counts as zero.
    pub fn tasks_running(&self) -> u64 {
        self.doc
            .get("tasksRunning")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// Scheduler acknowledgment of an update or deletion, which Marathon answers
/// with the deployment it started. A JSON document, or a bare token wrapped
/// as a JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentAck(Value);

impl DeploymentAck {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(v) => Self(v),
            Err(_) => Self(Value::String(body.trim().to_string())),
        }
    }

    pub fn new(doc: Value) -> Self {
        Self(doc)
    }

    pub fn document(&self) -> &Value {
        &self.0
    }

    pub fn into_document(self) -> Value {
        self.0
    }
}
