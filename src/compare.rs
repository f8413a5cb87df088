use serde_json::{Map, Number, Value};
use similar::{ChangeTag, TextDiff};

use crate::document::FieldPath;

/// Top-level attributes that matter for convergence. Anything else the
/// scheduler reports (`version`, `tasksRunning`, `deployments`, ...) never
/// forces an update.
pub const UPDATE_ATTRIBUTES: &[&str] = &[
    "args",
    "backoffFactor",
    "backoffSeconds",
    "cmd",
    "constraints",
    "container",
    "cpus",
    "dependencies",
    "disk",
    "env",
    "executor",
    "fetch",
    "gpus",
    "healthChecks",
    "instances",
    "ipAddress",
    "killSelection",
    "labels",
    "maxLaunchDelaySeconds",
    "mem",
    "networks",
    "portDefinitions",
    "ports",
    "readinessChecks",
    "requirePorts",
    "residency",
    "secrets",
    "storeUrls",
    "taskKillGracePeriodSeconds",
    "unreachableStrategy",
    "upgradeStrategy",
    "uris",
    "user",
];

/// Removes `field` from the node at `at`. When that node is a list, the field
/// is removed from every object element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub at: FieldPath,
    pub field: String,
}

impl IgnoreRule {
    pub fn new(at: FieldPath, field: &str) -> Self {
        Self {
            at,
            field: field.to_string(),
        }
    }

    fn strip(&self, doc: &mut Value) {
        match self.at.resolve_mut(doc) {
            Some(Value::Array(items)) => {
                for item in items.iter_mut().filter_map(Value::as_object_mut) {
                    item.remove(&self.field);
                }
            }
            Some(Value::Object(map)) => {
                map.remove(&self.field);
            }
            _ => {}
        }
    }
}

/// Fields the scheduler injects unconditionally. Stripped from both sides
/// before any comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreMask {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMask {
    pub fn new(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// Marathon assigns `servicePort` to every port mapping, under
    /// `container.docker` before 1.5 and directly under `container` after.
    pub fn marathon() -> Self {
        Self::new(vec![
            IgnoreRule::new(FieldPath::parse("container.docker.portMappings"), "servicePort"),
            IgnoreRule::new(FieldPath::parse("container.portMappings"), "servicePort"),
        ])
    }

    /// A copy of `doc` with every masked field removed.
    pub fn apply(&self, doc: &Value) -> Value {
        let mut masked = doc.clone();
        for rule in &self.rules {
            rule.strip(&mut masked);
        }
        masked
    }
}

/// Order-independent, masked equality between desired and live documents.
#[derive(Debug, Clone)]
pub struct Comparator {
    mask: IgnoreMask,
    attributes: Vec<String>,
}

impl Comparator {
    pub fn new(mask: IgnoreMask, attributes: &[&str]) -> Self {
        Self {
            mask,
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Update-relevant attributes whose canonical values differ. An attribute
    /// missing from either side is not comparable and never reported; a
    /// present `null` is a value like any other.
    pub fn differing_attributes(&self, desired: &Value, live: &Value) -> Vec<String> {
        let desired = self.mask.apply(desired);
        let live = self.mask.apply(live);

        self.attributes
            .iter()
            .filter(|attr| match (desired.get(attr.as_str()), live.get(attr.as_str())) {
                (Some(d), Some(l)) => canonicalize(d) != canonicalize(l),
                _ => false,
            })
            .cloned()
            .collect()
    }

    pub fn equivalent(&self, desired: &Value, live: &Value) -> bool {
        self.differing_attributes(desired, live).is_empty()
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(IgnoreMask::marathon(), UPDATE_ATTRIBUTES)
    }
}

/// Normalize ordering: object keys sorted, list elements sorted by their
/// canonical serialization. Structurally equal documents canonicalize to equal
/// values regardless of key or element order. Numbers are compared by value,
/// so `128` and `128.0` are the same.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sorted_map(map, canonicalize)),
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(canonicalize).collect();
            items.sort_by_cached_key(|v| v.to_string());
            Value::Array(items)
        }
        Value::Number(n) => canonical_number(n),
        other => other.clone(),
    }
}

/// Marathon reports `cpus`, `mem` and `disk` as floats whatever the
/// definition used. Integers with an exact `f64` form become floats;
/// larger ones are left as they are.
fn canonical_number(n: &Number) -> Value {
    const EXACT: u64 = 1 << f64::MANTISSA_DIGITS;
    let exact = match (n.as_u64(), n.as_i64()) {
        (Some(u), _) => u <= EXACT,
        (None, Some(i)) => i.unsigned_abs() <= EXACT,
        (None, None) => true,
    };
    match n.as_f64().and_then(Number::from_f64) {
        Some(float) if exact => Value::Number(float),
        _ => Value::Number(n.clone()),
    }
}

/// Pretty-print with sorted keys and 4-space indentation. List order is kept.
pub fn render_canonical(value: &Value) -> String {
    let sorted = sort_keys(value);
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    match serde::Serialize::serialize(&sorted, &mut ser) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => sorted.to_string(),
    }
}

/// How much of a line diff to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DiffStyle {
    /// Unified diff with headers, hunk markers and three lines of context.
    #[default]
    Full,
    /// Only the removed and added lines.
    Compact,
}

/// Line diff from `before` (live) to `after` (desired). Identical inputs
/// yield no lines.
pub fn unified_diff(before: &str, after: &str, style: DiffStyle) -> Vec<String> {
    let diff = TextDiff::from_lines(before, after);
    match style {
        DiffStyle::Full => diff
            .unified_diff()
            .context_radius(3)
            .missing_newline_hint(false)
            .header("live", "desired")
            .to_string()
            .lines()
            .map(str::to_string)
            .collect(),
        DiffStyle::Compact => diff
            .iter_all_changes()
            .filter_map(|change| {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => return None,
                };
                Some(format!("{sign}{}", change.value().trim_end_matches('\n')))
            })
            .collect(),
    }
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sorted_map(map, sort_keys)),
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn sorted_map(map: &Map<String, Value>, each: fn(&Value) -> Value) -> Map<String, Value> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(k, v)| (k.clone(), each(v))).collect()
}
