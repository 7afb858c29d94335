use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::Result;

/// Field holding the event time, RFC 3339 encoded.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// A structured application event: an ordered mapping of field name to value.
///
/// Field order is the insertion order and is kept through serialization, so
/// the canonical string form ([`fmt::Display`]) is stable for a given event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    fields: Map<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one JSON object into an event.
    pub fn from_json(input: &str) -> Result<Self> {
        let fields: Map<String, Value> = serde_json::from_str(input)?;
        Ok(Self { fields })
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Looks up a field reference.
    ///
    /// A bare name addresses a top-level field. The bracket form
    /// `[outer][inner]` walks into nested objects.
    pub fn get_path(&self, reference: &str) -> Option<&Value> {
        let mut parts = reference_parts(reference).into_iter();
        let mut current = self.fields.get(parts.next()?)?;

        for part in parts {
            current = current.get(part)?;
        }

        Some(current)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The event time taken from `@timestamp`, if present and well-formed.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.fields.get(TIMESTAMP_FIELD)?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

impl From<Map<String, Value>> for Event {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

/// Renders a field value the way it appears inside a template.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

fn reference_parts(reference: &str) -> Vec<&str> {
    if reference.starts_with('[') && reference.ends_with(']') {
        reference[1..reference.len() - 1].split("][").collect()
    } else {
        vec![reference]
    }
}
