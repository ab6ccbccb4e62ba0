use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub type Tags = BTreeMap<String, String>;
pub type Fields = BTreeMap<String, FieldValue>;

/// A single value taken from the fetched document.
///
/// Objects and arrays are not flattened; they travel as `Nested` and the sink decides how
/// to store them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    UInteger(u64),
    Float(f64),
    String(String),
    Nested(Value),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::UInteger(u)
                } else {
                    // serde_json only yields finite floats
                    FieldValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => FieldValue::String(s),
            nested @ (Value::Array(_) | Value::Object(_)) => FieldValue::Nested(nested),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Tags,
    fields: Fields,
    timestamp: DateTime<Utc>,
}

impl Point {
    pub fn build(measurement: impl Into<String>, tags: Tags, fields: Fields, now: DateTime<Utc>) -> Self {
        Point {
            measurement: measurement.into(),
            tags,
            fields,
            timestamp: now,
        }
    }

    pub fn now(measurement: impl Into<String>, tags: Tags, fields: Fields) -> Self {
        Self::build(measurement, tags, fields, Utc::now())
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
