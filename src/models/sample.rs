use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MergeError, Result};

/// The three telemetry sources the collectors emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    State,
    Pmc,
    Rapl,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::State, Source::Pmc, Source::Rapl];

    /// Column prefix used to namespace this source's fields in merged output.
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Source::State => "state",
            Source::Pmc => "pmc",
            Source::Rapl => "rapl",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_prefix())
    }
}

/// A single field value: numeric or categorical, nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => Some(s.as_str()),
        }
    }

    /// Convert a JSON value into a field value. Booleans become 0/1 because
    /// the collectors emit flags as integers; nulls yield None (absent field).
    pub fn from_json(value: &Value) -> Result<Option<FieldValue>> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(FieldValue::Number(if *b { 1.0 } else { 0.0 }))),
            Value::Number(n) => {
                let f = n.as_f64().ok_or_else(|| {
                    MergeError::InvalidFormat(format!("non-finite numeric value: {}", n))
                })?;
                Ok(Some(FieldValue::Number(f)))
            }
            Value::String(s) => Ok(Some(FieldValue::Text(s.clone()))),
            Value::Array(_) | Value::Object(_) => Err(MergeError::InvalidFormat(
                "nested arrays/objects are not valid field values".to_string(),
            )),
        }
    }
}

/// One parsed record from a single source log. The `timestamp` key is lifted
/// out of the field map; everything else is carried through as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub source: Source,
    pub timestamp: i64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RawSample {
    pub fn new(source: Source, timestamp: i64, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            source,
            timestamp,
            fields,
        }
    }
}
