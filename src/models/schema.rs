use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MergeError, Result};
use crate::models::{FieldValue, RawSample, Source};

/// Semantic kind of a field, used for schema reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
}

impl FieldKind {
    pub fn of(value: &FieldValue) -> Self {
        match value {
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Number => f.write_str("number"),
            FieldKind::Text => f.write_str("text"),
        }
    }
}

/// The reconciled field set of one source stream: the superset of field names
/// seen across all samples, each with a single stable kind.
///
/// New fields appearing mid-stream widen the schema (rows before them are
/// null-filled). A field changing kind is irreconcilable and fails the merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl StreamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the schema, widening or failing on kind change.
    pub fn absorb(&mut self, sample: &RawSample) -> Result<()> {
        for (name, value) in &sample.fields {
            let kind = FieldKind::of(value);
            match self.fields.get(name) {
                None => {
                    self.fields.insert(name.clone(), kind);
                }
                Some(existing) if *existing == kind => {}
                Some(existing) => {
                    return Err(MergeError::SchemaMismatch {
                        stream: sample.source,
                        field: name.clone(),
                        details: format!(
                            "field was {} at first sight but {} at timestamp {}",
                            existing, kind, sample.timestamp
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build the reconciled schema over a whole sample slice.
    pub fn from_samples(samples: &[RawSample]) -> Result<Self> {
        let mut schema = Self::new();
        for sample in samples {
            schema.absorb(sample)?;
        }
        Ok(schema)
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).copied()
    }

    /// Field names in deterministic (sorted) order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An ordered sequence of samples from one source, with its reconciled schema.
#[derive(Debug, Clone)]
pub struct SourceStream {
    pub source: Source,
    pub samples: Vec<RawSample>,
    pub schema: StreamSchema,
}

impl SourceStream {
    /// Build a stream from samples in file order, reconciling the schema.
    /// Ordering by timestamp is the merger's concern, not checked here.
    pub fn new(source: Source, samples: Vec<RawSample>) -> Result<Self> {
        let schema = StreamSchema::from_samples(&samples)?;
        Ok(Self {
            source,
            samples,
            schema,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// First and last timestamps in time order, if any samples exist.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let min = self.samples.iter().map(|s| s.timestamp).min()?;
        let max = self.samples.iter().map(|s| s.timestamp).max()?;
        Some((min, max))
    }
}
