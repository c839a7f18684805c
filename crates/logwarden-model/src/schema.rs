use logwarden_common::ParsedLogRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The ordered list of field names that defines how a parsed record
/// becomes a feature vector. Fixed for the lifetime of one trained
/// model; rebuilt only on successful retraining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Derives a schema from a training batch: the union of numeric
    /// field names seen across all records, in sorted order, so the
    /// same batch always yields the same schema.
    pub fn derive(records: &[ParsedLogRecord]) -> Self {
        let mut names = BTreeSet::new();
        for record in records {
            for (name, value) in &record.fields {
                if value.as_numeric().is_some() {
                    names.insert(name.clone());
                }
            }
        }
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Projects a record into a vector aligned with this schema.
    /// Missing or non-numeric fields map to 0.0; fields absent from the
    /// schema are dropped. The result always has exactly `len()`
    /// entries.
    pub fn project(&self, record: &ParsedLogRecord) -> Vec<f64> {
        self.names
            .iter()
            .map(|name| {
                record
                    .fields
                    .get(name)
                    .and_then(|value| value.as_numeric())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
