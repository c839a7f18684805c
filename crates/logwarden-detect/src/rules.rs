use crate::FALLBACK_SERVICE;
use logwarden_common::{ParsedLogRecord, RuleViolation};
use std::collections::HashMap;

/// One per-field upper bound. Violation means strictly greater.
#[derive(Debug, Clone)]
pub struct ThresholdBound {
    pub field: String,
    pub max: f64,
}

/// Per-service threshold rule tables with a `__default__` fallback.
///
/// Within a service the bounds keep their configured order, and the
/// first violated bound wins. A service with its own table is checked
/// against that table only; the fallback applies to services with no
/// entry.
#[derive(Debug, Clone, Default)]
pub struct ThresholdRules {
    services: HashMap<String, Vec<ThresholdBound>>,
}

impl ThresholdRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds rule tables from a `{service: {field: bound}}` JSON
    /// object. Non-numeric bounds are skipped with a warning.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let mut services = HashMap::new();
        let Some(table) = value.as_object() else {
            if !value.is_null() {
                tracing::warn!("Alert conditions must be a JSON object, ignoring");
            }
            return Self::default();
        };

        for (service, bounds) in table {
            let Some(bounds) = bounds.as_object() else {
                tracing::warn!(service = %service, "Alert conditions entry is not an object, skipping");
                continue;
            };
            let mut parsed = Vec::with_capacity(bounds.len());
            for (field, bound) in bounds {
                match bound.as_f64() {
                    Some(max) => parsed.push(ThresholdBound {
                        field: field.clone(),
                        max,
                    }),
                    None => {
                        tracing::warn!(
                            service = %service,
                            field = %field,
                            "Threshold bound is not numeric, skipping"
                        );
                    }
                }
            }
            services.insert(service.clone(), parsed);
        }
        Self { services }
    }

    /// Evaluates a record against the active table for its service.
    /// Returns the first violation in configured order, if any.
    pub fn evaluate(&self, record: &ParsedLogRecord) -> Option<RuleViolation> {
        let table = self
            .services
            .get(&record.service)
            .or_else(|| self.services.get(FALLBACK_SERVICE))?;

        for bound in table {
            let Some(actual) = record
                .fields
                .get(&bound.field)
                .and_then(|value| value.as_numeric())
            else {
                continue;
            };
            if actual > bound.max {
                return Some(RuleViolation {
                    rule_name: bound.field.clone(),
                    threshold: bound.max,
                    actual_value: actual,
                });
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
