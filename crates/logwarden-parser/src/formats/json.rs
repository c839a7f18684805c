use crate::error::ParseError;
use crate::{numeric, timestamp};
use chrono::{DateTime, Utc};
use logwarden_common::{FieldValue, ParsedLogRecord, RawLogRecord};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parses a JSON object log line. Nested objects are flattened with
/// `.`-joined keys. The top-level `timestamp`, `level` and `message`
/// keys populate the record envelope instead of the field map.
pub fn parse(log: &RawLogRecord) -> Result<ParsedLogRecord, ParseError> {
    let value: Value = serde_json::from_str(&log.raw_log)
        .map_err(|e| ParseError::MalformedInput(format!("invalid JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::MalformedInput("JSON log must be an object".to_string()))?;

    let mut fields = HashMap::new();
    let mut ts: Option<DateTime<Utc>> = None;
    let mut level = None;
    let mut message = None;

    for (key, val) in obj {
        match (key.as_str(), val) {
            ("timestamp", Value::String(s)) => ts = timestamp::parse(s),
            ("level", Value::String(s)) => level = Some(s.clone()),
            ("message", Value::String(s)) => message = Some(s.clone()),
            _ => insert_value(&mut fields, key, val),
        }
    }

    Ok(ParsedLogRecord {
        raw_log: log.raw_log.clone(),
        service: log.service.clone(),
        source: log.source.clone(),
        timestamp: ts.unwrap_or_else(Utc::now),
        log_level: level,
        message,
        fields,
    })
}

fn insert_value(fields: &mut HashMap<String, FieldValue>, key: &str, value: &Value) {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                fields.insert(key.to_string(), FieldValue::Numeric(f));
            }
        }
        Value::String(s) => {
            fields.insert(key.to_string(), numeric::field_from_str(s));
        }
        Value::Object(nested) => flatten(fields, key, nested),
        // Booleans, nulls and arrays carry no feature signal.
        Value::Bool(_) | Value::Null | Value::Array(_) => {}
    }
}

fn flatten(fields: &mut HashMap<String, FieldValue>, prefix: &str, obj: &Map<String, Value>) {
    for (key, val) in obj {
        let joined = format!("{prefix}.{key}");
        insert_value(fields, &joined, val);
    }
}
