use crate::error::ParseError;
use crate::{numeric, timestamp};
use chrono::{DateTime, Utc};
use logwarden_common::{ParsedLogRecord, RawLogRecord};
use regex::Regex;
use std::collections::HashMap;

/// Parses a log line with a caller-supplied pattern. Capture groups are
/// named through `field_mapping`, keyed by the group index as a decimal
/// string starting at `"0"`. The names `timestamp`, `level` and
/// `message` route into the record envelope.
pub fn parse(log: &RawLogRecord) -> Result<ParsedLogRecord, ParseError> {
    let config = log
        .custom_config
        .as_ref()
        .ok_or(ParseError::MissingConfig("regex format requires custom_config"))?;
    let pattern = config
        .pattern
        .as_deref()
        .ok_or(ParseError::MissingConfig("regex format requires a pattern"))?;

    let re = Regex::new(pattern)
        .map_err(|e| ParseError::MalformedInput(format!("invalid pattern: {e}")))?;
    let caps = re
        .captures(&log.raw_log)
        .ok_or_else(|| ParseError::MalformedInput("pattern did not match".to_string()))?;

    let mut fields = HashMap::new();
    let mut ts: Option<DateTime<Utc>> = None;
    let mut level = None;
    let mut message = None;

    for (index, group) in caps.iter().skip(1).enumerate() {
        let Some(m) = group else { continue };
        let Some(name) = config.field_mapping.get(&index.to_string()) else {
            continue;
        };
        match name.as_str() {
            "timestamp" => ts = timestamp::parse(m.as_str()),
            "level" => level = Some(m.as_str().to_string()),
            "message" => message = Some(m.as_str().to_string()),
            _ => {
                fields.insert(name.clone(), numeric::field_from_str(m.as_str()));
            }
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
