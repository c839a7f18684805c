use crate::error::ParseError;
use crate::{numeric, timestamp};
use chrono::{DateTime, Utc};
use logwarden_common::{ParsedLogRecord, RawLogRecord};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const LEVEL_TOKENS: &[&str] = &["INFO", "WARN", "ERROR", "DEBUG", "FATAL"];

fn pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(\w+)=("[^"]*"|\S+)"#).expect("key=value regex is valid"))
}

/// Parses a whitespace-separated `key=value` log line. Tokens before
/// the first pair may carry an ISO-8601 timestamp and a bare uppercase
/// level keyword.
pub fn parse(log: &RawLogRecord) -> Result<ParsedLogRecord, ParseError> {
    let mut fields = HashMap::new();
    let mut ts: Option<DateTime<Utc>> = None;
    let mut level = None;
    let mut message = None;

    let prefix_end = pair_re()
        .find(&log.raw_log)
        .map(|m| m.start())
        .unwrap_or(log.raw_log.len());
    for token in log.raw_log[..prefix_end].split_whitespace() {
        if ts.is_none() {
            if let Some(parsed) = timestamp::parse(token) {
                ts = Some(parsed);
                continue;
            }
        }
        if level.is_none() && LEVEL_TOKENS.contains(&token) {
            level = Some(token.to_string());
        }
    }

    for caps in pair_re().captures_iter(&log.raw_log) {
        let key = &caps[1];
        let value = caps[2].trim_matches('"');
        match key {
            "timestamp" => {
                if let Some(parsed) = timestamp::parse(value) {
                    ts = Some(parsed);
                }
            }
            "level" => level = Some(value.to_string()),
            "message" => message = Some(value.to_string()),
            _ => {
                // Last pair wins on duplicate keys.
                fields.insert(key.to_string(), numeric::field_from_str(value));
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
