//! Multi-format log parsing.
//!
//! A [`LogParser`] turns a [`RawLogRecord`] into a [`ParsedLogRecord`]
//! according to the record's declared format: JSON objects (nested keys
//! flattened with `.`), whitespace-separated `key=value` lines, or a
//! caller-supplied regex with a capture-group field mapping. String
//! values whose content is a number with an optional unit suffix
//! (`ms`, `s`, `kb`, `mb`, `%`) are coerced to numeric fields.
//!
//! Parsing never fails at the batch level: a line that cannot be parsed
//! yields a degenerate record with an empty field map, which downstream
//! stages treat as unclassifiable.

pub mod error;
pub mod formats;
mod numeric;
mod timestamp;


use chrono::Utc;
use logwarden_common::{LogFormat, ParsedLogRecord, RawLogRecord};
use std::collections::HashMap;

pub use error::ParseError;

/// Stateless parser over the supported log formats.
#[derive(Debug, Default)]
pub struct LogParser;

impl LogParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a raw record, falling back to a degenerate record when
    /// the line cannot be parsed. The degenerate record keeps the
    /// service/source envelope, stamps the current time, and carries no
    /// fields, so no rule can match it.
    pub fn parse(&self, log: &RawLogRecord) -> ParsedLogRecord {
        match self.try_parse(log) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(
                    service = %log.service,
                    format = %log.format_type,
                    error = %e,
                    "Failed to parse log line, emitting unclassifiable record"
                );
                unclassifiable(log)
            }
        }
    }

    /// Parses a raw record, surfacing the format-specific error.
    pub fn try_parse(&self, log: &RawLogRecord) -> Result<ParsedLogRecord, ParseError> {
        match log.format_type {
            LogFormat::Json => formats::json::parse(log),
            LogFormat::KeyValue => formats::key_value::parse(log),
            LogFormat::Regex => formats::regex::parse(log),
        }
    }
}

fn unclassifiable(log: &RawLogRecord) -> ParsedLogRecord {
    ParsedLogRecord {
        raw_log: log.raw_log.clone(),
        service: log.service.clone(),
        source: log.source.clone(),
        timestamp: Utc::now(),
        log_level: None,
        message: None,
        fields: HashMap::new(),
    }
}
