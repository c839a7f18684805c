/// Errors produced by the format strategies.
///
/// These are absorbed at the record level: the public
/// [`LogParser::parse`](crate::LogParser::parse) entry point converts
/// any of them into a degenerate record instead of failing the batch.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The line does not conform to its declared format.
    #[error("Parse: malformed input: {0}")]
    MalformedInput(String),

    /// The `regex` format was requested without a pattern.
    #[error("Parse: missing configuration: {0}")]
    MissingConfig(&'static str),
}
