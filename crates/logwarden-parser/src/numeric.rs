use logwarden_common::FieldValue;
use regex::Regex;
use std::sync::OnceLock;

/// Matches a whole string that is a number with an optional unit
/// suffix. The unit is stripped, never scaled: `"85%"` coerces to 85.0.
fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*([-+]?(?:\d+\.?\d*|\.\d+))\s*(?:ms|s|kb|mb|%)?\s*$")
            .expect("numeric coercion regex is valid")
    })
}

/// Coerces a string to a numeric value when its entire content is a
/// number with an optional unit suffix.
pub fn coerce(value: &str) -> Option<f64> {
    numeric_re()
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Classifies a string value as numeric or text.
pub fn field_from_str(value: &str) -> FieldValue {
    match coerce(value) {
        Some(n) => FieldValue::Numeric(n),
        None => FieldValue::Text(value.to_string()),
    }
}
