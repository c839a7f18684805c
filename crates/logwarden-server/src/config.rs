use serde_json::{json, Value};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime settings, resolved from environment variables at startup.
/// Invalid values fall back to their defaults with a warning rather
/// than aborting startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_host: String,
    pub api_port: u16,
    pub model_path: PathBuf,
    pub model_contamination: f64,
    pub anomaly_threshold: f64,
    pub model_random_state: u64,
    pub min_train_samples: usize,
    pub max_recent_anomalies: usize,
    pub feedback_capacity: usize,
    pub request_timeout_secs: u64,
    /// `{service: {field: bound}}` threshold rule tables, user config
    /// merged over the built-in defaults.
    pub alert_conditions: Value,
    /// `{service: {count, window_seconds}}` rate rule tables, user
    /// config merged over the built-in defaults.
    pub complex_alert_rules: Value,
    pub slack_webhook_url: Option<String>,
    pub pagerduty_routing_key: Option<String>,
    pub generic_webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            model_path: PathBuf::from("models/isolation_forest_model.pkl"),
            model_contamination: 0.05,
            anomaly_threshold: 0.75,
            model_random_state: 42,
            min_train_samples: 10,
            max_recent_anomalies: 500,
            feedback_capacity: 1000,
            request_timeout_secs: 30,
            alert_conditions: default_alert_conditions(),
            complex_alert_rules: default_rate_rules(),
            slack_webhook_url: None,
            pagerduty_routing_key: None,
            generic_webhook_url: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let model_contamination = env_parse("MODEL_CONTAMINATION", defaults.model_contamination);
        let model_contamination = if model_contamination > 0.0 && model_contamination < 0.5 {
            model_contamination
        } else {
            tracing::warn!(
                value = model_contamination,
                "MODEL_CONTAMINATION must be in (0, 0.5), using default"
            );
            defaults.model_contamination
        };

        Self {
            api_host: env_string("API_HOST", &defaults.api_host),
            api_port: env_parse("API_PORT", defaults.api_port),
            model_path: PathBuf::from(env_string(
                "MODEL_PATH",
                &defaults.model_path.to_string_lossy(),
            )),
            model_contamination,
            anomaly_threshold: env_parse("ANOMALY_THRESHOLD", defaults.anomaly_threshold),
            model_random_state: env_parse("MODEL_RANDOM_STATE", defaults.model_random_state),
            min_train_samples: env_parse("MIN_TRAIN_SAMPLES", defaults.min_train_samples),
            max_recent_anomalies: env_parse("MAX_RECENT_ANOMALIES", defaults.max_recent_anomalies),
            feedback_capacity: env_parse("FEEDBACK_CAPACITY", defaults.feedback_capacity),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs),
            alert_conditions: merge_alert_conditions(env_opt("ALERT_CONDITIONS").as_deref()),
            complex_alert_rules: merge_rate_rules(env_opt("COMPLEX_ALERT_RULES").as_deref()),
            slack_webhook_url: env_opt("SLACK_WEBHOOK_URL"),
            pagerduty_routing_key: env_opt("PAGERDUTY_ROUTING_KEY"),
            generic_webhook_url: env_opt("GENERIC_WEBHOOK_URL"),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr + Display + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Built-in threshold tables, applied when `ALERT_CONDITIONS` is unset
/// and merged under user config otherwise.
pub fn default_alert_conditions() -> Value {
    json!({
        "web_server": {"response_time": 2000, "error_rate": 0.1},
        "database": {"query_time": 5000, "connection_count": 500, "error_rate": 0.05},
        "application": {"cpu_usage": 90, "memory_usage": 85, "thread_count": 300},
        "__default__": {"cpu_usage": 95, "memory_usage": 90, "error_rate": 0.2},
    })
}

/// Built-in rate rules, applied when `COMPLEX_ALERT_RULES` is unset and
/// merged under user config otherwise.
pub fn default_rate_rules() -> Value {
    json!({
        "web_server": {"count": 3, "window_seconds": 60},
        "database": {"count": 5, "window_seconds": 120},
        "application": {"count": 8, "window_seconds": 180},
        "__default__": {"count": 10, "window_seconds": 300},
    })
}

/// Merges user-supplied alert conditions over the defaults. Services
/// merge field by field so a user bound overrides only that field;
/// unparseable input keeps the defaults.
pub fn merge_alert_conditions(user: Option<&str>) -> Value {
    let mut merged = default_alert_conditions();
    let Some(raw) = user else {
        tracing::info!("No ALERT_CONDITIONS set, using default alert conditions");
        return merged;
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(services)) => {
            let table = merged.as_object_mut().expect("defaults are an object");
            for (service, bounds) in services {
                match (
                    table.get_mut(&service).and_then(Value::as_object_mut),
                    bounds.as_object(),
                ) {
                    (Some(existing), Some(overrides)) => {
                        for (field, bound) in overrides {
                            existing.insert(field.clone(), bound.clone());
                        }
                    }
                    _ => {
                        table.insert(service, bounds);
                    }
                }
            }
        }
        Ok(_) | Err(_) => {
            tracing::error!("Failed to parse ALERT_CONDITIONS JSON, using defaults");
        }
    }
    merged
}

/// Merges user-supplied rate rules over the defaults. Rules replace
/// whole services; unparseable input keeps the defaults.
pub fn merge_rate_rules(user: Option<&str>) -> Value {
    let mut merged = default_rate_rules();
    let Some(raw) = user else {
        tracing::info!("No COMPLEX_ALERT_RULES set, using default rate alert rules");
        return merged;
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(services)) => {
            let table = merged.as_object_mut().expect("defaults are an object");
            for (service, rule) in services {
                table.insert(service, rule);
            }
        }
        Ok(_) | Err(_) => {
            tracing::error!("Failed to parse COMPLEX_ALERT_RULES JSON, using defaults");
        }
    }
    merged
}
