//! Scrubbing of secret-bearing fields from JSON returned to clients.

use serde_json::Value;

/// Replacement for any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// Field names whose values are secrets, compared case-insensitively with
/// `_` and `-` ignored.
const SECRET_FIELDS: &[&str] = &["privatekey", "secretkey", "secret", "seed", "mnemonic"];

fn is_secret_field(name: &str) -> bool {
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    SECRET_FIELDS.contains(&normalized.as_str())
}

/// Replace every secret field, at any depth, with [`REDACTED`].
#[must_use]
pub fn redact_secret_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if is_secret_field(&key) {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact_secret_fields(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_secret_fields).collect()),
        other => other,
    }
}
