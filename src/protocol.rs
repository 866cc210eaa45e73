//! Wire formats of the marking site's JSON endpoints

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Autosave response: `{success: 0|1, errors?: {field: message}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValidationResult {
    /// Whether the group was accepted
    #[serde(deserialize_with = "flag")]
    pub success: bool,
    /// Message per rejected logical name
    #[serde(default, deserialize_with = "error_map")]
    pub errors: HashMap<String, String>,
}

impl ValidationResult {
    /// Accepted, no errors
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: HashMap::new(),
        }
    }

    /// Rejected with `errors`
    pub fn failed<I, K, V>(errors: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            success: false,
            errors: errors.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Message for `logical`, if it was rejected
    pub fn error_for(&self, logical: &str) -> Option<&str> {
        self.errors.get(logical).map(String::as_str)
    }
}

/// `1`, `true` or `"1"` count as success
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Error entries come as a message or a list of messages
fn error_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, String>, D::Error> {
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(field, value)| (field, message_text(&value)))
        .collect())
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(message_text).collect::<Vec<_>>().join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Options endpoint response: `{results: [descriptor, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OptionsResponse {
    /// Raw descriptors in server order
    #[serde(default)]
    pub results: Vec<Map<String, Value>>,
}

/// One option as the server describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDescriptor {
    /// Becomes the option value
    pub id: String,
    /// Becomes the option label
    pub label: String,
}

impl OptionsResponse {
    /// Descriptors in server order, label taken from `label_key`
    pub fn descriptors(&self, label_key: &str) -> Vec<OptionDescriptor> {
        self.results
            .iter()
            .map(|entry| OptionDescriptor {
                id: entry.get("id").map(scalar_text).unwrap_or_default(),
                label: entry.get(label_key).map(scalar_text).unwrap_or_default(),
            })
            .collect()
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
