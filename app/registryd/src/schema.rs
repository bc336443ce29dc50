//! JSON Schema of the configuration file.

use crate::config::RegistryConfig;

/// Schema identifier embedded as `$id`.
const SCHEMA_ID: &str = "https://registryd.invalid/registryd.schema.json";

/// Generates a JSON Schema for the registryd configuration.
#[must_use]
pub fn generate_schema() -> schemars::Schema {
    let mut schema = schemars::schema_for!(RegistryConfig);

    if let Some(obj) = schema.as_object_mut() {
        obj.insert("$id".to_string(), serde_json::json!(SCHEMA_ID));
    }

    schema
}

/// Generates a pretty-printed JSON Schema string.
#[must_use]
pub fn generate_schema_json() -> String {
    let schema = generate_schema();
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_schema_produces_valid_json() {
        let schema_json = generate_schema_json();
        let parsed: serde_json::Value = serde_json::from_str(&schema_json).unwrap();

        assert!(parsed["$id"].as_str().unwrap().ends_with("registryd.schema.json"));
        assert_eq!(parsed["title"], "RegistryConfig");
        assert!(parsed["properties"]["mousePoll"].is_object());
        assert!(parsed["properties"]["listenerTimeoutMs"].is_object());
    }

    #[test]
    fn test_schema_contains_nested_configs() {
        let parsed: serde_json::Value = serde_json::from_str(&generate_schema_json()).unwrap();
        assert!(parsed["$defs"]["BusConfig"].is_object());
        assert!(parsed["$defs"]["KeyboardConfig"].is_object());
    }

    #[test]
    fn test_schema_json_is_pretty_printed() {
        assert!(generate_schema_json().contains('\n'));
    }
}
