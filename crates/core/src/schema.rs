//! Minimal JSON-Schema checker for tool arguments and structured outputs.
//!
//! Supports the subset tools and output shapes actually declare: `type`
//! (including type arrays), `enum`, `properties`, `required`,
//! `additionalProperties: false`, `items`, `minItems`/`maxItems`,
//! `minLength`/`maxLength` (counted in characters) and
//! `minimum`/`maximum`. Unknown keywords are ignored.

use serde_json::Value;
use thiserror::Error;

/// One failed constraint at a JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// `$`-rooted path, e.g. `$.letter` or `$.files[2].kind`.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All violations found in one instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.violations))]
pub struct SchemaError {
    pub violations: Vec<SchemaViolation>,
}

fn render(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate `instance` against `schema`.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), SchemaError> {
    let mut violations = Vec::new();
    check(schema, instance, "$", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { violations })
    }
}

/// Check that a tool's parameter schema is usable: an object schema whose
/// `required` entries are all declared in `properties`.
pub fn check_object_schema(schema: &Value) -> Result<(), String> {
    let Some(obj) = schema.as_object() else {
        return Err("schema must be a JSON object".into());
    };
    if obj.get("type").and_then(Value::as_str) != Some("object") {
        return Err("root schema must have \"type\": \"object\"".into());
    }
    let properties = match obj.get("properties") {
        None => None,
        Some(Value::Object(p)) => Some(p),
        Some(_) => return Err("\"properties\" must be an object".into()),
    };
    match obj.get("required") {
        None => Ok(()),
        Some(Value::Array(required)) => {
            for name in required {
                let Some(name) = name.as_str() else {
                    return Err("\"required\" entries must be strings".into());
                };
                if !properties.is_some_and(|p| p.contains_key(name)) {
                    return Err(format!("required property '{name}' is not declared"));
                }
            }
            Ok(())
        }
        Some(_) => Err("\"required\" must be an array".into()),
    }
}

fn check(schema: &Value, instance: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let Some(schema) = schema.as_object() else {
        return;
    };

    match schema.get("type") {
        Some(Value::String(expected)) if !type_matches(expected, instance) => {
            fail(out, path, format!("expected {expected}, got {}", type_name(instance)));
            return;
        }
        Some(Value::Array(options)) => {
            let ok = options
                .iter()
                .filter_map(Value::as_str)
                .any(|t| type_matches(t, instance));
            if !ok {
                fail(out, path, format!("unexpected type {}", type_name(instance)));
                return;
            }
        }
        _ => {}
    }

    if let Some(Value::Array(allowed)) = schema.get("enum")
        && !allowed.contains(instance)
    {
        fail(out, path, format!("value {instance} is not one of {}", Value::Array(allowed.clone())));
    }

    match instance {
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
                && len < min
            {
                fail(out, path, format!("length {len} is shorter than {min}"));
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
                && len > max
            {
                fail(out, path, format!("length {len} is longer than {max}"));
            }
        }
        Value::Number(n) => {
            let value = n.as_f64().unwrap_or(f64::NAN);
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
                && value < min
            {
                fail(out, path, format!("{value} is less than minimum {min}"));
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
                && value > max
            {
                fail(out, path, format!("{value} is greater than maximum {max}"));
            }
        }
        Value::Array(items) => {
            let len = items.len() as u64;
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64)
                && len < min
            {
                fail(out, path, format!("{len} item(s), expected at least {min}"));
            }
            if let Some(max) = schema.get("maxItems").and_then(Value::as_u64)
                && len > max
            {
                fail(out, path, format!("{len} item(s), expected at most {max}"));
            }
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{i}]"), out);
                }
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(required)) = schema.get("required") {
                for name in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(name) {
                        fail(out, path, format!("missing required property '{name}'"));
                    }
                }
            }
            let properties = schema.get("properties").and_then(Value::as_object);
            if let Some(properties) = properties {
                for (name, sub) in properties {
                    if let Some(value) = map.get(name) {
                        check(sub, value, &format!("{path}.{name}"), out);
                    }
                }
            }
            if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                for name in map.keys() {
                    if !properties.is_some_and(|p| p.contains_key(name)) {
                        fail(out, path, format!("unexpected property '{name}'"));
                    }
                }
            }
        }
        _ => {}
    }
}

fn fail(out: &mut Vec<SchemaViolation>, path: &str, message: String) {
    out.push(SchemaViolation {
        path: path.to_string(),
        message,
    });
}

fn type_matches(expected: &str, instance: &Value) -> bool {
    match expected {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => true,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn letter_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "letter": { "type": "string", "minLength": 1, "maxLength": 1 }
            },
            "required": ["text", "letter"]
        })
    }

    #[test]
    fn accepts_valid_instance() {
        assert!(validate(&letter_schema(), &json!({"text": "strawberry", "letter": "r"})).is_ok());
    }

    #[test]
    fn rejects_multi_character_letter() {
        let err = validate(&letter_schema(), &json!({"text": "strawberry", "letter": "rr"})).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].path, "$.letter");
        assert!(err.to_string().contains("longer than 1"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(validate(&letter_schema(), &json!({"text": "草莓", "letter": "莓"})).is_ok());
    }

    #[test]
    fn reports_missing_and_mistyped_properties() {
        let err = validate(&letter_schema(), &json!({"text": 5})).unwrap_err();
        let messages: Vec<_> = err.violations.iter().map(|v| v.to_string()).collect();
        assert!(messages.iter().any(|m| m.contains("missing required property 'letter'")));
        assert!(messages.iter().any(|m| m.starts_with("$.text") && m.contains("expected string")));
    }

    #[test]
    fn enum_numeric_bounds_and_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {
                "risk": { "type": "string", "enum": ["low", "medium", "high"] },
                "score": { "type": "number", "minimum": 1, "maximum": 10 },
                "notes": { "type": "array", "items": { "type": "string" } }
            }
        });
        assert!(validate(&schema, &json!({"risk": "low", "score": 7, "notes": ["a"]})).is_ok());
        let err = validate(&schema, &json!({"risk": "extreme", "score": 11, "notes": ["a", 2]})).unwrap_err();
        let paths: Vec<_> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["$.notes[1]", "$.risk", "$.score"]);
    }

    #[test]
    fn integer_type_accepts_whole_floats_only() {
        let schema = json!({"type": "integer"});
        assert!(validate(&schema, &json!(3)).is_ok());
        assert!(validate(&schema, &json!(3.0)).is_ok());
        assert!(validate(&schema, &json!(3.5)).is_err());
    }

    #[test]
    fn additional_properties_false_rejects_extras() {
        let schema = json!({
            "type": "object",
            "properties": { "city": { "type": "string" } },
            "additionalProperties": false
        });
        let err = validate(&schema, &json!({"city": "Tokyo", "country": "JP"})).unwrap_err();
        assert!(err.to_string().contains("unexpected property 'country'"));
    }

    #[test]
    fn object_schema_check() {
        assert!(check_object_schema(&letter_schema()).is_ok());
        assert!(check_object_schema(&json!({"type": "string"})).is_err());
        assert!(check_object_schema(&json!({"type": "object", "required": ["x"]})).is_err());
        assert!(check_object_schema(&json!({"type": "object"})).is_ok());
    }
}
