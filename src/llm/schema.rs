//! JSON Schema reduction for Gemini function declarations.
//!
//! Gemini accepts only an OpenAPI 3.0 subset. MCP servers publish full JSON
//! Schema (`$schema`, `additionalProperties`, type unions, ...), so every
//! schema is rewritten before it is sent.

use serde_json::{Map, Value};

const KEPT_KEYS: &[&str] = &[
    "description",
    "nullable",
    "enum",
    "required",
    "minimum",
    "maximum",
    "minItems",
    "maxItems",
];

/// Reduce a JSON Schema to the subset Gemini accepts.
///
/// Returns `None` for an object schema with no properties, which Gemini
/// rejects; callers omit `parameters` in that case.
pub fn sanitize_schema(schema: &Value) -> Option<Value> {
    let out = sanitize(schema);
    let is_empty_object = out.get("type").and_then(Value::as_str) == Some("OBJECT")
        && out
            .get("properties")
            .and_then(Value::as_object)
            .map_or(true, Map::is_empty);
    if is_empty_object {
        None
    } else {
        Some(out)
    }
}

fn sanitize(schema: &Value) -> Value {
    let Some(obj) = schema.as_object() else {
        return Value::Object(Map::new());
    };
    let mut out = Map::new();

    match obj.get("type") {
        Some(Value::String(t)) => {
            out.insert("type".to_string(), Value::String(t.to_uppercase()));
        }
        Some(Value::Array(types)) => {
            let mut nullable = false;
            let mut chosen = None;
            for t in types.iter().filter_map(Value::as_str) {
                if t == "null" {
                    nullable = true;
                } else if chosen.is_none() {
                    chosen = Some(t.to_uppercase());
                }
            }
            if let Some(t) = chosen {
                out.insert("type".to_string(), Value::String(t));
            }
            if nullable {
                out.insert("nullable".to_string(), Value::Bool(true));
            }
        }
        _ if obj.contains_key("properties") => {
            out.insert("type".to_string(), Value::String("OBJECT".to_string()));
        }
        _ => {}
    }

    for key in KEPT_KEYS {
        if let Some(v) = obj.get(*key) {
            out.insert((*key).to_string(), v.clone());
        }
    }

    if let Some(Value::String(format)) = obj.get("format") {
        if format == "enum" || format == "date-time" {
            out.insert("format".to_string(), Value::String(format.clone()));
        }
    }

    if let Some(Value::Object(props)) = obj.get("properties") {
        let props: Map<String, Value> = props
            .iter()
            .map(|(name, prop)| (name.clone(), sanitize(prop)))
            .collect();
        out.insert("properties".to_string(), Value::Object(props));
    }

    if let Some(items) = obj.get("items") {
        out.insert("items".to_string(), sanitize(items));
    }

    if let Some(Value::Array(variants)) = obj.get("anyOf") {
        out.insert(
            "anyOf".to_string(),
            Value::Array(variants.iter().map(sanitize).collect()),
        );
    }

    // Enum values must be strings.
    if let Some(Value::Array(values)) = out.get_mut("enum") {
        for v in values.iter_mut() {
            if !v.is_string() {
                *v = Value::String(v.to_string());
            }
        }
    }

    Value::Object(out)
}
