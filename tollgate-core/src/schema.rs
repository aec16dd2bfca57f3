//! Translation of tool parameter schemas into function declarations
//!
//! Function-calling agents accept a narrower JSON Schema dialect than the
//! one tools publish: no `default` keys and no type unions. Translation
//! rewrites each top-level parameter so the agent sees a single concrete
//! type and an explicit "Optional." hint where a default used to be.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::ToolDefinition;

/// A tool as described to a function-calling agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Errors raised while translating tool definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("tool at index {index} has a missing or empty name")]
    MissingName { index: usize },

    #[error("tool '{name}' at index {index} has a parameter schema that is not an object")]
    NotAnObject { index: usize, name: String },
}

/// Translate a single tool definition found at `index` of its source list
pub fn translate_tool(
    index: usize,
    definition: &ToolDefinition,
) -> Result<FunctionDeclaration, SchemaError> {
    let name = definition.name.trim();
    if name.is_empty() {
        return Err(SchemaError::MissingName { index });
    }

    let description = match definition.description.as_deref() {
        Some(d) if !d.trim().is_empty() => d.to_string(),
        _ => format!("Executes the {} tool.", name),
    };

    let parameters = match &definition.input_schema {
        None => None,
        Some(schema) => Some(translate_parameters(schema).ok_or_else(|| {
            SchemaError::NotAnObject {
                index,
                name: name.to_string(),
            }
        })?),
    };

    Ok(FunctionDeclaration {
        name: name.to_string(),
        description,
        parameters,
    })
}

/// Translate every definition, failing on the first invalid one
pub fn translate_tools(
    definitions: &[ToolDefinition],
) -> Result<Vec<FunctionDeclaration>, SchemaError> {
    definitions
        .iter()
        .enumerate()
        .map(|(index, def)| translate_tool(index, def))
        .collect()
}

/// Rewrite a parameter schema for an agent without default or union support.
///
/// Returns `None` when the schema is not a JSON object. The input is never
/// modified; the result is built from a deep copy.
pub fn translate_parameters(schema: &Value) -> Option<Value> {
    let mut translated = schema.as_object()?.clone();

    if let Some(Value::Object(properties)) = translated.get_mut("properties") {
        for (name, property) in properties.iter_mut() {
            if let Value::Object(property) = property {
                strip_default(name, property);
                collapse_union(property);
            }
        }
    }

    Some(Value::Object(translated))
}

fn strip_default(name: &str, property: &mut Map<String, Value>) {
    if property.remove("default").is_none() {
        return;
    }

    let description = property
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let rewritten = if description.trim().is_empty() {
        format!("Optional parameter {}.", name)
    } else if description.to_lowercase().contains("optional") {
        description.to_string()
    } else {
        format!("Optional. {}", description)
    };

    property.insert("description".to_string(), Value::String(rewritten));
}

fn collapse_union(property: &mut Map<String, Value>) {
    if let Some(Value::Array(branches)) = property.get("anyOf") {
        let types: Vec<&str> = branches
            .iter()
            .filter_map(|b| b.get("type").and_then(Value::as_str))
            .collect();

        if let Some(chosen) = pick_type(&types) {
            property.remove("anyOf");
            property.insert("type".to_string(), Value::String(chosen.to_string()));
        }
        return;
    }

    if let Some(Value::Array(types)) = property.get("type") {
        let types: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
        if let Some(chosen) = pick_type(&types) {
            property.insert("type".to_string(), Value::String(chosen.to_string()));
        }
    }
}

fn pick_type(types: &[&str]) -> Option<&'static str> {
    if types.contains(&"string") {
        Some("string")
    } else if types.contains(&"integer") {
        Some("integer")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str, schema: Value) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: Some("Lists things".to_string()),
            input_schema: Some(schema),
        }
    }

    #[test]
    fn test_default_removed_and_description_prefixed() {
        let schema = json!({
            "type": "object",
            "properties": {
                "page": {"type": "integer", "default": 1, "description": "Page number"}
            }
        });

        let out = translate_parameters(&schema).unwrap();
        let page = &out["properties"]["page"];

        assert!(page.get("default").is_none());
        assert_eq!(page["description"], "Optional. Page number");
    }

    #[test]
    fn test_default_with_existing_optional_mention_kept() {
        let schema = json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "default": "pending", "description": "OPTIONAL filter"}
            }
        });

        let out = translate_parameters(&schema).unwrap();
        assert_eq!(out["properties"]["status"]["description"], "OPTIONAL filter");
    }

    #[test]
    fn test_default_without_description_synthesized() {
        let schema = json!({
            "type": "object",
            "properties": {"per_page": {"type": "integer", "default": 30}}
        });

        let out = translate_parameters(&schema).unwrap();
        assert_eq!(
            out["properties"]["per_page"]["description"],
            "Optional parameter per_page."
        );
    }

    #[test]
    fn test_any_of_with_string_branch_collapses_to_string() {
        let schema = json!({
            "type": "object",
            "properties": {
                "resource_instance": {"anyOf": [{"type": "string"}, {"type": "null"}]}
            }
        });

        let out = translate_parameters(&schema).unwrap();
        let prop = &out["properties"]["resource_instance"];
        assert_eq!(prop["type"], "string");
        assert!(prop.get("anyOf").is_none());
    }

    #[test]
    fn test_any_of_integer_chosen_without_string() {
        let schema = json!({
            "type": "object",
            "properties": {"page": {"anyOf": [{"type": "integer"}, {"type": "null"}]}}
        });

        let out = translate_parameters(&schema).unwrap();
        assert_eq!(out["properties"]["page"]["type"], "integer");
    }

    #[test]
    fn test_any_of_without_known_type_left_alone() {
        let schema = json!({
            "type": "object",
            "properties": {"flag": {"anyOf": [{"type": "boolean"}, {"type": "null"}]}}
        });

        let out = translate_parameters(&schema).unwrap();
        assert!(out["properties"]["flag"].get("anyOf").is_some());
        assert!(out["properties"]["flag"].get("type").is_none());
    }

    #[test]
    fn test_type_array_collapses() {
        let schema = json!({
            "type": "object",
            "properties": {"reason": {"type": ["string", "null"]}}
        });

        let out = translate_parameters(&schema).unwrap();
        assert_eq!(out["properties"]["reason"]["type"], "string");
    }

    #[test]
    fn test_source_schema_not_mutated() {
        let schema = json!({
            "type": "object",
            "properties": {"page": {"type": "integer", "default": 1}}
        });
        let before = schema.clone();

        let _ = translate_parameters(&schema);
        assert_eq!(schema, before);
    }

    #[test]
    fn test_non_object_schema_rejected() {
        let err = translate_tool(3, &def("bad", json!(["not", "an", "object"]))).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NotAnObject {
                index: 3,
                name: "bad".into()
            }
        );
    }

    #[test]
    fn test_blank_name_rejected_with_index() {
        let definitions = vec![
            def("ok", json!({"type": "object"})),
            def("   ", json!({"type": "object"})),
        ];

        let err = translate_tools(&definitions).unwrap_err();
        assert_eq!(err, SchemaError::MissingName { index: 1 });
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_missing_description_synthesized() {
        let definition = ToolDefinition {
            name: "list_dishes".into(),
            description: None,
            input_schema: None,
        };

        let decl = translate_tool(0, &definition).unwrap();
        assert_eq!(decl.description, "Executes the list_dishes tool.");
        assert!(decl.parameters.is_none());
    }

    #[test]
    fn test_no_translated_property_keeps_default() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "string", "default": "x"},
                "b": {"type": "integer", "default": 2, "description": "Count"},
                "c": {"anyOf": [{"type": "integer"}, {"type": "string"}], "default": null}
            }
        });

        let out = translate_parameters(&schema).unwrap();
        for (_, prop) in out["properties"].as_object().unwrap() {
            assert!(prop.get("default").is_none());
            let desc = prop["description"].as_str().unwrap().to_lowercase();
            assert!(desc.contains("optional"));
        }
        assert_eq!(out["properties"]["c"]["type"], "string");
    }
}
