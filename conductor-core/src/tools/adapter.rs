//! Projects the tool registry into the Ollama `/api/chat` function-calling
//! JSON-Schema shape (`{type:"function", function:{name, description, parameters}}`).

use super::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One entry of the Ollama tool catalog payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OllamaFunctionSpec,
}

/// The `function` object inside an [`OllamaToolSpec`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaFunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Project a tool catalog into the Ollama function-calling shape. Idempotent:
/// calling this twice over the same definitions yields byte-identical output,
/// since it is a pure function of the definitions' own fields.
pub fn to_ollama_tools(definitions: &[&ToolDefinition]) -> Vec<OllamaToolSpec> {
    definitions.iter().map(|def| project_one(def)).collect()
}

fn project_one(def: &ToolDefinition) -> OllamaToolSpec {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in &def.parameters {
        let mut schema = json!({
            "type": param.kind.json_schema_type(),
            "description": param.description,
        });
        if let Some(enum_values) = &param.enum_values {
            schema["enum"] = json!(enum_values);
        }
        if let Some(default) = &param.default {
            schema["default"] = default.clone();
        }
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    OllamaToolSpec {
        kind: "function".to_string(),
        function: OllamaFunctionSpec {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": Value::Object(properties),
                "required": Value::Array(required),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterKind, ToolCategory, ToolParameter};

    fn sample() -> ToolDefinition {
        ToolDefinition::new(
            "filesystem",
            "read and write files",
            ToolCategory::Filesystem,
            vec![
                ToolParameter::required("operation", ParameterKind::String, "the operation")
                    .with_enum(vec!["list".into(), "read".into(), "write".into()]),
                ToolParameter::optional("content", ParameterKind::String, "file content"),
            ],
        )
    }

    #[test]
    fn projects_required_and_optional_parameters() {
        let def = sample();
        let projected = to_ollama_tools(&[&def]);
        assert_eq!(projected.len(), 1);
        let function = &projected[0].function;
        assert_eq!(function.name, "filesystem");
        let required = function.parameters["required"].as_array().unwrap();
        assert_eq!(required, &vec![Value::String("operation".to_string())]);
        assert_eq!(
            function.parameters["properties"]["operation"]["enum"],
            json!(["list", "read", "write"])
        );
        assert!(function.parameters["properties"]["content"].get("enum").is_none());
    }

    #[test]
    fn projection_is_idempotent() {
        let def = sample();
        let first = to_ollama_tools(&[&def]);
        let second = to_ollama_tools(&[&def]);
        assert_eq!(first, second);
    }

    #[test]
    fn kind_mapping_is_exact() {
        let def = ToolDefinition::new(
            "probe",
            "probe kinds",
            ToolCategory::Core,
            vec![
                ToolParameter::required("s", ParameterKind::String, "s"),
                ToolParameter::required("n", ParameterKind::Number, "n"),
                ToolParameter::required("b", ParameterKind::Boolean, "b"),
                ToolParameter::required("a", ParameterKind::Array, "a"),
                ToolParameter::required("o", ParameterKind::Object, "o"),
            ],
        );
        let projected = &to_ollama_tools(&[&def])[0];
        let props = &projected.function.parameters["properties"];
        assert_eq!(props["s"]["type"], "string");
        assert_eq!(props["n"]["type"], "number");
        assert_eq!(props["b"]["type"], "boolean");
        assert_eq!(props["a"]["type"], "array");
        assert_eq!(props["o"]["type"], "object");
    }
}
