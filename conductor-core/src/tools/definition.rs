//! Tool metadata: names, categories, and parameter schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category a tool belongs to. Governs approval-gating (`requireApprovalForCategories`)
/// and catalog filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Core,
    Filesystem,
    Execution,
    Analysis,
    Planning,
    Search,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Filesystem => "filesystem",
            Self::Execution => "execution",
            Self::Analysis => "analysis",
            Self::Planning => "planning",
            Self::Search => "search",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar kind a parameter accepts. Maps exactly onto JSON-Schema primitive
/// types for the adapter projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterKind {
    /// JSON-Schema `type` keyword for this kind.
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// One entry in a [`ToolDefinition`]'s parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    pub description: String,
    pub required: bool,
    pub enum_values: Option<Vec<String>>,
    pub default: Option<Value>,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            enum_values: None,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            enum_values: None,
            default: None,
        }
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Hint describing how a tool's result should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayOutput {
    /// Render the formatted result inline in the terminal.
    Inline,
    /// Only show a one-line banner; the full body goes straight to history.
    Banner,
    /// Suppress display entirely (used by tools whose results are implementation detail).
    Silent,
}

/// Static metadata describing a tool: its name, category, parameter schema,
/// and how its results should be displayed. Does not carry the handler
/// itself — see [`crate::tools::Tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: Vec<ToolParameter>,
    pub display_output: DisplayOutput,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
        parameters: Vec<ToolParameter>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            parameters,
            display_output: DisplayOutput::Inline,
        }
    }

    pub fn with_display(mut self, display: DisplayOutput) -> Self {
        self.display_output = display;
        self
    }

    pub fn required_parameter_names(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }
}
