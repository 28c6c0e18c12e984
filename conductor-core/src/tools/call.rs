//! Tool call requests and results exchanged between the turn loop and the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A tool-call request, either surfaced natively by the LLM transport or
/// extracted from the in-band content stream by the streaming parser.
///
/// `id` is stable within a turn and has the shape `{toolName}-{epochMillis}-{ordinal}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parameters: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parameters,
        }
    }

    /// Build the stable call identifier `{toolName}-{epochMillis}-{ordinal}`.
    pub fn make_id(tool_name: &str, epoch_millis: u128, ordinal: u64) -> String {
        format!("{tool_name}-{epoch_millis}-{ordinal}")
    }
}

/// Free-form metadata attached to a [`ToolResult`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub execution_time_ms: Option<u64>,
    pub warnings: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ToolMetadata {
    pub fn with_execution_time(mut self, millis: u64) -> Self {
        self.execution_time_ms = Some(millis);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Discriminated outcome of a tool dispatch: `{success:true, data, metadata}`
/// or `{success:false, error, metadata}`. `data` is opaque to the dispatcher
/// and only interpreted by the formatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: ToolMetadata,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ToolMetadata::default(),
        }
    }

    pub fn success_with_metadata(data: Value, metadata: ToolMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: ToolMetadata::default(),
        }
    }

    pub fn failure_with_metadata(error: impl Into<String>, metadata: ToolMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata,
        }
    }

    /// Attach diagnostic `data` to a failure result (e.g. a timed-out
    /// execution still reports exit code and captured output alongside the
    /// error message).
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ToolMetadata {
        &mut self.metadata
    }

    /// Stamp `data.executionDeclined = true` on a successful result. Used by
    /// the planning-create post-execute hook when the user declines the
    /// immediate-approval prompt.
    pub fn mark_execution_declined(&mut self) {
        if self.success {
            if let Some(Value::Object(map)) = self.data.as_mut() {
                map.insert("executionDeclined".to_string(), Value::Bool(true));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn make_id_has_stable_shape() {
        let id = ToolCall::make_id("filesystem", 1_700_000_000_000, 0);
        assert_eq!(id, "filesystem-1700000000000-0");
    }

    #[test]
    fn mark_execution_declined_only_touches_success() {
        let mut result = ToolResult::success(json!({"plan_id": "p1"}));
        result.mark_execution_declined();
        assert_eq!(
            result.data.as_ref().and_then(|d| d.get("executionDeclined")),
            Some(&Value::Bool(true))
        );

        let mut failure = ToolResult::failure("nope");
        failure.mark_execution_declined();
        assert!(!failure.is_success());
        assert!(failure.data.is_none());
    }
}
