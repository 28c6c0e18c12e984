//! Planning tool: `create` and `execute` operations.
//!
//! The `execute` operation's plan-approval gate lives in the dispatcher
//! (spec.md §4.4 steps 5 and 8); this tool only holds the plan's own shape,
//! which spec.md leaves implicit while describing the gate in detail.

use super::{
    DisplayOutput, ParameterKind, Tool, ToolCategory, ToolContext, ToolDefinition, ToolParameter,
    ToolResult,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct PlanningTool {
    definition: ToolDefinition,
    next_id: AtomicU64,
    plans: Mutex<std::collections::HashMap<String, Value>>,
}

impl Default for PlanningTool {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanningTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "planning",
            "Create a step-by-step plan for approval, or execute a previously approved plan.",
            ToolCategory::Planning,
            vec![
                ToolParameter::required("operation", ParameterKind::String, "one of: create, execute")
                    .with_enum(vec!["create".into(), "execute".into()]),
                ToolParameter::optional("title", ParameterKind::String, "plan title (create only)"),
                ToolParameter::optional("steps", ParameterKind::Array, "ordered list of step descriptions (create only)"),
                ToolParameter::optional("plan_id", ParameterKind::String, "id of the plan to execute (execute only)"),
            ],
        )
        .with_display(DisplayOutput::Inline);

        Self {
            definition,
            next_id: AtomicU64::new(1),
            plans: Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn create(&self, params: &Value) -> ToolResult {
        let title = params.get("title").and_then(Value::as_str).unwrap_or("untitled plan");
        let steps: Vec<String> = params
            .get("steps")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        if steps.is_empty() {
            return ToolResult::failure("a plan requires at least one step");
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let plan_id = format!("plan-{id}");
        let plan = json!({"plan_id": plan_id, "title": title, "steps": steps});
        self.plans.lock().expect("plan map lock poisoned").insert(plan_id.clone(), plan.clone());

        ToolResult::success(plan)
    }

    fn execute(&self, params: &Value) -> ToolResult {
        let Some(plan_id) = params.get("plan_id").and_then(Value::as_str) else {
            return ToolResult::failure("missing required parameter 'plan_id'");
        };
        if !self.plans.lock().expect("plan map lock poisoned").contains_key(plan_id) {
            return ToolResult::failure(format!("unknown plan '{plan_id}'"));
        }
        ToolResult::success(json!({"plan_id": plan_id, "executed": true}))
    }
}

#[async_trait]
impl Tool for PlanningTool {
    fn metadata(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        match params.get("operation").and_then(Value::as_str) {
            Some("create") => self.create(&params),
            Some("execute") => self.execute(&params),
            Some(other) => ToolResult::failure(format!("unknown planning operation '{other}'")),
            None => ToolResult::failure("missing required parameter 'operation'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_execute_round_trips() {
        let tool = PlanningTool::new();
        let ctx = ToolContext::new(std::env::temp_dir());

        let created = tool
            .execute(json!({"operation": "create", "title": "refactor", "steps": ["a", "b"]}), &ctx)
            .await;
        assert!(created.is_success());
        let plan_id = created.data.unwrap()["plan_id"].as_str().unwrap().to_string();

        let executed = tool.execute(json!({"operation": "execute", "plan_id": plan_id}), &ctx).await;
        assert!(executed.is_success());
    }

    #[tokio::test]
    async fn executing_unknown_plan_fails() {
        let tool = PlanningTool::new();
        let ctx = ToolContext::new(std::env::temp_dir());
        let result = tool.execute(json!({"operation": "execute", "plan_id": "plan-999"}), &ctx).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn create_without_steps_fails() {
        let tool = PlanningTool::new();
        let ctx = ToolContext::new(std::env::temp_dir());
        let result = tool.execute(json!({"operation": "create", "title": "empty"}), &ctx).await;
        assert!(!result.is_success());
    }
}
