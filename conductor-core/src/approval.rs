//! Interactive approval subsystem (spec.md §4.4 step 4): category-based
//! gating with per-tool and per-category memoization for the process session.

use crate::tools::ToolCategory;
use async_trait::async_trait;
use std::collections::HashMap;

/// Two-tier memoization: `(name, category) -> approved?` and
/// `category -> approved?`. Lifetime: process session only, never persisted.
#[derive(Default)]
pub struct ApprovalCache {
    per_tool: HashMap<(String, ToolCategory), bool>,
    per_category: HashMap<ToolCategory, bool>,
}

impl ApprovalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prior decision for this exact tool, if memoized.
    pub fn tool_decision(&self, tool: &str, category: ToolCategory) -> Option<bool> {
        self.per_tool.get(&(tool.to_string(), category)).copied()
    }

    /// Prior decision for the whole category, if memoized.
    pub fn category_decision(&self, category: ToolCategory) -> Option<bool> {
        self.per_category.get(&category).copied()
    }

    /// Combined lookup: a category-wide decision takes precedence only when
    /// no tool-specific decision has been recorded.
    pub fn decision(&self, tool: &str, category: ToolCategory) -> Option<bool> {
        self.tool_decision(tool, category).or_else(|| self.category_decision(category))
    }

    pub fn memoize_tool(&mut self, tool: impl Into<String>, category: ToolCategory, approved: bool) {
        self.per_tool.insert((tool.into(), category), approved);
    }

    pub fn memoize_category(&mut self, category: ToolCategory, approved: bool) {
        self.per_category.insert(category, approved);
    }
}

/// The interactive approval collaborator: asks the user to confirm running a
/// gated tool, or to confirm executing a previously created plan. The CLI
/// binary supplies a concrete implementation (e.g. backed by `dialoguer`);
/// tests use an in-memory fake that answers deterministically.
#[async_trait]
pub trait Approver: Send + Sync {
    /// Ask whether `tool` (in `category`) may run with the given parameters.
    async fn request_tool_approval(&self, tool: &str, category: ToolCategory, parameters: &serde_json::Value) -> bool;

    /// Ask whether the model may execute an already-created plan. Implementations
    /// should render `title`/`steps` to the user before returning the decision.
    async fn request_plan_approval(&self, plan_id: &str, title: &str, steps: &[String]) -> bool;
}

/// A non-interactive approver that always denies — used when the session is
/// not interactive and approval cannot be collected.
pub struct AlwaysDeny;

#[async_trait]
impl Approver for AlwaysDeny {
    async fn request_tool_approval(&self, _tool: &str, _category: ToolCategory, _parameters: &serde_json::Value) -> bool {
        false
    }

    async fn request_plan_approval(&self, _plan_id: &str, _title: &str, _steps: &[String]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_decision_takes_precedence_over_category() {
        let mut cache = ApprovalCache::new();
        cache.memoize_category(ToolCategory::Execution, true);
        cache.memoize_tool("execution", ToolCategory::Execution, false);
        assert_eq!(cache.decision("execution", ToolCategory::Execution), Some(false));
    }

    #[test]
    fn category_decision_used_when_no_tool_specific_entry() {
        let mut cache = ApprovalCache::new();
        cache.memoize_category(ToolCategory::Execution, true);
        assert_eq!(cache.decision("execution", ToolCategory::Execution), Some(true));
    }

    #[test]
    fn undecided_returns_none() {
        let cache = ApprovalCache::new();
        assert_eq!(cache.decision("execution", ToolCategory::Execution), None);
    }
}
