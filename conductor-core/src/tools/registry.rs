//! Catalog of registered tools: lookup by name, listing, and category filters.

use super::{ToolCategory, ToolDefinition, ToolHandle};
use std::collections::HashMap;

/// Immutable-after-build catalog of tools. The orchestrator owns one
/// `ToolRegistry` and hands out shared read-only references to it; tools
/// themselves hold no back-reference into the registry or the orchestrator.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolHandle>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registration under the same name replaces the
    /// previous entry.
    pub fn register(&mut self, tool: ToolHandle) {
        let name = tool.metadata().name.clone();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolHandle> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|t| t.metadata()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn get_by_category(&self, category: ToolCategory) -> Vec<&ToolHandle> {
        self.tools
            .values()
            .filter(|t| t.metadata().category == category)
            .collect()
    }

    /// Catalog filtered by the union of `categories`. An empty set returns
    /// the full catalog.
    pub fn list_for_categories(&self, categories: &[ToolCategory]) -> Vec<&ToolDefinition> {
        if categories.is_empty() {
            return self.list();
        }
        self.tools
            .values()
            .map(|t| t.metadata())
            .filter(|def| categories.contains(&def.category))
            .collect()
    }

    /// Catalog filtered by an explicit name allowlist.
    pub fn list_for_names(&self, names: &[String]) -> Vec<&ToolDefinition> {
        self.tools
            .values()
            .map(|t| t.metadata())
            .filter(|def| names.iter().any(|n| n == &def.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterKind, Tool, ToolContext, ToolParameter, ToolResult};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct StubTool(ToolDefinition);

    #[async_trait]
    impl Tool for StubTool {
        fn metadata(&self) -> &ToolDefinition {
            &self.0
        }

        async fn execute(&self, _params: Value, _context: &ToolContext) -> ToolResult {
            ToolResult::success(Value::Null)
        }
    }

    fn stub(name: &str, category: ToolCategory) -> ToolHandle {
        Arc::new(StubTool(ToolDefinition::new(
            name,
            "a stub tool",
            category,
            vec![ToolParameter::required("x", ParameterKind::String, "x")],
        )))
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(stub("filesystem", ToolCategory::Filesystem));
        registry.register(stub("filesystem", ToolCategory::Core));
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get("filesystem").unwrap().metadata().category, ToolCategory::Core);
    }

    #[test]
    fn category_filter_returns_matching_tools_only() {
        let mut registry = ToolRegistry::new();
        registry.register(stub("execution", ToolCategory::Execution));
        registry.register(stub("filesystem", ToolCategory::Filesystem));
        let filtered = registry.get_by_category(ToolCategory::Execution);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].metadata().name, "execution");
    }

    #[test]
    fn list_for_categories_empty_means_everything() {
        let mut registry = ToolRegistry::new();
        registry.register(stub("execution", ToolCategory::Execution));
        registry.register(stub("filesystem", ToolCategory::Filesystem));
        assert_eq!(registry.list_for_categories(&[]).len(), 2);
        assert_eq!(
            registry
                .list_for_categories(&[ToolCategory::Filesystem])
                .len(),
            1
        );
    }
}
