//! Search tool: literal or regex search over files under the project root.
//!
//! Referenced by the result formatter (spec.md §4.6: "search: summary of
//! matches and files scanned...") but not otherwise specified; grounded in
//! the teacher's use of the `regex` and `walkdir` crates elsewhere in the
//! workspace.

use super::{
    DisplayOutput, ParameterKind, Tool, ToolCategory, ToolContext, ToolDefinition, ToolMetadata,
    ToolParameter, ToolResult,
};
use async_trait::async_trait;
use regex::{escape, Regex};
use serde_json::{json, Value};
use walkdir::WalkDir;

const MAX_FILES_SCANNED: usize = 2_000;
const MAX_MATCHES: usize = 500;

pub struct SearchTool {
    definition: ToolDefinition,
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "search",
            "Search for a literal string or regular expression across files under the project root.",
            ToolCategory::Search,
            vec![
                ToolParameter::required("pattern", ParameterKind::String, "literal text or regex to search for"),
                ToolParameter::optional("path", ParameterKind::String, "subdirectory to scope the search to")
                    .with_default(json!(".")),
                ToolParameter::optional("regex", ParameterKind::Boolean, "treat pattern as a regular expression")
                    .with_default(json!(false)),
            ],
        )
        .with_display(DisplayOutput::Inline);

        Self { definition }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn metadata(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let Some(pattern) = params.get("pattern").and_then(Value::as_str) else {
            return ToolResult::failure("missing required parameter 'pattern'");
        };
        let use_regex = params.get("regex").and_then(Value::as_bool).unwrap_or(false);
        let scope = params.get("path").and_then(Value::as_str).unwrap_or(".");

        let expr = if use_regex { pattern.to_string() } else { escape(pattern) };
        let regex = match Regex::new(&expr) {
            Ok(r) => r,
            Err(e) => return ToolResult::failure(format!("invalid search pattern: {e}")),
        };

        let root = match super::resolve_within_root(&context.project_root, scope) {
            Ok(p) => p,
            Err(reason) => return ToolResult::failure(format!("safety violation: {reason}")),
        };

        let mut matches = Vec::new();
        let mut files_scanned = 0usize;
        let mut truncated = false;

        for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if files_scanned >= MAX_FILES_SCANNED {
                truncated = true;
                break;
            }
            files_scanned += 1;

            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            for (line_no, line) in content.lines().enumerate() {
                if matches.len() >= MAX_MATCHES {
                    truncated = true;
                    break;
                }
                if let Some(m) = regex.find(line) {
                    matches.push(json!({
                        "path": entry.path().display().to_string(),
                        "line": line_no + 1,
                        "column": m.start() + 1,
                        "text": line.trim(),
                    }));
                }
            }
            if truncated {
                break;
            }
        }

        ToolResult::success_with_metadata(
            json!({
                "matches": matches,
                "files_scanned": files_scanned,
                "truncated": truncated,
            }),
            ToolMetadata::default(),
        )
    }
}
