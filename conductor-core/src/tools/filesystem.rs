//! Filesystem tool: the canonical example of the tool contract (spec.md §1).
//!
//! Operations: `list`, `read`, `write`, `exists`, `delete`. Every path
//! parameter is resolved and containment-checked against the tool context's
//! `project_root` via [`super::resolve_within_root`].

use super::{
    resolve_within_root, DisplayOutput, ParameterKind, Tool, ToolCategory, ToolContext,
    ToolDefinition, ToolParameter, ToolResult,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::fs;

pub struct FilesystemTool {
    definition: ToolDefinition,
}

impl Default for FilesystemTool {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "filesystem",
            "List, read, write, check existence of, and delete files inside the project root.",
            ToolCategory::Filesystem,
            vec![
                ToolParameter::required("operation", ParameterKind::String, "one of: list, read, write, exists, delete")
                    .with_enum(vec!["list", "read", "write", "exists", "delete"].into_iter().map(String::from).collect()),
                ToolParameter::required("path", ParameterKind::String, "path relative to the project root"),
                ToolParameter::optional("content", ParameterKind::String, "content to write (write only)"),
                ToolParameter::optional("start_line", ParameterKind::Number, "1-based inclusive start line (read only)"),
                ToolParameter::optional("end_line", ParameterKind::Number, "1-based inclusive end line (read only)"),
                ToolParameter::optional("create_dirs", ParameterKind::Boolean, "create parent directories if missing (write only)")
                    .with_default(json!(false)),
                ToolParameter::optional("recursive", ParameterKind::Boolean, "remove directories recursively (delete only)")
                    .with_default(json!(false)),
            ],
        )
        .with_display(DisplayOutput::Inline);

        Self { definition }
    }

    fn path_param<'a>(&self, params: &'a Value) -> Result<&'a str, ToolResult> {
        params
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolResult::failure("missing required parameter 'path'"))
    }

    fn resolve<'a>(&self, context: &ToolContext, params: &'a Value) -> Result<std::path::PathBuf, ToolResult> {
        let path = self.path_param(params)?;
        resolve_within_root(&context.project_root, path)
            .map_err(|reason| ToolResult::failure(format!("safety violation: {reason}")))
    }

    fn do_list(&self, context: &ToolContext, params: &Value) -> ToolResult {
        let resolved = match self.resolve(context, params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let entries = match fs::read_dir(&resolved) {
            Ok(entries) => entries,
            Err(e) => return ToolResult::failure(format!("failed to list '{}': {e}", resolved.display())),
        };

        let mut items = Vec::new();
        for entry in entries.flatten() {
            let metadata = entry.metadata().ok();
            let is_dir = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
            items.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "is_dir": is_dir,
                "size": size,
            }));
        }
        items.sort_by(|a, b| {
            let a_dir = a["is_dir"].as_bool().unwrap_or(false);
            let b_dir = b["is_dir"].as_bool().unwrap_or(false);
            b_dir.cmp(&a_dir).then_with(|| {
                a["name"].as_str().unwrap_or_default().cmp(b["name"].as_str().unwrap_or_default())
            })
        });

        ToolResult::success(json!({"path": self.path_param(params).unwrap_or_default(), "entries": items}))
    }

    fn do_read(&self, context: &ToolContext, params: &Value) -> ToolResult {
        let resolved = match self.resolve(context, params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let content = match fs::read_to_string(&resolved) {
            Ok(c) => c,
            Err(e) => return ToolResult::failure(format!("failed to read '{}': {e}", resolved.display())),
        };

        let start = params.get("start_line").and_then(Value::as_u64).map(|n| n as usize);
        let end = params.get("end_line").and_then(Value::as_u64).map(|n| n as usize);

        let sliced = match (start, end) {
            (Some(start), Some(end)) if start >= 1 && end >= start => content
                .lines()
                .skip(start - 1)
                .take(end - start + 1)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => content,
        };

        ToolResult::success(json!({"path": self.path_param(params).unwrap_or_default(), "content": sliced}))
    }

    fn do_write(&self, context: &ToolContext, params: &Value) -> ToolResult {
        let resolved = match self.resolve(context, params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let content = params.get("content").and_then(Value::as_str).unwrap_or_default();
        let create_dirs = params.get("create_dirs").and_then(Value::as_bool).unwrap_or(false);

        if create_dirs {
            if let Some(parent) = resolved.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    return ToolResult::failure(format!("failed to create parent directories: {e}"));
                }
            }
        }

        match fs::write(&resolved, content) {
            Ok(()) => ToolResult::success(json!({
                "path": self.path_param(params).unwrap_or_default(),
                "bytes_written": content.len(),
            })),
            Err(e) => ToolResult::failure(format!("failed to write '{}': {e}", resolved.display())),
        }
    }

    fn do_exists(&self, context: &ToolContext, params: &Value) -> ToolResult {
        let resolved = match self.resolve(context, params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        ToolResult::success(json!({
            "path": self.path_param(params).unwrap_or_default(),
            "exists": resolved.exists(),
        }))
    }

    fn do_delete(&self, context: &ToolContext, params: &Value) -> ToolResult {
        let resolved = match self.resolve(context, params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let recursive = params.get("recursive").and_then(Value::as_bool).unwrap_or(false);

        let outcome = if resolved.is_dir() {
            if recursive {
                fs::remove_dir_all(&resolved)
            } else {
                fs::remove_dir(&resolved)
            }
        } else {
            fs::remove_file(&resolved)
        };

        match outcome {
            Ok(()) => ToolResult::success(json!({"path": self.path_param(params).unwrap_or_default(), "deleted": true})),
            Err(e) => ToolResult::failure(format!("failed to delete '{}': {e}", resolved.display())),
        }
    }
}

#[async_trait]
impl Tool for FilesystemTool {
    fn metadata(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let operation = params.get("operation").and_then(Value::as_str).unwrap_or_default();
        match operation {
            "list" => self.do_list(context, &params),
            "read" => self.do_read(context, &params),
            "write" => self.do_write(context, &params),
            "exists" => self.do_exists(context, &params),
            "delete" => self.do_delete(context, &params),
            other => ToolResult::failure(format!("unknown filesystem operation '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(root: &std::path::Path) -> ToolContext {
        ToolContext::new(root.to_path_buf())
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new();
        let ctx = context(dir.path());

        let write_result = tool
            .execute(json!({"operation": "write", "path": "hello.txt", "content": "Hello World"}), &ctx)
            .await;
        assert!(write_result.is_success());
        assert_eq!(write_result.data.unwrap()["bytes_written"], 11);

        let read_result = tool.execute(json!({"operation": "read", "path": "hello.txt"}), &ctx).await;
        assert_eq!(read_result.data.unwrap()["content"], "Hello World");
    }

    #[tokio::test]
    async fn exists_reports_false_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new();
        let ctx = context(dir.path());
        let result = tool.execute(json!({"operation": "exists", "path": "nope.txt"}), &ctx).await;
        assert_eq!(result.data.unwrap()["exists"], false);
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new();
        let ctx = context(dir.path());
        let result = tool
            .execute(json!({"operation": "read", "path": "../../../etc/passwd"}), &ctx)
            .await;
        assert!(!result.is_success());
        assert!(result.error.unwrap().contains("safety violation"));
    }

    #[tokio::test]
    async fn list_sorts_directories_first_then_name() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FilesystemTool::new();
        let ctx = context(dir.path());
        fs::write(dir.path().join("b.txt"), "x").unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("zz_dir")).unwrap();

        let result = tool.execute(json!({"operation": "list", "path": "."}), &ctx).await;
        let entries = result.data.unwrap()["entries"].as_array().unwrap().clone();
        assert_eq!(entries[0]["name"], "zz_dir");
        assert_eq!(entries[1]["name"], "a.txt");
        assert_eq!(entries[2]["name"], "b.txt");
    }
}
