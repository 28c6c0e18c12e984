//! Result formatter (spec.md §4.6): renders a raw [`ToolResult`] into terse,
//! model-facing text for the follow-up tool-result message.

use crate::tools::ToolResult;
use serde_json::Value;

const MAX_LIST_ITEMS: usize = 20;
const MAX_SEARCH_MATCHES: usize = 10;
const MAX_VULNERABILITIES: usize = 5;
const REPEATED_FAILURE_THRESHOLD: u32 = 2;

/// Render `result` (the outcome of calling `tool_name`) for the transcript.
/// `prior_failures` is the number of times this exact signature has already
/// failed, used to attach a "try a different approach" warning.
pub fn format_result(tool_name: &str, params: &Value, result: &ToolResult, prior_failures: u32) -> String {
    if !result.is_success() {
        return format_failure(tool_name, params, result, prior_failures);
    }

    let Some(data) = &result.data else {
        return "Tool execution successful.".to_string();
    };

    let operation = params.get("operation").and_then(Value::as_str);

    match (tool_name, operation) {
        ("filesystem", Some("list")) => format_filesystem_list(data),
        ("filesystem", Some("write")) => format_filesystem_write(data),
        ("filesystem", Some("exists")) => format_filesystem_exists(data),
        ("search", _) => format_search(data),
        ("advanced-code-analysis", _) => format_analysis(data),
        _ => format_generic_success(data),
    }
}

fn format_filesystem_list(data: &Value) -> String {
    let entries = data.get("entries").and_then(Value::as_array).cloned().unwrap_or_default();
    let total = entries.len();
    let (dirs, files): (Vec<&Value>, Vec<&Value>) = entries
        .iter()
        .partition(|e| e.get("is_dir").and_then(Value::as_bool).unwrap_or(false));

    let mut out = format!("Listed {total} item(s): {} director{}, {} file(s).\n", dirs.len(), if dirs.len() == 1 { "y" } else { "ies" }, files.len());

    for entry in entries.iter().take(MAX_LIST_ITEMS) {
        let icon = if entry.get("is_dir").and_then(Value::as_bool).unwrap_or(false) { "[dir]" } else { "[file]" };
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("?");
        let size = entry.get("size").and_then(Value::as_u64).unwrap_or(0);
        out.push_str(&format!("{icon} {name} ({size} bytes)\n"));
    }
    if total > MAX_LIST_ITEMS {
        out.push_str(&format!("... and {} more\n", total - MAX_LIST_ITEMS));
    }
    out
}

fn format_filesystem_write(data: &Value) -> String {
    let path = data.get("path").and_then(Value::as_str).unwrap_or("?");
    let bytes = data.get("bytes_written").and_then(Value::as_u64).unwrap_or(0);
    format!(
        "File written successfully: {path} ({bytes} bytes). You do NOT need to create this file again."
    )
}

fn format_filesystem_exists(data: &Value) -> String {
    let path = data.get("path").and_then(Value::as_str).unwrap_or("?");
    let exists = data.get("exists").and_then(Value::as_bool).unwrap_or(false);
    if exists {
        format!("Confirmed: '{path}' exists.")
    } else {
        format!("Confirmed: '{path}' does not exist.")
    }
}

fn format_search(data: &Value) -> String {
    let matches = data.get("matches").and_then(Value::as_array).cloned().unwrap_or_default();
    let files_scanned = data.get("files_scanned").and_then(Value::as_u64).unwrap_or(0);
    let truncated = data.get("truncated").and_then(Value::as_bool).unwrap_or(false);

    let mut out = format!("Found {} match(es) across {files_scanned} file(s) scanned.\n", matches.len());
    for m in matches.iter().take(MAX_SEARCH_MATCHES) {
        let path = m.get("path").and_then(Value::as_str).unwrap_or("?");
        let line = m.get("line").and_then(Value::as_u64).unwrap_or(0);
        let column = m.get("column").and_then(Value::as_u64).unwrap_or(0);
        let text = m.get("text").and_then(Value::as_str).unwrap_or("");
        out.push_str(&format!("{path}:{line}:{column}: {text}\n"));
    }
    if matches.len() > MAX_SEARCH_MATCHES || truncated {
        out.push_str("... results truncated\n");
    }
    out
}

fn format_analysis(data: &Value) -> String {
    let risk_level = data.get("risk_level").and_then(Value::as_str).unwrap_or("unknown");
    let checks_passed = data.get("checks_passed").and_then(Value::as_u64).unwrap_or(0);
    let vulnerabilities = data.get("vulnerabilities").and_then(Value::as_array).cloned().unwrap_or_default();
    let recommendations = data.get("recommendations").and_then(Value::as_array).cloned().unwrap_or_default();

    let mut out = format!("Risk level: {risk_level}. Checks passed: {checks_passed}.\n");
    for v in vulnerabilities.iter().take(MAX_VULNERABILITIES) {
        let file = v.get("file").and_then(Value::as_str).unwrap_or("?");
        let line = v.get("line").and_then(Value::as_u64).unwrap_or(0);
        let check = v.get("check").and_then(Value::as_str).unwrap_or("?");
        let snippet = v.get("snippet").and_then(Value::as_str).unwrap_or("");
        let fix = v.get("fix").and_then(Value::as_str).unwrap_or("");
        out.push_str(&format!("- {file}:{line} [{check}] `{snippet}` — fix: {fix}\n"));
    }
    if !recommendations.is_empty() {
        out.push_str("Recommendations:\n");
        for r in recommendations.iter().take(MAX_VULNERABILITIES) {
            if let Some(text) = r.as_str() {
                out.push_str(&format!("- {text}\n"));
            }
        }
    }
    out.push_str("If the user asked for a fix, you may follow up with filesystem.write to apply it.\n");
    out
}

fn format_generic_success(data: &Value) -> String {
    format!("Tool execution successful. Result: {}", serde_json::to_string(data).unwrap_or_default())
}

fn format_failure(tool_name: &str, params: &Value, result: &ToolResult, prior_failures: u32) -> String {
    let error = result.error.as_deref().unwrap_or("unknown error");
    let mut out = format!("Tool execution failed. Error: {error}");

    if tool_name == "advanced-code-analysis" && error.contains("does not exist") {
        out.push_str("\nThe target file does not exist yet; call filesystem.write to create it before analyzing it.");
    }
    if tool_name == "execution" {
        if let Some(command) = params.get("command").and_then(Value::as_str) {
            out.push_str(&format!("\nCommand attempted: {command}"));
        }
    }

    if prior_failures >= REPEATED_FAILURE_THRESHOLD {
        out.push_str(&format!(
            "\nWarning: this call has now failed {} times with the same arguments. Try a different approach instead of repeating it.",
            prior_failures + 1
        ));
    }
    out
}

/// The one-line banner shown in the terminal as a call starts or finishes
/// (spec.md §4.4 step 10).
pub fn format_banner_start(tool_name: &str, params: &Value) -> String {
    match tool_name {
        "execution" => {
            let command = params.get("command").and_then(Value::as_str).unwrap_or("?");
            format!("$ {command}")
        }
        "filesystem" if params.get("operation").and_then(Value::as_str) == Some("write") => {
            let path = params.get("path").and_then(Value::as_str).unwrap_or("?");
            format!("Creating file: {path}")
        }
        _ => format!("Running {tool_name}..."),
    }
}

pub fn format_banner_end(result: &ToolResult, elapsed_secs: f64) -> String {
    if result.is_success() {
        if elapsed_secs >= 1.0 {
            format!("done ({elapsed_secs:.1}s)")
        } else {
            "done".to_string()
        }
    } else {
        format!("failed: {}", result.error.as_deref().unwrap_or("unknown error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filesystem_list_truncates_beyond_twenty() {
        let entries: Vec<Value> = (0..25)
            .map(|i| json!({"name": format!("f{i}.txt"), "is_dir": false, "size": 1}))
            .collect();
        let data = json!({"entries": entries});
        let result = ToolResult::success(data);
        let rendered = format_result("filesystem", &json!({"operation": "list"}), &result, 0);
        assert!(rendered.contains("... and 5 more"));
    }

    #[test]
    fn filesystem_write_success_discourages_rewrite() {
        let result = ToolResult::success(json!({"path": "a.txt", "bytes_written": 5}));
        let rendered = format_result("filesystem", &json!({"operation": "write"}), &result, 0);
        assert!(rendered.contains("do NOT need to create this file again"));
    }

    #[test]
    fn search_renders_matches_with_location() {
        let data = json!({
            "matches": [{"path": "a.rs", "line": 3, "column": 5, "text": "todo!()"}],
            "files_scanned": 4,
            "truncated": false,
        });
        let result = ToolResult::success(data);
        let rendered = format_result("search", &json!({}), &result, 0);
        assert!(rendered.contains("a.rs:3:5: todo!()"));
    }

    #[test]
    fn failure_includes_repeated_warning_past_threshold() {
        let result = ToolResult::failure("boom");
        let rendered = format_result("execution", &json!({"command": "ls"}), &result, 2);
        assert!(rendered.contains("failed 3 times"));
    }

    #[test]
    fn failure_below_threshold_has_no_warning() {
        let result = ToolResult::failure("boom");
        let rendered = format_result("execution", &json!({"command": "ls"}), &result, 0);
        assert!(!rendered.contains("Warning"));
    }

    #[test]
    fn analysis_failure_suggests_writing_file_first() {
        let result = ToolResult::failure("path 'x.rs' does not exist");
        let rendered = format_result("advanced-code-analysis", &json!({}), &result, 0);
        assert!(rendered.contains("filesystem.write"));
    }
}
