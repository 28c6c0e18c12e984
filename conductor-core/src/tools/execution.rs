//! Execution tool: the reference implementation of the tool contract
//! (spec.md §4.7). Spawns a subprocess, enforces a timeout with a
//! gentle-then-forcible kill, and honors external cancellation.

use super::{
    DisplayOutput, ParameterKind, Tool, ToolCategory, ToolContext, ToolDefinition, ToolMetadata,
    ToolParameter, ToolResult,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout as tokio_timeout;

/// Commands whose basename is never allowed, regardless of arguments.
const DANGEROUS_COMMANDS: &[&str] = &[
    "rm", "rmdir", "dd", "mkfs", "shred", "format", "fdisk", "chmod", "chown", "passwd",
    "sudo", "su", "doas", "shutdown", "reboot", "halt", "poweroff", "kill", "killall", "pkill",
    "mount", "umount", "iptables",
];

/// Commands that are inferred to need a shell when no explicit `shell` flag
/// is given (spec.md §4.7).
const SHELL_INFERRED_COMMANDS: &[&str] = &[
    "node", "npm", "yarn", "git", "ls", "cd", "mkdir", "rm", "cp", "mv", "echo", "cat",
];

const GRACE_PERIOD: Duration = Duration::from_secs(2);

pub struct ExecutionTool {
    definition: ToolDefinition,
}

impl Default for ExecutionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionTool {
    pub fn new() -> Self {
        let definition = ToolDefinition::new(
            "execution",
            "Run a shell command inside the project root with a timeout and output capture.",
            ToolCategory::Execution,
            vec![
                ToolParameter::required("command", ParameterKind::String, "the program to run"),
                ToolParameter::optional("args", ParameterKind::Array, "arguments to pass to the program")
                    .with_default(json!([])),
                ToolParameter::optional("cwd", ParameterKind::String, "working directory, relative to the project root"),
                ToolParameter::optional("timeout", ParameterKind::Number, "timeout in milliseconds")
                    .with_default(json!(30_000)),
                ToolParameter::optional("env", ParameterKind::Object, "environment variables merged over the context environment"),
                ToolParameter::optional("shell", ParameterKind::Boolean, "force shell invocation"),
                ToolParameter::optional("capture_output", ParameterKind::Boolean, "capture stdout/stderr")
                    .with_default(json!(true)),
                ToolParameter::optional("allowed_commands", ParameterKind::Array, "override whitelist for this call"),
            ],
        )
        .with_display(DisplayOutput::Banner);

        Self { definition }
    }

    /// Reject dangerous commands and file-creation-via-redirection. Mirrors
    /// spec.md §4.7's safety rules, factored so the dispatcher's safety
    /// gating and this tool's own guard stay in sync.
    pub fn check_safety(command: &str, args: &[String], allowed: Option<&[String]>) -> Result<(), String> {
        let basename = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);

        if DANGEROUS_COMMANDS.contains(&basename) {
            return Err(format!(
                "command '{basename}' is not allowed; use the filesystem tool for file management"
            ));
        }

        if let Some(allowed) = allowed {
            if !allowed.iter().any(|a| a == basename) {
                return Err(format!("command '{basename}' is not in the allowed commands list for this call"));
            }
        }

        let full_command = std::iter::once(command.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        let redirects_output = matches!(basename, "echo" | "cat" | "printf")
            && (full_command.contains('>') || args.iter().any(|a| a == ">" || a == ">>"));
        if redirects_output {
            return Err(
                "shell redirection to create files is not allowed; use the filesystem tool with operation \"write\" instead"
                    .to_string(),
            );
        }

        Ok(())
    }

    fn infer_shell(command: &str, explicit: Option<bool>) -> bool {
        explicit.unwrap_or_else(|| SHELL_INFERRED_COMMANDS.contains(&command))
    }
}

#[async_trait]
impl Tool for ExecutionTool {
    fn metadata(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult {
        let Some(command) = params.get("command").and_then(Value::as_str) else {
            return ToolResult::failure("missing required parameter 'command'");
        };
        let args: Vec<String> = params
            .get("args")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let allowed_commands: Option<Vec<String>> = params.get("allowed_commands").and_then(Value::as_array).map(|arr| {
            arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()
        });

        if let Err(reason) = Self::check_safety(command, &args, allowed_commands.as_deref()) {
            return ToolResult::failure(format!("safety violation: {reason}"));
        }

        let cwd = match params.get("cwd").and_then(Value::as_str) {
            Some(relative) => match super::resolve_within_root(&context.project_root, relative) {
                Ok(p) => p,
                Err(reason) => return ToolResult::failure(format!("safety violation: {reason}")),
            },
            None => context.working_directory.clone(),
        };

        let timeout_ms = params.get("timeout").and_then(Value::as_u64).unwrap_or(30_000);
        let capture_output = params.get("capture_output").and_then(Value::as_bool).unwrap_or(true);
        let shell = Self::infer_shell(command, params.get("shell").and_then(Value::as_bool));

        let mut env: HashMap<String, String> = context.environment.clone();
        if let Some(Value::Object(overrides)) = params.get("env") {
            for (k, v) in overrides {
                if let Some(s) = v.as_str() {
                    env.insert(k.clone(), s.to_string());
                }
            }
        }

        let mut cmd = if shell {
            let mut c = Command::new(if cfg!(windows) { "cmd" } else { "sh" });
            let flag = if cfg!(windows) { "/C" } else { "-c" };
            let joined = std::iter::once(command.to_string()).chain(args.iter().cloned()).collect::<Vec<_>>().join(" ");
            c.arg(flag).arg(joined);
            c
        } else {
            let mut c = Command::new(command);
            c.args(&args);
            c
        };

        cmd.current_dir(&cwd);
        cmd.envs(&env);
        cmd.kill_on_drop(true);
        if capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return ToolResult::failure(format!("failed to spawn '{command}': {e}")),
        };
        let pid = child.id();

        // Drain the pipes concurrently with the wait below: a child that
        // writes more than the OS pipe buffer would otherwise block on
        // write() with nobody reading, and `child.wait()` would never
        // return.
        let stdout_task = child.stdout.take().map(|mut h| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = h.read_to_string(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut h| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = h.read_to_string(&mut buf).await;
                buf
            })
        });

        let primary = tokio::select! {
            biased;
            _ = context.abort.cancelled() => None,
            result = tokio_timeout(Duration::from_millis(timeout_ms), child.wait()) => Some(result),
        };

        let (status, timed_out) = match primary {
            Some(Ok(status)) => (status, false),
            Some(Err(_)) | None => {
                terminate_gracefully(pid);
                match tokio_timeout(GRACE_PERIOD, child.wait()).await {
                    Ok(status) => (status, true),
                    Err(_) => {
                        let _ = child.start_kill();
                        (child.wait().await, true)
                    }
                }
            }
        };

        let stdout = match stdout_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let execution_time = started.elapsed();
        let exit_code = status.as_ref().ok().and_then(|s| s.code());
        let success = !timed_out && status.as_ref().map(|s| s.success()).unwrap_or(false);

        let data = json!({
            "command": command,
            "exit_code": exit_code,
            "stdout": stdout,
            "stderr": stderr,
            "timed_out": timed_out,
        });

        let metadata = ToolMetadata::default().with_execution_time(execution_time.as_millis() as u64);

        if success {
            ToolResult::success_with_metadata(data, metadata)
        } else if timed_out {
            ToolResult::failure_with_metadata(format!("command '{command}' timed out after {timeout_ms}ms"), metadata)
                .with_data(data)
        } else {
            ToolResult::failure_with_metadata(
                format!("command '{command}' exited with code {:?}", exit_code),
                metadata,
            )
            .with_data(data)
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(pid: Option<u32>) {
    if let Some(pid) = pid {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ToolContext {
        ToolContext::new(std::env::temp_dir())
    }

    #[test]
    fn dangerous_command_is_rejected() {
        let err = ExecutionTool::check_safety("rm", &["-rf".to_string(), "/".to_string()], None).unwrap_err();
        assert!(err.contains("not allowed"));
    }

    #[test]
    fn redirection_via_echo_is_rejected() {
        let err = ExecutionTool::check_safety("echo", &["hi".to_string(), ">".to_string(), "out.txt".to_string()], None)
            .unwrap_err();
        assert!(err.contains("shell redirection"));
    }

    #[test]
    fn allowed_commands_whitelist_is_enforced() {
        let allowed = vec!["ls".to_string()];
        assert!(ExecutionTool::check_safety("ls", &[], Some(&allowed)).is_ok());
        assert!(ExecutionTool::check_safety("grep", &[], Some(&allowed)).is_err());
    }

    #[tokio::test]
    async fn successful_command_reports_exit_code_zero() {
        let tool = ExecutionTool::new();
        let ctx = context();
        let result = tool
            .execute(json!({"command": "true", "args": []}), &ctx)
            .await;
        assert!(result.is_success());
        assert_eq!(result.data.unwrap()["exit_code"], 0);
    }

    #[tokio::test]
    async fn failing_command_is_reported_as_failure() {
        let tool = ExecutionTool::new();
        let ctx = context();
        let result = tool.execute(json!({"command": "false", "args": []}), &ctx).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn timeout_is_honored_and_marks_timed_out() {
        let tool = ExecutionTool::new();
        let ctx = context();
        let result = tool
            .execute(json!({"command": "sleep", "args": ["5"], "timeout": 200}), &ctx)
            .await;
        assert!(!result.is_success());
        assert_eq!(result.data.as_ref().unwrap()["timed_out"], true);
    }
}
