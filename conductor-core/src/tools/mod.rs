//! The tool contract, registry, and the reference tool implementations
//! (`execution`, `filesystem`, `search`, `advanced-code-analysis`, `planning`).

mod adapter;
mod analysis;
mod call;
mod definition;
mod execution;
mod filesystem;
mod path_guard;
mod planning;
mod registry;
mod search;

pub use adapter::{to_ollama_tools, OllamaFunctionSpec, OllamaToolSpec};
pub use analysis::AnalysisTool;
pub use call::{ToolCall, ToolMetadata, ToolResult};
pub use definition::{DisplayOutput, ParameterKind, ToolCategory, ToolDefinition, ToolParameter};
pub use execution::ExecutionTool;
pub use filesystem::FilesystemTool;
pub use path_guard::resolve_within_root;
pub use planning::PlanningTool;
pub use registry::ToolRegistry;
pub use search::SearchTool;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execution context threaded into every tool handler: the working directory,
/// the project root used for sandbox containment, the merged environment,
/// and a cancellation token the dispatcher fires on timeout or abort.
#[derive(Clone)]
pub struct ToolContext {
    pub working_directory: PathBuf,
    pub project_root: PathBuf,
    pub environment: HashMap<String, String>,
    pub abort: CancellationToken,
}

impl ToolContext {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            working_directory: project_root.clone(),
            project_root,
            environment: HashMap::new(),
            abort: CancellationToken::new(),
        }
    }

    /// Clone this context with a fresh child cancellation token: cancelling
    /// the child (e.g. on a per-call timeout) never cancels siblings, but
    /// cancelling this context's own token still propagates down to it.
    pub fn with_child_abort(&self) -> Self {
        Self {
            working_directory: self.working_directory.clone(),
            project_root: self.project_root.clone(),
            environment: self.environment.clone(),
            abort: self.abort.child_token(),
        }
    }
}

/// The tool handler contract every registered tool implements:
/// `validateParameters`, `execute`, and static `metadata`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static metadata: name, description, category, parameter schema.
    fn metadata(&self) -> &ToolDefinition;

    /// Validate `params` against the tool's parameter schema before `execute`
    /// is invoked. The default implementation checks only that every
    /// `required` parameter is present; tools with stricter needs override it.
    fn validate_parameters(&self, params: &Value) -> Result<(), String> {
        let Value::Object(map) = params else {
            return Err("parameters must be a JSON object".to_string());
        };
        for name in self.metadata().required_parameter_names() {
            if !map.contains_key(name) {
                return Err(format!("missing required parameter '{name}'"));
            }
        }
        Ok(())
    }

    /// Execute the tool against validated parameters.
    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult;
}

pub type ToolHandle = Arc<dyn Tool>;
