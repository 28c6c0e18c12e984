//! Command-line surface (spec.md §6 "CLI surface"): one prompt, one model,
//! one working directory, repeatable `--auto-approve` category flags.

use clap::Parser;
use conductor_core::tools::ToolCategory;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "conductor", version, about = "Streaming tool-calling orchestrator")]
pub struct Cli {
    /// The user prompt to run.
    pub prompt: String,

    /// Model name passed to the LLM transport.
    #[arg(long, default_value = "llama3.1")]
    pub model: String,

    /// Working directory the session operates in. Defaults to the current directory.
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Category to pre-approve for the whole session. Repeatable.
    #[arg(long = "auto-approve", value_enum)]
    pub auto_approve: Vec<AutoApproveCategory>,

    /// Path to a TOML configuration file. Falls back to defaults when absent.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the Ollama-compatible endpoint.
    #[arg(long, default_value = "http://127.0.0.1:11434")]
    pub endpoint: String,
}

/// `clap::ValueEnum` mirror of [`ToolCategory`] (which itself only derives
/// `serde`, not `clap::ValueEnum`, since the core crate has no CLI opinions).
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum AutoApproveCategory {
    Core,
    Filesystem,
    Execution,
    Analysis,
    Planning,
    Search,
}

impl From<AutoApproveCategory> for ToolCategory {
    fn from(value: AutoApproveCategory) -> Self {
        match value {
            AutoApproveCategory::Core => ToolCategory::Core,
            AutoApproveCategory::Filesystem => ToolCategory::Filesystem,
            AutoApproveCategory::Execution => ToolCategory::Execution,
            AutoApproveCategory::Analysis => ToolCategory::Analysis,
            AutoApproveCategory::Planning => ToolCategory::Planning,
            AutoApproveCategory::Search => ToolCategory::Search,
        }
    }
}
