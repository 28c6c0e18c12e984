//! Binary entry point: wires the CLI surface (spec.md §6) to the
//! orchestrator core.

mod approve;
mod cli;
mod ollama;
mod render;

use approve::InteractiveApprover;
use clap::Parser;
use cli::Cli;
use conductor_core::approval::AlwaysDeny;
use conductor_core::dispatcher::ToolDispatcher;
use conductor_core::message::{ConversationHistory, Message};
use conductor_core::orchestrator::Orchestrator;
use conductor_core::session::OrchestratorState;
use conductor_core::tools::{
    AnalysisTool, ExecutionTool, FilesystemTool, PlanningTool, SearchTool, ToolCategory, ToolContext, ToolRegistry,
};
use conductor_core::OrchestratorConfig;
use ollama::OllamaTransport;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Categories gated behind interactive approval when the loaded config
/// doesn't already say otherwise.
const DEFAULT_GATED_CATEGORIES: [ToolCategory; 2] = [ToolCategory::Execution, ToolCategory::Filesystem];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let working_dir = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| ".".into()));

    let mut config = load_config(cli.config.as_deref());
    config.model = cli.model.clone();
    if config.require_approval_for_categories.is_empty() {
        config.require_approval_for_categories = DEFAULT_GATED_CATEGORIES.into_iter().collect();
    }

    let mut state = OrchestratorState::new(&config);
    for category in &cli.auto_approve {
        state.approval_cache.memoize_category((*category).into(), true);
    }

    let registry = Arc::new(build_registry());
    let approver: Arc<dyn conductor_core::approval::Approver> = if std::io::stdin().is_terminal() {
        Arc::new(InteractiveApprover)
    } else {
        Arc::new(AlwaysDeny)
    };
    let dispatcher = ToolDispatcher::new(Arc::clone(&registry), approver);

    let transport = match OllamaTransport::try_from_base_url(&cli.endpoint).await {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let renderer = Arc::new(render::StdoutRenderer);
    let orchestrator = Orchestrator::new(registry, dispatcher, transport, renderer);

    let context = ToolContext::new(working_dir);
    let mut history = ConversationHistory::new();
    history.push(Message::user(cli.prompt.clone()));

    let result = orchestrator.run_conversation(&mut history, &context, &config, &mut state).await;

    if result.session_should_end {
        if let Some(reason) = &result.reason {
            tracing::error!(reason, "session ended early");
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<&std::path::Path>) -> OrchestratorConfig {
    let Some(path) = path else {
        return OrchestratorConfig::default();
    };
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(error = %err, path = %path.display(), "failed to parse config file, using defaults");
            OrchestratorConfig::default()
        }),
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "failed to read config file, using defaults");
            OrchestratorConfig::default()
        }
    }
}

fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FilesystemTool::new()));
    registry.register(Arc::new(ExecutionTool::new()));
    registry.register(Arc::new(SearchTool::new()));
    registry.register(Arc::new(AnalysisTool::new()));
    registry.register(Arc::new(PlanningTool::new()));
    registry
}
