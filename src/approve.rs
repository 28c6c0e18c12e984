//! Interactive [`Approver`] (spec.md §4.4 step 4) backed by `dialoguer`
//! confirmation prompts. Falls back to auto-denial in a non-interactive
//! session, since there is nobody at the terminal to answer.

use async_trait::async_trait;
use conductor_core::approval::Approver;
use conductor_core::tools::ToolCategory;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use serde_json::Value;
use std::io::IsTerminal;

pub struct InteractiveApprover;

impl InteractiveApprover {
    fn is_interactive() -> bool {
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
    }

    fn confirm(prompt: String) -> bool {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

#[async_trait]
impl Approver for InteractiveApprover {
    async fn request_tool_approval(&self, tool: &str, category: ToolCategory, parameters: &Value) -> bool {
        if !Self::is_interactive() {
            tracing::warn!(tool, ?category, "non-interactive session; denying approval request");
            return false;
        }
        let prompt = format!("Allow '{tool}' ({category:?}) to run with {parameters}?");
        tokio::task::spawn_blocking(move || Self::confirm(prompt)).await.unwrap_or(false)
    }

    async fn request_plan_approval(&self, plan_id: &str, title: &str, steps: &[String]) -> bool {
        if !Self::is_interactive() {
            tracing::warn!(plan_id, "non-interactive session; denying plan approval request");
            return false;
        }
        let mut prompt = format!("Execute plan '{title}' ({plan_id})?\n");
        for (index, step) in steps.iter().enumerate() {
            prompt.push_str(&format!("  {}. {step}\n", index + 1));
        }
        tokio::task::spawn_blocking(move || Self::confirm(prompt)).await.unwrap_or(false)
    }
}
