//! Error taxonomy for the orchestrator core.
//!
//! Every variant here corresponds to a failure mode a tool dispatch can hit.
//! Dispatch never lets one of these escape as a Rust error to the turn loop:
//! `ToolDispatcher::dispatch` always converts it into a failure [`crate::tools::ToolResult`]
//! before returning, so the model gets a chance to recover. The only
//! exceptions are the outer loop's own budget exhaustions, which escalate
//! through [`crate::orchestrator::TerminationReason`] instead of this enum.

use thiserror::Error;

/// Taxonomy of errors a tool dispatch can produce.
#[derive(Debug, Error, Clone)]
pub enum OrchestratorError {
    #[error("failed to parse tool arguments: {0}")]
    ParseError(String),

    #[error("tool '{name}' does not exist. Available tools: {available}{suggestion}", suggestion = suggestion_suffix(.suggestions))]
    UnknownTool {
        name: String,
        available: String,
        suggestions: Vec<String>,
    },

    #[error("parameter validation failed for '{tool}': {reason}")]
    ValidationError { tool: String, reason: String },

    #[error("approval for tool '{tool}' (category '{category}') was denied")]
    ApprovalDenied { tool: String, category: String },

    #[error("approval for tool '{tool}' timed out after {timeout_secs}s")]
    ApprovalTimeout { tool: String, timeout_secs: u64 },

    #[error("duplicate call to '{tool}' suppressed (last run ~{age_secs}s ago)")]
    RapidDuplicate { tool: String, age_secs: u64 },

    #[error("retry of failing call to '{tool}' suppressed (failed ~{age_secs}s ago)")]
    FailedRetryBlocked { tool: String, age_secs: u64 },

    #[error(
        "'{tool}' has been called {count} times with identical arguments and is now blocked for this conversation"
    )]
    BlockedSignature { tool: String, count: u32 },

    #[error("plan '{plan_id}' has not been approved for execution")]
    PlanNotApproved { plan_id: String },

    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    TimeoutError { tool: String, timeout_secs: u64 },

    #[error("safety violation: {reason}")]
    SafetyViolation { reason: String },

    #[error("execution failed: {reason}")]
    ExecutionError { reason: String },

    #[error("LLM transport error: {0}")]
    TransportError(String),
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(". Did you mean: {}?", suggestions.join(", "))
    }
}

impl OrchestratorError {
    /// Short machine-readable kind, used by the formatter and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParseError(_) => "parse_error",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::ValidationError { .. } => "validation_error",
            Self::ApprovalDenied { .. } => "approval_denied",
            Self::ApprovalTimeout { .. } => "approval_timeout",
            Self::RapidDuplicate { .. } => "rapid_duplicate",
            Self::FailedRetryBlocked { .. } => "failed_retry_blocked",
            Self::BlockedSignature { .. } => "blocked_signature",
            Self::PlanNotApproved { .. } => "plan_not_approved",
            Self::TimeoutError { .. } => "timeout",
            Self::SafetyViolation { .. } => "safety_violation",
            Self::ExecutionError { .. } => "execution_error",
            Self::TransportError(_) => "transport_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_renders_suggestions() {
        let err = OrchestratorError::UnknownTool {
            name: "flesystem".to_string(),
            available: "filesystem, execution".to_string(),
            suggestions: vec!["filesystem".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("Did you mean: filesystem?"));
        assert_eq!(err.kind(), "unknown_tool");
    }

    #[test]
    fn unknown_tool_without_suggestions_has_no_suffix() {
        let err = OrchestratorError::UnknownTool {
            name: "zzz".to_string(),
            available: "filesystem".to_string(),
            suggestions: vec![],
        };
        assert!(!err.to_string().contains("Did you mean"));
    }
}
