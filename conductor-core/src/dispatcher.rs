//! Tool dispatcher (spec.md §4.4): resolves, authorizes, deduplicates,
//! executes, caches, and reports a single tool call.

use crate::approval::Approver;
use crate::config::OrchestratorConfig;
use crate::dedup::DedupDecision;
use crate::error::OrchestratorError;
use crate::formatter::{format_banner_end, format_banner_start, format_result};
use crate::session::OrchestratorState;
use crate::signature::{signature as build_signature, suggest};
use crate::tools::{ToolCall, ToolContext, ToolRegistry, ToolResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout as tokio_timeout;

/// Everything the turn loop needs after one dispatch: the raw result, the
/// model-facing rendered text, and the terminal banner lines.
pub struct DispatchOutcome {
    pub result: ToolResult,
    pub rendered: String,
    pub banner_start: String,
    pub banner_end: String,
    /// The dedup signature this call resolved to, if resolution got far
    /// enough to compute one. The turn loop uses this to block a signature
    /// when a duplicate threshold trips.
    pub signature: Option<String>,
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    approver: Arc<dyn Approver>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, approver: Arc<dyn Approver>) -> Self {
        Self { registry, approver }
    }

    pub async fn dispatch(&self, call: &ToolCall, context: &ToolContext, config: &OrchestratorConfig, state: &mut OrchestratorState) -> DispatchOutcome {
        let banner_start = format_banner_start(&call.name, &call.parameters);
        let started = Instant::now();

        let (result, signature_opt, was_flagged_duplicate, ran) = self.dispatch_inner(call, context, config, state).await;

        let mut prior_failures = 0;
        if let Some(signature) = &signature_opt {
            prior_failures = state.failure_counts.get(signature).copied().unwrap_or(0);
            // Only a call that actually reached execution should update the
            // recent-calls TTL record: a dedup-rejected call (rapid
            // duplicate, failed-retry block, blocked signature) never ran
            // against the stored attempt, so touching its outcome here
            // would flip a successful record to failed without resetting
            // `inserted_at`, blocking a legitimate re-run past the rapid
            // TTL as though it were still within the failed-retry window.
            if ran {
                state.recent_calls.record_outcome(signature, result.is_success());
            }
            state.record_duplicate_outcome(signature, result.is_success(), was_flagged_duplicate);
            state.failure_counts.insert(signature.clone(), if result.is_success() { 0 } else { prior_failures + 1 });
        }
        state.result_cache.insert(call.id.clone(), result.clone());

        let rendered = format_result(&call.name, &call.parameters, &result, prior_failures);
        let banner_end = format_banner_end(&result, started.elapsed().as_secs_f64());

        DispatchOutcome {
            result,
            rendered,
            banner_start,
            banner_end,
            signature: signature_opt,
        }
    }

    /// Returns `(result, signature-if-one-was-computed, was-flagged-duplicate,
    /// ran)`. The signature is `None` only for resolution failures, where no
    /// meaningful dedup key exists. `ran` is `true` once the call has passed
    /// dedup gating and [`crate::dedup::RecentCalls::record_attempt`] has
    /// been called for it — every return site below that point must report
    /// `ran = true` so the caller knows to update the recent-calls outcome.
    async fn dispatch_inner(&self, call: &ToolCall, context: &ToolContext, config: &OrchestratorConfig, state: &mut OrchestratorState) -> (ToolResult, Option<String>, bool, bool) {
        // 1. Resolution.
        let Some(tool) = self.registry.get(&call.name).cloned() else {
            let available: Vec<&str> = self.registry.names();
            let suggestions = suggest(&call.name, available.iter().copied());
            let err = OrchestratorError::UnknownTool {
                name: call.name.clone(),
                available: available.join(", "),
                suggestions,
            };
            return (ToolResult::failure(err.to_string()), None, false, false);
        };

        // 2. Parameter parsing.
        let parameters = match resolve_parameters(&call.parameters) {
            Ok(v) => v,
            Err(e) => return (ToolResult::failure(OrchestratorError::ParseError(e).to_string()), None, false, false),
        };

        let signature = build_signature(&call.name, &parameters);

        // 3. Signature & deduplication.
        if state.is_blocked(&signature) {
            let count = state.consecutive_successful_duplicates.max(state.consecutive_duplicates);
            let err = OrchestratorError::BlockedSignature { tool: call.name.clone(), count };
            return (ToolResult::failure(err.to_string()), Some(signature), true, false);
        }

        match state.recent_calls.check(&signature, config.rapid_duplicate_ttl(), config.failed_retry_ttl()) {
            DedupDecision::Allow => {}
            DedupDecision::RapidDuplicate { age_secs } => {
                let err = OrchestratorError::RapidDuplicate { tool: call.name.clone(), age_secs };
                return (ToolResult::failure(err.to_string()), Some(signature), true, false);
            }
            DedupDecision::FailedRetryBlocked { age_secs } => {
                let err = OrchestratorError::FailedRetryBlocked { tool: call.name.clone(), age_secs };
                return (ToolResult::failure(err.to_string()), Some(signature), true, false);
            }
        }
        state.recent_calls.record_attempt(signature.clone());

        // 4. Approval.
        let category = tool.metadata().category;
        if config.require_approval_for_categories.contains(&category) {
            let decision = state.approval_cache.decision(&call.name, category);
            match decision {
                Some(false) => {
                    let err = OrchestratorError::ApprovalDenied { tool: call.name.clone(), category: category.to_string() };
                    return (ToolResult::failure(err.to_string()), Some(signature), false, true);
                }
                Some(true) => {}
                None => {
                    if config.skip_unapproved_tools {
                        return (
                            ToolResult::failure(format!(
                                "tool '{}' skipped: approval required for category '{category}' and prompting is disabled",
                                call.name
                            )),
                            Some(signature),
                            false,
                            true,
                        );
                    }
                    match tokio_timeout(config.approval_timeout(), self.approver.request_tool_approval(&call.name, category, &parameters)).await {
                        Ok(approved) => {
                            state.approval_cache.memoize_tool(call.name.clone(), category, approved);
                            if !approved {
                                let err = OrchestratorError::ApprovalDenied { tool: call.name.clone(), category: category.to_string() };
                                return (ToolResult::failure(err.to_string()), Some(signature), false, true);
                            }
                        }
                        Err(_) => {
                            let err = OrchestratorError::ApprovalTimeout { tool: call.name.clone(), timeout_secs: config.approval_timeout_secs };
                            return (ToolResult::failure(err.to_string()), Some(signature), false, true);
                        }
                    }
                }
            }
        }

        // 5. Plan-approval gate.
        if call.name == "planning" && parameters.get("operation").and_then(Value::as_str) == Some("execute") {
            let plan_id = parameters.get("plan_id").and_then(Value::as_str).unwrap_or_default().to_string();
            if !state.approved_plan_ids.remove(&plan_id) {
                let err = OrchestratorError::PlanNotApproved { plan_id };
                return (ToolResult::failure(err.to_string()), Some(signature), false, true);
            }
        }

        // 6. Parameter validation.
        if let Err(reason) = tool.validate_parameters(&parameters) {
            let err = OrchestratorError::ValidationError { tool: call.name.clone(), reason };
            return (ToolResult::failure(err.to_string()), Some(signature), false, true);
        }

        // 7. Execution with timeout.
        let call_context = context.with_child_abort();
        let timeout_secs = config.tool_timeout_secs;
        let mut result = tokio::select! {
            biased;
            _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => {
                call_context.abort.cancel();
                let err = OrchestratorError::TimeoutError { tool: call.name.clone(), timeout_secs };
                ToolResult::failure(err.to_string())
            }
            result = tool.execute(parameters.clone(), &call_context) => result,
        };

        // 8. Post-execute side effect: planning create.
        if call.name == "planning"
            && parameters.get("operation").and_then(Value::as_str) == Some("create")
            && result.is_success()
            && config.require_plan_approval
        {
            if let Some(data) = result.data.clone() {
                let plan_id = data.get("plan_id").and_then(Value::as_str).unwrap_or_default().to_string();
                let title = data.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
                let steps: Vec<String> = data
                    .get("steps")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();

                if self.approver.request_plan_approval(&plan_id, &title, &steps).await {
                    state.approved_plan_ids.insert(plan_id);
                } else {
                    result.mark_execution_declined();
                }
            }
        }

        (result, Some(signature), false, true)
    }
}

/// Parse parameters delivered as a raw JSON string; pass through values
/// already shaped as objects/arrays/etc (spec.md §4.4 step 2, §3).
fn resolve_parameters(parameters: &Value) -> Result<Value, String> {
    match parameters {
        Value::String(raw) => serde_json::from_str(raw).map_err(|e| e.to_string()),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::AlwaysDeny;
    use crate::tools::{DisplayOutput, ParameterKind, Tool, ToolCategory, ToolDefinition, ToolParameter};
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool(ToolDefinition);

    #[async_trait]
    impl Tool for EchoTool {
        fn metadata(&self) -> &ToolDefinition {
            &self.0
        }
        async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
            ToolResult::success(params)
        }
    }

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool(ToolDefinition::new(
            "echo",
            "echoes parameters",
            ToolCategory::Core,
            vec![ToolParameter::required("x", ParameterKind::String, "x")],
        ).with_display(DisplayOutput::Inline))));
        Arc::new(registry)
    }

    fn ctx() -> ToolContext {
        ToolContext::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn unknown_tool_reports_suggestion() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let call = ToolCall::new("c1", "ecko", json!({"x": "1"}));
        let outcome = dispatcher.dispatch(&call, &ctx(), &OrchestratorConfig::default(), &mut state).await;
        assert!(!outcome.result.is_success());
        assert!(outcome.result.error.unwrap().contains("Did you mean: echo?"));
    }

    #[tokio::test]
    async fn successful_call_is_cached_under_call_id() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let call = ToolCall::new("c1", "echo", json!({"x": "1"}));
        let outcome = dispatcher.dispatch(&call, &ctx(), &OrchestratorConfig::default(), &mut state).await;
        assert!(outcome.result.is_success());
        assert!(state.result_cache.get("c1").is_some());
    }

    #[tokio::test]
    async fn rapid_repeat_of_same_signature_is_blocked() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let config = OrchestratorConfig::default();
        let call = ToolCall::new("c1", "echo", json!({"x": "1"}));
        dispatcher.dispatch(&call, &ctx(), &config, &mut state).await;

        let call2 = ToolCall::new("c2", "echo", json!({"x": "1"}));
        let outcome2 = dispatcher.dispatch(&call2, &ctx(), &config, &mut state).await;
        assert!(!outcome2.result.is_success());
        assert!(outcome2.result.error.unwrap().contains("duplicate"));
    }

    #[tokio::test]
    async fn rapid_duplicate_rejection_does_not_corrupt_the_stored_success_outcome() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let config = OrchestratorConfig::default(); // rapid_duplicate_ttl_secs: 3

        let call = ToolCall::new("c1", "echo", json!({"x": "1"}));
        let first = dispatcher.dispatch(&call, &ctx(), &config, &mut state).await;
        assert!(first.result.is_success());

        // Immediate repeat: rejected as a rapid duplicate, never executes.
        let call2 = ToolCall::new("c2", "echo", json!({"x": "1"}));
        let second = dispatcher.dispatch(&call2, &ctx(), &config, &mut state).await;
        assert!(!second.result.is_success());

        // A later call, past the rapid-duplicate TTL but still inside the
        // failed-retry TTL, must still see the first call's *real* outcome
        // (success) rather than the rejected duplicate's failure. Zeroing
        // rapid_duplicate_ttl_secs here stands in for "time has passed"
        // without requiring the test to actually sleep.
        let later_config = OrchestratorConfig {
            rapid_duplicate_ttl_secs: 0,
            ..OrchestratorConfig::default()
        };
        let call3 = ToolCall::new("c3", "echo", json!({"x": "1"}));
        let third = dispatcher.dispatch(&call3, &ctx(), &later_config, &mut state).await;
        assert!(third.result.is_success(), "a real success must still be allowed to re-run, not reported as a stale failure");
    }

    #[tokio::test]
    async fn approval_required_and_denied_fails_the_call() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let mut config = OrchestratorConfig::default();
        config.require_approval_for_categories.insert(ToolCategory::Core);
        let call = ToolCall::new("c1", "echo", json!({"x": "1"}));
        let outcome = dispatcher.dispatch(&call, &ctx(), &config, &mut state).await;
        assert!(!outcome.result.is_success());
        assert!(outcome.result.error.unwrap().contains("denied"));
    }

    #[tokio::test]
    async fn parse_error_for_malformed_string_parameters() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let call = ToolCall::new("c1", "echo", Value::String("{not json".to_string()));
        let outcome = dispatcher.dispatch(&call, &ctx(), &OrchestratorConfig::default(), &mut state).await;
        assert!(!outcome.result.is_success());
        assert!(outcome.result.error.unwrap().contains("failed to parse"));
    }

    #[tokio::test]
    async fn blocked_signature_short_circuits_before_execution() {
        let dispatcher = ToolDispatcher::new(registry_with_echo(), Arc::new(AlwaysDeny));
        let mut state = OrchestratorState::new(&OrchestratorConfig::default());
        let signature = build_signature("echo", &json!({"x": "1"}));
        state.blocked_signatures.insert(signature);
        let call = ToolCall::new("c1", "echo", json!({"x": "1"}));
        let outcome = dispatcher.dispatch(&call, &ctx(), &OrchestratorConfig::default(), &mut state).await;
        assert!(!outcome.result.is_success());
        assert!(outcome.result.error.unwrap().contains("blocked"));
    }
}
