//! The turn loop (spec.md §4.1): the core state machine driving one user
//! prompt from an LLM request through streaming, tool dispatch, history
//! mutation, and the strict-priority termination decision.

use crate::config::OrchestratorConfig;
use crate::dispatcher::{DispatchOutcome, ToolDispatcher};
use crate::error::OrchestratorError;
use crate::message::{ConversationHistory, Message};
use crate::parser::StreamingToolCallParser;
use crate::renderer::TerminalRenderer;
use crate::session::OrchestratorState;
use crate::tools::{to_ollama_tools, ToolCall, ToolContext, ToolRegistry};
use crate::transport::{ArgumentsPayload, ChatRequest, LlmTransport, StreamEvent};
use futures::StreamExt;
use std::sync::Arc;

/// Outcome of [`Orchestrator::run_conversation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub turn_complete: bool,
    pub session_should_end: bool,
    pub reason: Option<String>,
}

impl TurnResult {
    fn complete() -> Self {
        Self {
            turn_complete: true,
            session_should_end: false,
            reason: None,
        }
    }

    fn ended(reason: TerminationReason) -> Self {
        Self {
            turn_complete: false,
            session_should_end: true,
            reason: Some(reason.as_str().to_string()),
        }
    }

    fn propagated(reason: String) -> Self {
        Self {
            turn_complete: false,
            session_should_end: true,
            reason: Some(reason),
        }
    }
}

/// Why the outer loop ended the session rather than completing the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    MaxTurns,
    MaxToolCalls,
    ConsecutiveFailures,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxTurns => "max_turns",
            Self::MaxToolCalls => "max_tool_calls",
            Self::ConsecutiveFailures => "consecutive_failures",
        }
    }
}

/// Drives the conversation: composes requests, streams responses, dispatches
/// tool calls, and decides when the turn — and the session — is done.
pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    dispatcher: ToolDispatcher,
    transport: Arc<dyn LlmTransport>,
    renderer: Arc<dyn TerminalRenderer>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ToolRegistry>, dispatcher: ToolDispatcher, transport: Arc<dyn LlmTransport>, renderer: Arc<dyn TerminalRenderer>) -> Self {
        Self {
            registry,
            dispatcher,
            transport,
            renderer,
        }
    }

    /// Run the outer loop (spec.md §4.1) to completion for one user prompt.
    /// Mutates `history` by appending every assistant and tool-result message
    /// produced along the way.
    pub async fn run_conversation(
        &self,
        history: &mut ConversationHistory,
        context: &ToolContext,
        config: &OrchestratorConfig,
        state: &mut OrchestratorState,
    ) -> TurnResult {
        if !config.enable_tool_calling {
            return TurnResult::complete();
        }

        let mut total_tool_calls: u32 = 0;
        let mut final_answer_requested = false;
        let mut consecutive_tool_only_turns: u32 = 0;
        let mut tool_budget_recovery_spent = false;
        let mut previous_turn_had_tool_calls = false;
        let mut call_ordinal: u64 = 0;

        for turn_count in 1..=config.max_conversation_turns {
            tracing::debug!(session_id = %state.session_id, turn_count, "starting turn");

            let system_prompt = self.compose_system_prompt(history);
            let definitions = self.registry.list();
            let tools = to_ollama_tools(&definitions);
            let request = ChatRequest::new(config.model.clone(), system_prompt, history.as_slice().to_vec(), tools);

            let mut stream = match self.transport.stream_chat(request).await {
                Ok(stream) => stream,
                Err(err) => return self.handle_transport_failure(err, previous_turn_had_tool_calls, history),
            };

            let mut parser = StreamingToolCallParser::new(config.max_streaming_parse_attempts);
            let mut turn_tool_calls: Vec<ToolCall> = Vec::new();
            let mut tool_result_messages: Vec<Message> = Vec::new();
            let mut embedded_json_len: usize = 0;
            let mut tool_budget_exceeded_this_turn = false;
            let mut planning_outcome: Option<bool> = None;
            let mut had_failure_this_turn = false;
            let mut last_signature: Option<String> = None;
            let mut watchdog_fired = false;
            let mut transport_failure: Option<OrchestratorError> = None;

            let watchdog_deadline = previous_turn_had_tool_calls.then(|| tokio::time::Instant::now() + config.model_response_after_tools_timeout());

            loop {
                let next_event = match watchdog_deadline {
                    Some(deadline) => {
                        tokio::select! {
                            biased;
                            _ = tokio::time::sleep_until(deadline) => {
                                watchdog_fired = true;
                                None
                            }
                            event = stream.next() => event,
                        }
                    }
                    None => stream.next().await,
                };

                if watchdog_fired {
                    tracing::warn!(session_id = %state.session_id, turn_count, "model-response-after-tools watchdog fired");
                    break;
                }

                let Some(event) = next_event else {
                    break;
                };

                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        transport_failure = Some(err);
                        break;
                    }
                };

                match event {
                    StreamEvent::TextChunk { delta } => {
                        if !looks_like_tool_call_fragment(&delta) {
                            self.renderer.write_chunk(&delta);
                        }
                        for extracted in parser.feed(&delta) {
                            embedded_json_len += extracted.matched_len;
                            if total_tool_calls >= config.max_tools_per_request {
                                tool_budget_exceeded_this_turn = true;
                                continue;
                            }
                            call_ordinal += 1;
                            total_tool_calls += 1;
                            let id = ToolCall::make_id(&extracted.name, epoch_millis(), call_ordinal);
                            let call = ToolCall::new(id, extracted.name, extracted.arguments);
                            self.dispatch_and_record(
                                call,
                                context,
                                config,
                                state,
                                &mut turn_tool_calls,
                                &mut tool_result_messages,
                                &mut had_failure_this_turn,
                                &mut planning_outcome,
                                &mut last_signature,
                            )
                            .await;
                        }
                    }
                    StreamEvent::ToolCall { name, arguments } => {
                        if total_tool_calls >= config.max_tools_per_request {
                            tool_budget_exceeded_this_turn = true;
                            continue;
                        }
                        call_ordinal += 1;
                        total_tool_calls += 1;
                        let parameters = match arguments {
                            ArgumentsPayload::Parsed(value) => value,
                            ArgumentsPayload::Raw(raw) => serde_json::Value::String(raw),
                        };
                        let id = ToolCall::make_id(&name, epoch_millis(), call_ordinal);
                        let call = ToolCall::new(id, name, parameters);
                        self.dispatch_and_record(
                            call,
                            context,
                            config,
                            state,
                            &mut turn_tool_calls,
                            &mut tool_result_messages,
                            &mut had_failure_this_turn,
                            &mut planning_outcome,
                            &mut last_signature,
                        )
                        .await;
                    }
                    StreamEvent::Done => break,
                }
            }

            let assistant_content = parser.accumulated_text().to_string();
            history.push(Message::assistant(assistant_content, turn_tool_calls.clone()));
            for message in tool_result_messages {
                history.push(message);
            }

            if watchdog_fired {
                return TurnResult::complete();
            }
            if let Some(err) = transport_failure {
                return self.handle_transport_failure(err, true, history);
            }

            let had_tool_calls_this_turn = !turn_tool_calls.is_empty();
            let stripped_len = parser_text_len(&parser, embedded_json_len);
            previous_turn_had_tool_calls = had_tool_calls_this_turn;

            if let Some(result) = self.decide_termination(
                state,
                config,
                turn_count,
                &mut final_answer_requested,
                &mut consecutive_tool_only_turns,
                &mut tool_budget_recovery_spent,
                had_tool_calls_this_turn,
                stripped_len,
                tool_budget_exceeded_this_turn,
                planning_outcome,
                had_failure_this_turn,
                last_signature,
                history,
            ) {
                return result;
            }
        }

        tracing::warn!(session_id = %state.session_id, "max conversation turns reached");
        TurnResult::ended(TerminationReason::MaxTurns)
    }

    /// Dispatch one call and fold its outcome into the turn's bookkeeping:
    /// the running message lists and the decision block's inputs.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_and_record(
        &self,
        call: ToolCall,
        context: &ToolContext,
        config: &OrchestratorConfig,
        state: &mut OrchestratorState,
        turn_tool_calls: &mut Vec<ToolCall>,
        tool_result_messages: &mut Vec<Message>,
        had_failure_this_turn: &mut bool,
        planning_outcome: &mut Option<bool>,
        last_signature: &mut Option<String>,
    ) {
        let outcome: DispatchOutcome = self.dispatch_one(&call, context, config, state).await;

        if !outcome.result.is_success() {
            *had_failure_this_turn = true;
        }
        if call.name == "planning" {
            *planning_outcome = Some(outcome.result.is_success());
        }
        *last_signature = outcome.signature.clone();

        tool_result_messages.push(Message::tool_result(call.id.clone(), call.name.clone(), outcome.rendered));
        turn_tool_calls.push(call);
    }

    async fn dispatch_one(&self, call: &ToolCall, context: &ToolContext, config: &OrchestratorConfig, state: &mut OrchestratorState) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(call, context, config, state).await;
        self.renderer.info(&outcome.banner_start);
        if outcome.result.is_success() {
            self.renderer.success(&outcome.banner_end);
        } else {
            self.renderer.error(&outcome.banner_end);
        }
        outcome
    }

    fn handle_transport_failure(&self, err: OrchestratorError, previous_turn_had_tool_calls: bool, _history: &mut ConversationHistory) -> TurnResult {
        tracing::error!(error = %err, previous_turn_had_tool_calls, "llm transport failure");
        if previous_turn_had_tool_calls {
            TurnResult::complete()
        } else {
            TurnResult::propagated(format!("transport_error: {err}"))
        }
    }

    /// Enhance the base system prompt with planning guidance when the
    /// latest user message looks complex (spec.md §4.1 step 1).
    fn compose_system_prompt(&self, history: &ConversationHistory) -> String {
        const BASE: &str = "You are a coding assistant with access to tools for reading and writing files, \
            running shell commands, searching code, analyzing code, and planning multi-step work. \
            Call tools by emitting either a native tool call or a single JSON object of the shape \
            {\"name\": ..., \"arguments\": {...}}.";

        let latest_user_message = history
            .as_slice()
            .iter()
            .rev()
            .find(|m| matches!(m.role, crate::message::Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("");

        if looks_complex(latest_user_message) {
            format!(
                "{BASE}\n\nThis request looks like it involves multiple steps. Consider using the \
                planning tool to draft a short plan before making changes, then execute it once approved."
            )
        } else {
            BASE.to_string()
        }
    }

    /// Strict-priority termination decision (spec.md §4.1 step 8). Returns
    /// `Some` when the turn loop should return that result immediately,
    /// `None` to continue to the next turn.
    #[allow(clippy::too_many_arguments)]
    fn decide_termination(
        &self,
        state: &mut OrchestratorState,
        config: &OrchestratorConfig,
        turn_count: u32,
        final_answer_requested: &mut bool,
        consecutive_tool_only_turns: &mut u32,
        tool_budget_recovery_spent: &mut bool,
        had_tool_calls_this_turn: bool,
        stripped_len: usize,
        tool_budget_exceeded_this_turn: bool,
        planning_outcome: Option<bool>,
        had_failure_this_turn: bool,
        last_signature: Option<String>,
        history: &mut ConversationHistory,
    ) -> Option<TurnResult> {
        // a. Consecutive failures take absolute priority.
        if state.consecutive_failures >= config.max_consecutive_failures {
            return Some(TurnResult::ended(TerminationReason::ConsecutiveFailures));
        }

        // b. We already asked for a final answer and the model is still silent.
        if *final_answer_requested && stripped_len <= 20 {
            return Some(TurnResult::complete());
        }

        // c. A substantial textual answer, tool calls or not: done.
        if stripped_len > 20 {
            *final_answer_requested = false;
            *consecutive_tool_only_turns = 0;
            return Some(TurnResult::complete());
        }

        // d. A planning call took priority over the tool-only-turn counters below.
        if let Some(succeeded) = planning_outcome {
            if !succeeded || turn_count >= 3 {
                return Some(TurnResult::complete());
            }
            return None;
        }

        // e. Tool budget exceeded this turn. Checked after c and d per the
        // priority order, but still ahead of the "no tool calls at all"
        // branch below: a turn where every attempted call was rejected for
        // being over budget dispatches zero calls, but that's a budget
        // overflow, not an ordinary tool-free final answer.
        if tool_budget_exceeded_this_turn {
            if *tool_budget_recovery_spent {
                return Some(TurnResult::ended(TerminationReason::MaxToolCalls));
            }
            history.push(Message::system(
                "The tool call budget for this request has been reached. Do not call any more tools; \
                provide your final answer in plain text now.",
            ));
            *tool_budget_recovery_spent = true;
            return None;
        }

        // No tool calls at all this turn: an ordinary final answer.
        if !had_tool_calls_this_turn {
            *final_answer_requested = false;
            *consecutive_tool_only_turns = 0;
            return Some(TurnResult::complete());
        }

        // Reached only for tool-only turns (no budget overflow, no planning call).
        *consecutive_tool_only_turns += 1;
        // f. Too many consecutive tool-only turns with no failures.
        if *consecutive_tool_only_turns >= config.max_consecutive_tool_only_turns && !had_failure_this_turn {
            history.push(Message::system(
                "You have made several tool calls without giving a final textual answer. Respond now \
                with a plain-text answer and make no further tool calls.",
            ));
            *final_answer_requested = true;
            *consecutive_tool_only_turns = 0;
            return None;
        }

        // g. Repeated successful duplicates: block the signature.
        if state.consecutive_successful_duplicates >= config.max_successful_duplicates {
            if let Some(signature) = &last_signature {
                state.blocked_signatures.insert(signature.clone());
            }
            history.push(Message::system(
                "You have called the same tool with the same arguments multiple times successfully. \
                Stop calling it and use the result you already have.",
            ));
            return None;
        }

        // h. Repeated failing duplicates: block the signature.
        if state.consecutive_duplicates >= config.max_consecutive_duplicates {
            if let Some(signature) = &last_signature {
                state.blocked_signatures.insert(signature.clone());
            }
            history.push(Message::system("Repeated calls to the same failing tool have been blocked. Try a different approach."));
            return None;
        }

        // i. Otherwise, keep going.
        None
    }
}

fn parser_text_len(parser: &StreamingToolCallParser, embedded_json_len: usize) -> usize {
    parser.accumulated_text().len().saturating_sub(embedded_json_len)
}

/// Best-effort heuristic: a chunk that opens a JSON object and names both
/// `"name"` and `"arguments"` is very likely in-band tool-call JSON rather
/// than assistant-visible prose. Chunk-local, so a call whose shape only
/// becomes apparent across several chunks may still leak a brace or two to
/// the terminal before the parser recognizes it; that trade-off favors never
/// silently eating real prose over a pixel-perfect suppression.
fn looks_like_tool_call_fragment(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') && trimmed.contains("\"name\"") && trimmed.contains("\"arguments\"")
}

/// Heuristic for "the latest user message looks complex" (spec.md §4.1 step 1).
fn looks_complex(message: &str) -> bool {
    const LENGTH_THRESHOLD: usize = 240;
    const STEP_MARKERS: [&str; 5] = ["\n1", "\n-", "\n*", " and then", " after that"];
    message.len() > LENGTH_THRESHOLD || STEP_MARKERS.iter().any(|marker| message.contains(marker))
}

fn epoch_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
