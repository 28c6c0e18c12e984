//! LLM transport boundary (spec.md §6): a provider-agnostic streaming chat
//! call. The core only depends on this trait; the concrete NDJSON-over-HTTP
//! implementation lives in the binary crate.

use crate::error::OrchestratorError;
use crate::message::Message;
use crate::tools::OllamaToolSpec;
use futures::stream::BoxStream;
use serde_json::Value;

/// Everything needed to start one streamed chat turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<OllamaToolSpec>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>, messages: Vec<Message>, tools: Vec<OllamaToolSpec>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            messages,
            tools,
        }
    }
}

/// Arguments payload a streamed tool call arrives with. Some providers emit
/// the full JSON object in one shot; Ollama emits it as accumulated raw text
/// the parser later has to brace-balance.
#[derive(Debug, Clone)]
pub enum ArgumentsPayload {
    /// Not-yet-fully-parsed raw text, as extracted mid-stream by the parser.
    Raw(String),
    /// Already-parsed, complete JSON value.
    Parsed(Value),
}

impl ArgumentsPayload {
    /// Resolve to a concrete [`Value`], parsing [`Self::Raw`] on demand.
    pub fn into_value(self) -> Result<Value, OrchestratorError> {
        match self {
            Self::Parsed(value) => Ok(value),
            Self::Raw(text) => serde_json::from_str(&text).map_err(|e| OrchestratorError::ParseError(e.to_string())),
        }
    }
}

/// One event out of a streamed chat turn, in emission order.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of assistant-visible prose text.
    TextChunk { delta: String },
    /// A complete, named tool call with its arguments.
    ToolCall { name: String, arguments: ArgumentsPayload },
    /// The model finished this turn (end of stream, no more events follow).
    Done,
}

/// Streams one chat completion from an LLM endpoint. Implementations are
/// responsible for their own wire protocol (NDJSON, SSE, ...); the core only
/// ever sees [`StreamEvent`]s.
#[async_trait::async_trait]
pub trait LlmTransport: Send + Sync {
    async fn stream_chat(&self, request: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent, OrchestratorError>>, OrchestratorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_arguments_parse_into_value() {
        let payload = ArgumentsPayload::Raw(r#"{"path":"src/main.rs"}"#.to_string());
        let value = payload.into_value().unwrap();
        assert_eq!(value["path"], "src/main.rs");
    }

    #[test]
    fn invalid_raw_arguments_surface_parse_error() {
        let payload = ArgumentsPayload::Raw("{not json".to_string());
        let err = payload.into_value().unwrap_err();
        assert_eq!(err.kind(), "parse_error");
    }

    #[test]
    fn parsed_arguments_pass_through() {
        let payload = ArgumentsPayload::Parsed(serde_json::json!({"a": 1}));
        assert_eq!(payload.into_value().unwrap()["a"], 1);
    }
}
