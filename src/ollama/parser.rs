//! Turns one parsed NDJSON `/api/chat` line into zero or more [`StreamEvent`]s.
//!
//! Kept as a pure function over a `serde_json::Value` so it can be unit
//! tested without a server, the same shape as the model-pull event mapper
//! this is adapted from.

use conductor_core::transport::{ArgumentsPayload, StreamEvent};
use serde_json::Value as JsonValue;

/// Map one decoded chat-chunk object to the events it implies. A chunk can
/// carry assistant text, zero or more tool calls, or the terminal `done` flag
/// (which may coincide with trailing text in the same chunk).
pub fn events_from_value(value: &JsonValue) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(message) = value.get("message") {
        if let Some(content) = message.get("content").and_then(|c| c.as_str()) {
            if !content.is_empty() {
                events.push(StreamEvent::TextChunk {
                    delta: content.to_string(),
                });
            }
        }

        if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
            for call in calls {
                if let Some(event) = tool_call_from_value(call) {
                    events.push(event);
                }
            }
        }
    }

    if value.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        events.push(StreamEvent::Done);
    }

    events
}

fn tool_call_from_value(call: &JsonValue) -> Option<StreamEvent> {
    let function = call.get("function")?;
    let name = function.get("name")?.as_str()?.to_string();
    let arguments = function.get("arguments").cloned().unwrap_or(JsonValue::Null);
    Some(StreamEvent::ToolCall {
        name,
        arguments: ArgumentsPayload::Parsed(arguments),
    })
}
