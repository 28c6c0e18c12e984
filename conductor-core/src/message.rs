//! Conversation data model: roles, messages, and the ordered history.

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// Role a [`Message`] was authored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A single turn in the conversation.
///
/// Insertion order into [`ConversationHistory`] is preserved and significant;
/// messages are never reordered, only appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Only populated on assistant messages that requested tool calls.
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Correlation id of the tool call this message answers. Only set on
    /// `role: Tool` messages.
    pub tool_call_id: Option<String>,
    /// Name of the tool this message answers. Only set on `role: Tool` messages.
    pub tool_name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Ordered sequence of [`Message`]s with the well-formedness invariants from
/// the data model: every tool-result message must correlate to a tool call on
/// the most recent preceding assistant message, and appends never reorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Verify the well-formedness invariant: every tool-result message's
    /// correlation id matches a tool call on the most recent preceding
    /// assistant message, and no correlation id is answered twice.
    pub fn check_well_formed(&self) -> Result<(), String> {
        let mut pending: Vec<String> = Vec::new();
        let mut answered: std::collections::HashSet<String> = std::collections::HashSet::new();

        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    pending = message
                        .tool_calls
                        .as_ref()
                        .map(|calls| calls.iter().map(|c| c.id.clone()).collect())
                        .unwrap_or_default();
                }
                Role::Tool => {
                    let id = message
                        .tool_call_id
                        .as_ref()
                        .ok_or_else(|| "tool message missing tool_call_id".to_string())?;
                    if !pending.contains(id) {
                        return Err(format!(
                            "tool result {id} does not correlate to the preceding assistant message's tool calls"
                        ));
                    }
                    if !answered.insert(id.clone()) {
                        return Err(format!("tool result {id} answered more than once"));
                    }
                }
                Role::User | Role::System => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCall;

    #[test]
    fn well_formed_history_passes() {
        let mut history = ConversationHistory::new();
        history.push(Message::user("hello"));
        history.push(Message::assistant(
            "",
            vec![ToolCall::new("call-1", "filesystem", serde_json::json!({}))],
        ));
        history.push(Message::tool_result("call-1", "filesystem", "ok"));
        assert!(history.check_well_formed().is_ok());
    }

    #[test]
    fn double_answered_call_is_rejected() {
        let mut history = ConversationHistory::new();
        history.push(Message::assistant(
            "",
            vec![ToolCall::new("call-1", "filesystem", serde_json::json!({}))],
        ));
        history.push(Message::tool_result("call-1", "filesystem", "ok"));
        history.push(Message::tool_result("call-1", "filesystem", "ok again"));
        assert!(history.check_well_formed().is_err());
    }

    #[test]
    fn orphan_tool_result_is_rejected() {
        let mut history = ConversationHistory::new();
        history.push(Message::tool_result("call-1", "filesystem", "ok"));
        assert!(history.check_well_formed().is_err());
    }
}
