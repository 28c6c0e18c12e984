//! Concrete [`LlmTransport`] speaking the Ollama `/api/chat` NDJSON streaming
//! protocol.

use super::parser::events_from_value;
use async_trait::async_trait;
use conductor_core::error::OrchestratorError;
use conductor_core::message::{Message, Role};
use conductor_core::transport::{ChatRequest, LlmTransport, StreamEvent};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

const CONNECTION_ERROR: &str =
    "no running Ollama server detected; start it with `ollama serve`";

/// Client for a local or remote Ollama instance, speaking `/api/chat`.
pub struct OllamaTransport {
    client: reqwest::Client,
    host_root: String,
}

impl OllamaTransport {
    /// Build a client against `base_url` and confirm the server is reachable.
    pub async fn try_from_base_url(base_url: &str) -> Result<Self, OrchestratorError> {
        let host_root = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let transport = Self { client, host_root };
        transport.probe_server().await?;
        Ok(transport)
    }

    async fn probe_server(&self) -> Result<(), OrchestratorError> {
        let url = format!("{}/api/tags", self.host_root);
        let response = self.client.get(url).send().await.map_err(|err| {
            tracing::warn!(error = %err, "failed to connect to Ollama server");
            OrchestratorError::TransportError(CONNECTION_ERROR.to_string())
        })?;

        if response.status().is_success() {
            Ok(())
        } else {
            tracing::warn!(host = %self.host_root, status = %response.status(), "Ollama server probe failed");
            Err(OrchestratorError::TransportError(CONNECTION_ERROR.to_string()))
        }
    }
}

#[async_trait]
impl LlmTransport for OllamaTransport {
    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent, OrchestratorError>>, OrchestratorError> {
        let url = format!("{}/api/chat", self.host_root);
        let body = json!({
            "model": request.model,
            "messages": render_messages(&request.system_prompt, &request.messages),
            "tools": request.tools,
            "stream": true,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|err| OrchestratorError::TransportError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::TransportError(format!(
                "chat request failed: HTTP {}",
                response.status()
            )));
        }

        let mut bytes_stream = response.bytes_stream();
        let mut buf = String::new();

        let events = async_stream::stream! {
            while let Some(chunk) = bytes_stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        let Ok(text) = std::str::from_utf8(&bytes) else { continue; };
                        buf.push_str(text);
                        while let Some(pos) = buf.find('\n') {
                            let line = buf.drain(..=pos).collect::<String>();
                            let trimmed = line.trim();
                            if trimmed.is_empty() { continue; }
                            match serde_json::from_str::<JsonValue>(trimmed) {
                                Ok(value) => {
                                    if let Some(err_msg) = value.get("error").and_then(|e| e.as_str()) {
                                        yield Err(OrchestratorError::TransportError(err_msg.to_string()));
                                        return;
                                    }
                                    for event in events_from_value(&value) {
                                        yield Ok(event);
                                    }
                                }
                                Err(err) => {
                                    tracing::warn!(error = %err, line = %trimmed, "malformed NDJSON line from Ollama");
                                }
                            }
                        }
                    }
                    Err(err) => {
                        yield Err(OrchestratorError::TransportError(err.to_string()));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(events))
    }
}

fn render_messages(system_prompt: &str, messages: &[Message]) -> Vec<JsonValue> {
    let mut rendered = Vec::with_capacity(messages.len() + 1);
    rendered.push(json!({"role": "system", "content": system_prompt}));
    for message in messages {
        rendered.push(render_message(message));
    }
    rendered
}

fn render_message(message: &Message) -> JsonValue {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    };
    let mut rendered = json!({"role": role, "content": message.content});
    if let Some(object) = rendered.as_object_mut() {
        if let Some(tool_name) = &message.tool_name {
            object.insert("name".to_string(), json!(tool_name));
        }
    }
    rendered
}
