// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments with local LLMs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::check_status;
use super::sse::{decode_events, Framing};
use crate::domain::adapter::Adapter;
use crate::domain::error::{GatewayError, UnsupportedPartError};
use crate::domain::request::{
    AiRequest, ChatMessage, MessagePart, RequestKind, RequestOptions, RequestPayload, Role,
    ToolDefinition,
};
use crate::domain::response::{
    AiResponse, ChatOutput, FinishReason, Message, MessageStream, ResponseBody, TokenUsage,
};
use crate::domain::streaming::StreamEvent;

pub struct OllamaAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    tools_enabled: bool,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction,
}

#[derive(Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Chat reply; streamed replies are a sequence of these, one per line
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaResponseMessage>,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    role: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    done: bool,
    done_reason: Option<String>,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaAdapter {
    pub fn new(name: String, endpoint: String, model: String) -> Self {
        Self {
            name,
            client: reqwest::Client::new(),
            endpoint,
            model,
            tools_enabled: true,
        }
    }

    /// Not every local model was trained for tool calling
    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        check_status(response, &self.model).await
    }

    fn options(options: &RequestOptions) -> OllamaOptions {
        OllamaOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens.map(|t| t as i32),
            stop: options.stop_sequences.clone(),
        }
    }

    fn unsupported(&self, role: Role, part: &MessagePart) -> UnsupportedPartError {
        UnsupportedPartError {
            adapter: self.name.clone(),
            role,
            part: part.kind().to_string(),
        }
    }

    /// Ollama takes images as bare base64 strings, so remote image URLs
    /// cannot be forwarded.
    fn translate_message(&self, message: &ChatMessage) -> Result<OllamaMessage, UnsupportedPartError> {
        let mut translated = OllamaMessage {
            role: message.role.as_str(),
            content: String::new(),
            images: Vec::new(),
            tool_calls: Vec::new(),
        };

        for part in &message.parts {
            match (message.role, part) {
                (_, MessagePart::Text { text }) => translated.content.push_str(text),
                (Role::User, MessagePart::Image { data, .. }) => translated.images.push(data.clone()),
                (Role::Assistant, MessagePart::ToolCall { call }) => {
                    translated.tool_calls.push(OllamaToolCall {
                        id: Some(call.id.clone()),
                        function: OllamaFunctionCall {
                            name: call.name.clone(),
                            arguments: serde_json::Value::Object(call.arguments.clone()),
                        },
                    })
                }
                (Role::Tool, MessagePart::ToolResult { content, .. }) => {
                    translated.content.push_str(content)
                }
                (role, other) => return Err(self.unsupported(role, other)),
            }
        }
        Ok(translated)
    }

    fn chat_request<'a>(
        &'a self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &RequestOptions,
        stream: bool,
    ) -> Result<OllamaChatRequest<'a>, GatewayError> {
        let messages = messages
            .iter()
            .map(|m| self.translate_message(m))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OllamaChatRequest {
            model: &self.model,
            messages,
            tools: tools
                .iter()
                .map(|tool| OllamaTool {
                    kind: "function",
                    function: OllamaFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            stream,
            options: Some(Self::options(options)),
        })
    }

    fn response(&self, body: ResponseBody, usage: Option<TokenUsage>) -> AiResponse {
        let response = AiResponse::new(self.name.clone(), self.model.clone(), body);
        match usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        }
    }
}

fn usage(prompt: Option<u32>, completion: Option<u32>) -> Option<TokenUsage> {
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    let prompt_tokens = prompt.unwrap_or(0);
    let completion_tokens = completion.unwrap_or(0);
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens.saturating_add(completion_tokens),
    })
}

/// Events for one chat reply object.
///
/// Ollama delivers each tool call whole, so it becomes a start event plus a
/// single argument fragment. Calls without an id get a generated one.
fn message_events(message: OllamaResponseMessage) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if let Some(role) = message.role.as_deref() {
        events.push(StreamEvent::RoleMarker(super::parse_role(role)));
    }
    if !message.content.is_empty() {
        events.push(StreamEvent::TextDelta(message.content));
    }
    for call in message.tool_calls {
        let id = call
            .id
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
        events.push(StreamEvent::ToolCallStart {
            id,
            name: call.function.name,
        });
        let arguments = match call.function.arguments {
            serde_json::Value::Null => String::new(),
            // some models return the arguments pre-encoded
            serde_json::Value::String(encoded) => encoded,
            other => other.to_string(),
        };
        events.push(StreamEvent::ArgumentFragment(arguments));
    }
    events
}

/// Translate one NDJSON line of a streamed chat
fn line_events(line: &str) -> Result<Vec<StreamEvent>, GatewayError> {
    let chunk: OllamaChatResponse = serde_json::from_str(line)
        .map_err(|e| GatewayError::Provider(format!("Failed to parse stream line: {}", e)))?;
    if let Some(error) = chunk.error {
        return Err(GatewayError::Provider(error));
    }
    Ok(chunk.message.map(message_events).unwrap_or_default())
}

#[async_trait]
impl Adapter for OllamaAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, request: &AiRequest) -> bool {
        request.kind() != RequestKind::Image && (self.tools_enabled || !request.has_tools())
    }

    async fn handle_request(&self, request: &AiRequest) -> Result<AiResponse, GatewayError> {
        match &request.payload {
            RequestPayload::Chat {
                messages,
                tools,
                stream,
            } => {
                let body = self.chat_request(messages, tools, &request.options, *stream)?;
                let response = self.post("api/chat", &body).await?;

                if *stream {
                    debug!("Opened Ollama stream for model {}", self.model);
                    let events = decode_events(response.bytes_stream(), Framing::Ndjson, line_events);
                    return Ok(self.response(
                        ResponseBody::Chat(ChatOutput::Stream(MessageStream::new(events))),
                        None,
                    ));
                }

                let reply: OllamaChatResponse = response
                    .json()
                    .await
                    .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;
                if let Some(error) = reply.error {
                    return Err(GatewayError::Provider(error));
                }
                let events = reply.message.map(message_events).unwrap_or_default();
                let message = Message::from_events(events)?;
                Ok(self.response(
                    ResponseBody::Chat(ChatOutput::Complete(message)),
                    usage(reply.prompt_eval_count, reply.eval_count),
                ))
            }
            RequestPayload::Completion { prompt } => {
                let body = OllamaGenerateRequest {
                    model: &self.model,
                    prompt,
                    stream: false,
                    options: Some(Self::options(&request.options)),
                };
                let ollama_response: OllamaGenerateResponse = self
                    .post("api/generate", &body)
                    .await?
                    .json()
                    .await
                    .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;

                let finish_reason = match ollama_response.done_reason.as_deref() {
                    Some(reason) => FinishReason::from_provider(reason),
                    None if ollama_response.done => FinishReason::Stop,
                    None => FinishReason::Length,
                };
                Ok(self.response(
                    ResponseBody::Completion {
                        text: ollama_response.response,
                        finish_reason,
                    },
                    usage(ollama_response.prompt_eval_count, ollama_response.eval_count),
                ))
            }
            RequestPayload::Embedding { input } => {
                let body = OllamaEmbedRequest {
                    model: &self.model,
                    input,
                };
                let response: OllamaEmbedResponse = self
                    .post("api/embed", &body)
                    .await?
                    .json()
                    .await
                    .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;
                Ok(self.response(
                    ResponseBody::Embedding {
                        vectors: response.embeddings,
                    },
                    None,
                ))
            }
            RequestPayload::Image { .. } => Err(GatewayError::InvalidInput(format!(
                "Adapter '{}' does not serve image requests",
                self.name
            ))),
        }
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        // Check if Ollama server is running by listing models
        let response = self
            .client
            .get(self.url("api/tags"))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::streaming::fragments;

    fn adapter() -> OllamaAdapter {
        OllamaAdapter::new(
            "local".to_string(),
            "http://localhost:11434".to_string(),
            "llama3.2".to_string(),
        )
    }

    #[test]
    fn test_usage_total_saturates() {
        let usage = usage(Some(u32::MAX), Some(10)).unwrap();
        assert_eq!(usage.completion_tokens, 10);
        assert_eq!(usage.total_tokens, u32::MAX);
        assert!(super::usage(None, None).is_none());
    }

    #[test]
    fn test_whole_tool_call_line_becomes_start_and_fragment() {
        let line = r#"{"model":"llama3.2","message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"get_weather","arguments":{"city":"Oslo"}}}]},"done":false}"#;
        let events = line_events(line).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::RoleMarker(Role::Assistant));
        match &events[1] {
            StreamEvent::ToolCallStart { id, name } => {
                assert!(id.starts_with("call_"));
                assert_eq!(name, "get_weather");
            }
            other => panic!("unexpected {:?}", other),
        }

        let out: Vec<_> = fragments(events).collect::<Result<_, _>>().unwrap();
        let call = out[0].as_tool_call().unwrap();
        assert_eq!(call.arguments["city"], serde_json::json!("Oslo"));
    }

    #[test]
    fn test_two_tool_calls_get_distinct_ids() {
        let line = r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"a","arguments":{}}},{"function":{"name":"b","arguments":{}}}]},"done":true}"#;
        let out: Vec<_> = fragments(line_events(line).unwrap())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_ne!(
            out[0].as_tool_call().unwrap().id,
            out[1].as_tool_call().unwrap().id
        );
    }

    #[test]
    fn test_error_line() {
        let err = line_events(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Provider(m) if m.contains("nope")));
    }

    #[test]
    fn test_image_url_is_unsupported() {
        let message = ChatMessage::new(
            Role::User,
            vec![MessagePart::ImageUrl { url: "https://x/y.png".to_string() }],
        );
        let err = adapter().translate_message(&message).unwrap_err();
        assert_eq!(err.part, "image_url");
        assert_eq!(err.role, Role::User);
    }

    #[test]
    fn test_inline_image_and_tool_result() {
        let user = ChatMessage::new(
            Role::User,
            vec![
                MessagePart::Text { text: "describe".to_string() },
                MessagePart::Image {
                    mime_type: "image/jpeg".to_string(),
                    data: "BASE64".to_string(),
                },
            ],
        );
        let wire = serde_json::to_value(adapter().translate_message(&user).unwrap()).unwrap();
        assert_eq!(wire["images"][0], "BASE64");
        assert_eq!(wire["content"], "describe");

        let tool = adapter()
            .translate_message(&ChatMessage::tool_result("call_1", "42"))
            .unwrap();
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.content, "42");
    }

    #[test]
    fn test_supports_everything_but_images() {
        let a = adapter();
        assert!(a.supports(&AiRequest::embedding(vec!["x".to_string()])));
        assert!(a.supports(&AiRequest::completion("x")));
        assert!(!a.supports(&AiRequest::image("a cat")));
    }
}
