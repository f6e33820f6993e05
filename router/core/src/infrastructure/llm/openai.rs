// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Adapter
//
// Anti-Corruption Layer for the OpenAI API.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sse::{decode_events, Framing};
use super::{check_status, parse_role};
use crate::domain::adapter::Adapter;
use crate::domain::error::{GatewayError, UnsupportedPartError};
use crate::domain::request::{
    AiRequest, ChatMessage, MessagePart, RequestOptions, RequestPayload, Role, ToolDefinition,
};
use crate::domain::response::{
    AiResponse, ChatOutput, FinishReason, GeneratedImage, Message, MessageStream, ResponseBody,
    TokenUsage,
};
use crate::domain::streaming::StreamEvent;

pub struct OpenAIAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    tools_enabled: bool,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAIToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Debug, Serialize)]
struct OpenAIImageUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAIFunction,
}

#[derive(Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    role: Option<String>,
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIChunk {
    #[serde(default)]
    choices: Vec<OpenAIChunkChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OpenAIChunkChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Default, Deserialize)]
struct OpenAIDelta {
    role: Option<String>,
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCallDelta>,
}

#[derive(Deserialize)]
struct OpenAIToolCallDelta {
    id: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAIImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
}

#[derive(Deserialize)]
struct OpenAIImageResponse {
    data: Vec<OpenAIImageData>,
}

#[derive(Deserialize)]
struct OpenAIImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

impl OpenAIAdapter {
    pub fn new(name: String, endpoint: String, api_key: String, model: String) -> Self {
        Self {
            name,
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
            tools_enabled: true,
        }
    }

    /// Disable tool calling, e.g. for compatible servers that reject `tools`
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
        let mut request = self.client.post(self.url(path)).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        check_status(response, &self.model).await
    }

    fn unsupported(&self, role: Role, part: &MessagePart) -> UnsupportedPartError {
        UnsupportedPartError {
            adapter: self.name.clone(),
            role,
            part: part.kind().to_string(),
        }
    }

    /// Translate one neutral message. Tool messages expand to one provider
    /// message per result.
    fn translate_message(&self, message: &ChatMessage) -> Result<Vec<OpenAIMessage>, UnsupportedPartError> {
        match message.role {
            Role::Tool => message
                .parts
                .iter()
                .map(|part| match part {
                    MessagePart::ToolResult { call_id, content } => Ok(OpenAIMessage {
                        role: "tool",
                        content: Some(OpenAIContent::Text(content.clone())),
                        tool_calls: Vec::new(),
                        tool_call_id: Some(call_id.clone()),
                    }),
                    other => Err(self.unsupported(Role::Tool, other)),
                })
                .collect(),
            Role::System => {
                let mut text = String::new();
                for part in &message.parts {
                    match part {
                        MessagePart::Text { text: t } => text.push_str(t),
                        other => return Err(self.unsupported(Role::System, other)),
                    }
                }
                Ok(vec![OpenAIMessage {
                    role: "system",
                    content: Some(OpenAIContent::Text(text)),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                }])
            }
            Role::Assistant => {
                let mut text = String::new();
                let mut tool_calls = Vec::new();
                for part in &message.parts {
                    match part {
                        MessagePart::Text { text: t } => text.push_str(t),
                        MessagePart::ToolCall { call } => tool_calls.push(OpenAIToolCall {
                            id: call.id.clone(),
                            kind: function_type(),
                            function: OpenAIFunctionCall {
                                name: call.name.clone(),
                                arguments: serde_json::Value::Object(call.arguments.clone())
                                    .to_string(),
                            },
                        }),
                        other => return Err(self.unsupported(Role::Assistant, other)),
                    }
                }
                Ok(vec![OpenAIMessage {
                    role: "assistant",
                    content: (!text.is_empty() || tool_calls.is_empty())
                        .then_some(OpenAIContent::Text(text)),
                    tool_calls,
                    tool_call_id: None,
                }])
            }
            Role::User => {
                let mut parts = Vec::with_capacity(message.parts.len());
                for part in &message.parts {
                    parts.push(match part {
                        MessagePart::Text { text } => OpenAIContentPart::Text { text: text.clone() },
                        MessagePart::Image { mime_type, data } => OpenAIContentPart::ImageUrl {
                            image_url: OpenAIImageUrl {
                                url: format!("data:{};base64,{}", mime_type, data),
                            },
                        },
                        MessagePart::ImageUrl { url } => OpenAIContentPart::ImageUrl {
                            image_url: OpenAIImageUrl { url: url.clone() },
                        },
                        other => return Err(self.unsupported(Role::User, other)),
                    });
                }
                // Plain text keeps the request readable by older compatible servers
                let content = if parts.iter().all(|p| matches!(p, OpenAIContentPart::Text { .. })) {
                    OpenAIContent::Text(message.text_content())
                } else {
                    OpenAIContent::Parts(parts)
                };
                Ok(vec![OpenAIMessage {
                    role: "user",
                    content: Some(content),
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                }])
            }
        }
    }

    fn chat_request<'a>(
        &'a self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &RequestOptions,
        stream: bool,
    ) -> Result<OpenAIRequest<'a>, GatewayError> {
        let mut translated = Vec::with_capacity(messages.len());
        for message in messages {
            translated.extend(self.translate_message(message)?);
        }

        Ok(OpenAIRequest {
            model: &self.model,
            messages: translated,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: options.stop_sequences.clone(),
            tools: tools
                .iter()
                .map(|tool| OpenAITool {
                    kind: "function",
                    function: OpenAIFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            stream,
        })
    }

    async fn complete_chat(
        &self,
        body: &OpenAIRequest<'_>,
    ) -> Result<(Message, FinishReason, Option<TokenUsage>), GatewayError> {
        let response = self.post("chat/completions", body).await?;
        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;

        let usage = openai_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Provider("No response from model".into()))?;

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_provider)
            .unwrap_or(FinishReason::Stop);

        let role = choice.message.role.as_deref().map(parse_role).unwrap_or(Role::Assistant);
        let mut events = vec![StreamEvent::RoleMarker(role)];
        if let Some(content) = choice.message.content {
            events.push(StreamEvent::TextDelta(content));
        }
        for call in choice.message.tool_calls {
            events.push(StreamEvent::ToolCallStart {
                id: call.id,
                name: call.function.name,
            });
            events.push(StreamEvent::ArgumentFragment(call.function.arguments));
        }

        Ok((Message::from_events(events)?, finish_reason, usage))
    }

    fn response(&self, body: ResponseBody, usage: Option<TokenUsage>) -> AiResponse {
        let response = AiResponse::new(self.name.clone(), self.model.clone(), body);
        match usage {
            Some(usage) => response.with_usage(usage),
            None => response,
        }
    }
}

/// Translate one SSE frame of a streamed chat completion
fn chunk_events(frame: &str) -> Result<Vec<StreamEvent>, GatewayError> {
    if frame.trim() == "[DONE]" {
        return Ok(Vec::new());
    }

    let chunk: OpenAIChunk = serde_json::from_str(frame)
        .map_err(|e| GatewayError::Provider(format!("Failed to parse stream chunk: {}", e)))?;
    if let Some(error) = chunk.error {
        return Err(GatewayError::Provider(error.to_string()));
    }

    let mut events = Vec::new();
    for choice in chunk.choices.into_iter().take(1) {
        let delta = choice.delta;
        if let Some(role) = delta.role.as_deref() {
            events.push(StreamEvent::RoleMarker(parse_role(role)));
        }
        if let Some(content) = delta.content {
            events.push(StreamEvent::TextDelta(content));
        }
        for call in delta.tool_calls {
            let (name, arguments) = match call.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            if let Some(id) = call.id {
                events.push(StreamEvent::ToolCallStart {
                    id,
                    name: name.unwrap_or_default(),
                });
            }
            if let Some(arguments) = arguments.filter(|a| !a.is_empty()) {
                events.push(StreamEvent::ArgumentFragment(arguments));
            }
        }
    }
    Ok(events)
}

#[async_trait]
impl Adapter for OpenAIAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, request: &AiRequest) -> bool {
        self.tools_enabled || !request.has_tools()
    }

    async fn handle_request(&self, request: &AiRequest) -> Result<AiResponse, GatewayError> {
        match &request.payload {
            RequestPayload::Chat {
                messages,
                tools,
                stream,
            } => {
                let body = self.chat_request(messages, tools, &request.options, *stream)?;
                if *stream {
                    debug!("Opening OpenAI stream for model {}", self.model);
                    let response = self.post("chat/completions", &body).await?;
                    let events = decode_events(response.bytes_stream(), Framing::Sse, chunk_events);
                    return Ok(self.response(
                        ResponseBody::Chat(ChatOutput::Stream(MessageStream::new(events))),
                        None,
                    ));
                }

                let (message, _, usage) = self.complete_chat(&body).await?;
                Ok(self.response(ResponseBody::Chat(ChatOutput::Complete(message)), usage))
            }
            RequestPayload::Completion { prompt } => {
                let messages = [ChatMessage::user(prompt.clone())];
                let body = self.chat_request(&messages, &[], &request.options, false)?;
                let (message, finish_reason, usage) = self.complete_chat(&body).await?;
                Ok(self.response(
                    ResponseBody::Completion {
                        text: message.content,
                        finish_reason,
                    },
                    usage,
                ))
            }
            RequestPayload::Image {
                prompt,
                size,
                count,
            } => {
                let body = OpenAIImageRequest {
                    model: &self.model,
                    prompt,
                    n: *count,
                    size: size.as_deref(),
                };
                let response: OpenAIImageResponse = self
                    .post("images/generations", &body)
                    .await?
                    .json()
                    .await
                    .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;
                let images = response
                    .data
                    .into_iter()
                    .map(|d| GeneratedImage {
                        url: d.url,
                        base64: d.b64_json,
                    })
                    .collect();
                Ok(self.response(ResponseBody::Image { images }, None))
            }
            RequestPayload::Embedding { input } => {
                let body = OpenAIEmbeddingRequest {
                    model: &self.model,
                    input,
                };
                let response: OpenAIEmbeddingResponse = self
                    .post("embeddings", &body)
                    .await?
                    .json()
                    .await
                    .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;
                let vectors = response.data.into_iter().map(|d| d.embedding).collect();
                Ok(self.response(ResponseBody::Embedding { vectors }, None))
            }
        }
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        // Simple check - try to list models endpoint
        let mut request = self.client.get(self.url("models"));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(GatewayError::Authentication("Invalid API key".into()))
        } else {
            Err(GatewayError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::response::ToolCall;

    fn adapter() -> OpenAIAdapter {
        OpenAIAdapter::new(
            "gpt".to_string(),
            "https://api.openai.com/v1".to_string(),
            "sk-test".to_string(),
            "gpt-4o".to_string(),
        )
    }

    #[test]
    fn test_chunk_events_tool_call_deltas() {
        let start = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}"#;
        let more = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#;

        assert_eq!(
            chunk_events(start).unwrap(),
            vec![StreamEvent::ToolCallStart {
                id: "call_1".to_string(),
                name: "get_weather".to_string()
            }]
        );
        assert_eq!(
            chunk_events(more).unwrap(),
            vec![StreamEvent::ArgumentFragment("{\"city\":".to_string())]
        );
    }

    #[test]
    fn test_chunk_events_role_text_and_done() {
        let first = r#"{"choices":[{"delta":{"role":"assistant","content":"Hel"}}]}"#;
        assert_eq!(
            chunk_events(first).unwrap(),
            vec![
                StreamEvent::RoleMarker(Role::Assistant),
                StreamEvent::TextDelta("Hel".to_string())
            ]
        );
        assert!(chunk_events("[DONE]").unwrap().is_empty());
        assert!(chunk_events(r#"{"choices":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_chunk_events_errors() {
        assert!(matches!(chunk_events("not json"), Err(GatewayError::Provider(_))));
        assert!(matches!(
            chunk_events(r#"{"error":{"message":"overloaded"}}"#),
            Err(GatewayError::Provider(_))
        ));
    }

    #[test]
    fn test_assistant_tool_call_round_trips_to_wire() {
        let mut arguments = serde_json::Map::new();
        arguments.insert("city".to_string(), serde_json::json!("Paris"));
        let message = ChatMessage::new(
            Role::Assistant,
            vec![MessagePart::ToolCall {
                call: ToolCall {
                    id: "call_1".to_string(),
                    name: "get_weather".to_string(),
                    arguments,
                },
            }],
        );

        let wire = serde_json::to_value(adapter().translate_message(&message).unwrap()).unwrap();
        assert_eq!(wire[0]["role"], "assistant");
        assert!(wire[0].get("content").is_none());
        assert_eq!(wire[0]["tool_calls"][0]["type"], "function");
        assert_eq!(
            wire[0]["tool_calls"][0]["function"]["arguments"],
            r#"{"city":"Paris"}"#
        );
    }

    #[test]
    fn test_user_image_parts() {
        let message = ChatMessage::new(
            Role::User,
            vec![
                MessagePart::Text { text: "what is this?".to_string() },
                MessagePart::Image {
                    mime_type: "image/png".to_string(),
                    data: "AAAA".to_string(),
                },
            ],
        );
        let wire = serde_json::to_value(adapter().translate_message(&message).unwrap()).unwrap();
        assert_eq!(wire[0]["content"][1]["type"], "image_url");
        assert_eq!(
            wire[0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_image_in_system_message_is_unsupported() {
        let message = ChatMessage::new(
            Role::System,
            vec![MessagePart::ImageUrl { url: "https://x/y.png".to_string() }],
        );
        let err = adapter().translate_message(&message).unwrap_err();
        assert_eq!(err.adapter, "gpt");
        assert_eq!(err.role, Role::System);
        assert_eq!(err.part, "image_url");
    }

    #[test]
    fn test_tools_disabled_rejects_tool_requests() {
        let request = AiRequest::chat(vec![ChatMessage::user("hi")]).with_tool(ToolDefinition {
            name: "t".to_string(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object"}),
        });
        assert!(adapter().supports(&request));
        assert!(!adapter().with_tools(false).supports(&request));
        assert!(adapter()
            .with_tools(false)
            .supports(&AiRequest::chat(vec![ChatMessage::user("hi")])));
    }
}
