// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API

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

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    tools_enabled: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    Image {
        source: AnthropicImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Streamed event payloads; the SSE `event:` line repeats `type`
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    MessageStart {
        message: AnthropicStreamMessage,
    },
    ContentBlockStart {
        content_block: AnthropicStreamBlock,
    },
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    Error {
        error: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct AnthropicStreamMessage {
    role: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

impl AnthropicAdapter {
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

    pub fn with_tools(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn unsupported(&self, role: Role, part: &MessagePart) -> UnsupportedPartError {
        UnsupportedPartError {
            adapter: self.name.clone(),
            role,
            part: part.kind().to_string(),
        }
    }

    fn translate_part(&self, role: Role, part: &MessagePart) -> Result<AnthropicBlock, UnsupportedPartError> {
        let block = match (role, part) {
            (_, MessagePart::Text { text }) => AnthropicBlock::Text { text: text.clone() },
            (Role::User, MessagePart::Image { mime_type, data }) => AnthropicBlock::Image {
                source: AnthropicImageSource::Base64 {
                    media_type: mime_type.clone(),
                    data: data.clone(),
                },
            },
            (Role::User, MessagePart::ImageUrl { url }) => AnthropicBlock::Image {
                source: AnthropicImageSource::Url { url: url.clone() },
            },
            (Role::Assistant, MessagePart::ToolCall { call }) => AnthropicBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: serde_json::Value::Object(call.arguments.clone()),
            },
            (Role::User | Role::Tool, MessagePart::ToolResult { call_id, content }) => {
                AnthropicBlock::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: content.clone(),
                }
            }
            (role, other) => return Err(self.unsupported(role, other)),
        };
        Ok(block)
    }

    /// System text is hoisted out of the message list; tool results travel as
    /// user turns.
    fn chat_request<'a>(
        &'a self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        options: &RequestOptions,
        stream: bool,
    ) -> Result<AnthropicRequest<'a>, GatewayError> {
        let mut system: Vec<String> = Vec::new();
        let mut translated = Vec::with_capacity(messages.len());

        for message in messages {
            if message.role == Role::System {
                for part in &message.parts {
                    match part {
                        MessagePart::Text { text } => system.push(text.clone()),
                        other => return Err(self.unsupported(Role::System, other).into()),
                    }
                }
                continue;
            }

            let content = message
                .parts
                .iter()
                .map(|part| self.translate_part(message.role, part))
                .collect::<Result<Vec<_>, _>>()?;
            translated.push(AnthropicMessage {
                role: if message.role == Role::Assistant { "assistant" } else { "user" },
                content,
            });
        }

        Ok(AnthropicRequest {
            model: &self.model,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: translated,
            max_tokens: options.max_tokens.unwrap_or(4096),
            temperature: options.temperature,
            stop_sequences: options.stop_sequences.clone(),
            tools: tools
                .iter()
                .map(|tool| AnthropicTool {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    input_schema: tool.parameters.clone(),
                })
                .collect(),
            stream,
        })
    }

    async fn post(&self, body: &AnthropicRequest<'_>) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(self.url("messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        check_status(response, &self.model).await
    }

    async fn complete(
        &self,
        body: &AnthropicRequest<'_>,
    ) -> Result<(Message, FinishReason, Option<TokenUsage>), GatewayError> {
        let anthropic_response: AnthropicResponse = self
            .post(body)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Provider(format!("Failed to parse response: {}", e)))?;

        let mut events = vec![StreamEvent::RoleMarker(Role::Assistant)];
        for block in anthropic_response.content {
            match block {
                AnthropicContent::Text { text } => events.push(StreamEvent::TextDelta(text)),
                AnthropicContent::ToolUse { id, name, input } => {
                    events.push(StreamEvent::ToolCallStart { id, name });
                    if !input.is_null() {
                        events.push(StreamEvent::ArgumentFragment(input.to_string()));
                    }
                }
                AnthropicContent::Other => {}
            }
        }

        let usage = anthropic_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens.saturating_add(u.output_tokens),
        });
        let finish_reason = anthropic_response
            .stop_reason
            .as_deref()
            .map(FinishReason::from_provider)
            .unwrap_or(FinishReason::Stop);

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

/// Translate one SSE frame of a streamed message
fn stream_events(frame: &str) -> Result<Vec<StreamEvent>, GatewayError> {
    let event: AnthropicStreamEvent = serde_json::from_str(frame)
        .map_err(|e| GatewayError::Provider(format!("Failed to parse stream event: {}", e)))?;

    let events = match event {
        AnthropicStreamEvent::MessageStart { message } => {
            let role = match message.role.as_deref() {
                Some("user") => Role::User,
                _ => Role::Assistant,
            };
            vec![StreamEvent::RoleMarker(role)]
        }
        AnthropicStreamEvent::ContentBlockStart { content_block } => match content_block {
            AnthropicStreamBlock::ToolUse { id, name } => {
                vec![StreamEvent::ToolCallStart { id, name }]
            }
            AnthropicStreamBlock::Text { text } if !text.is_empty() => {
                vec![StreamEvent::TextDelta(text)]
            }
            _ => Vec::new(),
        },
        AnthropicStreamEvent::ContentBlockDelta { delta } => match delta {
            AnthropicDelta::TextDelta { text } => vec![StreamEvent::TextDelta(text)],
            AnthropicDelta::InputJsonDelta { partial_json } => {
                vec![StreamEvent::ArgumentFragment(partial_json)]
            }
            AnthropicDelta::Other => Vec::new(),
        },
        AnthropicStreamEvent::Error { error } => {
            return Err(GatewayError::Provider(error.to_string()));
        }
        AnthropicStreamEvent::Other => Vec::new(),
    };
    Ok(events)
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    /// Chat and completion only; there is no image or embedding endpoint
    fn supports(&self, request: &AiRequest) -> bool {
        matches!(request.kind(), RequestKind::Chat | RequestKind::Completion)
            && (self.tools_enabled || !request.has_tools())
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
                    debug!("Opening Anthropic stream for model {}", self.model);
                    let response = self.post(&body).await?;
                    let events = decode_events(response.bytes_stream(), Framing::Sse, stream_events);
                    return Ok(self.response(
                        ResponseBody::Chat(ChatOutput::Stream(MessageStream::new(events))),
                        None,
                    ));
                }
                let (message, _, usage) = self.complete(&body).await?;
                Ok(self.response(ResponseBody::Chat(ChatOutput::Complete(message)), usage))
            }
            RequestPayload::Completion { prompt } => {
                let messages = [ChatMessage::user(prompt.clone())];
                let body = self.chat_request(&messages, &[], &request.options, false)?;
                let (message, finish_reason, usage) = self.complete(&body).await?;
                Ok(self.response(
                    ResponseBody::Completion {
                        text: message.content,
                        finish_reason,
                    },
                    usage,
                ))
            }
            RequestPayload::Image { .. } | RequestPayload::Embedding { .. } => {
                Err(GatewayError::InvalidInput(format!(
                    "Adapter '{}' does not serve {} requests",
                    self.name,
                    request.kind()
                )))
            }
        }
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        // Anthropic has no free endpoint; a key-authenticated model list is the cheapest probe
        let response = self
            .client
            .get(self.url("models"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
    use crate::domain::streaming::fragments;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            "claude".to_string(),
            DEFAULT_ENDPOINT.to_string(),
            "key".to_string(),
            "claude-sonnet-4-5".to_string(),
        )
    }

    #[test]
    fn test_system_is_hoisted_and_tool_results_are_user_turns() {
        let messages = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("weather?"),
            ChatMessage::tool_result("toolu_1", "sunny"),
        ];
        let a = adapter();
        let body = a
            .chat_request(&messages, &[], &RequestOptions::default(), false)
            .unwrap();
        let wire = serde_json::to_value(&body).unwrap();

        assert_eq!(wire["system"], "Be brief.");
        assert_eq!(wire["messages"].as_array().unwrap().len(), 2);
        assert_eq!(wire["messages"][1]["role"], "user");
        assert_eq!(wire["messages"][1]["content"][0]["type"], "tool_result");
        assert_eq!(wire["messages"][1]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(wire["max_tokens"], 4096);
        assert!(wire.get("stream").is_none());
    }

    #[test]
    fn test_image_in_assistant_turn_is_unsupported() {
        let messages = vec![ChatMessage::new(
            Role::Assistant,
            vec![MessagePart::ImageUrl { url: "https://x/y.png".to_string() }],
        )];
        let err = adapter()
            .chat_request(&messages, &[], &RequestOptions::default(), false)
            .unwrap_err();
        match err {
            GatewayError::UnsupportedPart(e) => {
                assert_eq!(e.role, Role::Assistant);
                assert_eq!(e.part, "image_url");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_stream_events_reconstruct_tool_use() {
        let frames = [
            r#"{"type":"message_start","message":{"id":"msg_1","role":"assistant","content":[]}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Checking."}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"get_weather","input":{}}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"city\": "}}"#,
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"Paris\"}"}}"#,
            r#"{"type":"content_block_stop","index":1}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"tool_use"}}"#,
            r#"{"type":"message_stop"}"#,
            r#"{"type":"ping"}"#,
        ];
        let events: Vec<StreamEvent> = frames
            .iter()
            .flat_map(|f| stream_events(f).unwrap())
            .collect();

        let out: Vec<_> = fragments(events).collect::<Result<_, _>>().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text_delta, "Checking.");
        let call = out[1].as_tool_call().unwrap();
        assert_eq!(call.id, "toolu_1");
        assert_eq!(call.arguments["city"], serde_json::json!("Paris"));
    }

    #[test]
    fn test_stream_error_event() {
        let frame = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(stream_events(frame), Err(GatewayError::Provider(_))));
    }

    #[test]
    fn test_supports_chat_and_completion_only() {
        let a = adapter();
        assert!(a.supports(&AiRequest::chat(vec![ChatMessage::user("hi")])));
        assert!(a.supports(&AiRequest::completion("hi")));
        assert!(!a.supports(&AiRequest::embedding(vec!["x".to_string()])));
        assert!(!a.supports(&AiRequest::image("a cat")));
    }
}
