// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provider-neutral AI requests
//!
//! A request never names a backend. It carries a [`CriteriaCollection`] of
//! requirements and a payload; the decision tree picks the adapter.
//!
//! Builder methods that add a structural need (tools, streaming, image input)
//! also add the matching `feature:*` requirement so that criteria filtering
//! sees it before any adapter is consulted.

use serde::{Deserialize, Serialize};

use crate::domain::criteria::{CriteriaCollection, Criterion, Feature};
use crate::domain::response::ToolCall;

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    /// Inline image, base64 encoded
    Image { mime_type: String, data: String },
    /// Remote image reference
    ImageUrl { url: String },
    /// A tool invocation previously emitted by the assistant
    ToolCall { call: ToolCall },
    /// Output of a tool, answering `call_id`
    ToolResult { call_id: String, content: String },
}

impl MessagePart {
    /// Short name used in unsupported-part diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePart::Text { .. } => "text",
            MessagePart::Image { .. } => "image",
            MessagePart::ImageUrl { .. } => "image_url",
            MessagePart::ToolCall { .. } => "tool_call",
            MessagePart::ToolResult { .. } => "tool_result",
        }
    }

    fn is_image(&self) -> bool {
        matches!(self, MessagePart::Image { .. } | MessagePart::ImageUrl { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        Self { role, parts }
    }

    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![MessagePart::Text { text: text.into() }])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            Role::Tool,
            vec![MessagePart::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
            }],
        )
    }

    /// Concatenated text parts
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::ToolCall { call } => Some(call),
            _ => None,
        })
    }
}

/// Tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// Sampling options shared by all request kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Sequences that stop generation
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.7),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestPayload {
    Chat {
        messages: Vec<ChatMessage>,
        #[serde(default)]
        tools: Vec<ToolDefinition>,
        #[serde(default)]
        stream: bool,
    },
    Completion {
        prompt: String,
    },
    Image {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<String>,
        #[serde(default = "default_image_count")]
        count: u32,
    },
    Embedding {
        input: Vec<String>,
    },
}

fn default_image_count() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Chat,
    Completion,
    Image,
    Embedding,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestKind::Chat => "chat",
            RequestKind::Completion => "completion",
            RequestKind::Image => "image",
            RequestKind::Embedding => "embedding",
        };
        f.write_str(name)
    }
}

/// A provider-neutral request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRequest {
    /// What the request needs from a backend
    #[serde(default)]
    pub criteria: CriteriaCollection,

    #[serde(default)]
    pub options: RequestOptions,

    pub payload: RequestPayload,
}

impl AiRequest {
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            criteria: CriteriaCollection::new(),
            options: RequestOptions::default(),
            payload,
        }
    }

    pub fn chat(messages: Vec<ChatMessage>) -> Self {
        let has_images = messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .any(MessagePart::is_image);

        let mut request = Self::new(RequestPayload::Chat {
            messages,
            tools: Vec::new(),
            stream: false,
        });
        if has_images {
            request.criteria.push_unique(Criterion::feature(Feature::ImageToText));
        }
        request
    }

    pub fn completion(prompt: impl Into<String>) -> Self {
        Self::new(RequestPayload::Completion {
            prompt: prompt.into(),
        })
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        let mut request = Self::new(RequestPayload::Image {
            prompt: prompt.into(),
            size: None,
            count: 1,
        });
        request.criteria.push_unique(Criterion::feature(Feature::ImageGeneration));
        request
    }

    pub fn embedding(input: Vec<String>) -> Self {
        let mut request = Self::new(RequestPayload::Embedding { input });
        request.criteria.push_unique(Criterion::feature(Feature::Embeddings));
        request
    }

    /// Add one requirement
    pub fn require(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Add every requirement in `criteria`
    pub fn require_all(mut self, criteria: impl IntoIterator<Item = Criterion>) -> Self {
        self.criteria.extend(criteria);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Offer a tool to the model. Only meaningful for chat requests.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        if let RequestPayload::Chat { tools, .. } = &mut self.payload {
            tools.push(tool);
            self.criteria.push_unique(Criterion::feature(Feature::Tools));
        }
        self
    }

    /// Ask for a streamed response. Only meaningful for chat requests.
    pub fn streamed(mut self) -> Self {
        if let RequestPayload::Chat { stream, .. } = &mut self.payload {
            *stream = true;
            self.criteria.push_unique(Criterion::feature(Feature::Stream));
        }
        self
    }

    pub fn kind(&self) -> RequestKind {
        match self.payload {
            RequestPayload::Chat { .. } => RequestKind::Chat,
            RequestPayload::Completion { .. } => RequestKind::Completion,
            RequestPayload::Image { .. } => RequestKind::Image,
            RequestPayload::Embedding { .. } => RequestKind::Embedding,
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self.payload, RequestPayload::Chat { stream: true, .. })
    }

    pub fn has_tools(&self) -> bool {
        matches!(&self.payload, RequestPayload::Chat { tools, .. } if !tools.is_empty())
    }

    /// Chat history, empty for non-chat payloads
    pub fn messages(&self) -> &[ChatMessage] {
        match &self.payload {
            RequestPayload::Chat { messages, .. } => messages,
            _ => &[],
        }
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        match &self.payload {
            RequestPayload::Chat { tools, .. } => tools,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::Capability;

    #[test]
    fn test_builder_adds_structural_requirements() {
        let request = AiRequest::chat(vec![ChatMessage::user("hi")])
            .require(Criterion::capability(Capability::Smart))
            .with_tool(ToolDefinition {
                name: "lookup".to_string(),
                description: "Look something up".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            })
            .streamed();

        assert!(request.is_streamed());
        assert!(request.has_tools());
        assert_eq!(
            request.criteria.to_string(),
            "[capability:smart, feature:tools, feature:stream]"
        );
    }

    #[test]
    fn test_image_input_requires_vision() {
        let message = ChatMessage::new(
            Role::User,
            vec![
                MessagePart::Text { text: "what is this?".to_string() },
                MessagePart::ImageUrl { url: "https://example.com/cat.png".to_string() },
            ],
        );
        let request = AiRequest::chat(vec![message]);
        assert!(request
            .criteria
            .contains(&Criterion::feature(Feature::ImageToText)));
    }

    #[test]
    fn test_streamed_is_noop_for_embeddings() {
        let request = AiRequest::embedding(vec!["a".to_string()]).streamed();
        assert!(!request.is_streamed());
        assert_eq!(request.kind(), RequestKind::Embedding);
        assert_eq!(request.criteria.to_string(), "[feature:embeddings]");
    }

    #[test]
    fn test_text_content_skips_other_parts() {
        let message = ChatMessage::new(
            Role::User,
            vec![
                MessagePart::Text { text: "a".to_string() },
                MessagePart::ImageUrl { url: "u".to_string() },
                MessagePart::Text { text: "b".to_string() },
            ],
        );
        assert_eq!(message.text_content(), "ab");
    }
}
