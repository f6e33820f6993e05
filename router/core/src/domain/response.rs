// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provider-neutral responses
//!
//! Non-streamed chat responses carry a fully materialized [`Message`].
//! Streamed chat responses carry a [`MessageStream`]: a finite, forward-only
//! sequence of [`MessageFragment`]s produced by a [`StreamAccumulator`] as the
//! provider's chunks arrive. Dropping the stream drops the transport and
//! discards any tool call still being assembled.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::domain::error::{GatewayError, StreamReconstructionError};
use crate::domain::request::Role;
use crate::domain::streaming::{fragments, StreamAccumulator, StreamEvent};

/// A fully reconstructed tool invocation.
///
/// `id` is unique within one response only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// One element of a streamed message.
///
/// Carries either a text delta or exactly one completed tool call, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageFragment {
    pub role: Role,
    pub text_delta: String,
    pub tool_calls: Vec<ToolCall>,
}

impl MessageFragment {
    pub fn text(role: Role, delta: impl Into<String>) -> Self {
        Self {
            role,
            text_delta: delta.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(role: Role, call: ToolCall) -> Self {
        Self {
            role,
            text_delta: String::new(),
            tool_calls: vec![call],
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.first()
    }
}

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,

    /// Model stopped to call tools
    ToolCalls,
}

impl FinishReason {
    /// Map the common provider spellings, defaulting to `Stop`
    pub fn from_provider(reason: &str) -> Self {
        match reason {
            "length" | "max_tokens" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" | "tool_use" | "function_call" => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }

    /// Reconstruct a complete message from a finite event list.
    ///
    /// Non-streamed provider replies go through the same reconstruction as
    /// streamed ones, so tool-call arguments are validated identically.
    pub fn from_events(events: Vec<StreamEvent>) -> Result<Self, StreamReconstructionError> {
        let mut message = Message::assistant(String::new());
        let mut role = None;
        for fragment in fragments(events) {
            let fragment = fragment?;
            role.get_or_insert(fragment.role);
            message.content.push_str(&fragment.text_delta);
            message.tool_calls.extend(fragment.tool_calls);
        }
        if let Some(role) = role {
            message.role = role;
        }
        Ok(message)
    }
}

/// Boxed provider event stream consumed by a [`MessageStream`]
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, GatewayError>> + Send>>;

/// Lazy sequence of message fragments for one streamed response.
///
/// Owns its own [`StreamAccumulator`]; nothing is shared between responses.
/// The first error ends the stream.
pub struct MessageStream {
    events: EventStream,
    accumulator: StreamAccumulator,
    done: bool,
}

impl MessageStream {
    pub fn new(events: EventStream) -> Self {
        Self {
            events,
            accumulator: StreamAccumulator::new(),
            done: false,
        }
    }

    /// Stream over an already-materialized event list
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        Self::new(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    /// Drain the stream into a complete message.
    ///
    /// Text deltas are concatenated in order and tool calls are kept in the
    /// order they completed. Fails on the first error.
    pub async fn collect_message(mut self) -> Result<Message, GatewayError> {
        let mut message = Message::assistant(String::new());
        let mut role = None;
        while let Some(fragment) = self.next().await {
            let fragment = fragment?;
            role.get_or_insert(fragment.role);
            message.content.push_str(&fragment.text_delta);
            message.tool_calls.extend(fragment.tool_calls);
        }
        if let Some(role) = role {
            message.role = role;
        }
        Ok(message)
    }
}

impl fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageStream")
            .field("accumulator", &self.accumulator)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Stream for MessageStream {
    type Item = Result<MessageFragment, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.done {
                return Poll::Ready(None);
            }

            let next = match this.events.as_mut().poll_next(cx) {
                Poll::Ready(next) => next,
                Poll::Pending => return Poll::Pending,
            };

            match next {
                Some(Ok(event)) => match this.accumulator.accept(event) {
                    Ok(Some(fragment)) => return Poll::Ready(Some(Ok(fragment))),
                    Ok(None) => continue,
                    Err(e) => {
                        this.done = true;
                        return Poll::Ready(Some(Err(e.into())));
                    }
                },
                Some(Err(e)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    this.done = true;
                    return match this.accumulator.finish() {
                        Ok(Some(fragment)) => Poll::Ready(Some(Ok(fragment))),
                        Ok(None) => Poll::Ready(None),
                        Err(e) => Poll::Ready(Some(Err(e.into()))),
                    };
                }
            }
        }
    }
}

/// Chat output: complete or streamed
#[derive(Debug)]
pub enum ChatOutput {
    Complete(Message),
    Stream(MessageStream),
}

impl ChatOutput {
    pub fn is_stream(&self) -> bool {
        matches!(self, ChatOutput::Stream(_))
    }

    /// Resolve to a complete message, draining the stream if necessary
    pub async fn into_message(self) -> Result<Message, GatewayError> {
        match self {
            ChatOutput::Complete(message) => Ok(message),
            ChatOutput::Stream(stream) => stream.collect_message().await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

#[derive(Debug)]
pub enum ResponseBody {
    Chat(ChatOutput),
    Completion {
        text: String,
        finish_reason: FinishReason,
    },
    Image {
        images: Vec<GeneratedImage>,
    },
    Embedding {
        vectors: Vec<Vec<f32>>,
    },
}

/// Response returned by an adapter
#[derive(Debug)]
pub struct AiResponse {
    /// Name of the adapter that produced this response
    pub adapter: String,

    /// Backend model identifier
    pub model: String,

    /// Token usage, when the provider reports it up front
    pub usage: Option<TokenUsage>,

    pub body: ResponseBody,
}

impl AiResponse {
    pub fn new(adapter: impl Into<String>, model: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            adapter: adapter.into(),
            model: model.into(),
            usage: None,
            body,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Complete chat message, if this is a non-streamed chat response
    pub fn message(&self) -> Option<&Message> {
        match &self.body {
            ResponseBody::Chat(ChatOutput::Complete(message)) => Some(message),
            _ => None,
        }
    }

    /// Fragment stream, if this is a streamed chat response
    pub fn into_message_stream(self) -> Option<MessageStream> {
        match self.body {
            ResponseBody::Chat(ChatOutput::Stream(stream)) => Some(stream),
            _ => None,
        }
    }

    pub fn into_chat(self) -> Option<ChatOutput> {
        match self.body {
            ResponseBody::Chat(output) => Some(output),
            _ => None,
        }
    }

    /// Completion text, if this is a completion response
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Completion { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn embeddings(&self) -> Option<&[Vec<f32>]> {
        match &self.body {
            ResponseBody::Embedding { vectors } => Some(vectors),
            _ => None,
        }
    }

    pub fn images(&self) -> Option<&[GeneratedImage]> {
        match &self.body {
            ResponseBody::Image { images } => Some(images),
            _ => None,
        }
    }
}
