// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Stream framing for provider HTTP bodies
//
// OpenAI and Anthropic stream Server-Sent Events; Ollama streams
// newline-delimited JSON. Both are split into text frames here, and each
// adapter translates its frames into StreamEvents.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::domain::error::GatewayError;
use crate::domain::response::EventStream;
use crate::domain::streaming::StreamEvent;

/// Body framing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `data:` payloads, dispatched on blank lines
    Sse,
    /// One JSON document per line
    Ndjson,
}

/// Incremental frame decoder; chunk boundaries may fall anywhere, even inside
/// a multi-byte character.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Feed raw bytes, returning every frame completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.handle_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let rest = String::from_utf8_lossy(&rest).into_owned();
            if let Some(frame) = self.handle_line(rest.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        match self.framing {
            Framing::Ndjson => {
                let line = line.trim();
                (!line.is_empty()).then(|| line.to_string())
            }
            Framing::Sse => {
                if line.is_empty() {
                    return self.dispatch();
                }
                if let Some(data) = line.strip_prefix("data:") {
                    self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
                }
                // comments, event:, id: and retry: lines carry nothing we use
                None
            }
        }
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let frame = self.data.join("\n");
        self.data.clear();
        Some(frame)
    }
}

type ByteStream = std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

struct DecodeState<F> {
    source: ByteStream,
    decoder: FrameDecoder,
    translate: F,
    pending: VecDeque<Result<StreamEvent, GatewayError>>,
    finished: bool,
}

impl<F> DecodeState<F>
where
    F: FnMut(&str) -> Result<Vec<StreamEvent>, GatewayError>,
{
    fn translate_frames(&mut self, frames: Vec<String>) {
        for frame in frames {
            match (self.translate)(&frame) {
                Ok(events) => self.pending.extend(events.into_iter().map(Ok)),
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Turn a provider body into a normalized event stream.
///
/// `translate` maps one frame to zero or more events. Dropping the returned
/// stream drops the HTTP body and releases the connection.
pub fn decode_events<S, F>(source: S, framing: Framing, translate: F) -> EventStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: FnMut(&str) -> Result<Vec<StreamEvent>, GatewayError> + Send + 'static,
{
    let state = DecodeState {
        source: Box::pin(source),
        decoder: FrameDecoder::new(framing),
        translate,
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.source.next().await {
                Some(Ok(bytes)) => {
                    let frames = state.decoder.push(&bytes);
                    state.translate_frames(frames);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .pending
                        .push_back(Err(GatewayError::Network(e.to_string())));
                }
                None => {
                    state.finished = true;
                    let frames: Vec<String> = state.decoder.finish().into_iter().collect();
                    state.translate_frames(frames);
                }
            }
        }
    }))
}
