// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Stream Reconstruction
//!
//! Every adapter reduces its provider's chunk format to the four normalized
//! [`StreamEvent`] kinds. A [`StreamAccumulator`] folds those events into
//! [`MessageFragment`]s:
//!
//! ```text
//! Idle ──first event──▶ RoleAssigned ──tool-call-start──▶ AccumulatingToolCall
//!                            ▲                                 │   │
//!                            └──────── new id / finish ────────┘   │
//!                                                      finish ─────▶ Terminal
//! ```
//!
//! - Text deltas pass straight through as one fragment each.
//! - Argument fragments are appended verbatim to the active call's buffer.
//! - A start event with a new id, or the end of the stream, finalizes the active
//!   call: its buffer is decoded as a JSON object and emitted as exactly one
//!   fragment. Malformed payloads are errors, never partial calls.
//! - Call ids are unique within one response. A start event reusing the id of
//!   an already finalized call is an error.
//!
//! The accumulator is a plain value threaded through successive calls; one
//! instance serves exactly one response.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::error::StreamReconstructionError;
use crate::domain::request::Role;
use crate::domain::response::{MessageFragment, ToolCall};

/// Normalized provider stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    RoleMarker(Role),
    TextDelta(String),
    ToolCallStart { id: String, name: String },
    /// Argument text for the call in progress; carries no id
    ArgumentFragment(String),
}

/// Observable accumulator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Idle,
    RoleAssigned,
    AccumulatingToolCall,
    Terminal,
}

#[derive(Debug, Clone, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    role: Option<Role>,
    pending: Option<PendingToolCall>,
    finalized: HashSet<String>,
    finished: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AccumulatorState {
        if self.finished {
            AccumulatorState::Terminal
        } else if self.pending.is_some() {
            AccumulatorState::AccumulatingToolCall
        } else if self.role.is_some() {
            AccumulatorState::RoleAssigned
        } else {
            AccumulatorState::Idle
        }
    }

    /// Role fixed by the first event, if any
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Feed one event. Returns at most one fragment.
    pub fn accept(
        &mut self,
        event: StreamEvent,
    ) -> Result<Option<MessageFragment>, StreamReconstructionError> {
        if self.finished {
            warn!("Stream event received after stream end, ignoring: {:?}", event);
            return Ok(None);
        }

        match event {
            StreamEvent::RoleMarker(role) => {
                match self.role {
                    None => self.role = Some(role),
                    Some(fixed) if fixed != role => {
                        debug!("Ignoring role marker {} after role fixed to {}", role, fixed);
                    }
                    Some(_) => {}
                }
                Ok(None)
            }
            StreamEvent::TextDelta(text) => {
                let role = self.assign_role();
                if text.is_empty() {
                    return Ok(None);
                }
                Ok(Some(MessageFragment::text(role, text)))
            }
            StreamEvent::ToolCallStart { id, name } => {
                self.assign_role();

                if let Some(active) = self.pending.as_mut() {
                    if active.id == id {
                        if active.name.is_empty() {
                            active.name = name;
                        }
                        return Ok(None);
                    }
                }
                if self.finalized.contains(&id) {
                    return Err(StreamReconstructionError::DuplicateToolCallId { id });
                }

                let completed = match self.pending.take() {
                    Some(previous) => Some(self.finalize(previous)?),
                    None => None,
                };
                self.pending = Some(PendingToolCall {
                    id,
                    name,
                    arguments: String::new(),
                });
                Ok(completed)
            }
            StreamEvent::ArgumentFragment(fragment) => match self.pending.as_mut() {
                Some(active) => {
                    active.arguments.push_str(&fragment);
                    Ok(None)
                }
                None if fragment.trim().is_empty() => Ok(None),
                None => Err(StreamReconstructionError::OrphanArgumentFragment(fragment)),
            },
        }
    }

    /// Signal provider stream exhaustion; end of stream is an implicit call boundary.
    pub fn finish(&mut self) -> Result<Option<MessageFragment>, StreamReconstructionError> {
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        match self.pending.take() {
            Some(active) => self.finalize(active).map(Some),
            None => Ok(None),
        }
    }

    fn assign_role(&mut self) -> Role {
        *self.role.get_or_insert(Role::Assistant)
    }

    fn finalize(
        &mut self,
        call: PendingToolCall,
    ) -> Result<MessageFragment, StreamReconstructionError> {
        let arguments = decode_arguments(&call)?;
        self.finalized.insert(call.id.clone());
        debug!(
            "Tool call '{}' ({}) reconstructed with {} argument(s)",
            call.name,
            call.id,
            arguments.len()
        );
        metrics::counter!("modelgate_tool_calls_total").increment(1);

        Ok(MessageFragment::tool_call(
            self.role.unwrap_or(Role::Assistant),
            ToolCall {
                id: call.id,
                name: call.name,
                arguments,
            },
        ))
    }
}

fn decode_arguments(
    call: &PendingToolCall,
) -> Result<Map<String, Value>, StreamReconstructionError> {
    if call.arguments.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(&call.arguments) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StreamReconstructionError::NonObjectArguments {
            id: call.id.clone(),
            name: call.name.clone(),
            payload: call.arguments.clone(),
        }),
        Err(e) => Err(StreamReconstructionError::InvalidArguments {
            id: call.id.clone(),
            name: call.name.clone(),
            payload: call.arguments.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Blocking fragment iterator over a synchronous event source
pub struct Fragments<I> {
    events: I,
    accumulator: StreamAccumulator,
    done: bool,
}

/// Reduce `events` into a lazy fragment iterator
pub fn fragments<I>(events: I) -> Fragments<I::IntoIter>
where
    I: IntoIterator<Item = StreamEvent>,
{
    Fragments {
        events: events.into_iter(),
        accumulator: StreamAccumulator::new(),
        done: false,
    }
}

impl<I> Iterator for Fragments<I>
where
    I: Iterator<Item = StreamEvent>,
{
    type Item = Result<MessageFragment, StreamReconstructionError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let result = match self.events.next() {
                Some(event) => self.accumulator.accept(event),
                None => {
                    self.done = true;
                    self.accumulator.finish()
                }
            };
            match result {
                Ok(Some(fragment)) => return Some(Ok(fragment)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
