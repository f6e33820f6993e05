// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # modelgate core
//!
//! Routes provider-neutral AI requests to registered adapters from declarative
//! criteria, and reconstructs streamed provider output into well-formed
//! messages and tool calls.
//!
//! # Architecture
//!
//! - **Domain:** criteria, decision tree, stream accumulator, request/response types
//! - **Application:** [`application::RequestHandler`]
//! - **Infrastructure:** HTTP adapters and the config-driven registry

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
