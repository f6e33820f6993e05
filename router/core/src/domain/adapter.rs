// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Adapter Domain Interface (Anti-Corruption Layer)
//
// Isolates routing and reconstruction from vendor APIs.
// Implementations live in infrastructure/llm/.

use std::fmt;

use async_trait::async_trait;

use crate::domain::error::GatewayError;
use crate::domain::request::AiRequest;
use crate::domain::response::AiResponse;

/// Executes requests against one concrete backend
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry name, unique per gateway
    fn name(&self) -> &str;

    /// Structural check criteria cannot express (request shape, tool support).
    ///
    /// Must be pure. Only consulted after the criteria gate has passed.
    fn supports(&self, request: &AiRequest) -> bool;

    /// Run the request. Streamed chat requests return a lazy fragment stream.
    async fn handle_request(&self, request: &AiRequest) -> Result<AiResponse, GatewayError>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

impl fmt::Debug for dyn Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter").field("name", &self.name()).finish()
    }
}
