// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Request Handler
//!
//! Public entry point: resolve a request to an adapter through the
//! [`DecisionTree`], then hand the request to that adapter.
//!
//! Resolution runs on every call; nothing is cached between requests. Errors
//! from resolution and from the adapter propagate unchanged.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::adapter::Adapter;
use crate::domain::decision_tree::DecisionTree;
use crate::domain::error::{GatewayError, ResolutionError};
use crate::domain::request::AiRequest;
use crate::domain::response::AiResponse;

pub struct RequestHandler {
    tree: Arc<DecisionTree>,
}

impl RequestHandler {
    pub fn new(tree: Arc<DecisionTree>) -> Self {
        Self { tree }
    }

    pub fn decision_tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Resolve without executing
    pub fn resolve(&self, request: &AiRequest) -> Result<Arc<dyn Adapter>, ResolutionError> {
        self.tree.resolve(request).inspect_err(|e| {
            metrics::counter!("modelgate_resolution_failures_total").increment(1);
            warn!("{}", e);
        })
    }

    /// Resolve and run `request`.
    ///
    /// Streamed chat requests return as soon as the adapter has opened the
    /// provider stream; fragments are pulled lazily by the caller.
    pub async fn execute(&self, request: &AiRequest) -> Result<AiResponse, GatewayError> {
        let adapter = self.resolve(request)?;

        info!(
            "Executing {} request on adapter '{}' (streamed: {})",
            request.kind(),
            adapter.name(),
            request.is_streamed()
        );
        metrics::counter!("modelgate_requests_total", "adapter" => adapter.name().to_string())
            .increment(1);

        adapter.handle_request(request).await
    }
}
