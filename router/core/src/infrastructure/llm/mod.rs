// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provider Adapters - Anti-Corruption Layer Implementations
//
// Each adapter translates between the provider-neutral request/response types
// and one external API, including that API's streaming dialect.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod sse;

pub use registry::AdapterRegistry;

use crate::domain::error::GatewayError;
use crate::domain::request::Role;

/// Map a non-success HTTP status to the matching gateway error
pub(crate) fn status_error(status: reqwest::StatusCode, body: String, model: &str) -> GatewayError {
    match status.as_u16() {
        401 | 403 => GatewayError::Authentication(body),
        429 => GatewayError::RateLimit,
        404 => GatewayError::ModelNotFound(model.to_string()),
        _ => GatewayError::Provider(format!("HTTP {}: {}", status, body)),
    }
}

/// Provider role strings; unknown roles are treated as the assistant
pub(crate) fn parse_role(role: &str) -> Role {
    match role {
        "system" | "developer" => Role::System,
        "user" => Role::User,
        "tool" => Role::Tool,
        _ => Role::Assistant,
    }
}

pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, GatewayError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(status_error(status, error_text, model))
}
