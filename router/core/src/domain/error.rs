// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gateway error taxonomy
//!
//! - [`ResolutionError`]: no registered rule accepts a request. Recoverable by the
//!   caller; never substituted with a default adapter here.
//! - [`UnsupportedPartError`]: an adapter cannot translate a message part or role.
//! - [`StreamReconstructionError`]: a streamed tool call could not be assembled.
//!
//! Every variant carries enough context to diagnose the failure without
//! re-running the request. Nothing at this layer retries.

use std::fmt;

use crate::domain::criteria::{CriteriaCollection, Criterion};
use crate::domain::request::{RequestKind, Role};

/// Why a single rule was passed over during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Requirements with no MATCH among the rule's capabilities
    UnmetCriteria(Vec<Criterion>),
    /// Criteria passed but the adapter's `supports()` refused the request
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRejection {
    pub adapter: String,
    pub reason: RejectionReason,
}

impl fmt::Display for RuleRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            RejectionReason::UnmetCriteria(unmet) => {
                write!(f, "{}: unmet ", self.adapter)?;
                write!(f, "{}", CriteriaCollection::from(unmet.clone()))
            }
            RejectionReason::Unsupported => write!(
                f,
                "{}: criteria matched but the adapter does not support this request",
                self.adapter
            ),
        }
    }
}

/// No registered rule satisfied the request.
///
/// `rejections` holds one entry per registered rule, in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "No eligible adapter for {kind} request requiring {requirements} ({} rules considered)",
    .rejections.len()
)]
pub struct ResolutionError {
    pub kind: RequestKind,
    pub requirements: CriteriaCollection,
    pub rejections: Vec<RuleRejection>,
}

impl ResolutionError {
    /// Multi-line report: the summary followed by one line per rule
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        for rejection in &self.rejections {
            out.push_str("\n  - ");
            out.push_str(&rejection.to_string());
        }
        out
    }

    /// Requirements no registered rule could satisfy on its own
    pub fn universally_unmet(&self) -> Vec<Criterion> {
        self.requirements
            .iter()
            .filter(|requirement| {
                !self.rejections.is_empty()
                    && self.rejections.iter().all(|r| match &r.reason {
                        RejectionReason::UnmetCriteria(unmet) => unmet.contains(requirement),
                        RejectionReason::Unsupported => false,
                    })
            })
            .cloned()
            .collect()
    }
}

/// An adapter could not translate part of a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Adapter '{adapter}' cannot translate a {part} part in a {role} message")]
pub struct UnsupportedPartError {
    pub adapter: String,
    pub role: Role,
    pub part: String,
}

/// A streamed tool call could not be reconstructed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamReconstructionError {
    #[error("Tool call '{name}' ({id}) has malformed arguments {payload:?}: {reason}")]
    InvalidArguments {
        id: String,
        name: String,
        payload: String,
        reason: String,
    },

    #[error("Tool call '{name}' ({id}) arguments must be a JSON object, got {payload:?}")]
    NonObjectArguments {
        id: String,
        name: String,
        payload: String,
    },

    #[error("Argument fragment {0:?} arrived with no tool call in progress")]
    OrphanArgumentFragment(String),

    #[error("Tool call id {id} was already used by an earlier call in this response")]
    DuplicateToolCallId { id: String },
}

/// Errors surfaced by [`crate::application::RequestHandler::execute`]
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    UnsupportedPart(#[from] UnsupportedPartError),

    #[error(transparent)]
    StreamReconstruction(#[from] StreamReconstructionError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::{Capability, Feature};

    fn sample() -> ResolutionError {
        ResolutionError {
            kind: RequestKind::Chat,
            requirements: CriteriaCollection::from(vec![
                Criterion::capability(Capability::Smart),
                Criterion::feature(Feature::Tools),
            ]),
            rejections: vec![
                RuleRejection {
                    adapter: "local".to_string(),
                    reason: RejectionReason::UnmetCriteria(vec![
                        Criterion::capability(Capability::Smart),
                        Criterion::feature(Feature::Tools),
                    ]),
                },
                RuleRejection {
                    adapter: "cloud".to_string(),
                    reason: RejectionReason::UnmetCriteria(vec![Criterion::capability(
                        Capability::Smart,
                    )]),
                },
            ],
        }
    }

    #[test]
    fn test_resolution_error_names_requirements() {
        let err = sample();
        assert_eq!(
            err.to_string(),
            "No eligible adapter for chat request requiring [capability:smart, feature:tools] (2 rules considered)"
        );
        let report = err.report();
        assert!(report.contains("local: unmet [capability:smart, feature:tools]"));
        assert!(report.contains("cloud: unmet [capability:smart]"));
    }

    #[test]
    fn test_universally_unmet() {
        let err = sample();
        assert_eq!(
            err.universally_unmet(),
            vec![Criterion::capability(Capability::Smart)]
        );
    }

    #[test]
    fn test_unsupported_rule_is_not_counted_as_unmet() {
        let mut err = sample();
        err.rejections.push(RuleRejection {
            adapter: "picky".to_string(),
            reason: RejectionReason::Unsupported,
        });
        assert!(err.universally_unmet().is_empty());
        assert!(err.report().contains("picky: criteria matched"));
    }
}
