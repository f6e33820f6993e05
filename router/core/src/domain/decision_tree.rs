// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decision Tree
//!
//! Ordered registry of [`Rule`]s, each binding one adapter to the capabilities
//! it advertises. Resolution walks the rules in order and returns the first
//! adapter whose capabilities satisfy the request's requirements *and* whose
//! `supports()` accepts the request. Criteria are the coarse filter;
//! `supports()` is the final structural check.
//!
//! The tree is built once at startup and never mutated afterwards, so it can
//! be shared across tasks behind an `Arc` without locking.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::adapter::Adapter;
use crate::domain::criteria::CriteriaCollection;
use crate::domain::error::{RejectionReason, ResolutionError, RuleRejection};
use crate::domain::request::AiRequest;

/// How registered rules are ordered for resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOrder {
    /// Registration order
    #[default]
    Declaration,
    /// Descending `priority`; equal priorities keep registration order
    Priority,
}

impl FromStr for RuleOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "declaration" => Ok(RuleOrder::Declaration),
            "priority" => Ok(RuleOrder::Priority),
            other => Err(format!(
                "Invalid rule order '{}'. Expected 'declaration' or 'priority'",
                other
            )),
        }
    }
}

impl fmt::Display for RuleOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOrder::Declaration => f.write_str("declaration"),
            RuleOrder::Priority => f.write_str("priority"),
        }
    }
}

/// Binding of one adapter to the capability set it satisfies
#[derive(Clone)]
pub struct Rule {
    adapter: Arc<dyn Adapter>,
    capabilities: CriteriaCollection,
    priority: i32,
    order: usize,
}

impl Rule {
    pub fn new(adapter: Arc<dyn Adapter>, capabilities: CriteriaCollection) -> Self {
        Self {
            adapter,
            capabilities,
            priority: 0,
            order: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn capabilities(&self) -> &CriteriaCollection {
        &self.capabilities
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Zero-based position in resolution order
    pub fn order(&self) -> usize {
        self.order
    }

    fn evaluate(&self, request: &AiRequest) -> Result<(), RejectionReason> {
        if !request.criteria.matches(&self.capabilities) {
            return Err(RejectionReason::UnmetCriteria(
                request.criteria.unmet_by(&self.capabilities),
            ));
        }
        if !self.adapter.supports(request) {
            return Err(RejectionReason::Unsupported);
        }
        Ok(())
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("adapter", &self.adapter.name())
            .field("capabilities", &self.capabilities)
            .field("priority", &self.priority)
            .field("order", &self.order)
            .finish()
    }
}

/// Ordered, immutable rule registry
#[derive(Debug, Clone)]
pub struct DecisionTree {
    rules: Vec<Rule>,
    order: RuleOrder,
}

impl DecisionTree {
    /// Build the tree. `order` decides how `rules` are sequenced for resolution.
    pub fn new(mut rules: Vec<Rule>, order: RuleOrder) -> Self {
        if order == RuleOrder::Priority {
            // sort_by is stable, so ties keep declaration order
            rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        for (index, rule) in rules.iter_mut().enumerate() {
            rule.order = index;
        }

        info!(
            "Decision tree built with {} rule(s), order = {}",
            rules.len(),
            order
        );
        for rule in &rules {
            debug!(
                "  #{} {} priority={} capabilities={}",
                rule.order,
                rule.adapter.name(),
                rule.priority,
                rule.capabilities
            );
        }

        Self { rules, order }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_order(&self) -> RuleOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Resolve `request` to exactly one adapter.
    ///
    /// Deterministic for a given registry and request. On failure the error
    /// lists every rule with the reason it was passed over.
    pub fn resolve(&self, request: &AiRequest) -> Result<Arc<dyn Adapter>, ResolutionError> {
        let mut rejections = Vec::new();

        for rule in &self.rules {
            match rule.evaluate(request) {
                Ok(()) => {
                    debug!(
                        "Resolved {} request {} -> {} (rule #{})",
                        request.kind(),
                        request.criteria,
                        rule.adapter.name(),
                        rule.order
                    );
                    return Ok(Arc::clone(&rule.adapter));
                }
                Err(reason) => {
                    debug!("Rule #{} ({}) rejected: {:?}", rule.order, rule.adapter.name(), reason);
                    rejections.push(RuleRejection {
                        adapter: rule.adapter.name().to_string(),
                        reason,
                    });
                }
            }
        }

        Err(ResolutionError {
            kind: request.kind(),
            requirements: request.criteria.clone(),
            rejections,
        })
    }

    /// Every eligible adapter, in resolution order
    pub fn candidates(&self, request: &AiRequest) -> Vec<Arc<dyn Adapter>> {
        self.rules
            .iter()
            .filter(|rule| rule.evaluate(request).is_ok())
            .map(|rule| Arc::clone(&rule.adapter))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::criteria::{Capability, Criterion, Feature, Privacy};
    use crate::domain::error::GatewayError;
    use crate::domain::request::{ChatMessage, RequestKind};
    use crate::domain::response::{AiResponse, ChatOutput, Message, ResponseBody};
    use async_trait::async_trait;

    struct StubAdapter {
        name: String,
        tools: bool,
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn supports(&self, request: &AiRequest) -> bool {
            self.tools || !request.has_tools()
        }

        async fn handle_request(&self, _request: &AiRequest) -> Result<AiResponse, GatewayError> {
            Ok(AiResponse::new(
                &self.name,
                "stub",
                ResponseBody::Chat(ChatOutput::Complete(Message::assistant("ok"))),
            ))
        }
    }

    fn stub(name: &str) -> Arc<dyn Adapter> {
        Arc::new(StubAdapter {
            name: name.to_string(),
            tools: true,
        })
    }

    fn caps(criteria: Vec<Criterion>) -> CriteriaCollection {
        CriteriaCollection::from(criteria)
    }

    fn chat() -> AiRequest {
        AiRequest::chat(vec![ChatMessage::user("hello")])
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let tree = DecisionTree::new(
            vec![
                Rule::new(stub("a"), caps(vec![Criterion::privacy(Privacy::High)])),
                Rule::new(stub("b"), caps(vec![])),
            ],
            RuleOrder::Declaration,
        );

        let high = chat().require(Criterion::privacy(Privacy::High));
        assert_eq!(tree.resolve(&high).unwrap().name(), "a");

        // HIGH ranks above LOW, so rule a also satisfies a LOW lower bound
        let low = chat().require(Criterion::privacy(Privacy::Low));
        assert_eq!(tree.resolve(&low).unwrap().name(), "a");
    }

    #[test]
    fn test_lower_rank_does_not_satisfy_higher_requirement() {
        let tree = DecisionTree::new(
            vec![
                Rule::new(stub("a"), caps(vec![Criterion::privacy(Privacy::Low)])),
                Rule::new(stub("b"), caps(vec![])),
            ],
            RuleOrder::Declaration,
        );
        let request = chat().require(Criterion::privacy(Privacy::High));
        let err = tree.resolve(&request).unwrap_err();
        assert_eq!(err.kind, RequestKind::Chat);
        assert_eq!(err.rejections.len(), 2);
        assert_eq!(
            err.universally_unmet(),
            vec![Criterion::privacy(Privacy::High)]
        );
    }

    #[test]
    fn test_empty_requirements_take_first_rule() {
        let tree = DecisionTree::new(
            vec![
                Rule::new(stub("a"), caps(vec![Criterion::capability(Capability::Basic)])),
                Rule::new(stub("b"), caps(vec![])),
            ],
            RuleOrder::Declaration,
        );
        assert_eq!(tree.resolve(&chat()).unwrap().name(), "a");
    }

    #[test]
    fn test_supports_is_final_gate() {
        let no_tools: Arc<dyn Adapter> = Arc::new(StubAdapter {
            name: "no-tools".to_string(),
            tools: false,
        });
        let everything = caps(vec![Criterion::feature(Feature::Tools)]);
        let tree = DecisionTree::new(
            vec![
                Rule::new(no_tools, everything.clone()),
                Rule::new(stub("tools"), everything),
            ],
            RuleOrder::Declaration,
        );

        let request = chat().with_tool(crate::domain::request::ToolDefinition {
            name: "t".to_string(),
            description: String::new(),
            parameters: serde_json::json!({}),
        });
        assert_eq!(tree.resolve(&request).unwrap().name(), "tools");
        assert_eq!(tree.candidates(&request).len(), 1);
    }

    #[test]
    fn test_unsupported_everywhere_reports_reason() {
        let no_tools: Arc<dyn Adapter> = Arc::new(StubAdapter {
            name: "no-tools".to_string(),
            tools: false,
        });
        let tree = DecisionTree::new(
            vec![Rule::new(no_tools, caps(vec![Criterion::feature(Feature::Tools)]))],
            RuleOrder::Declaration,
        );
        let request = chat().with_tool(crate::domain::request::ToolDefinition {
            name: "t".to_string(),
            description: String::new(),
            parameters: serde_json::json!({}),
        });
        let err = tree.resolve(&request).unwrap_err();
        assert_eq!(err.rejections[0].reason, RejectionReason::Unsupported);
    }

    #[test]
    fn test_priority_order_is_stable() {
        let tree = DecisionTree::new(
            vec![
                Rule::new(stub("low"), caps(vec![])).with_priority(-1),
                Rule::new(stub("first-ten"), caps(vec![])).with_priority(10),
                Rule::new(stub("second-ten"), caps(vec![])).with_priority(10),
            ],
            RuleOrder::Priority,
        );
        let names: Vec<&str> = tree.rules().iter().map(|r| r.adapter().name()).collect();
        assert_eq!(names, vec!["first-ten", "second-ten", "low"]);
        assert_eq!(tree.rules()[2].order(), 2);
        assert_eq!(tree.resolve(&chat()).unwrap().name(), "first-ten");
    }

    #[test]
    fn test_declaration_order_ignores_priority() {
        let tree = DecisionTree::new(
            vec![
                Rule::new(stub("a"), caps(vec![])).with_priority(-5),
                Rule::new(stub("b"), caps(vec![])).with_priority(5),
            ],
            RuleOrder::Declaration,
        );
        assert_eq!(tree.resolve(&chat()).unwrap().name(), "a");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let tree = DecisionTree::new(
            vec![
                Rule::new(stub("a"), caps(vec![Criterion::capability(Capability::Basic)])),
                Rule::new(stub("b"), caps(vec![Criterion::capability(Capability::Smart)])),
            ],
            RuleOrder::Declaration,
        );
        let request = chat().require(Criterion::capability(Capability::Advanced));
        for _ in 0..10 {
            assert_eq!(tree.resolve(&request).unwrap().name(), "b");
        }
    }

    #[test]
    fn test_rule_order_parse() {
        assert_eq!("Priority".parse::<RuleOrder>().unwrap(), RuleOrder::Priority);
        assert_eq!(" declaration ".parse::<RuleOrder>().unwrap(), RuleOrder::Declaration);
        assert!("random".parse::<RuleOrder>().is_err());
    }
}
