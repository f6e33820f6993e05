// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Adapter Registry - builds adapters and routing rules from configuration
//
// Each enabled adapter declared in the manifest becomes one Rule. Its
// advertised criteria are extended with `provider:<type>` and `model:<model>`
// so a request can pin either.

use std::sync::Arc;

use tracing::{info, warn};

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;
use crate::domain::adapter::Adapter;
use crate::domain::criteria::{CriteriaCollection, Criterion};
use crate::domain::decision_tree::{DecisionTree, Rule, RuleOrder};
use crate::domain::error::GatewayError;
use crate::domain::gateway_config::{AdapterConfig, GatewayConfigManifest};

struct RegisteredAdapter {
    adapter: Arc<dyn Adapter>,
    criteria: CriteriaCollection,
    priority: i32,
}

/// Adapters built from configuration, in declaration order
pub struct AdapterRegistry {
    adapters: Vec<RegisteredAdapter>,
    order: RuleOrder,
}

impl AdapterRegistry {
    /// Create the registry from a gateway manifest.
    ///
    /// Disabled adapters are skipped. An adapter that cannot be built (for
    /// example a missing `env:` key) is skipped with a warning.
    pub fn from_config(config: &GatewayConfigManifest) -> anyhow::Result<Self> {
        let mut adapters = Vec::new();

        info!("Initializing adapter registry");

        for adapter_config in &config.spec.adapters {
            if !adapter_config.enabled {
                info!("Adapter '{}' disabled, skipping", adapter_config.name);
                continue;
            }

            match Self::create_adapter(adapter_config) {
                Ok(adapter) => {
                    let criteria = Self::rule_criteria(adapter_config);
                    info!(
                        "Registered adapter '{}' ({}) advertising {}",
                        adapter_config.name, adapter_config.adapter_type, criteria
                    );
                    adapters.push(RegisteredAdapter {
                        adapter,
                        criteria,
                        priority: adapter_config.priority,
                    });
                }
                Err(e) => {
                    warn!("Failed to initialize adapter '{}': {}", adapter_config.name, e);
                    // Continue with other adapters
                }
            }
        }

        if adapters.is_empty() {
            warn!("No adapters configured - every request will fail resolution");
        }

        Ok(Self {
            adapters,
            order: config.spec.routing.order,
        })
    }

    /// Create an adapter instance from configuration
    fn create_adapter(config: &AdapterConfig) -> anyhow::Result<Arc<dyn Adapter>> {
        let api_key = Self::resolve_api_key(&config.api_key)?;
        let name = config.name.clone();
        let endpoint = config.endpoint.clone();
        let model = config.model.clone();

        let adapter: Arc<dyn Adapter> = match config.adapter_type.as_str() {
            // OpenAI-compatible APIs (LM Studio, vLLM, etc.) speak the same dialect
            "openai" | "openai-compatible" => Arc::new(
                OpenAIAdapter::new(name, endpoint, api_key, model).with_tools(config.tools),
            ),
            "anthropic" => Arc::new(
                AnthropicAdapter::new(name, endpoint, api_key, model).with_tools(config.tools),
            ),
            "ollama" => Arc::new(OllamaAdapter::new(name, endpoint, model).with_tools(config.tools)),
            _ => anyhow::bail!("Unsupported adapter type: {}", config.adapter_type),
        };

        Ok(adapter)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(k.clone()),
            },
            None => Ok(String::new()), // For local adapters without auth
        }
    }

    fn rule_criteria(config: &AdapterConfig) -> CriteriaCollection {
        let mut criteria = config.criteria.clone();
        let provider = match config.adapter_type.as_str() {
            "openai-compatible" => "openai",
            other => other,
        };
        criteria.push_unique(Criterion::provider(provider));
        criteria.push_unique(Criterion::model(config.model.as_str()));
        criteria
    }

    /// Build the decision tree, one rule per registered adapter
    pub fn decision_tree(&self) -> DecisionTree {
        let rules = self
            .adapters
            .iter()
            .map(|entry| {
                Rule::new(entry.adapter.clone(), entry.criteria.clone()).with_priority(entry.priority)
            })
            .collect();
        DecisionTree::new(rules, self.order)
    }

    pub fn adapter(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .find(|entry| entry.adapter.name() == name)
            .map(|entry| entry.adapter.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|entry| entry.adapter.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Probe every adapter, in declaration order
    pub async fn health_check_all(&self) -> Vec<(String, Result<(), GatewayError>)> {
        let mut results = Vec::with_capacity(self.adapters.len());
        for entry in &self.adapters {
            let result = entry.adapter.health_check().await;
            if let Err(e) = &result {
                warn!("Adapter '{}' failed health check: {}", entry.adapter.name(), e);
            }
            results.push((entry.adapter.name().to_string(), result));
        }
        results
    }
}
