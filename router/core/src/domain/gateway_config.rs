// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Configuration Types
//
// Defines the configuration schema for a modelgate instance:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Adapter declarations with the criteria each one advertises
// - Rule ordering for resolution
// - Logging settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::domain::criteria::{Capability, CriteriaCollection, Criterion, Feature, Privacy};
use crate::domain::decision_tree::RuleOrder;

pub const API_VERSION: &str = "modelgate/v1";
pub const KIND: &str = "GatewayConfig";

/// Adapter types the registry knows how to build
pub const ADAPTER_TYPES: [&str; 4] = ["openai", "openai-compatible", "anthropic", "ollama"];

/// Top-level Kubernetes-style gateway configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfigManifest {
    /// API version (must be "modelgate/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "GatewayConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: GatewayConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable gateway name
    pub name: String,

    /// Optional: Labels for categorization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfigSpec {
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Adapters in declaration order
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Rule sequencing for resolution
    #[serde(default)]
    pub order: RuleOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Unique adapter name (e.g., "ollama-local", "gpt")
    pub name: String,

    /// Adapter type: "openai", "openai-compatible", "anthropic", "ollama"
    #[serde(rename = "type")]
    pub adapter_type: String,

    /// API endpoint URL
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Backend model identifier
    pub model: String,

    /// Whether this adapter is registered
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Used when routing.order is "priority"; higher wins
    #[serde(default)]
    pub priority: i32,

    /// Whether the backend accepts tool definitions
    #[serde(default = "default_true")]
    pub tools: bool,

    /// Capabilities this adapter advertises, e.g. ["capability:smart", "feature:tools"]
    #[serde(default)]
    pub criteria: CriteriaCollection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for GatewayConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "modelgate".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: GatewayConfigSpec::default(),
        }
    }
}

impl GatewayConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. MODELGATE_CONFIG_PATH environment variable
    /// 2. ./modelgate-config.yaml (working directory)
    /// 3. ~/.modelgate/config.yaml (user home)
    /// 4. /etc/modelgate/config.yaml (system, Unix) or C:\ProgramData\Modelgate\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MODELGATE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./modelgate-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".modelgate").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/modelgate/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Modelgate\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MODELGATE_RULE_ORDER") {
            match val.parse::<RuleOrder>() {
                Ok(order) => {
                    tracing::info!("Environment override: MODELGATE_RULE_ORDER={}", order);
                    self.spec.routing.order = order;
                }
                Err(e) => {
                    tracing::warn!("Ignoring MODELGATE_RULE_ORDER: {}", e);
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for adapter in &self.spec.adapters {
            if adapter.name.is_empty() {
                anyhow::bail!("Adapter name cannot be empty");
            }

            if !seen.insert(adapter.name.as_str()) {
                anyhow::bail!("Duplicate adapter name: {}", adapter.name);
            }

            if !ADAPTER_TYPES.contains(&adapter.adapter_type.as_str()) {
                anyhow::bail!(
                    "Unsupported adapter type '{}' for: {}. Expected one of {:?}",
                    adapter.adapter_type,
                    adapter.name,
                    ADAPTER_TYPES
                );
            }

            if adapter.endpoint.is_empty() {
                anyhow::bail!("Adapter endpoint cannot be empty for: {}", adapter.name);
            }

            if adapter.model.is_empty() {
                anyhow::bail!("Adapter model cannot be empty for: {}", adapter.name);
            }
        }

        Ok(())
    }

    /// Sample configuration used by `config generate`
    pub fn sample() -> Self {
        let mut manifest = Self::default();
        manifest.spec.adapters = vec![
            AdapterConfig {
                name: "local".to_string(),
                adapter_type: "ollama".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
                model: "llama3.2".to_string(),
                enabled: true,
                priority: 10,
                tools: true,
                criteria: CriteriaCollection::from(vec![
                    Criterion::capability(Capability::Intermediate),
                    Criterion::privacy(Privacy::High),
                    Criterion::feature(Feature::Tools),
                    Criterion::feature(Feature::Stream),
                    Criterion::feature(Feature::Embeddings),
                ]),
            },
            AdapterConfig {
                name: "gpt".to_string(),
                adapter_type: "openai".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: Some("env:OPENAI_API_KEY".to_string()),
                model: "gpt-4o".to_string(),
                enabled: true,
                priority: 0,
                tools: true,
                criteria: CriteriaCollection::from(vec![
                    Criterion::capability(Capability::Smart),
                    Criterion::privacy(Privacy::Low),
                    Criterion::feature(Feature::Tools),
                    Criterion::feature(Feature::Stream),
                    Criterion::feature(Feature::ImageToText),
                    Criterion::feature(Feature::Embeddings),
                    Criterion::feature(Feature::ImageGeneration),
                ]),
            },
            AdapterConfig {
                name: "claude".to_string(),
                adapter_type: "anthropic".to_string(),
                endpoint: "https://api.anthropic.com/v1".to_string(),
                api_key: Some("env:ANTHROPIC_API_KEY".to_string()),
                model: "claude-sonnet-4-5".to_string(),
                enabled: true,
                priority: 5,
                tools: true,
                criteria: CriteriaCollection::from(vec![
                    Criterion::capability(Capability::Smart),
                    Criterion::privacy(Privacy::Medium),
                    Criterion::feature(Feature::Tools),
                    Criterion::feature(Feature::Stream),
                    Criterion::feature(Feature::ImageToText),
                ]),
            },
        ];
        manifest.spec.observability = Some(ObservabilityConfig {
            logging: Some(LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            }),
        });
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
apiVersion: modelgate/v1
kind: GatewayConfig
metadata:
  name: test-gateway
spec:
  routing:
    order: priority
  adapters:
    - name: local
      type: ollama
      endpoint: http://localhost:11434
      model: llama3.2
      priority: 3
      tools: false
      criteria:
        - capability:basic
        - privacy:high
        - feature:stream
    - name: gpt
      type: openai
      endpoint: https://api.openai.com/v1
      api_key: env:OPENAI_API_KEY
      model: gpt-4o
      criteria:
        - capability:smart
        - feature:tools
"#;

    #[test]
    fn test_default_manifest() {
        let manifest = GatewayConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert!(manifest.spec.adapters.is_empty());
        assert_eq!(manifest.spec.routing.order, RuleOrder::Declaration);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let manifest = GatewayConfigManifest::from_yaml_str(YAML).unwrap();
        assert_eq!(manifest.metadata.name, "test-gateway");
        assert_eq!(manifest.spec.routing.order, RuleOrder::Priority);
        assert_eq!(manifest.spec.adapters.len(), 2);

        let local = &manifest.spec.adapters[0];
        assert!(!local.tools);
        assert!(local.enabled);
        assert_eq!(local.priority, 3);
        assert_eq!(
            local.criteria.to_string(),
            "[capability:basic, privacy:high, feature:stream]"
        );

        let gpt = &manifest.spec.adapters[1];
        assert!(gpt.tools);
        assert_eq!(gpt.priority, 0);
        assert_eq!(gpt.api_key.as_deref(), Some("env:OPENAI_API_KEY"));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_unknown_criterion_is_a_load_error() {
        let yaml = YAML.replace("capability:smart", "capability:omniscient");
        assert!(GatewayConfigManifest::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = GatewayConfigManifest::from_yaml_str(YAML).unwrap();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.adapters[1].name = "local".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.adapters[1].name = "gpt".to_string();

        manifest.spec.adapters[1].adapter_type = "mystery".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.adapters[1].adapter_type = "openai".to_string();

        manifest.spec.adapters[0].model = String::new();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_sample_is_valid_and_roundtrips() {
        let sample = GatewayConfigManifest::sample();
        assert!(sample.validate().is_ok());

        let yaml = serde_yaml::to_string(&sample).unwrap();
        let parsed = GatewayConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.adapters.len(), 3);
        assert_eq!(
            parsed.spec.adapters[1].criteria,
            sample.spec.adapters[1].criteria
        );
    }

    #[test]
    fn test_file_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelgate-config.yaml");
        GatewayConfigManifest::sample().to_yaml_file(&path).unwrap();

        let loaded = GatewayConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.spec.adapters.len(), 3);

        let missing = dir.path().join("missing.yaml");
        assert!(GatewayConfigManifest::load_or_default(Some(missing)).is_err());
    }
}
