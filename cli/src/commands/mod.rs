// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the modelgate CLI

pub mod chat;
pub mod config;
pub mod health;
pub mod route;

pub use self::chat::ChatArgs;
pub use self::config::ConfigCommand;
pub use self::route::RouteArgs;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use modelgate_core::domain::gateway_config::GatewayConfigManifest;
use modelgate_core::infrastructure::llm::AdapterRegistry;

/// Load and validate configuration, then build the adapter registry
pub(crate) fn load_registry(config_path: Option<PathBuf>) -> Result<AdapterRegistry> {
    let config = GatewayConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    info!(
        "Loaded configuration '{}' with {} adapter(s)",
        config.metadata.name,
        config.spec.adapters.len()
    );

    let registry =
        AdapterRegistry::from_config(&config).context("Failed to build adapter registry")?;
    debug!("Registered adapters: {:?}", registry.names());
    Ok(registry)
}
