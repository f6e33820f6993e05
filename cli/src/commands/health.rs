// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use super::load_registry;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let registry = load_registry(config_path)?;
    if registry.is_empty() {
        println!("{}", "No adapters registered".yellow());
        return Ok(());
    }

    let mut failures = 0;
    for (name, result) in registry.health_check_all().await {
        match result {
            Ok(()) => println!("  {} {}", "✓".green(), name),
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "✗".red(), name, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} adapter(s) unhealthy", failures, registry.len());
    }
    Ok(())
}
