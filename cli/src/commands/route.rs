// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dry-run resolution
//!
//! Builds a placeholder request with the given requirements and shows which
//! adapter the decision tree picks, or why none qualified.

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, warn};

use modelgate_core::domain::criteria::Criterion;
use modelgate_core::domain::decision_tree::DecisionTree;
use modelgate_core::domain::error::ResolutionError;
use modelgate_core::domain::request::{AiRequest, ChatMessage, ToolDefinition};

use super::load_registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Chat,
    Completion,
    Image,
    Embedding,
}

#[derive(Args)]
pub struct RouteArgs {
    /// Required criterion, e.g. capability:smart (repeatable)
    #[arg(short = 'r', long = "require", value_name = "CRITERION")]
    pub require: Vec<Criterion>,

    /// Request kind to resolve
    #[arg(long, value_enum, default_value = "chat")]
    pub kind: KindArg,

    /// Chat request offers tools
    #[arg(long)]
    pub tools: bool,

    /// Chat request is streamed
    #[arg(long)]
    pub stream: bool,

    /// List every eligible adapter, not just the winner
    #[arg(long)]
    pub all: bool,
}

/// Placeholder request carrying the structural needs of `args`
pub fn probe_request(args: &RouteArgs) -> AiRequest {
    let request = match args.kind {
        KindArg::Chat => {
            let mut request = AiRequest::chat(vec![ChatMessage::user("")]);
            if args.tools {
                request = request.with_tool(ToolDefinition {
                    name: "probe".to_string(),
                    description: String::new(),
                    parameters: serde_json::json!({"type": "object"}),
                });
            }
            if args.stream {
                request = request.streamed();
            }
            request
        }
        KindArg::Completion => AiRequest::completion(""),
        KindArg::Image => AiRequest::image(""),
        KindArg::Embedding => AiRequest::embedding(Vec::new()),
    };
    request.require_all(args.require.iter().cloned())
}

pub async fn execute(args: RouteArgs, config_path: Option<PathBuf>) -> Result<()> {
    let tree = load_registry(config_path)?.decision_tree();
    let request = probe_request(&args);

    match tree.resolve(&request) {
        Ok(adapter) => {
            debug!("Resolved {} request to {}", request.kind(), adapter.name());
            println!(
                "{}",
                format!("✓ {} request {} → {}", request.kind(), request.criteria, adapter.name())
                    .green()
            );
            if args.all {
                print_candidates(&tree, &request);
            }
            Ok(())
        }
        Err(e) => {
            warn!("No adapter satisfies {}", request.criteria);
            print_rejections(&e);
            std::process::exit(2);
        }
    }
}

fn print_candidates(tree: &DecisionTree, request: &AiRequest) {
    println!("{}", "Eligible adapters (resolution order):".bold());
    for (index, adapter) in tree.candidates(request).iter().enumerate() {
        println!("  {}. {}", index + 1, adapter.name());
    }
}

fn print_rejections(e: &ResolutionError) {
    eprintln!("{}", format!("✗ {}", e).red());
    for rejection in &e.rejections {
        eprintln!("  - {}", rejection);
    }
    let unmet = e.universally_unmet();
    if !unmet.is_empty() {
        let names: Vec<String> = unmet.iter().map(ToString::to_string).collect();
        eprintln!(
            "{}",
            format!("No adapter advertises: {}", names.join(", ")).yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelgate_core::domain::criteria::{Capability, Feature};
    use modelgate_core::domain::request::RequestKind;

    fn args(kind: KindArg) -> RouteArgs {
        RouteArgs {
            require: vec![Criterion::capability(Capability::Smart)],
            kind,
            tools: true,
            stream: true,
            all: false,
        }
    }

    #[test]
    fn test_probe_chat_carries_structural_needs() {
        let request = probe_request(&args(KindArg::Chat));
        assert_eq!(request.kind(), RequestKind::Chat);
        assert!(request.criteria.contains(&Criterion::feature(Feature::Tools)));
        assert!(request.criteria.contains(&Criterion::feature(Feature::Stream)));
        assert!(request
            .criteria
            .contains(&Criterion::capability(Capability::Smart)));
    }

    #[test]
    fn test_probe_embedding_ignores_chat_flags() {
        let request = probe_request(&args(KindArg::Embedding));
        assert_eq!(
            request.criteria.to_string(),
            "[feature:embeddings, capability:smart]"
        );
    }
}
