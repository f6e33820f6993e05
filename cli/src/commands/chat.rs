// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chat command: resolve by criteria, execute, print the reply

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use modelgate_core::application::RequestHandler;
use modelgate_core::domain::criteria::Criterion;
use modelgate_core::domain::error::GatewayError;
use modelgate_core::domain::request::{AiRequest, ChatMessage, RequestOptions};
use modelgate_core::domain::response::{ChatOutput, Message, ToolCall};

use super::load_registry;

#[derive(Args)]
pub struct ChatArgs {
    /// User prompt
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Required criterion, e.g. privacy:high (repeatable)
    #[arg(short = 'r', long = "require", value_name = "CRITERION")]
    pub require: Vec<Criterion>,

    /// Stream the reply as it is generated
    #[arg(long)]
    pub stream: bool,

    /// System prompt
    #[arg(long, value_name = "TEXT")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}

pub fn build_request(args: &ChatArgs) -> AiRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.push(ChatMessage::user(args.prompt.clone()));

    let defaults = RequestOptions::default();
    let mut request = AiRequest::chat(messages)
        .require_all(args.require.iter().cloned())
        .with_options(RequestOptions {
            max_tokens: args.max_tokens.or(defaults.max_tokens),
            temperature: args.temperature.or(defaults.temperature),
            stop_sequences: None,
        });
    if args.stream {
        request = request.streamed();
    }
    request
}

pub async fn execute(args: ChatArgs, config_path: Option<PathBuf>) -> Result<()> {
    let registry = load_registry(config_path)?;
    let handler = RequestHandler::new(Arc::new(registry.decision_tree()));
    let request = build_request(&args);

    let response = match handler.execute(&request).await {
        Ok(response) => response,
        Err(GatewayError::Resolution(e)) => {
            eprintln!("{}", e.report().red());
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("Chat request failed"),
    };

    info!("Chat request served by {} ({})", response.adapter, response.model);
    eprintln!(
        "{}",
        format!("[{} · {}]", response.adapter, response.model).dimmed()
    );

    match response.into_chat() {
        Some(ChatOutput::Stream(mut stream)) => {
            let mut stdout = std::io::stdout();
            while let Some(fragment) = stream.next().await {
                let fragment = fragment.context("Stream failed")?;
                if !fragment.text_delta.is_empty() {
                    write!(stdout, "{}", fragment.text_delta)?;
                    stdout.flush()?;
                }
                for call in &fragment.tool_calls {
                    print_tool_call(call)?;
                }
            }
            println!();
        }
        Some(ChatOutput::Complete(message)) => print_message(&message)?,
        None => anyhow::bail!("Adapter returned a non-chat response"),
    }

    Ok(())
}

fn print_message(message: &Message) -> Result<()> {
    if !message.content.is_empty() {
        println!("{}", message.content);
    }
    for call in &message.tool_calls {
        print_tool_call(call)?;
    }
    Ok(())
}

fn print_tool_call(call: &ToolCall) -> Result<()> {
    let json = serde_json::to_string_pretty(call).context("Failed to encode tool call")?;
    println!();
    println!("{}", format!("tool call {} ({})", call.name, call.id).cyan());
    println!("{}", json);
    Ok(())
}
