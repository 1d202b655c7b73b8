// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{CheckpointCommands, Cli, Commands};
use loft_engine::{Engine, Notification};
use loft_model::{
    mock::{ScriptedClient, ScriptedStep},
    LLMClient,
};
use loft_tools::{FakeToolWorker, ToolWorker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = loft_config::load(cli.config.as_deref())?;

    if matches!(cli.command, Commands::ShowConfig) {
        println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
        return Ok(());
    }

    let engine = Arc::new(build_engine(config)?);

    match cli.command {
        Commands::Send { workbench, text } => {
            let message_id = engine.send_user_message(&workbench, &text)?;
            println!("{}", json!({ "message_id": message_id }));
        }
        Commands::Run { workbench, text } => {
            run_command(&engine, &workbench, &text).await?;
        }
        Commands::Cancel { workbench } => {
            let requested = engine.cancel_run(&workbench);
            println!("{}", json!({ "cancel_requested": requested }));
        }
        Commands::State { workbench } => {
            println!("{}", serde_json::to_string_pretty(&engine.state(&workbench))?);
        }
        Commands::Changes { workbench } => {
            let changes = engine.review_change_set(&workbench)?;
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }
        Commands::Publish { workbench } => {
            engine.draft_publish(&workbench)?;
            eprintln!("draft published");
        }
        Commands::Discard { workbench } => {
            engine.draft_discard(&workbench)?;
            eprintln!("draft discarded");
        }
        Commands::Checkpoints { command } => match command {
            CheckpointCommands::List { workbench } => {
                let list = engine.checkpoints_list(&workbench)?;
                println!("{}", serde_json::to_string_pretty(&list)?);
            }
            CheckpointCommands::Create { workbench, description } => {
                let meta = engine.checkpoint_create(&workbench, &description)?;
                println!("{}", serde_json::to_string_pretty(&meta)?);
            }
            CheckpointCommands::Restore { workbench, checkpoint_id } => {
                let (restored, pre) = engine.checkpoint_restore(&workbench, &checkpoint_id)?;
                println!(
                    "{}",
                    json!({
                        "restored": restored.checkpoint_id,
                        "pre_restore": pre.checkpoint_id,
                    })
                );
            }
        },
        Commands::ShowConfig => unreachable!("handled above"),
    }

    Ok(())
}

/// Send the message, run the agent, and mirror notifications to the
/// terminal: phase transitions on stderr, streamed summary text on stdout.
async fn run_command(engine: &Arc<Engine>, workbench: &str, text: &str) -> anyhow::Result<()> {
    let message_id = engine.send_user_message(workbench, text)?;
    let (tx, mut rx) = tokio::sync::mpsc::channel(256);

    let printer = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match notification {
                Notification::PhaseStarted { phase } => eprintln!("[loft] {phase} started"),
                Notification::PhaseCompleted { phase } => eprintln!("[loft] {phase} completed"),
                Notification::ImplementProgress { item_index, item_count } => {
                    eprintln!("[loft] implement {item_index}/{item_count}")
                }
                Notification::AssistantStreamDelta { text } => {
                    use std::io::Write;
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                Notification::CheckpointCreated { checkpoint_id } => {
                    eprintln!("[loft] checkpoint created {checkpoint_id}")
                }
                Notification::CheckpointRestored { checkpoint_id, .. } => {
                    eprintln!("[loft] checkpoint restored {checkpoint_id}")
                }
            }
        }
    });

    let outcome = engine.run_agent(workbench, &message_id, tx).await;
    let _ = printer.await;
    println!();

    let outcome = outcome.context("run failed")?;
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

fn build_engine(config: loft_config::Config) -> anyhow::Result<Engine> {
    let client: Arc<dyn LLMClient> = match config.model.provider.as_str() {
        // The in-tree transport is the scripted one; live transports are
        // plugged in by the embedding host, which owns credentials and
        // egress policy.
        "fake" | "mock" | "scripted-mock" => Arc::new(demo_client()),
        other => anyhow::bail!(
            "unknown provider '{other}': this binary only bundles the 'fake' transport"
        ),
    };
    let worker: Arc<dyn ToolWorker> = Arc::new(FakeToolWorker);
    if !config.workspace.fake_worker {
        tracing::warn!("no external tool worker configured; using the canned worker");
    }
    Ok(Engine::new(config, client, worker))
}

/// A deterministic end-to-end script for local development: one research
/// pass, a single-item plan, one text write, and a streamed summary.
fn demo_client() -> ScriptedClient {
    ScriptedClient::new(vec![
        ScriptedStep::text("Reviewed the workbench file manifest."),
        ScriptedStep::text(
            "# Execution Plan\n\n## Items\n\
             - [ ] 1. Write notes \u{2014} Record the request in run-notes.md\n",
        ),
        ScriptedStep::tool_call(
            "demo-1",
            "write_text_file",
            json!({"path": "run-notes.md", "content": "Processed by the fake provider.\n"}),
        ),
        ScriptedStep::text("Item complete."),
        ScriptedStep::Stream(vec!["Wrote run-notes.md into the draft.".into()]),
    ])
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("LOFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
