// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "loft", about = "AI-assisted document workbench engine", version)]
pub struct Cli {
    /// Explicit config file (otherwise the standard search paths are used)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase stderr log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a user message on a workbench (clears prior phase artifacts)
    Send {
        #[arg(short, long)]
        workbench: String,
        /// The message text
        text: String,
    },
    /// Record a user message and run the full phased agent over it
    Run {
        #[arg(short, long)]
        workbench: String,
        /// The message text
        text: String,
    },
    /// Cancel the active run on a workbench
    Cancel {
        #[arg(short, long)]
        workbench: String,
    },
    /// Report workbench state (research/plan/draft/run flags)
    State {
        #[arg(short, long)]
        workbench: String,
    },
    /// Print the draft change set with focus hints
    Changes {
        #[arg(short, long)]
        workbench: String,
    },
    /// Publish the draft over the published tree
    Publish {
        #[arg(short, long)]
        workbench: String,
    },
    /// Discard the draft
    Discard {
        #[arg(short, long)]
        workbench: String,
    },
    /// Checkpoint operations
    Checkpoints {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[derive(Debug, Subcommand)]
pub enum CheckpointCommands {
    /// List checkpoints, most recent first
    List {
        #[arg(short, long)]
        workbench: String,
    },
    /// Snapshot the current tree
    Create {
        #[arg(short, long)]
        workbench: String,
        /// Human description of the snapshot
        #[arg(default_value = "manual checkpoint")]
        description: String,
    },
    /// Restore a checkpoint (auto-creates a pre-restore snapshot)
    Restore {
        #[arg(short, long)]
        workbench: String,
        checkpoint_id: String,
    },
}
