// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;
use tokio::sync::mpsc;

use loft_config::Phase;

/// Fire-and-forget notifications emitted during a run.  Consumers (the RPC
/// layer, the CLI) subscribe via the channel passed to `run_agent`; a
/// dropped receiver never blocks the run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    PhaseStarted {
        phase: Phase,
    },
    PhaseCompleted {
        phase: Phase,
    },
    /// Progress through the implement checklist; `item_index` is 1-based.
    ImplementProgress {
        item_index: usize,
        item_count: usize,
    },
    /// Streamed summary text.  The summary phase is the only emitter.
    AssistantStreamDelta {
        text: String,
    },
    CheckpointCreated {
        checkpoint_id: String,
    },
    CheckpointRestored {
        checkpoint_id: String,
        pre_restore_id: String,
    },
}

pub type Notifier = mpsc::Sender<Notification>;

/// Send without blocking the run on a slow or dropped consumer.
pub async fn notify(tx: &Notifier, notification: Notification) {
    let _ = tx.send(notification).await;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
