// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fsutil;
use crate::layout::WorkbenchPaths;

/// One recorded tool call.  `arguments` is the lossless raw payload the
/// model sent; `result` is the full JSON the worker returned.  Exactly one
/// of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLogEntry {
    /// Monotonically increasing, starting at 1.
    pub id: u64,
    pub tool: String,
    pub arguments: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Append-only JSONL tool log at `meta/workshop/tool_log.jsonl`.
///
/// A single malformed line makes the reader treat the whole file as empty:
/// callers must interpret absence as "no history" and proceed, never restart
/// numbering from a partially readable file.
#[derive(Debug, Clone)]
pub struct ToolLog {
    path: PathBuf,
}

impl ToolLog {
    pub fn new(paths: &WorkbenchPaths) -> Self {
        Self { path: paths.tool_log_file() }
    }

    /// Highest valid entry id, or 0 when the log is absent or unreadable.
    pub fn current_seq(&self) -> u64 {
        self.read_entries().iter().map(|e| e.id).max().unwrap_or(0)
    }

    /// Append an entry.  The caller assigns `id = current_seq() + 1` inside
    /// the run-locked region, which keeps ids strictly monotonic.
    pub fn append(&self, entry: &ToolLogEntry) -> anyhow::Result<()> {
        let mut text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&serde_json::to_string(entry)?);
        text.push('\n');
        fsutil::atomic_write(&self.path, text.as_bytes())
    }

    /// The last entry with the given id (recall path).
    pub fn read_entry(&self, id: u64) -> Option<ToolLogEntry> {
        self.read_entries().into_iter().rev().find(|e| e.id == id)
    }

    /// All entries, oldest first.  Empty on absence or any malformed line.
    pub fn read_entries(&self) -> Vec<ToolLogEntry> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };
        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<ToolLogEntry>(line) {
                Ok(e) => entries.push(e),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e,
                          "malformed tool log line; treating log as empty");
                    return Vec::new();
                }
            }
        }
        entries
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
