// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Resolved filesystem locations for one workbench.  Cheap to construct;
/// build a fresh view per call rather than sharing across workbenches.
#[derive(Debug, Clone)]
pub struct WorkbenchPaths {
    root: PathBuf,
}

impl WorkbenchPaths {
    pub fn new(data_root: &Path, workbench_id: &str) -> Self {
        Self { root: data_root.join(workbench_id) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn published(&self) -> PathBuf {
        self.root.join("published")
    }

    pub fn draft(&self) -> PathBuf {
        self.root.join("draft")
    }

    pub fn workshop_meta(&self) -> PathBuf {
        self.root.join("meta").join("workshop")
    }

    pub fn conversation_file(&self) -> PathBuf {
        self.workshop_meta().join("conversation.jsonl")
    }

    pub fn tool_log_file(&self) -> PathBuf {
        self.workshop_meta().join("tool_log.jsonl")
    }

    pub fn rpi_dir(&self) -> PathBuf {
        self.workshop_meta().join("_rpi")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn checkpoint_dir(&self, checkpoint_id: &str) -> PathBuf {
        self.checkpoints_dir().join(checkpoint_id)
    }

    /// Create the directories every workbench is expected to have.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for dir in [self.published(), self.workshop_meta()] {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
