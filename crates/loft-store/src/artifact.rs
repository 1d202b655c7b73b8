// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use crate::fsutil;
use crate::layout::WorkbenchPaths;

/// Names of the phase artifacts kept under `_rpi/`.
pub const RESEARCH_FILE: &str = "research.md";
pub const PLAN_FILE: &str = "plan.md";

/// Plain-text phase artifacts under `meta/workshop/_rpi/`.
///
/// Each artifact is created at the start of its phase and overwritten only
/// by that phase, or cleared wholesale on a new user message.  Reads
/// tolerate absence — a missing directory just means no state yet.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(paths: &WorkbenchPaths) -> Self {
        Self { dir: paths.rpi_dir() }
    }

    /// Read an artifact; `Ok(None)` when it (or the whole directory) is
    /// absent.
    pub fn read(&self, name: &str) -> anyhow::Result<Option<String>> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading artifact {}", path.display())),
        }
    }

    /// Durable replace of an artifact (stage + rename).
    pub fn write(&self, name: &str, text: &str) -> anyhow::Result<()> {
        let path = self.dir.join(name);
        debug!(path = %path.display(), bytes = text.len(), "writing artifact");
        fsutil::atomic_write(&path, text.as_bytes())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.dir.join(name).is_file()
    }

    /// Remove the whole `_rpi/` directory.  Called when a new user message
    /// arrives so the next run starts fresh.
    pub fn remove_all(&self) -> anyhow::Result<()> {
        debug!(dir = %self.dir.display(), "clearing phase artifacts");
        fsutil::remove_dir_if_present(&self.dir)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        (dir, ArtifactStore::new(&paths))
    }

    #[test]
    fn read_missing_returns_none() {
        let (_d, s) = store();
        assert!(s.read(RESEARCH_FILE).unwrap().is_none());
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_d, s) = store();
        s.write(RESEARCH_FILE, "findings").unwrap();
        assert_eq!(s.read(RESEARCH_FILE).unwrap().as_deref(), Some("findings"));
        assert!(s.exists(RESEARCH_FILE));
    }

    #[test]
    fn write_replaces_previous_content() {
        let (_d, s) = store();
        s.write(PLAN_FILE, "v1").unwrap();
        s.write(PLAN_FILE, "v2").unwrap();
        assert_eq!(s.read(PLAN_FILE).unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn remove_all_clears_everything_and_tolerates_absence() {
        let (_d, s) = store();
        s.write(RESEARCH_FILE, "r").unwrap();
        s.write(PLAN_FILE, "p").unwrap();
        s.remove_all().unwrap();
        assert!(s.read(RESEARCH_FILE).unwrap().is_none());
        assert!(s.read(PLAN_FILE).unwrap().is_none());
        // Second removal is a no-op.
        s.remove_all().unwrap();
    }
}
