// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::fsutil;
use crate::layout::WorkbenchPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    Manual,
    PreRestore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub checkpoint_id: String,
    pub reason: CheckpointReason,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshots of the draft tree under `checkpoints/<id>/`.
///
/// Each checkpoint holds a full copy of the tree plus a `meta.json`.  When
/// no draft overlay exists the published tree is snapshotted instead, so a
/// later restore reproduces the state the user saw at create time.
#[derive(Clone)]
pub struct CheckpointStore {
    paths: WorkbenchPaths,
    clock: Arc<dyn Clock>,
}

impl CheckpointStore {
    pub fn new(paths: &WorkbenchPaths, clock: Arc<dyn Clock>) -> Self {
        Self { paths: paths.clone(), clock }
    }

    /// Snapshot the current tree.  Returns the new checkpoint's metadata.
    pub fn create(
        &self,
        reason: CheckpointReason,
        description: &str,
    ) -> anyhow::Result<CheckpointMeta> {
        let meta = CheckpointMeta {
            checkpoint_id: Uuid::new_v4().to_string(),
            reason,
            description: description.to_string(),
            created_at: self.clock.now(),
        };

        let dir = self.paths.checkpoint_dir(&meta.checkpoint_id);
        let snapshot = dir.join("draft");
        let source = if self.paths.draft().is_dir() {
            self.paths.draft()
        } else {
            self.paths.published()
        };
        if source.is_dir() {
            fsutil::copy_dir_all(&source, &snapshot)?;
        } else {
            std::fs::create_dir_all(&snapshot)
                .with_context(|| format!("creating {}", snapshot.display()))?;
        }

        fsutil::atomic_write(&dir.join("meta.json"), serde_json::to_vec_pretty(&meta)?.as_slice())?;
        debug!(checkpoint_id = %meta.checkpoint_id, ?reason, "created checkpoint");
        Ok(meta)
    }

    /// All checkpoints, most recent first.
    pub fn list(&self) -> anyhow::Result<Vec<CheckpointMeta>> {
        let dir = self.paths.checkpoints_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut metas = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let meta_path = entry.path().join("meta.json");
            if !meta_path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&meta_path)
                .with_context(|| format!("reading {}", meta_path.display()))?;
            match serde_json::from_str::<CheckpointMeta>(&text) {
                Ok(meta) => metas.push(meta),
                Err(e) => {
                    tracing::warn!(path = %meta_path.display(), error = %e,
                                   "skipping unreadable checkpoint metadata");
                }
            }
        }
        metas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(metas)
    }

    pub fn get(&self, checkpoint_id: &str) -> anyhow::Result<Option<CheckpointMeta>> {
        let meta_path = self.paths.checkpoint_dir(checkpoint_id).join("meta.json");
        match std::fs::read_to_string(&meta_path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", meta_path.display())),
        }
    }

    /// Restore a checkpoint: first snapshot the current tree under a
    /// `pre_restore` checkpoint, then replace the draft overlay with the
    /// target's snapshot.  Returns `(restored, pre_restore)` metadata.
    pub fn restore(
        &self,
        checkpoint_id: &str,
    ) -> anyhow::Result<(CheckpointMeta, CheckpointMeta)> {
        let target = self
            .get(checkpoint_id)?
            .ok_or_else(|| anyhow::anyhow!("no checkpoint with id {checkpoint_id}"))?;

        let pre = self.create(
            CheckpointReason::PreRestore,
            &format!("before restoring {checkpoint_id}"),
        )?;

        let snapshot = self.paths.checkpoint_dir(checkpoint_id).join("draft");
        let draft = self.paths.draft();
        fsutil::remove_dir_if_present(&draft)?;
        fsutil::copy_dir_all(&snapshot, &draft)?;
        debug!(checkpoint_id, pre_restore_id = %pre.checkpoint_id, "restored checkpoint");
        Ok((target, pre))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::draft::DraftStore;

    fn setup() -> (tempfile::TempDir, WorkbenchPaths, DraftStore, CheckpointStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        paths.ensure_layout().unwrap();
        std::fs::write(paths.published().join("seed.txt"), "seed").unwrap();
        let drafts = DraftStore::new(&paths);
        let checkpoints = CheckpointStore::new(&paths, Arc::new(SystemClock));
        (dir, paths, drafts, checkpoints)
    }

    #[test]
    fn create_and_get_round_trip() {
        let (_d, _p, _drafts, cps) = setup();
        let meta = cps.create(CheckpointReason::Manual, "before edits").unwrap();
        let got = cps.get(&meta.checkpoint_id).unwrap().unwrap();
        assert_eq!(got.description, "before edits");
        assert_eq!(got.reason, CheckpointReason::Manual);
    }

    #[test]
    fn get_missing_returns_none() {
        let (_d, _p, _drafts, cps) = setup();
        assert!(cps.get("nope").unwrap().is_none());
    }

    #[test]
    fn list_is_most_recent_first() {
        let (_d, _p, _drafts, cps) = setup();
        let a = cps.create(CheckpointReason::Manual, "first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = cps.create(CheckpointReason::Manual, "second").unwrap();
        let list = cps.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].checkpoint_id, b.checkpoint_id);
        assert_eq!(list[1].checkpoint_id, a.checkpoint_id);
    }

    #[test]
    fn restore_snapshots_current_state_first() {
        let (_d, _p, drafts, cps) = setup();
        drafts.write_file("a.txt", b"v1").unwrap();
        let cp = cps.create(CheckpointReason::Manual, "v1").unwrap();

        drafts.write_file("a.txt", b"v2").unwrap();
        let (restored, pre) = cps.restore(&cp.checkpoint_id).unwrap();
        assert_eq!(restored.checkpoint_id, cp.checkpoint_id);
        assert_eq!(pre.reason, CheckpointReason::PreRestore);

        // Draft is back to v1.
        assert_eq!(drafts.read_file("a.txt").unwrap().unwrap(), b"v1");
        // The pre-restore snapshot preserved v2.
        let (_, pre2) = cps.restore(&pre.checkpoint_id).unwrap();
        assert_eq!(drafts.read_file("a.txt").unwrap().unwrap(), b"v2");
        assert_eq!(pre2.reason, CheckpointReason::PreRestore);
    }

    #[test]
    fn restore_unknown_id_is_an_error() {
        let (_d, _p, _drafts, cps) = setup();
        assert!(cps.restore("nope").is_err());
    }

    #[test]
    fn create_without_draft_snapshots_published() {
        let (_d, _p, drafts, cps) = setup();
        let cp = cps.create(CheckpointReason::Manual, "published state").unwrap();
        // Mutate, then restore: the published content comes back as draft.
        drafts.write_file("seed.txt", b"mutated").unwrap();
        cps.restore(&cp.checkpoint_id).unwrap();
        assert_eq!(drafts.read_file("seed.txt").unwrap().unwrap(), b"seed");
    }
}
