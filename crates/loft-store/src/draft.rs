// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fsutil;
use crate::layout::WorkbenchPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One per-path entry in the review change set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// The draft overlay over a workbench's published tree.
///
/// Created lazily on the first write of a run; all tool writes land here
/// until the draft is published (commit) or discarded.
#[derive(Debug, Clone)]
pub struct DraftStore {
    paths: WorkbenchPaths,
}

impl DraftStore {
    pub fn new(paths: &WorkbenchPaths) -> Self {
        Self { paths: paths.clone() }
    }

    pub fn has_draft(&self) -> bool {
        self.paths.draft().is_dir()
    }

    /// Create the draft overlay from the published tree if it does not
    /// exist yet.  Idempotent.
    pub fn ensure_draft(&self) -> anyhow::Result<()> {
        let draft = self.paths.draft();
        if draft.is_dir() {
            return Ok(());
        }
        debug!(draft = %draft.display(), "creating draft overlay from published tree");
        let published = self.paths.published();
        if published.is_dir() {
            fsutil::copy_dir_all(&published, &draft)?;
        } else {
            std::fs::create_dir_all(&draft)
                .with_context(|| format!("creating {}", draft.display()))?;
        }
        Ok(())
    }

    /// The tree reads should see: the draft overlay when present, else the
    /// published tree.
    pub fn effective_root(&self) -> PathBuf {
        if self.has_draft() {
            self.paths.draft()
        } else {
            self.paths.published()
        }
    }

    /// Absolute path of a file in the effective tree (for read-side worker
    /// calls).
    pub fn effective_path(&self, rel: &str) -> PathBuf {
        self.effective_root().join(rel)
    }

    /// Absolute path of a file inside the draft overlay (for write-side
    /// worker calls; the overlay must already exist).
    pub fn draft_path(&self, rel: &str) -> PathBuf {
        self.paths.draft().join(rel)
    }

    /// All files in the effective tree, relative paths, sorted.
    pub fn list_files(&self) -> anyhow::Result<Vec<String>> {
        fsutil::list_files_recursive(&self.effective_root())
    }

    pub fn read_file(&self, rel: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.effective_root().join(rel);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Write a file into the draft, creating the overlay on first use.
    pub fn write_file(&self, rel: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.ensure_draft()?;
        fsutil::atomic_write(&self.paths.draft().join(rel), bytes)
    }

    /// Delete a file from the draft, creating the overlay on first use so
    /// the deletion shows up in the change set.
    pub fn delete_file(&self, rel: &str) -> anyhow::Result<bool> {
        self.ensure_draft()?;
        let path = self.paths.draft().join(rel);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("deleting {}", path.display())),
        }
    }

    pub fn copy_file(&self, from: &str, to: &str) -> anyhow::Result<()> {
        self.ensure_draft()?;
        let src = self.paths.draft().join(from);
        let dst = self.paths.draft().join(to);
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&src, &dst)
            .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
        Ok(())
    }

    /// Commit the draft: the overlay becomes the published tree and the
    /// overlay is removed.
    pub fn publish(&self) -> anyhow::Result<()> {
        if !self.has_draft() {
            anyhow::bail!("no draft to publish");
        }
        let published = self.paths.published();
        let stage = self.paths.root().join("published.stage");
        fsutil::remove_dir_if_present(&stage)?;
        fsutil::copy_dir_all(&self.paths.draft(), &stage)?;
        fsutil::remove_dir_if_present(&published)?;
        std::fs::rename(&stage, &published)
            .with_context(|| format!("renaming stage over {}", published.display()))?;
        fsutil::remove_dir_if_present(&self.paths.draft())
    }

    /// Drop the overlay without committing.
    pub fn discard(&self) -> anyhow::Result<()> {
        fsutil::remove_dir_if_present(&self.paths.draft())
    }

    /// Per-path differences between the draft and published trees.  Empty
    /// when no draft exists.
    pub fn change_set(&self) -> anyhow::Result<Vec<PathChange>> {
        if !self.has_draft() {
            return Ok(Vec::new());
        }
        let published = self.paths.published();
        let draft = self.paths.draft();
        let pub_files = fsutil::list_files_recursive(&published)?;
        let draft_files = fsutil::list_files_recursive(&draft)?;

        let mut changes = Vec::new();
        for path in &draft_files {
            if !pub_files.contains(path) {
                changes.push(PathChange { path: path.clone(), kind: ChangeKind::Added });
            } else {
                let a = std::fs::read(published.join(path))?;
                let b = std::fs::read(draft.join(path))?;
                if a != b {
                    changes.push(PathChange { path: path.clone(), kind: ChangeKind::Modified });
                }
            }
        }
        for path in &pub_files {
            if !draft_files.contains(path) {
                changes.push(PathChange { path: path.clone(), kind: ChangeKind::Deleted });
            }
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(changes)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, DraftStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        paths.ensure_layout().unwrap();
        std::fs::write(paths.published().join("seed.txt"), "seed").unwrap();
        (dir, DraftStore::new(&paths))
    }

    #[test]
    fn no_draft_until_first_write() {
        let (_d, s) = store();
        assert!(!s.has_draft());
        s.write_file("one.txt", b"one").unwrap();
        assert!(s.has_draft());
    }

    #[test]
    fn ensure_draft_copies_published_tree() {
        let (_d, s) = store();
        s.ensure_draft().unwrap();
        assert_eq!(s.read_file("seed.txt").unwrap().unwrap(), b"seed");
    }

    #[test]
    fn effective_root_prefers_draft() {
        let (_d, s) = store();
        assert!(s.effective_root().ends_with("published"));
        s.write_file("one.txt", b"one").unwrap();
        assert!(s.effective_root().ends_with("draft"));
    }

    #[test]
    fn change_set_reports_add_modify_delete() {
        let (_d, s) = store();
        s.write_file("one.txt", b"one").unwrap();
        s.write_file("seed.txt", b"changed").unwrap();
        s.delete_file("nope.txt").unwrap();
        let mut changes = s.change_set().unwrap();
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "one.txt");
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[1].path, "seed.txt");
        assert_eq!(changes[1].kind, ChangeKind::Modified);

        s.delete_file("seed.txt").unwrap();
        let changes = s.change_set().unwrap();
        assert!(changes
            .iter()
            .any(|c| c.path == "seed.txt" && c.kind == ChangeKind::Deleted));
    }

    #[test]
    fn publish_replaces_published_and_drops_draft() {
        let (_d, s) = store();
        s.write_file("one.txt", b"one").unwrap();
        s.publish().unwrap();
        assert!(!s.has_draft());
        assert_eq!(s.read_file("one.txt").unwrap().unwrap(), b"one");
        assert!(s.change_set().unwrap().is_empty());
    }

    #[test]
    fn publish_without_draft_is_an_error() {
        let (_d, s) = store();
        assert!(s.publish().is_err());
    }

    #[test]
    fn discard_drops_overlay_keeping_published() {
        let (_d, s) = store();
        s.write_file("one.txt", b"one").unwrap();
        s.discard().unwrap();
        assert!(!s.has_draft());
        assert!(s.read_file("one.txt").unwrap().is_none());
        assert_eq!(s.read_file("seed.txt").unwrap().unwrap(), b"seed");
    }
}
