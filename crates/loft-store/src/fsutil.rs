// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

/// Durable replace: stage the bytes to a sibling file, fsync, then rename
/// over the target.  Readers never observe a half-written file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("creating directory {}", parent.display()))?;

    let stage = path.with_extension(format!(
        "{}.tmp{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut f = fs::File::create(&stage)
        .with_context(|| format!("staging write to {}", stage.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("writing staged bytes to {}", stage.display()))?;
    f.sync_all()
        .with_context(|| format!("syncing staged file {}", stage.display()))?;
    drop(f);

    fs::rename(&stage, path)
        .with_context(|| format!("renaming {} over {}", stage.display(), path.display()))?;
    Ok(())
}

/// Recursively copy a directory tree.  Missing source is an error; the
/// destination is created as needed.
pub fn copy_dir_all(src: &Path, dst: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("reading {}", src.display()))? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to)
                .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

/// Remove a directory tree, tolerating its absence.
pub fn remove_dir_if_present(path: &Path) -> anyhow::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

/// List all files under `root`, as paths relative to `root`, sorted.
/// Returns an empty list when the root is absent.
pub fn list_files_recursive(root: &Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    if !root.exists() {
        return Ok(out);
    }
    walk(root, root, &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
