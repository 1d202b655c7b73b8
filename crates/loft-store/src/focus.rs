// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fsutil;
use crate::layout::WorkbenchPaths;

/// A small structured locator produced by a successful office-file write,
/// used by the review UI to open the diff at the right place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FocusHint {
    /// xlsx: sheet plus the top-left coordinate of the first cell-touching
    /// operation.  Sheet-level operations carry no coordinates.
    Sheet {
        sheet: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        row_start: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        col_start: Option<u32>,
    },
    /// docx: smallest explicit section index among the operations, else 0.
    Section { section_index: u32 },
    /// pptx: smallest explicit slide index; `add_slide` without an index is
    /// resolved post-apply to slide-count − 1.
    Slide { slide_index: u32 },
}

/// Per-path focus hints, last-writer-wins, persisted alongside the workshop
/// metadata so the review surface can read them outside a run.
#[derive(Debug, Clone)]
pub struct FocusStore {
    path: PathBuf,
}

impl FocusStore {
    pub fn new(paths: &WorkbenchPaths) -> Self {
        Self { path: paths.workshop_meta().join("focus_hints.json") }
    }

    pub fn record(&self, file: &str, hint: FocusHint) -> anyhow::Result<()> {
        let mut map = self.all();
        map.insert(file.to_string(), hint);
        fsutil::atomic_write(&self.path, serde_json::to_vec_pretty(&map)?.as_slice())
    }

    pub fn get(&self, file: &str) -> Option<FocusHint> {
        self.all().remove(file)
    }

    /// Snapshot read; absence or unreadable content is an empty map.
    pub fn all(&self) -> HashMap<String, FocusHint> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default()
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
