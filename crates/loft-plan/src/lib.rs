// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Checklist-markdown plan model.
//!
//! The plan file is the authoritative execution log of an agent run and is
//! deliberately a human-editable markdown checklist rather than a typed
//! structure — operators can hand-edit it between runs.  Everything that is
//! not a checkbox item (headings, `## Notes` sections, blank lines) must
//! round-trip verbatim.
//!
//! Item grammar (the separator is U+2014; ASCII `--` is not accepted):
//!
//! ```text
//! - [ ] 1. Label — Description
//! - [x] 2. Label — Description
//! - [!] 3. Label — Description [Failed: reason]
//! ```
//!
//! An optional `<!-- original_count: N -->` header fixes the maximum number
//! of actionable items; appended items beyond that bound are dropped.

mod plan;

pub use plan::{
    annotate_original_count, extract_new_items, ItemStatus, Plan, PlanItem,
};
