// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// Label–description separator inside an item line (U+2014 em-dash).
const SEPARATOR: &str = " \u{2014} ";
/// Failure-reason suffix marker on `[!]` items.
const FAILED_OPEN: &str = " [Failed: ";

const COUNT_PREFIX: &str = "<!-- original_count: ";
const COUNT_SUFFIX: &str = " -->";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Done,
    Failed,
}

/// One actionable checklist item, as parsed from its line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    /// The number as written in the file.  Duplicates are tolerated; the
    /// item's *position* in document order is authoritative for mutation.
    pub index: usize,
    pub label: String,
    pub description: String,
    pub status: ItemStatus,
    pub failure_reason: Option<String>,
}

/// Parsed view of a plan file.
///
/// The raw lines are kept verbatim; items are re-parsed on demand so that
/// every mutation is a single-line rewrite and unknown text is never touched.
#[derive(Debug, Clone)]
pub struct Plan {
    original_count: Option<usize>,
    lines: Vec<String>,
}

impl Plan {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let original_count = lines.iter().find_map(|l| parse_count_header(l));
        Self { original_count, lines }
    }

    /// Render the plan back to its file form.  Inverse of [`parse`] for
    /// untouched plans: `parse(render(p)) == p`.
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// The inflation-guard bound.  `None` disables the guard.
    pub fn original_count(&self) -> Option<usize> {
        self.original_count
    }

    /// All actionable items in document order.
    pub fn items(&self) -> Vec<PlanItem> {
        self.lines.iter().filter_map(|l| parse_item_line(l)).collect()
    }

    /// True when every item is done or failed.  A plan with zero parsed
    /// items is complete (a no-op run).
    pub fn all_done(&self) -> bool {
        self.items().iter().all(|i| i.status != ItemStatus::Pending)
    }

    /// Rewrite the status of the item at `position` (0-based, document
    /// order).  Preserves the item's written number, label and description;
    /// never renumbers and never touches surrounding text.
    pub fn mark(
        &mut self,
        position: usize,
        status: ItemStatus,
        reason: Option<&str>,
    ) -> Result<(), PlanError> {
        let line_idx = self
            .item_line_indices()
            .get(position)
            .copied()
            .ok_or(PlanError::NoSuchItem(position))?;
        let item = parse_item_line(&self.lines[line_idx])
            .expect("item_line_indices only yields parseable lines");

        let PlanItem { index, label, description, .. } = item;
        self.lines[line_idx] = match status {
            ItemStatus::Pending => format!("- [ ] {index}. {label}{SEPARATOR}{description}"),
            ItemStatus::Done => format!("- [x] {index}. {label}{SEPARATOR}{description}"),
            ItemStatus::Failed => {
                let reason = reason.unwrap_or("unspecified");
                format!("- [!] {index}. {label}{SEPARATOR}{description}{FAILED_OPEN}{reason}]")
            }
        };
        Ok(())
    }

    /// Insert raw checkbox lines immediately after the last existing item
    /// line, so trailing free-form sections (`## Notes`) stay below the
    /// checklist.  Lines that do not parse as items are ignored; lines that
    /// would push the actionable count over `original_count` are dropped.
    ///
    /// Returns the number of lines actually inserted.
    pub fn append(&mut self, new_lines: &[String]) -> usize {
        let valid: Vec<&String> =
            new_lines.iter().filter(|l| parse_item_line(l).is_some()).collect();
        if valid.is_empty() {
            return 0;
        }

        let current = self.item_line_indices().len();
        let allowed = match self.original_count {
            Some(bound) => bound.saturating_sub(current),
            None => usize::MAX,
        };
        let take = valid.len().min(allowed);
        if take == 0 {
            return 0;
        }

        let insert_at = match self.item_line_indices().last() {
            Some(&i) => i + 1,
            // No items yet: insert at the end, but before a final empty
            // element that represents the file's trailing newline.
            None => match self.lines.last() {
                Some(l) if l.is_empty() => self.lines.len() - 1,
                _ => self.lines.len(),
            },
        };
        for (offset, line) in valid[..take].iter().enumerate() {
            self.lines.insert(insert_at + offset, (*line).clone());
        }
        take
    }

    fn item_line_indices(&self) -> Vec<usize> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| parse_item_line(l).is_some())
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PlanError {
    NoSuchItem(usize),
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSuchItem(pos) => write!(f, "no plan item at position {pos}"),
        }
    }
}

impl std::error::Error for PlanError {}

/// Prefix `text` with the inflation-guard header.
pub fn annotate_original_count(text: &str, count: usize) -> String {
    format!("{COUNT_PREFIX}{count}{COUNT_SUFFIX}\n{text}")
}

/// Return any top-level pending checkbox lines from a model's reply.
///
/// Only column-zero `- [ ] N. Label — Description` lines count; indented
/// variants (nested checkboxes inside a quoted block, say) are ignored.
pub fn extract_new_items(model_text: &str) -> Vec<String> {
    model_text
        .lines()
        .filter(|l| {
            matches!(parse_item_line(l), Some(item) if item.status == ItemStatus::Pending)
        })
        .map(str::to_string)
        .collect()
}

fn parse_count_header(line: &str) -> Option<usize> {
    line.strip_prefix(COUNT_PREFIX)?
        .strip_suffix(COUNT_SUFFIX)?
        .parse()
        .ok()
}

/// Parse one line as a checklist item.  The checkbox must start at column
/// zero; indented checkboxes do not count as plan items.
fn parse_item_line(line: &str) -> Option<PlanItem> {
    let (status, rest) = if let Some(r) = line.strip_prefix("- [ ] ") {
        (ItemStatus::Pending, r)
    } else if let Some(r) = line.strip_prefix("- [x] ") {
        (ItemStatus::Done, r)
    } else if let Some(r) = line.strip_prefix("- [!] ") {
        (ItemStatus::Failed, r)
    } else {
        return None;
    };

    let dot = rest.find(". ")?;
    let digits = &rest[..dot];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: usize = digits.parse().ok()?;

    let body = &rest[dot + 2..];
    let sep = body.find(SEPARATOR)?;
    let label = body[..sep].to_string();
    let mut description = body[sep + SEPARATOR.len()..].to_string();

    let mut failure_reason = None;
    if status == ItemStatus::Failed {
        if let Some(open) = description.rfind(FAILED_OPEN) {
            if description.ends_with(']') {
                failure_reason =
                    Some(description[open + FAILED_OPEN.len()..description.len() - 1].to_string());
                description.truncate(open);
            }
        }
    }

    Some(PlanItem { index, label, description, status, failure_reason })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
