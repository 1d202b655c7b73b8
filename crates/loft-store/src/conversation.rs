// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::fsutil;
use crate::layout::WorkbenchPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// One persisted conversation entry.
///
/// `kind` distinguishes ordinary chat messages from system events (e.g. a
/// checkpoint restore); system events carry an `event_kind` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub message_id: String,
    pub role: ConversationRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ConversationMessage {
    pub fn message(role: ConversationRole, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            kind: "message".to_string(),
            message_id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: now,
            event_kind: None,
            metadata: None,
        }
    }

    pub fn system_event(
        event_kind: impl Into<String>,
        text: impl Into<String>,
        metadata: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: "system_event".to_string(),
            message_id: Uuid::new_v4().to_string(),
            role: ConversationRole::System,
            text: text.into(),
            created_at: now,
            event_kind: Some(event_kind.into()),
            metadata,
        }
    }
}

/// Append-only JSONL conversation log.
///
/// Appends are atomic (stage + rename of the whole file) so a crashed write
/// never leaves a torn trailing line.  Entries are linearizable with respect
/// to the run: all mutation happens inside the run-locked region.
#[derive(Clone)]
pub struct ConversationStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ConversationStore {
    pub fn new(paths: &WorkbenchPaths, clock: Arc<dyn Clock>) -> Self {
        Self { path: paths.conversation_file(), clock }
    }

    /// Append one entry and return its `message_id`.
    pub fn append(&self, message: ConversationMessage) -> anyhow::Result<String> {
        let id = message.message_id.clone();
        let mut entries = self.read_all()?;
        entries.push(message);
        self.write_all(&entries)?;
        Ok(id)
    }

    /// Convenience: append a plain chat message stamped with the store clock.
    pub fn append_message(
        &self,
        role: ConversationRole,
        text: impl Into<String>,
    ) -> anyhow::Result<String> {
        self.append(ConversationMessage::message(role, text, self.clock.now()))
    }

    /// All entries in append order.  An absent file is an empty history.
    pub fn read_all(&self) -> anyhow::Result<Vec<ConversationMessage>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading conversation {}", self.path.display()))
            }
        };
        let mut entries = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let entry: ConversationMessage = serde_json::from_str(line)
                .with_context(|| format!("parsing conversation line: {line}"))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The `count` most-recent entries (the tail the model sees).
    pub fn tail(&self, count: usize) -> anyhow::Result<Vec<ConversationMessage>> {
        let entries = self.read_all()?;
        let skip = entries.len().saturating_sub(count);
        Ok(entries.into_iter().skip(skip).collect())
    }

    fn write_all(&self, entries: &[ConversationMessage]) -> anyhow::Result<()> {
        let mut buf = String::new();
        for e in entries {
            buf.push_str(&serde_json::to_string(e)?);
            buf.push('\n');
        }
        fsutil::atomic_write(&self.path, buf.as_bytes())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn store() -> (tempfile::TempDir, ConversationStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        (dir, ConversationStore::new(&paths, Arc::new(SystemClock)))
    }

    #[test]
    fn empty_store_reads_as_empty() {
        let (_d, s) = store();
        assert!(s.read_all().unwrap().is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let (_d, s) = store();
        s.append_message(ConversationRole::User, "first").unwrap();
        s.append_message(ConversationRole::Assistant, "second").unwrap();
        let all = s.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].text, "first");
        assert_eq!(all[1].text, "second");
    }

    #[test]
    fn append_returns_unique_message_ids() {
        let (_d, s) = store();
        let a = s.append_message(ConversationRole::User, "a").unwrap();
        let b = s.append_message(ConversationRole::User, "b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tail_returns_most_recent() {
        let (_d, s) = store();
        for i in 0..5 {
            s.append_message(ConversationRole::User, format!("m{i}")).unwrap();
        }
        let tail = s.tail(2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].text, "m3");
        assert_eq!(tail[1].text, "m4");
    }

    #[test]
    fn system_event_round_trips_metadata() {
        let (_d, s) = store();
        let ev = ConversationMessage::system_event(
            "checkpoint_restore",
            "Restored checkpoint",
            Some(serde_json::json!({"checkpoint_id": "c1", "pre_restore_id": "c2"})),
            Utc::now(),
        );
        s.append(ev).unwrap();
        let all = s.read_all().unwrap();
        assert_eq!(all[0].kind, "system_event");
        assert_eq!(all[0].event_kind.as_deref(), Some("checkpoint_restore"));
        assert_eq!(all[0].metadata.as_ref().unwrap()["checkpoint_id"], "c1");
    }
}
