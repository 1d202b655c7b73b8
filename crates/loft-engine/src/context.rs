// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use loft_config::EngineConfig;
use loft_model::{ChatMessage, Role};
use loft_store::{ConversationRole, ConversationStore, DraftStore};

const CHAT_SYSTEM_PROMPT: &str = "\
You are the assistant of a document workbench. Answer questions about the \
workbench files using the manifest and inline contents below. Inline \
contents may be cut at a per-file line cap; a truncated file ends with the \
marker line.";

/// Model-visible message list for ad-hoc (non-phased) chat: a synthesized
/// system preamble followed by the most-recent conversation tail.  The
/// preamble is rebuilt each call and does not count toward the tail cap.
pub fn build_chat_messages(
    drafts: &DraftStore,
    conversation: &ConversationStore,
    config: &EngineConfig,
) -> anyhow::Result<Vec<ChatMessage>> {
    let manifest = crate::prompts::file_manifest(drafts)?;
    let payloads = crate::prompts::inline_payloads(drafts, config.max_context_lines_per_file)?;
    let preamble = format!("{CHAT_SYSTEM_PROMPT}\n\n{manifest}\n{payloads}");

    let mut messages = vec![ChatMessage::system(preamble)];
    for entry in conversation.tail(config.max_conversation_messages)? {
        let role = match entry.role {
            ConversationRole::User => Role::User,
            ConversationRole::Assistant => Role::Assistant,
            ConversationRole::System => Role::System,
        };
        messages.push(ChatMessage { role, content: loft_model::MessageContent::Text(entry.text) });
    }
    Ok(messages)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
