// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::error::ProviderError;
use crate::types::{ChatRequest, ChatTurn, StreamEvent, ToolInvocation};

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// The model transport used by the workbench engine.
///
/// Implementations translate these calls into their provider's wire format,
/// including the `reasoning_effort` hint carried on [`ChatRequest`].  The
/// engine never sees provider-specific encoding.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Stable provider identifier for error attribution.
    fn provider_id(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Tool-free streaming completion.  Used by the summary phase, which is
    /// the only phase that streams deltas to the client.
    async fn stream_chat(&self, req: ChatRequest) -> Result<EventStream, ProviderError>;

    /// Buffered completion with tool support: returns the finished turn.
    ///
    /// The default implementation drives [`stream_chat_with_tools`] to
    /// completion and collects the events; transports with a native
    /// non-streaming endpoint can override.
    async fn chat_with_tools(&self, req: ChatRequest) -> Result<ChatTurn, ProviderError> {
        let stream = self.stream_chat_with_tools(req).await?;
        collect_turn(stream).await
    }

    /// Streaming completion with tool support.
    async fn stream_chat_with_tools(&self, req: ChatRequest) -> Result<EventStream, ProviderError>;
}

/// Drain a response stream into a completed [`ChatTurn`].
///
/// Tool-call argument chunks are reassembled per provider index; calls with
/// an empty name cannot be dispatched and are dropped.
pub async fn collect_turn(mut stream: EventStream) -> Result<ChatTurn, ProviderError> {
    let mut text = String::new();
    // Keyed by the parallel-tool-call index from the provider.  Providers
    // that interleave argument chunks always tag them with the same index.
    let mut pending: HashMap<u32, (String, String, String)> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => text.push_str(&delta),
            StreamEvent::ToolCall { index, id, name, arguments } => {
                let slot = pending.entry(index).or_default();
                if !id.is_empty() {
                    slot.0 = id;
                }
                if !name.is_empty() {
                    slot.1 = name;
                }
                slot.2.push_str(&arguments);
            }
            StreamEvent::Done => break,
        }
    }

    let mut sorted: Vec<(u32, (String, String, String))> = pending.into_iter().collect();
    sorted.sort_by_key(|(idx, _)| *idx);

    let mut tool_calls = Vec::with_capacity(sorted.len());
    for (_, (id, name, args_buf)) in sorted {
        if name.is_empty() {
            warn!(tool_call_id = %id, "dropping tool call with empty name from model");
            continue;
        }
        let arguments = if args_buf.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&args_buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool_name = %name, error = %e,
                          "model sent tool call with invalid JSON arguments; substituting {{}}");
                    serde_json::Value::Object(Default::default())
                }
            }
        };
        tool_calls.push(ToolInvocation { id, name, arguments });
    }

    Ok(ChatTurn { text, tool_calls })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
