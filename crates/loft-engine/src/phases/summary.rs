// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use futures::StreamExt;
use serde_json::json;

use loft_config::Phase;
use loft_model::{ChatMessage, ChatRequest, StreamEvent};
use loft_store::{ConversationMessage, ConversationRole};

use crate::error::{EngineError, ErrorCode};
use crate::events::{notify, Notification};
use crate::phases::RunCtx;
use crate::prompts::{file_manifest, SUMMARY_SYSTEM_PROMPT};

/// Summary: the only phase that streams to the client.  On completion the
/// assistant reply is appended to the conversation with the run's wall-clock
/// duration; hard-stopped runs never reach this point, so no summary message
/// is recorded for them.
pub async fn run(ctx: &RunCtx<'_>, final_plan: &str) -> Result<String, EngineError> {
    notify(ctx.notifier, Notification::PhaseStarted { phase: Phase::Summary }).await;

    let manifest = file_manifest(ctx.drafts).map_err(|e| {
        EngineError::in_phase(ErrorCode::FileReadFailed, Phase::Summary, e.to_string())
    })?;
    let system = format!("{SUMMARY_SYSTEM_PROMPT}\n\n# Final plan\n{final_plan}\n\n{manifest}");
    let req = ChatRequest {
        messages: vec![ChatMessage::system(system), ChatMessage::user(ctx.user_message)],
        tools: Vec::new(),
        // Summary carries no reasoning-effort override.
        reasoning_effort: None,
    };

    let mut stream = crate::retry::call_model(
        || ctx.client.stream_chat(req.clone()),
        ctx.sleeper,
        ctx.cancel,
        Phase::Summary,
    )
    .await
    .map_err(|e| e.into_engine_error(Phase::Summary))?;

    let mut text = String::new();
    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return Err(EngineError::user_canceled(Phase::Summary));
            }
            event = stream.next() => event,
        };
        match event {
            None => break,
            Some(Ok(StreamEvent::TextDelta(delta))) => {
                text.push_str(&delta);
                notify(ctx.notifier, Notification::AssistantStreamDelta { text: delta }).await;
            }
            Some(Ok(StreamEvent::Done)) => break,
            Some(Ok(StreamEvent::ToolCall { .. })) => {
                // Tool-free request; a tool call here is a protocol slip we
                // can safely ignore.
            }
            Some(Err(e)) => return Err(EngineError::from_provider(&e, Phase::Summary)),
        }
    }

    let elapsed_ms = (ctx.clock.now() - ctx.run_started).num_milliseconds().max(0);
    let mut message =
        ConversationMessage::message(ConversationRole::Assistant, &text, ctx.clock.now());
    message.metadata = Some(json!({ "job_elapsed_ms": elapsed_ms }));
    ctx.conversation.append(message).map_err(|e| {
        EngineError::in_phase(ErrorCode::FileWriteFailed, Phase::Summary, e.to_string())
    })?;

    notify(ctx.notifier, Notification::PhaseCompleted { phase: Phase::Summary }).await;
    Ok(text)
}
