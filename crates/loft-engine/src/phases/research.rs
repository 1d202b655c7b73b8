// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use loft_config::Phase;
use loft_model::ChatMessage;
use loft_store::artifact::RESEARCH_FILE;

use crate::error::{EngineError, ErrorCode};
use crate::events::{notify, Notification};
use crate::phases::{tool_loop::run_tool_loop, RunCtx};
use crate::prompts::{
    file_manifest, inline_payloads, RESEARCH_SYSTEM_PROMPT, TOOL_RECEIPTS_NOTE,
};

/// Research: read-only exploration of the workbench, persisted atomically
/// as `research.md`.  Nothing streams to the client during this phase.
pub async fn run(ctx: &RunCtx<'_>) -> Result<(), EngineError> {
    notify(ctx.notifier, Notification::PhaseStarted { phase: Phase::Research }).await;

    let manifest = file_manifest(ctx.drafts)
        .map_err(|e| EngineError::in_phase(ErrorCode::FileReadFailed, Phase::Research, e.to_string()))?;
    let payloads = inline_payloads(ctx.drafts, ctx.max_context_lines_per_file)
        .map_err(|e| EngineError::in_phase(ErrorCode::FileReadFailed, Phase::Research, e.to_string()))?;

    let system = format!("{RESEARCH_SYSTEM_PROMPT}\n\n{TOOL_RECEIPTS_NOTE}\n\n{manifest}\n{payloads}");
    let messages = vec![ChatMessage::system(system), ChatMessage::user(ctx.user_message)];

    let briefing = run_tool_loop(ctx, Phase::Research, messages)
        .await
        .map_err(|e| e.into_engine_error(Phase::Research))?;

    ctx.artifacts.write(RESEARCH_FILE, &briefing).map_err(|e| {
        EngineError::in_phase(ErrorCode::FileWriteFailed, Phase::Research, e.to_string())
    })?;

    notify(ctx.notifier, Notification::PhaseCompleted { phase: Phase::Research }).await;
    Ok(())
}
