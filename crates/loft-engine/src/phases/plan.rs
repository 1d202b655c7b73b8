// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use loft_config::Phase;
use loft_model::ChatMessage;
use loft_plan::{annotate_original_count, Plan};
use loft_store::artifact::{PLAN_FILE, RESEARCH_FILE};

use crate::error::{EngineError, ErrorCode};
use crate::events::{notify, Notification};
use crate::phases::{tool_loop::run_tool_loop, RunCtx};
use crate::prompts::PLAN_SYSTEM_PROMPT;

/// Plan: turn the research briefing into a checklist.  The reply must carry
/// the plan headings; the engine prepends the inflation-guard header with
/// the parsed item count before persisting `plan.md`.
pub async fn run(ctx: &RunCtx<'_>) -> Result<Plan, EngineError> {
    notify(ctx.notifier, Notification::PhaseStarted { phase: Phase::Plan }).await;

    let research = ctx
        .artifacts
        .read(RESEARCH_FILE)
        .map_err(|e| EngineError::in_phase(ErrorCode::FileReadFailed, Phase::Plan, e.to_string()))?
        .unwrap_or_default();

    let messages = vec![
        ChatMessage::system(PLAN_SYSTEM_PROMPT),
        ChatMessage::user(format!("Research briefing:\n\n{research}")),
    ];

    let reply = run_tool_loop(ctx, Phase::Plan, messages)
        .await
        .map_err(|e| e.into_engine_error(Phase::Plan))?;

    let text = reply.trim_start();
    if !text.starts_with("# Execution Plan") || !text.contains("## Items") {
        return Err(EngineError::in_phase(
            ErrorCode::ValidationFailed,
            Phase::Plan,
            "plan reply must start with '# Execution Plan' and contain an '## Items' section",
        ));
    }

    let item_count = Plan::parse(text).items().len();
    let annotated = annotate_original_count(text, item_count);
    ctx.artifacts
        .write(PLAN_FILE, &annotated)
        .map_err(|e| EngineError::in_phase(ErrorCode::FileWriteFailed, Phase::Plan, e.to_string()))?;

    notify(ctx.notifier, Notification::PhaseCompleted { phase: Phase::Plan }).await;
    Ok(Plan::parse(&annotated))
}
