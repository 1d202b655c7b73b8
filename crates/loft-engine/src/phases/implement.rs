// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use tracing::warn;

use loft_config::Phase;
use loft_model::ChatMessage;
use loft_plan::{extract_new_items, ItemStatus, Plan, PlanItem};
use loft_store::artifact::PLAN_FILE;

use crate::error::{EngineError, ErrorCode};
use crate::events::{notify, Notification};
use crate::phases::{tool_loop::run_tool_loop, RunCtx};
use crate::prompts::{IMPLEMENT_SYSTEM_PROMPT, TOOL_RECEIPTS_NOTE};
use crate::retry::ModelCallError;

/// Implement: execute pending plan items in document order.
///
/// Error policy per item: a transient `Unavailable` gets one retry of the
/// whole item; a second non-fatal failure marks the item `[!]` and the run
/// continues.  Rate-limit exhaustion and fatal errors stop the run with the
/// item left pending.
pub async fn run(ctx: &RunCtx<'_>, plan: &mut Plan) -> Result<(), EngineError> {
    notify(ctx.notifier, Notification::PhaseStarted { phase: Phase::Implement }).await;

    let mut position = 0;
    loop {
        let items = plan.items();
        if position >= items.len() {
            break;
        }
        let item = items[position].clone();
        if item.status != ItemStatus::Pending {
            position += 1;
            continue;
        }

        match run_item(ctx, plan, &item).await {
            Ok(reply) => complete_item(ctx, plan, position, &reply).await?,
            Err(ModelCallError::Unavailable(first)) => {
                warn!(position, error = %first, "implement item hit transient failure; retrying once");
                match run_item(ctx, plan, &item).await {
                    Ok(reply) => complete_item(ctx, plan, position, &reply).await?,
                    Err(ModelCallError::Unavailable(second)) => {
                        warn!(position, error = %second, "retry failed; marking item failed");
                        plan.mark(
                            position,
                            ItemStatus::Failed,
                            Some(&format!("provider unavailable: {second}")),
                        )
                        .map_err(|e| {
                            EngineError::in_phase(
                                ErrorCode::ValidationFailed,
                                Phase::Implement,
                                e.to_string(),
                            )
                        })?;
                        persist(ctx, plan)?;
                    }
                    Err(ModelCallError::Fatal(e)) => return Err(e),
                }
            }
            Err(ModelCallError::Fatal(e)) => return Err(e),
        }

        position += 1;
    }

    notify(ctx.notifier, Notification::PhaseCompleted { phase: Phase::Implement }).await;
    Ok(())
}

async fn run_item(
    ctx: &RunCtx<'_>,
    plan: &Plan,
    item: &PlanItem,
) -> Result<String, ModelCallError> {
    let system = format!(
        "{IMPLEMENT_SYSTEM_PROMPT}\n\n{TOOL_RECEIPTS_NOTE}\n\n# Current item\n{}. {} \u{2014} {}\n\n# Plan\n{}",
        item.index,
        item.label,
        item.description,
        plan.render(),
    );
    let messages = vec![ChatMessage::system(system), ChatMessage::user(ctx.user_message)];
    run_tool_loop(ctx, Phase::Implement, messages).await
}

/// Mark the item done, persist, report progress, and fold any items the
/// model proposed in its reply back into the plan (inflation guard applies).
async fn complete_item(
    ctx: &RunCtx<'_>,
    plan: &mut Plan,
    position: usize,
    reply: &str,
) -> Result<(), EngineError> {
    plan.mark(position, ItemStatus::Done, None).map_err(|e| {
        EngineError::in_phase(ErrorCode::ValidationFailed, Phase::Implement, e.to_string())
    })?;
    persist(ctx, plan)?;

    notify(
        ctx.notifier,
        Notification::ImplementProgress {
            item_index: position + 1,
            item_count: plan.items().len(),
        },
    )
    .await;

    let discovered = extract_new_items(reply);
    if !discovered.is_empty() {
        let added = plan.append(&discovered);
        if added < discovered.len() {
            warn!(
                dropped = discovered.len() - added,
                "inflation guard dropped model-proposed plan items"
            );
        }
        if added > 0 {
            persist(ctx, plan)?;
        }
    }
    Ok(())
}

fn persist(ctx: &RunCtx<'_>, plan: &Plan) -> Result<(), EngineError> {
    ctx.artifacts.write(PLAN_FILE, &plan.render()).map_err(|e| {
        EngineError::in_phase(ErrorCode::FileWriteFailed, Phase::Implement, e.to_string())
    })
}
