// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use loft_config::Phase;
use loft_model::{ChatMessage, ChatRequest, ToolSchema};

use crate::error::{EngineError, ErrorCode};
use crate::phases::RunCtx;
use crate::retry::{call_model, ModelCallError};

/// Upper bound on model↔tool rounds within one phase call.  A model that
/// never stops calling tools is a protocol violation, not a retry case.
const MAX_TOOL_ROUNDS: usize = 64;

/// Drive the model↔tool loop to completion: while the model returns tool
/// calls, execute them strictly in emission order and feed the receipts
/// back; when it stops, return the final text.
pub(crate) async fn run_tool_loop(
    ctx: &RunCtx<'_>,
    phase: Phase,
    mut messages: Vec<ChatMessage>,
) -> Result<String, ModelCallError> {
    let tools: Vec<ToolSchema> = ctx
        .registry
        .schemas_for_phase(phase)
        .into_iter()
        .map(|s| ToolSchema { name: s.name, description: s.description, parameters: s.parameters })
        .collect();

    for _round in 0..MAX_TOOL_ROUNDS {
        let req = ChatRequest {
            messages: messages.clone(),
            tools: tools.clone(),
            reasoning_effort: ctx.effort.for_phase(phase),
        };
        let turn =
            call_model(|| ctx.client.chat_with_tools(req.clone()), ctx.sleeper, ctx.cancel, phase)
                .await?;

        if turn.tool_calls.is_empty() {
            return Ok(turn.text);
        }

        if !turn.text.is_empty() {
            messages.push(ChatMessage::assistant(&turn.text));
        }
        // Record all tool-call messages before any results, preserving the
        // provider's parallel-call wire ordering.
        for inv in &turn.tool_calls {
            messages.push(ChatMessage::tool_call(
                inv.id.clone(),
                inv.name.clone(),
                inv.arguments.to_string(),
            ));
        }

        for inv in turn.tool_calls {
            let call = loft_tools::ToolCall { id: inv.id, name: inv.name, args: inv.arguments };
            let output = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    return Err(ModelCallError::Fatal(EngineError::user_canceled(phase)));
                }
                result = ctx.registry.execute(&call) => result.map_err(|e| {
                    ModelCallError::Fatal(EngineError::in_phase(
                        ErrorCode::FileWriteFailed,
                        phase,
                        e.to_string(),
                    ))
                })?,
            };
            messages.push(ChatMessage::tool_result(output.call_id.clone(), output.content));
        }
    }

    Err(ModelCallError::Fatal(EngineError::in_phase(
        ErrorCode::ValidationFailed,
        phase,
        format!("tool loop exceeded {MAX_TOOL_ROUNDS} rounds without a final reply"),
    )))
}
