// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

use loft_config::Phase;
use loft_store::ToolLog;

use crate::tool::{Tool, ToolCall, ToolError, ToolSuccess, PLAN_PHASES};

/// Fetch the full logged result of an earlier tool call by its entry id.
///
/// Write tools return only a short receipt to the model; the complete
/// result JSON stays in the tool log and is recoverable here.  The system
/// prompt documents the receipt-to-log linkage.
pub struct RecallToolResultTool {
    log: ToolLog,
}

impl RecallToolResultTool {
    pub fn new(log: ToolLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Tool for RecallToolResultTool {
    fn name(&self) -> &str {
        "recall_tool_result"
    }

    fn description(&self) -> &str {
        "Returns the full original result of an earlier tool call, looked up by the \
         tool-log entry id from its receipt."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "entry_id": {
                    "type": "integer",
                    "description": "Tool-log entry id (1-based, increasing per call)"
                }
            },
            "required": ["entry_id"]
        })
    }

    fn phases(&self) -> &[Phase] {
        PLAN_PHASES
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let entry_id = call
            .args
            .get("entry_id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ToolError::missing("entry_id", &call.args))?;

        let entry = self
            .log
            .read_entry(entry_id)
            .ok_or_else(|| ToolError::msg(format!("no tool log entry with id {entry_id}")))?;

        match (entry.result, entry.error) {
            (Some(result), _) => Ok(ToolSuccess::json(result)),
            (None, Some(error)) => Ok(ToolSuccess::json(json!({
                "tool": entry.tool,
                "error": error,
            }))),
            (None, None) => Err(ToolError::msg(format!(
                "tool log entry {entry_id} has neither result nor error"
            ))),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
