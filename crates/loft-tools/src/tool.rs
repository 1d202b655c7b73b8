// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

use loft_config::Phase;
use loft_store::FocusHint;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier assigned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// The successful outcome of a tool execution, before logging.
///
/// `result` is the full JSON persisted losslessly in the tool log so that
/// `recall_tool_result` can reproduce it; `receipt` is the string returned
/// to the model (the raw JSON for read tools, a short sentence for writes).
#[derive(Debug, Clone)]
pub struct ToolSuccess {
    pub result: Value,
    pub receipt: String,
    /// `(file, hint)` recorded for office-file writes, last-writer-wins.
    pub focus: Option<(String, FocusHint)>,
}

impl ToolSuccess {
    /// A read result: the receipt is the JSON itself.
    pub fn json(result: Value) -> Self {
        let receipt = result.to_string();
        Self { result, receipt, focus: None }
    }

    /// A write result: short sentence receipt, no focus hint.
    pub fn receipt(result: Value, receipt: impl Into<String>) -> Self {
        Self { result, receipt: receipt.into(), focus: None }
    }

    pub fn with_focus(mut self, file: impl Into<String>, hint: FocusHint) -> Self {
        self.focus = Some((file.into(), hint));
        self
    }
}

/// A non-fatal tool failure.  The message is fed back to the model so it
/// can correct its arguments; the run itself continues.
#[derive(Debug, Clone)]
pub struct ToolError(pub String);

impl ToolError {
    pub fn msg(m: impl Into<String>) -> Self {
        Self(m.into())
    }

    /// The standard shape for a missing/invalid required argument.
    pub fn missing(param: &str, args: &Value) -> Self {
        let preview = serde_json::to_string(args).unwrap_or_else(|_| "null".to_string());
        Self(format!("missing required parameter '{param}'. Received: {preview}"))
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ToolError {}

/// What the dispatcher hands back to the phase runner: the receipt (or
/// error text) to feed the model, plus the log entry id it was recorded
/// under.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    /// Receipt or error message — the string the model sees.
    pub content: String,
    pub is_error: bool,
    /// Tool-log entry id assigned to this call.
    pub entry_id: u64,
}

/// Trait every catalog tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// The phases in which this tool is offered to the model.
    fn phases(&self) -> &[Phase];
    /// Write-capable tools lazily create the draft overlay once their
    /// arguments validate; a rejected call leaves the workbench untouched.
    fn is_write(&self) -> bool {
        false
    }
    /// Execute.  Argument validation failures are `Err(ToolError)`; the
    /// dispatcher logs them and feeds the message back to the model.
    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError>;
}

/// Phase sets shared by the catalog: read-only research tools are also
/// available during implement; the plan phase sees only `read_file` and
/// `recall_tool_result`.
pub const READ_PHASES: &[Phase] = &[Phase::Research, Phase::Implement];
pub const PLAN_PHASES: &[Phase] = &[Phase::Research, Phase::Plan, Phase::Implement];
pub const WRITE_PHASES: &[Phase] = &[Phase::Implement];

// ─── Unit tests ──────────────────────────────────────────────────────────────
