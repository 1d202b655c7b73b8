// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use loft_config::Phase;
use loft_store::{Clock, FocusStore, ToolLog, ToolLogEntry, WorkbenchPaths};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// A tool schema — mirrors the model crate's shape but keeps this crate
/// independent from it.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding the tool catalog for one workbench, plus the
/// shared dispatch pipeline: validate → lazily ensure draft → invoke →
/// log → receipt → focus hint.  The draft overlay is created by each write
/// tool only after its arguments validate, so a rejected call never
/// materialises a draft.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    log: ToolLog,
    focus: FocusStore,
    clock: Arc<dyn Clock>,
}

impl ToolRegistry {
    pub fn new(paths: &WorkbenchPaths, clock: Arc<dyn Clock>) -> Self {
        Self {
            tools: HashMap::new(),
            log: ToolLog::new(paths),
            focus: FocusStore::new(paths),
            clock,
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Schemas for the tools offered in `phase`, sorted by name.
    pub fn schemas_for_phase(&self, phase: Phase) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .filter(|t| t.phases().contains(&phase))
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn names_for_phase(&self, phase: Phase) -> Vec<String> {
        let mut names: Vec<String> = self
            .tools
            .values()
            .filter(|t| t.phases().contains(&phase))
            .map(|t| t.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Dispatch one model tool call.
    ///
    /// Argument/precondition failures come back as `is_error` outputs fed to
    /// the model; infrastructure failures (log append, focus recording) are
    /// `Err` and abort the run.  Every dispatch — success or tool error —
    /// is recorded in the tool log under a fresh monotonic id.
    pub async fn execute(&self, call: &ToolCall) -> anyhow::Result<ToolOutput> {
        let started_at = self.clock.now();

        let outcome = match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => Err(crate::tool::ToolError::msg(format!("unknown tool: {}", call.name))),
        };

        let finished_at = self.clock.now();
        let entry_id = self.log.current_seq() + 1;
        let entry = match &outcome {
            Ok(success) => ToolLogEntry {
                id: entry_id,
                tool: call.name.clone(),
                arguments: call.args.clone(),
                result: Some(success.result.clone()),
                error: None,
                started_at,
                finished_at,
            },
            Err(e) => ToolLogEntry {
                id: entry_id,
                tool: call.name.clone(),
                arguments: call.args.clone(),
                result: None,
                error: Some(e.0.clone()),
                started_at,
                finished_at,
            },
        };
        self.log.append(&entry).context("appending tool log entry")?;

        match outcome {
            Ok(success) => {
                if let Some((file, hint)) = &success.focus {
                    self.focus
                        .record(file, hint.clone())
                        .context("recording focus hint")?;
                }
                debug!(tool = %call.name, entry_id, "tool call succeeded");
                Ok(ToolOutput {
                    call_id: call.id.clone(),
                    content: success.receipt,
                    is_error: false,
                    entry_id,
                })
            }
            Err(e) => {
                warn!(tool = %call.name, entry_id, error = %e, "tool call failed");
                Ok(ToolOutput {
                    call_id: call.id.clone(),
                    content: e.0,
                    is_error: true,
                    entry_id,
                })
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::tool::{ToolError, ToolSuccess, READ_PHASES, WRITE_PHASES};
    use loft_store::{DraftStore, SystemClock};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn phases(&self) -> &[Phase] {
            READ_PHASES
        }
        async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
            Ok(ToolSuccess::json(json!({"echo": call.args})))
        }
    }

    struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        fn name(&self) -> &str {
            "always_fails"
        }
        fn description(&self) -> &str {
            "fails"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn phases(&self) -> &[Phase] {
            WRITE_PHASES
        }
        fn is_write(&self) -> bool {
            true
        }
        async fn execute(&self, _call: &ToolCall) -> Result<ToolSuccess, ToolError> {
            Err(ToolError::msg("boom"))
        }
    }

    fn registry() -> (tempfile::TempDir, ToolRegistry, DraftStore) {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkbenchPaths::new(dir.path(), "wb");
        paths.ensure_layout().unwrap();
        let mut reg = ToolRegistry::new(&paths, Arc::new(SystemClock));
        reg.register(EchoTool);
        reg.register(FailTool);
        let drafts = DraftStore::new(&paths);
        (dir, reg, drafts)
    }

    fn call(name: &str) -> ToolCall {
        ToolCall { id: "c1".into(), name: name.into(), args: json!({"x": 1}) }
    }

    #[tokio::test]
    async fn execute_assigns_monotonic_entry_ids() {
        let (_d, reg, _drafts) = registry();
        let a = reg.execute(&call("echo")).await.unwrap();
        let b = reg.execute(&call("echo")).await.unwrap();
        assert_eq!(a.entry_id, 1);
        assert_eq!(b.entry_id, 2);
    }

    #[tokio::test]
    async fn tool_errors_are_logged_not_fatal() {
        let (_d, reg, _drafts) = registry();
        let out = reg.execute(&call("always_fails")).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.content, "boom");
    }

    #[tokio::test]
    async fn unknown_tool_is_a_tool_error() {
        let (_d, reg, _drafts) = registry();
        let out = reg.execute(&call("nope")).await.unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn failed_write_tool_does_not_create_draft() {
        let (_d, reg, drafts) = registry();
        assert!(!drafts.has_draft());
        let out = reg.execute(&call("always_fails")).await.unwrap();
        assert!(out.is_error);
        assert!(!drafts.has_draft(), "a rejected write call must not materialise a draft");
    }

    #[tokio::test]
    async fn schemas_filter_by_phase() {
        let (_d, reg, _drafts) = registry();
        let research = reg.names_for_phase(Phase::Research);
        assert_eq!(research, vec!["echo"]);
        let implement = reg.names_for_phase(Phase::Implement);
        assert_eq!(implement, vec!["always_fails", "echo"]);
        assert!(reg.names_for_phase(Phase::Plan).is_empty());
    }
}
