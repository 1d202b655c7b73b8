// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use loft_config::Phase;
use loft_store::DraftStore;

use super::{bare_name, extension, require_str, safe_rel};
use crate::tool::{Tool, ToolCall, ToolError, ToolSuccess, READ_PHASES, WRITE_PHASES};
use crate::worker::ToolWorker;

/// Forward a read-side table call to the worker: the file must exist in the
/// effective tree, and all other arguments pass through untouched.
async fn table_read(
    drafts: &DraftStore,
    worker: &Arc<dyn ToolWorker>,
    method: &str,
    call: &ToolCall,
) -> Result<ToolSuccess, ToolError> {
    let path = safe_rel(require_str(&call.args, "path")?)?;
    if drafts
        .read_file(path)
        .map_err(|e| ToolError::msg(format!("reading {path}: {e}")))?
        .is_none()
    {
        return Err(ToolError::msg(format!("file not found: {path}")));
    }

    let mut params: Map<String, Value> =
        call.args.as_object().cloned().unwrap_or_default();
    params.insert(
        "path".to_string(),
        Value::String(drafts.effective_path(path).to_string_lossy().into_owned()),
    );
    let result = worker
        .call(method, Value::Object(params))
        .await
        .map_err(|e| ToolError::msg(format!("{method} failed: {e}")))?;
    Ok(ToolSuccess::json(result))
}

macro_rules! table_read_tool {
    ($ty:ident, $name:literal, $desc:literal, $extra:expr) => {
        pub struct $ty {
            drafts: DraftStore,
            worker: Arc<dyn ToolWorker>,
        }

        impl $ty {
            pub fn new(drafts: DraftStore, worker: Arc<dyn ToolWorker>) -> Self {
                Self { drafts, worker }
            }
        }

        #[async_trait]
        impl Tool for $ty {
            fn name(&self) -> &str {
                $name
            }
            fn description(&self) -> &str {
                $desc
            }
            fn parameters_schema(&self) -> Value {
                let mut props = serde_json::Map::new();
                props.insert(
                    "path".to_string(),
                    json!({ "type": "string", "description": "Workbench-relative table file" }),
                );
                for (key, schema) in $extra {
                    props.insert(key.to_string(), schema);
                }
                json!({ "type": "object", "properties": props, "required": ["path"] })
            }
            fn phases(&self) -> &[Phase] {
                READ_PHASES
            }
            async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
                table_read(&self.drafts, &self.worker, $name, call).await
            }
        }
    };
}

table_read_tool!(
    TableGetMapTool,
    "table_get_map",
    "Returns the sheet/table layout of a tabular file.",
    std::iter::empty::<(&str, Value)>()
);

table_read_tool!(
    TableDescribeTool,
    "table_describe",
    "Returns column names and inferred types for a table.",
    [("sheet", json!({ "type": "string", "description": "Sheet name (workbooks only)" }))]
);

table_read_tool!(
    TableStatsTool,
    "table_stats",
    "Returns row/column counts and basic numeric statistics for a table.",
    [("sheet", json!({ "type": "string", "description": "Sheet name (workbooks only)" }))]
);

table_read_tool!(
    TableReadRowsTool,
    "table_read_rows",
    "Reads a window of table rows.",
    [
        ("sheet", json!({ "type": "string", "description": "Sheet name (workbooks only)" })),
        ("start_row", json!({ "type": "integer", "description": "First row to read (1-based)" })),
        ("limit", json!({ "type": "integer", "description": "Maximum rows to return" }))
    ]
);

table_read_tool!(
    TableQueryTool,
    "table_query",
    "Runs a filter/aggregate query against a table and returns matching rows.",
    [
        ("sheet", json!({ "type": "string", "description": "Sheet name (workbooks only)" })),
        ("query", json!({ "type": "string", "description": "Query expression" })),
        ("limit", json!({ "type": "integer", "description": "Maximum rows to return" }))
    ]
);

// ─── table_export ─────────────────────────────────────────────────────────────

pub struct TableExportTool {
    drafts: DraftStore,
    worker: Arc<dyn ToolWorker>,
}

impl TableExportTool {
    pub fn new(drafts: DraftStore, worker: Arc<dyn ToolWorker>) -> Self {
        Self { drafts, worker }
    }
}

#[async_trait]
impl Tool for TableExportTool {
    fn name(&self) -> &str {
        "table_export"
    }

    fn description(&self) -> &str {
        "Exports a table to a new csv or xlsx file in the draft. The target \
         extension must match the requested format."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_path": { "type": "string", "description": "Table file to export from" },
                "target_path": { "type": "string", "description": "New file name" },
                "format": { "type": "string", "enum": ["csv", "xlsx"] },
                "sheet": { "type": "string", "description": "Sheet name (workbooks only)" }
            },
            "required": ["source_path", "target_path", "format"]
        })
    }

    fn phases(&self) -> &[Phase] {
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let source = safe_rel(require_str(&call.args, "source_path")?)?;
        let format = require_str(&call.args, "format")?;
        if !matches!(format, "csv" | "xlsx") {
            return Err(ToolError::msg(format!("format must be csv or xlsx, got: {format}")));
        }
        let target = bare_name(require_str(&call.args, "target_path")?);
        if extension(&target) != format {
            return Err(ToolError::msg(format!(
                "target_path extension must match format {format}: {target}"
            )));
        }
        if self
            .drafts
            .read_file(source)
            .map_err(|e| ToolError::msg(format!("reading {source}: {e}")))?
            .is_none()
        {
            return Err(ToolError::msg(format!("file not found: {source}")));
        }

        self.drafts
            .ensure_draft()
            .map_err(|e| ToolError::msg(format!("creating draft overlay: {e}")))?;
        let mut params = json!({
            "source_path": self.drafts.effective_path(source).to_string_lossy(),
            "target_path": self.drafts.draft_path(&target).to_string_lossy(),
            "format": format,
        });
        if let Some(sheet) = call.args.get("sheet").and_then(|v| v.as_str()) {
            params["sheet"] = Value::String(sheet.to_string());
        }
        let result = self
            .worker
            .call("table_export", params)
            .await
            .map_err(|e| ToolError::msg(format!("table_export failed: {e}")))?;
        Ok(ToolSuccess::receipt(result, format!("Exported table to {target}")))
    }
}

// ─── table_update_from_export ─────────────────────────────────────────────────

const UPDATE_MODES: &[&str] = &["replace_sheet", "append_rows", "write_range"];

pub struct TableUpdateFromExportTool {
    drafts: DraftStore,
    worker: Arc<dyn ToolWorker>,
}

impl TableUpdateFromExportTool {
    pub fn new(drafts: DraftStore, worker: Arc<dyn ToolWorker>) -> Self {
        Self { drafts, worker }
    }
}

#[async_trait]
impl Tool for TableUpdateFromExportTool {
    fn name(&self) -> &str {
        "table_update_from_export"
    }

    fn description(&self) -> &str {
        "Writes previously exported table data back into a draft workbook. Modes: \
         replace_sheet, append_rows, write_range. clear_target_range is only valid \
         with write_range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_path": { "type": "string", "description": "Exported file to read" },
                "target_path": { "type": "string", "description": "Workbook to update (.xlsx)" },
                "mode": { "type": "string", "enum": UPDATE_MODES },
                "sheet": { "type": "string", "description": "Target sheet" },
                "range": { "type": "string", "description": "Target range (write_range mode)" },
                "clear_target_range": { "type": "boolean", "description": "Clear the range before writing" }
            },
            "required": ["source_path", "target_path", "mode"]
        })
    }

    fn phases(&self) -> &[Phase] {
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let source = safe_rel(require_str(&call.args, "source_path")?)?;
        let target = bare_name(require_str(&call.args, "target_path")?);
        if extension(&target) != "xlsx" {
            return Err(ToolError::msg(format!("target_path must end in .xlsx: {target}")));
        }
        let mode = require_str(&call.args, "mode")?;
        if !UPDATE_MODES.contains(&mode) {
            return Err(ToolError::msg(format!(
                "mode must be one of replace_sheet/append_rows/write_range, got: {mode}"
            )));
        }
        if call.args.get("clear_target_range").is_some() && mode != "write_range" {
            return Err(ToolError::msg(
                "clear_target_range is only allowed when mode is write_range",
            ));
        }
        if self
            .drafts
            .read_file(source)
            .map_err(|e| ToolError::msg(format!("reading {source}: {e}")))?
            .is_none()
        {
            return Err(ToolError::msg(format!("file not found: {source}")));
        }

        self.drafts
            .ensure_draft()
            .map_err(|e| ToolError::msg(format!("creating draft overlay: {e}")))?;
        let mut params: Map<String, Value> =
            call.args.as_object().cloned().unwrap_or_default();
        params.insert(
            "source_path".to_string(),
            Value::String(self.drafts.effective_path(source).to_string_lossy().into_owned()),
        );
        params.insert(
            "target_path".to_string(),
            Value::String(self.drafts.draft_path(&target).to_string_lossy().into_owned()),
        );
        let result = self
            .worker
            .call("table_update_from_export", Value::Object(params))
            .await
            .map_err(|e| ToolError::msg(format!("table_update_from_export failed: {e}")))?;
        Ok(ToolSuccess::receipt(result, format!("Updated {target} ({mode})")))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
