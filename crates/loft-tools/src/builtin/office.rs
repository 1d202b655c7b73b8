// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use loft_config::Phase;
use loft_store::{DraftStore, FocusHint};

use super::{bare_name, extension, require_str, safe_rel};
use crate::tool::{Tool, ToolCall, ToolError, ToolSuccess, READ_PHASES, WRITE_PHASES};
use crate::worker::ToolWorker;

// ─── Read-side worker tools ───────────────────────────────────────────────────

async fn worker_read(
    drafts: &DraftStore,
    worker: &Arc<dyn ToolWorker>,
    method: &str,
    call: &ToolCall,
    required_ext: Option<&str>,
) -> Result<ToolSuccess, ToolError> {
    let path = safe_rel(require_str(&call.args, "path")?)?;
    if let Some(ext) = required_ext {
        if extension(path) != ext {
            return Err(ToolError::msg(format!("path must be a .{ext} file: {path}")));
        }
    }
    if drafts
        .read_file(path)
        .map_err(|e| ToolError::msg(format!("reading {path}: {e}")))?
        .is_none()
    {
        return Err(ToolError::msg(format!("file not found: {path}")));
    }
    let abs = drafts.effective_path(path);
    let result = worker
        .call(method, json!({"path": abs.to_string_lossy()}))
        .await
        .map_err(|e| ToolError::msg(format!("{method} failed: {e}")))?;
    Ok(ToolSuccess::json(result))
}

macro_rules! worker_read_tool {
    ($ty:ident, $name:literal, $desc:literal, $method:literal, $ext:expr) => {
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
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Workbench-relative file path" }
                    },
                    "required": ["path"]
                })
            }
            fn phases(&self) -> &[Phase] {
                READ_PHASES
            }
            async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
                worker_read(&self.drafts, &self.worker, $method, call, $ext).await
            }
        }
    };
}

worker_read_tool!(
    GetFileMapTool,
    "get_file_map",
    "Returns the structural map of an office or tabular file: sheets and used \
     ranges for workbooks, sections for documents, slides for presentations.",
    "get_file_map",
    None
);

worker_read_tool!(
    XlsxGetStylesTool,
    "xlsx_get_styles",
    "Returns the named styles and formatting summary of a workbook.",
    "xlsx_get_styles",
    Some("xlsx")
);

worker_read_tool!(
    DocxGetStylesTool,
    "docx_get_styles",
    "Returns the paragraph and character styles defined in a document.",
    "docx_get_styles",
    Some("docx")
);

worker_read_tool!(
    PptxGetStylesTool,
    "pptx_get_styles",
    "Returns the slide layouts and theme styles of a presentation.",
    "pptx_get_styles",
    Some("pptx")
);

// ─── Create tools ─────────────────────────────────────────────────────────────

macro_rules! worker_create_tool {
    ($ty:ident, $name:literal, $desc:literal, $method:literal, $ext:literal, $noun:literal) => {
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
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File name for the new file" }
                    },
                    "required": ["path"]
                })
            }
            fn phases(&self) -> &[Phase] {
                WRITE_PHASES
            }
            fn is_write(&self) -> bool {
                true
            }
            async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
                let file = bare_name(require_str(&call.args, "path")?);
                if extension(&file) != $ext {
                    return Err(ToolError::msg(format!(
                        concat!("path must end in .", $ext, ": {}"),
                        file
                    )));
                }
                self.drafts
                    .ensure_draft()
                    .map_err(|e| ToolError::msg(format!("creating draft overlay: {e}")))?;
                let abs = self.drafts.draft_path(&file);
                let result = self
                    .worker
                    .call($method, json!({"path": abs.to_string_lossy()}))
                    .await
                    .map_err(|e| ToolError::msg(format!(concat!($method, " failed: {}"), e)))?;
                Ok(ToolSuccess::receipt(result, format!(concat!("Created ", $noun, " {}"), file)))
            }
        }
    };
}

worker_create_tool!(
    XlsxCreateTool,
    "xlsx_create",
    "Creates an empty workbook in the draft.",
    "xlsx_create",
    "xlsx",
    "workbook"
);

worker_create_tool!(
    DocxCreateTool,
    "docx_create",
    "Creates an empty document in the draft.",
    "docx_create",
    "docx",
    "document"
);

worker_create_tool!(
    PptxCreateTool,
    "pptx_create",
    "Creates an empty presentation in the draft.",
    "pptx_create",
    "pptx",
    "presentation"
);

// ─── Cell references ──────────────────────────────────────────────────────────

/// Parse an A1-style cell reference into `(row, col)`, both 1-based.
fn parse_cell_ref(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    let letters: String = s.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &s[letters.len()..];
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let col = letters
        .to_ascii_uppercase()
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, col))
}

// ─── xlsx_operations ──────────────────────────────────────────────────────────

const XLSX_OPS: &[&str] = &[
    "ensure_sheet",
    "set_range",
    "set_cells",
    "summarize_by_category",
    "set_column_widths",
    "set_row_heights",
    "freeze_panes",
];

/// Operations that touch the sheet but no particular cell.
const XLSX_SHEET_OPS: &[&str] = &[
    "ensure_sheet",
    "summarize_by_category",
    "set_column_widths",
    "set_row_heights",
    "freeze_panes",
];

fn column_is_valid(v: &Value) -> bool {
    match v {
        Value::String(s) => !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic()),
        Value::Number(n) => n.as_u64().is_some_and(|c| c >= 1),
        _ => false,
    }
}

fn validate_xlsx_ops(ops: &[Value]) -> Result<(), ToolError> {
    for op in ops {
        let name = op
            .get("op")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::msg("each operation requires an 'op' field"))?;
        if !XLSX_OPS.contains(&name) {
            return Err(ToolError::msg(format!("unknown xlsx operation: {name}")));
        }
        match name {
            "set_column_widths" => {
                let entries = op
                    .get("columns")
                    .and_then(|v| v.as_array())
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| {
                        ToolError::msg("set_column_widths requires a non-empty 'columns' array")
                    })?;
                for e in entries {
                    let col_ok = e.get("column").is_some_and(column_is_valid);
                    let width_ok = e.get("width").and_then(|v| v.as_f64()).is_some();
                    if !col_ok || !width_ok {
                        return Err(ToolError::msg(
                            "each set_column_widths entry requires 'column' (letter or 1-based \
                             integer) and numeric 'width'",
                        ));
                    }
                }
            }
            "set_row_heights" => {
                let entries = op
                    .get("rows")
                    .and_then(|v| v.as_array())
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| {
                        ToolError::msg("set_row_heights requires a non-empty 'rows' array")
                    })?;
                for e in entries {
                    let row_ok = e.get("row").and_then(|v| v.as_u64()).is_some_and(|r| r >= 1);
                    let height_ok = e.get("height").and_then(|v| v.as_f64()).is_some();
                    if !row_ok || !height_ok {
                        return Err(ToolError::msg(
                            "each set_row_heights entry requires 1-based 'row' and numeric 'height'",
                        ));
                    }
                }
            }
            "freeze_panes" => {
                let row = op.get("row").and_then(|v| v.as_i64());
                let col = op.get("column").and_then(|v| v.as_i64());
                if row.is_none() && col.is_none() {
                    return Err(ToolError::msg(
                        "freeze_panes requires at least one of 'row'/'column'",
                    ));
                }
                if row.is_some_and(|r| r < 0) || col.is_some_and(|c| c < 0) {
                    return Err(ToolError::msg("freeze_panes row/column must be >= 0"));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Focus hint for a workbook write: the top-left coordinate of the first
/// cell-touching operation, or sheet-only for sheet-level operations.
fn xlsx_focus(ops: &[Value]) -> Option<FocusHint> {
    for op in ops {
        let name = op.get("op").and_then(|v| v.as_str()).unwrap_or("");
        let sheet = op.get("sheet").and_then(|v| v.as_str());
        match name {
            "set_range" => {
                let sheet = sheet?;
                let range = op.get("range").and_then(|v| v.as_str())?;
                let top_left = range.split(':').next().unwrap_or(range);
                let (row, col) = parse_cell_ref(top_left)?;
                return Some(FocusHint::Sheet {
                    sheet: sheet.to_string(),
                    row_start: Some(row),
                    col_start: Some(col),
                });
            }
            "set_cells" => {
                let sheet = sheet?;
                let cells = op.get("cells").and_then(|v| v.as_array())?;
                let refs: Vec<(u32, u32)> = cells
                    .iter()
                    .filter_map(|c| c.get("cell").and_then(|v| v.as_str()))
                    .filter_map(parse_cell_ref)
                    .collect();
                let row = refs.iter().map(|(r, _)| *r).min()?;
                let col = refs.iter().map(|(_, c)| *c).min()?;
                return Some(FocusHint::Sheet {
                    sheet: sheet.to_string(),
                    row_start: Some(row),
                    col_start: Some(col),
                });
            }
            _ => {}
        }
    }
    // No cell-touching operation: fall back to the first sheet-level op.
    for op in ops {
        let name = op.get("op").and_then(|v| v.as_str()).unwrap_or("");
        if XLSX_SHEET_OPS.contains(&name) {
            if let Some(sheet) = op.get("sheet").and_then(|v| v.as_str()) {
                return Some(FocusHint::Sheet {
                    sheet: sheet.to_string(),
                    row_start: None,
                    col_start: None,
                });
            }
        }
    }
    None
}

pub struct XlsxOperationsTool {
    drafts: DraftStore,
    worker: Arc<dyn ToolWorker>,
}

impl XlsxOperationsTool {
    pub fn new(drafts: DraftStore, worker: Arc<dyn ToolWorker>) -> Self {
        Self { drafts, worker }
    }
}

#[async_trait]
impl Tool for XlsxOperationsTool {
    fn name(&self) -> &str {
        "xlsx_operations"
    }

    fn description(&self) -> &str {
        "Applies a batch of workbook operations to a draft xlsx file. Supported ops: \
         ensure_sheet, set_range, set_cells, summarize_by_category, set_column_widths, \
         set_row_heights, freeze_panes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Workbook file name" },
                "operations": {
                    "type": "array",
                    "description": "Ordered operation objects, each with an 'op' field",
                    "items": { "type": "object" }
                }
            },
            "required": ["path", "operations"]
        })
    }

    fn phases(&self) -> &[Phase] {
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let file = bare_name(require_str(&call.args, "path")?);
        if extension(&file) != "xlsx" {
            return Err(ToolError::msg(format!("path must end in .xlsx: {file}")));
        }
        let ops = call
            .args
            .get("operations")
            .and_then(|v| v.as_array())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ToolError::msg("a non-empty 'operations' array is required"))?;
        validate_xlsx_ops(ops)?;

        self.drafts
            .ensure_draft()
            .map_err(|e| ToolError::msg(format!("creating draft overlay: {e}")))?;
        let abs = self.drafts.draft_path(&file);
        let result = self
            .worker
            .call(
                "xlsx_operations",
                json!({"path": abs.to_string_lossy(), "operations": ops}),
            )
            .await
            .map_err(|e| ToolError::msg(format!("xlsx_operations failed: {e}")))?;

        let mut success = ToolSuccess::receipt(
            result,
            format!("Modified {file} with {} operations", ops.len()),
        );
        if let Some(hint) = xlsx_focus(ops) {
            success = success.with_focus(file, hint);
        }
        Ok(success)
    }
}

// ─── docx_operations ──────────────────────────────────────────────────────────

const DOCX_OPS: &[&str] = &["set_paragraphs", "append_paragraph", "replace_text"];

/// Validate and normalize document operations.  `find` is accepted as an
/// alias for `search` on replace_text and rewritten before the worker call.
fn normalize_docx_ops(ops: &[Value]) -> Result<Vec<Value>, ToolError> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        let name = op
            .get("op")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::msg("each operation requires an 'op' field"))?;
        if !DOCX_OPS.contains(&name) {
            return Err(ToolError::msg(format!("unknown docx operation: {name}")));
        }
        let mut op = op.clone();
        if name == "replace_text" {
            if let Some(obj) = op.as_object_mut() {
                if let Some(find) = obj.remove("find") {
                    obj.entry("search").or_insert(find);
                }
            }
            if op.get("search").and_then(|v| v.as_str()).is_none() {
                return Err(ToolError::msg("replace_text requires 'search' (alias: 'find')"));
            }
        }
        out.push(op);
    }
    Ok(out)
}

fn docx_focus(ops: &[Value]) -> FocusHint {
    let section_index = ops
        .iter()
        .filter_map(|op| op.get("section_index").and_then(|v| v.as_u64()))
        .min()
        .unwrap_or(0) as u32;
    FocusHint::Section { section_index }
}

pub struct DocxOperationsTool {
    drafts: DraftStore,
    worker: Arc<dyn ToolWorker>,
}

impl DocxOperationsTool {
    pub fn new(drafts: DraftStore, worker: Arc<dyn ToolWorker>) -> Self {
        Self { drafts, worker }
    }
}

#[async_trait]
impl Tool for DocxOperationsTool {
    fn name(&self) -> &str {
        "docx_operations"
    }

    fn description(&self) -> &str {
        "Applies a batch of document operations to a draft docx file. Supported ops: \
         set_paragraphs, append_paragraph, replace_text."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Document file name" },
                "operations": {
                    "type": "array",
                    "description": "Ordered operation objects, each with an 'op' field",
                    "items": { "type": "object" }
                }
            },
            "required": ["path", "operations"]
        })
    }

    fn phases(&self) -> &[Phase] {
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let file = bare_name(require_str(&call.args, "path")?);
        if extension(&file) != "docx" {
            return Err(ToolError::msg(format!("path must end in .docx: {file}")));
        }
        let ops = call
            .args
            .get("operations")
            .and_then(|v| v.as_array())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ToolError::msg("a non-empty 'operations' array is required"))?;
        let normalized = normalize_docx_ops(ops)?;

        self.drafts
            .ensure_draft()
            .map_err(|e| ToolError::msg(format!("creating draft overlay: {e}")))?;
        let abs = self.drafts.draft_path(&file);
        let result = self
            .worker
            .call(
                "docx_operations",
                json!({"path": abs.to_string_lossy(), "operations": normalized}),
            )
            .await
            .map_err(|e| ToolError::msg(format!("docx_operations failed: {e}")))?;

        let focus = docx_focus(ops);
        Ok(ToolSuccess::receipt(
            result,
            format!("Modified {file} with {} operations", ops.len()),
        )
        .with_focus(file, focus))
    }
}

// ─── pptx_operations ──────────────────────────────────────────────────────────

const PPTX_OPS: &[&str] = &["add_slide", "set_slide_text", "append_bullets"];

/// Validate and normalize presentation operations.  `slide_index` is
/// accepted as an alias for `index` and rewritten before the worker call.
fn normalize_pptx_ops(ops: &[Value]) -> Result<Vec<Value>, ToolError> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        let name = op
            .get("op")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::msg("each operation requires an 'op' field"))?;
        if !PPTX_OPS.contains(&name) {
            return Err(ToolError::msg(format!("unknown pptx operation: {name}")));
        }
        let mut op = op.clone();
        if let Some(obj) = op.as_object_mut() {
            if let Some(idx) = obj.remove("slide_index") {
                obj.entry("index").or_insert(idx);
            }
        }
        if matches!(name, "set_slide_text" | "append_bullets")
            && op.get("index").and_then(|v| v.as_u64()).is_none()
        {
            return Err(ToolError::msg(format!(
                "{name} requires 'index' (alias: 'slide_index')"
            )));
        }
        out.push(op);
    }
    Ok(out)
}

/// Smallest explicit slide index among the normalized operations, when any.
fn pptx_explicit_focus(ops: &[Value]) -> Option<FocusHint> {
    ops.iter()
        .filter_map(|op| op.get("index").and_then(|v| v.as_u64()))
        .min()
        .map(|i| FocusHint::Slide { slide_index: i as u32 })
}

pub struct PptxOperationsTool {
    drafts: DraftStore,
    worker: Arc<dyn ToolWorker>,
}

impl PptxOperationsTool {
    pub fn new(drafts: DraftStore, worker: Arc<dyn ToolWorker>) -> Self {
        Self { drafts, worker }
    }
}

#[async_trait]
impl Tool for PptxOperationsTool {
    fn name(&self) -> &str {
        "pptx_operations"
    }

    fn description(&self) -> &str {
        "Applies a batch of presentation operations to a draft pptx file. Supported \
         ops: add_slide, set_slide_text, append_bullets."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Presentation file name" },
                "operations": {
                    "type": "array",
                    "description": "Ordered operation objects, each with an 'op' field",
                    "items": { "type": "object" }
                }
            },
            "required": ["path", "operations"]
        })
    }

    fn phases(&self) -> &[Phase] {
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let file = bare_name(require_str(&call.args, "path")?);
        if extension(&file) != "pptx" {
            return Err(ToolError::msg(format!("path must end in .pptx: {file}")));
        }
        let ops = call
            .args
            .get("operations")
            .and_then(|v| v.as_array())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ToolError::msg("a non-empty 'operations' array is required"))?;
        let normalized = normalize_pptx_ops(ops)?;
        let explicit_focus = pptx_explicit_focus(&normalized);

        self.drafts
            .ensure_draft()
            .map_err(|e| ToolError::msg(format!("creating draft overlay: {e}")))?;
        let abs = self.drafts.draft_path(&file);
        let result = self
            .worker
            .call(
                "pptx_operations",
                json!({"path": abs.to_string_lossy(), "operations": normalized}),
            )
            .await
            .map_err(|e| ToolError::msg(format!("pptx_operations failed: {e}")))?;

        // An add_slide without an explicit index lands at the end of the
        // deck, so its position is only known after the apply: query the
        // slide count and point at the last slide.
        let focus = match explicit_focus {
            Some(hint) => Some(hint),
            None => match self
                .worker
                .call("pptx_slide_count", json!({"path": abs.to_string_lossy()}))
                .await
            {
                Ok(info) => info
                    .get("slide_count")
                    .and_then(|v| v.as_u64())
                    .filter(|c| *c > 0)
                    .map(|c| FocusHint::Slide { slide_index: (c - 1) as u32 }),
                Err(e) => {
                    warn!(file = %file, error = %e, "slide count query failed; no focus hint");
                    None
                }
            },
        };

        let mut success = ToolSuccess::receipt(
            result,
            format!("Modified {file} with {} operations", ops.len()),
        );
        if let Some(hint) = focus {
            success = success.with_focus(file, hint);
        }
        Ok(success)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
