// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use loft_config::Phase;
use loft_store::DraftStore;

use super::{extension, is_text_extension, require_str, safe_rel};
use crate::tool::{Tool, ToolCall, ToolError, ToolSuccess, PLAN_PHASES, READ_PHASES, WRITE_PHASES};

// ─── list_files ───────────────────────────────────────────────────────────────

pub struct ListFilesTool {
    drafts: DraftStore,
}

impl ListFilesTool {
    pub fn new(drafts: DraftStore) -> Self {
        Self { drafts }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "Lists every file in the workbench with its size in bytes. \
         Reads reflect uncommitted draft changes when a draft exists."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn phases(&self) -> &[Phase] {
        READ_PHASES
    }

    async fn execute(&self, _call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let root = self.drafts.effective_root();
        let files = self
            .drafts
            .list_files()
            .map_err(|e| ToolError::msg(format!("listing files: {e}")))?;
        let entries: Vec<Value> = files
            .iter()
            .map(|path| {
                let size = std::fs::metadata(root.join(path)).map(|m| m.len()).unwrap_or(0);
                json!({"path": path, "size": size})
            })
            .collect();
        Ok(ToolSuccess::json(json!({ "files": entries })))
    }
}

// ─── get_file_info ────────────────────────────────────────────────────────────

pub struct GetFileInfoTool {
    drafts: DraftStore,
}

impl GetFileInfoTool {
    pub fn new(drafts: DraftStore) -> Self {
        Self { drafts }
    }
}

fn classify_kind(path: &str) -> &'static str {
    match extension(path).as_str() {
        "xlsx" => "xlsx",
        "docx" => "docx",
        "pptx" => "pptx",
        "pdf" => "pdf",
        _ if is_text_extension(path) => "text",
        _ => "binary",
    }
}

#[async_trait]
impl Tool for GetFileInfoTool {
    fn name(&self) -> &str {
        "get_file_info"
    }

    fn description(&self) -> &str {
        "Returns size and format classification (text, xlsx, docx, pptx, pdf, binary) \
         for a single workbench file."
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
        let path = safe_rel(require_str(&call.args, "path")?)?;
        let bytes = self
            .drafts
            .read_file(path)
            .map_err(|e| ToolError::msg(format!("reading {path}: {e}")))?
            .ok_or_else(|| ToolError::msg(format!("file not found: {path}")))?;
        Ok(ToolSuccess::json(json!({
            "path": path,
            "size": bytes.len(),
            "kind": classify_kind(path),
        })))
    }
}

// ─── read_file ────────────────────────────────────────────────────────────────

pub struct ReadFileTool {
    drafts: DraftStore,
}

impl ReadFileTool {
    pub fn new(drafts: DraftStore) -> Self {
        Self { drafts }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a UTF-8 text file from the workbench. Optional start_line/end_line \
         (1-based, inclusive) select a line range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Workbench-relative file path" },
                "start_line": { "type": "integer", "description": "First line to include (1-based)" },
                "end_line": { "type": "integer", "description": "Last line to include (inclusive)" }
            },
            "required": ["path"]
        })
    }

    fn phases(&self) -> &[Phase] {
        PLAN_PHASES
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let path = safe_rel(require_str(&call.args, "path")?)?;
        let bytes = self
            .drafts
            .read_file(path)
            .map_err(|e| ToolError::msg(format!("reading {path}: {e}")))?
            .ok_or_else(|| ToolError::msg(format!("file not found: {path}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ToolError::msg(format!("file is not valid UTF-8 text: {path}")))?;

        let start = call.args.get("start_line").and_then(|v| v.as_u64()).unwrap_or(1).max(1);
        let end = call.args.get("end_line").and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
        if end < start {
            return Err(ToolError::msg("end_line must not precede start_line"));
        }

        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let slice: Vec<&str> = lines
            .into_iter()
            .skip(start as usize - 1)
            .take((end - start + 1) as usize)
            .collect();
        Ok(ToolSuccess::json(json!({
            "path": path,
            "total_lines": total,
            "content": slice.join("\n"),
        })))
    }
}

// ─── write_text_file ──────────────────────────────────────────────────────────

pub struct WriteTextFileTool {
    drafts: DraftStore,
}

impl WriteTextFileTool {
    pub fn new(drafts: DraftStore) -> Self {
        Self { drafts }
    }
}

#[async_trait]
impl Tool for WriteTextFileTool {
    fn name(&self) -> &str {
        "write_text_file"
    }

    fn description(&self) -> &str {
        "Writes a UTF-8 text file into the draft. Overwrites an existing file at the \
         same path. Only text extensions (txt, md, csv, json, ...) are accepted; use \
         the format-specific operation tools for office files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Workbench-relative file path" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"]
        })
    }

    fn phases(&self) -> &[Phase] {
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let path = safe_rel(require_str(&call.args, "path")?)?;
        let content = call
            .args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::missing("content", &call.args))?;
        if !is_text_extension(path) {
            return Err(ToolError::msg(format!(
                "write_text_file only accepts text extensions; got: {path}"
            )));
        }

        debug!(path, bytes = content.len(), "write_text_file");
        self.drafts
            .write_file(path, content.as_bytes())
            .map_err(|e| ToolError::msg(format!("writing {path}: {e}")))?;
        Ok(ToolSuccess::receipt(
            json!({"path": path, "bytes_written": content.len()}),
            format!("Wrote {path} ({} bytes)", content.len()),
        ))
    }
}

// ─── delete_file ──────────────────────────────────────────────────────────────

pub struct DeleteFileTool {
    drafts: DraftStore,
}

impl DeleteFileTool {
    pub fn new(drafts: DraftStore) -> Self {
        Self { drafts }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Deletes a file from the draft. The published copy is untouched until the \
         draft is published."
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
        WRITE_PHASES
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolSuccess, ToolError> {
        let path = safe_rel(require_str(&call.args, "path")?)?;
        let removed = self
            .drafts
            .delete_file(path)
            .map_err(|e| ToolError::msg(format!("deleting {path}: {e}")))?;
        if !removed {
            return Err(ToolError::msg(format!("file not found: {path}")));
        }
        Ok(ToolSuccess::receipt(json!({"path": path, "deleted": true}), format!("Deleted {path}")))
    }
}

// ─── copy_file ────────────────────────────────────────────────────────────────

pub struct CopyFileTool {
    drafts: DraftStore,
}

impl CopyFileTool {
    pub fn new(drafts: DraftStore) -> Self {
        Self { drafts }
    }
}

#[async_trait]
impl Tool for CopyFileTool {
    fn name(&self) -> &str {
        "copy_file"
    }

    fn description(&self) -> &str {
        "Copies a draft file to a new name within the workbench."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_path": { "type": "string", "description": "Existing file to copy" },
                "target_path": { "type": "string", "description": "Destination path" }
            },
            "required": ["source_path", "target_path"]
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
        let target = safe_rel(require_str(&call.args, "target_path")?)?;
        self.drafts
            .copy_file(source, target)
            .map_err(|e| ToolError::msg(format!("copying {source} to {target}: {e}")))?;
        Ok(ToolSuccess::receipt(
            json!({"source_path": source, "target_path": target}),
            format!("Copied {source} to {target}"),
        ))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
