// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod fs;
mod office;
mod recall;
mod table;

use std::sync::Arc;

use loft_store::{Clock, DraftStore, ToolLog, WorkbenchPaths};

use crate::registry::ToolRegistry;
use crate::tool::ToolError;
use crate::worker::ToolWorker;

pub use fs::{CopyFileTool, DeleteFileTool, GetFileInfoTool, ListFilesTool, ReadFileTool, WriteTextFileTool};
pub use office::{
    DocxCreateTool, DocxGetStylesTool, DocxOperationsTool, GetFileMapTool, PptxCreateTool,
    PptxGetStylesTool, PptxOperationsTool, XlsxCreateTool, XlsxGetStylesTool, XlsxOperationsTool,
};
pub use recall::RecallToolResultTool;
pub use table::{
    TableDescribeTool, TableExportTool, TableGetMapTool, TableQueryTool, TableReadRowsTool,
    TableStatsTool, TableUpdateFromExportTool,
};

/// Build the standard 24-tool catalog for one workbench.
pub fn standard_registry(
    paths: &WorkbenchPaths,
    worker: Arc<dyn ToolWorker>,
    clock: Arc<dyn Clock>,
) -> ToolRegistry {
    let drafts = DraftStore::new(paths);
    let log = ToolLog::new(paths);

    let mut reg = ToolRegistry::new(paths, clock);

    // Local filesystem tools.
    reg.register(ListFilesTool::new(drafts.clone()));
    reg.register(GetFileInfoTool::new(drafts.clone()));
    reg.register(ReadFileTool::new(drafts.clone()));
    reg.register(WriteTextFileTool::new(drafts.clone()));
    reg.register(DeleteFileTool::new(drafts.clone()));
    reg.register(CopyFileTool::new(drafts.clone()));

    // Office-file tools routed to the worker.
    reg.register(GetFileMapTool::new(drafts.clone(), worker.clone()));
    reg.register(XlsxGetStylesTool::new(drafts.clone(), worker.clone()));
    reg.register(DocxGetStylesTool::new(drafts.clone(), worker.clone()));
    reg.register(PptxGetStylesTool::new(drafts.clone(), worker.clone()));
    reg.register(XlsxCreateTool::new(drafts.clone(), worker.clone()));
    reg.register(DocxCreateTool::new(drafts.clone(), worker.clone()));
    reg.register(PptxCreateTool::new(drafts.clone(), worker.clone()));
    reg.register(XlsxOperationsTool::new(drafts.clone(), worker.clone()));
    reg.register(DocxOperationsTool::new(drafts.clone(), worker.clone()));
    reg.register(PptxOperationsTool::new(drafts.clone(), worker.clone()));

    // Tabular tools routed to the worker.
    reg.register(TableGetMapTool::new(drafts.clone(), worker.clone()));
    reg.register(TableDescribeTool::new(drafts.clone(), worker.clone()));
    reg.register(TableStatsTool::new(drafts.clone(), worker.clone()));
    reg.register(TableReadRowsTool::new(drafts.clone(), worker.clone()));
    reg.register(TableQueryTool::new(drafts.clone(), worker.clone()));
    reg.register(TableExportTool::new(drafts.clone(), worker.clone()));
    reg.register(TableUpdateFromExportTool::new(drafts, worker));

    // Receipt recall.
    reg.register(RecallToolResultTool::new(log));

    reg
}

// ─── Shared argument helpers ──────────────────────────────────────────────────

/// Required string argument.
pub(crate) fn require_str<'a>(
    args: &'a serde_json::Value,
    param: &str,
) -> Result<&'a str, ToolError> {
    args.get(param)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::missing(param, args))
}

/// Strip any directory prefix, leaving the bare filename.  The workbench
/// namespace is flat; office writes must never escape it.
pub(crate) fn bare_name(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// Reject absolute paths and parent traversal in user-supplied paths.
pub(crate) fn safe_rel(path: &str) -> Result<&str, ToolError> {
    if path.starts_with('/') || path.starts_with('\\') || path.contains("..") {
        return Err(ToolError::msg(format!("path must be workbench-relative: {path}")));
    }
    Ok(path)
}

/// Lowercased file extension, empty when absent.
pub(crate) fn extension(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "yaml", "yml", "toml", "html", "xml", "log",
];

pub(crate) fn is_text_extension(path: &str) -> bool {
    TEXT_EXTENSIONS.contains(&extension(path).as_str())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
