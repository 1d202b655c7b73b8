// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

/// The opaque RPC boundary to the file-format worker that owns xlsx, docx,
/// pptx, pdf and tabular manipulation.  The engine never interprets the
/// result beyond persisting it and deriving a receipt.
#[async_trait]
pub trait ToolWorker: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value>;
}

/// Canned-JSON worker used by tests and local development
/// (`LOFT_FAKE_WORKER=1`).  Responses are synchronous and deterministic.
#[derive(Debug, Default)]
pub struct FakeToolWorker;

#[async_trait]
impl ToolWorker for FakeToolWorker {
    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let path = params.get("path").and_then(|v| v.as_str()).unwrap_or("");
        Ok(match method {
            "xlsx_operations" | "docx_operations" | "pptx_operations" => {
                let n = params
                    .get("operations")
                    .and_then(|v| v.as_array())
                    .map(|a| a.len())
                    .unwrap_or(0);
                json!({"ok": true, "path": path, "operations_applied": n})
            }
            "pptx_slide_count" => json!({"slide_count": 1}),
            "get_file_map" => json!({
                "path": path,
                "kind": "map",
                "entries": [{"name": "Sheet1", "rows": 4, "columns": 2}]
            }),
            "xlsx_get_styles" | "docx_get_styles" | "pptx_get_styles" => {
                json!({"path": path, "styles": ["Normal", "Heading 1"]})
            }
            "table_get_map" => json!({"path": path, "sheets": ["Sheet1"]}),
            "table_describe" => json!({
                "path": path,
                "columns": [{"name": "category", "type": "text"}, {"name": "value", "type": "number"}]
            }),
            "table_stats" => json!({"path": path, "row_count": 4, "column_count": 2}),
            "table_read_rows" => json!({
                "path": path,
                "rows": [["a", 1], ["b", 2]]
            }),
            "table_query" => json!({"path": path, "rows": [["a", 1]], "truncated": false}),
            "table_export" | "table_update_from_export" => json!({"ok": true}),
            "xlsx_create" | "docx_create" | "pptx_create" => json!({"ok": true, "path": path}),
            other => json!({"ok": true, "method": other}),
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
