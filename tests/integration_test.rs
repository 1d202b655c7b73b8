// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Cross-crate smoke test: drive a full run through the public engine API
//! with the scripted transport and canned worker, then publish the draft.

use std::sync::Arc;

use serde_json::json;

use loft_config::Config;
use loft_engine::Engine;
use loft_model::{
    mock::{ScriptedClient, ScriptedStep},
    LLMClient,
};
use loft_store::{ChangeKind, WorkbenchPaths};
use loft_tools::FakeToolWorker;

#[tokio::test]
async fn full_run_then_publish() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.workspace.data_root = Some(dir.path().to_path_buf());

    let paths = WorkbenchPaths::new(dir.path(), "wb");
    paths.ensure_layout().unwrap();
    std::fs::write(paths.published().join("seed.txt"), "seed").unwrap();

    let client: Arc<dyn LLMClient> = Arc::new(ScriptedClient::new(vec![
        ScriptedStep::text("Workbench holds seed.txt."),
        ScriptedStep::text(
            "# Execution Plan\n\n## Items\n\
             - [ ] 1. Write greeting \u{2014} Create hello.txt\n",
        ),
        ScriptedStep::tool_call(
            "c1",
            "write_text_file",
            json!({"path": "hello.txt", "content": "hello"}),
        ),
        ScriptedStep::text("Item complete."),
        ScriptedStep::Stream(vec!["Created hello.txt.".into()]),
    ]));
    let engine = Engine::new(config, client, Arc::new(FakeToolWorker));

    let message_id = engine.send_user_message("wb", "Please add a greeting file.").unwrap();
    let (tx, _rx) = tokio::sync::mpsc::channel(256);
    let outcome = engine.run_agent("wb", &message_id, tx).await.unwrap();
    assert!(outcome.has_draft);

    // The change set shows the added file.
    let changes = engine.review_change_set("wb").unwrap();
    assert!(changes
        .iter()
        .any(|c| c.change.path == "hello.txt" && c.change.kind == ChangeKind::Added));

    // Publishing lands it in the published tree and drops the draft.
    engine.draft_publish("wb").unwrap();
    assert_eq!(
        std::fs::read_to_string(paths.published().join("hello.txt")).unwrap(),
        "hello"
    );
    assert!(!paths.draft().exists());
    assert!(engine.review_change_set("wb").unwrap().is_empty());
}
