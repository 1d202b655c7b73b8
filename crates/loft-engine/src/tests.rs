// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! End-to-end run scenarios over the scripted transport and the canned
//! tool worker.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use loft_config::{Config, Phase};
use loft_model::{
    mock::{ScriptedClient, ScriptedStep},
    LLMClient, ProviderError, ReasoningEffort,
};
use loft_store::{ArtifactStore, ToolLog, WorkbenchPaths};
use loft_tools::FakeToolWorker;

use crate::engine::Engine;
use crate::error::ErrorCode;
use crate::events::Notification;
use crate::retry::RecordingSleeper;

const WB: &str = "wb-test";

struct Harness {
    _dir: tempfile::TempDir,
    engine: Arc<Engine>,
    client: Arc<ScriptedClient>,
    sleeper: Arc<RecordingSleeper>,
    paths: WorkbenchPaths,
}

fn harness(steps: Vec<ScriptedStep>) -> Harness {
    harness_with_config(steps, Config::default())
}

fn harness_with_config(steps: Vec<ScriptedStep>, mut config: Config) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    config.workspace.data_root = Some(dir.path().to_path_buf());

    let client = Arc::new(ScriptedClient::new(steps));
    let sleeper = Arc::new(RecordingSleeper::new());
    let dyn_client: Arc<dyn LLMClient> = client.clone();
    let engine = Arc::new(
        Engine::new(config, dyn_client, Arc::new(FakeToolWorker)).with_sleeper(sleeper.clone()),
    );

    let paths = WorkbenchPaths::new(dir.path(), WB);
    paths.ensure_layout().unwrap();
    std::fs::write(paths.published().join("seed.txt"), "seed data").unwrap();

    Harness { _dir: dir, engine, client, sleeper, paths }
}

fn plan_reply(items: &[&str]) -> ScriptedStep {
    ScriptedStep::text(format!("# Execution Plan\n\n## Items\n{}\n", items.join("\n")))
}

const ITEM_ONE: &str = "- [ ] 1. Write one \u{2014} Create one.txt with content";
const ITEM_TWO: &str = "- [ ] 2. Write two \u{2014} Create two.txt with content";

async fn run(h: &Harness) -> (Result<crate::RunOutcome, crate::EngineError>, Vec<Notification>) {
    let message_id = h.engine.send_user_message(WB, "Please process files.").unwrap();
    let (tx, mut rx) = mpsc::channel(1024);
    let outcome = h.engine.run_agent(WB, &message_id, tx).await;
    let mut notifications = Vec::new();
    while let Ok(n) = rx.try_recv() {
        notifications.push(n);
    }
    (outcome, notifications)
}

fn count_phase(notifications: &[Notification], phase: Phase, started: bool) -> usize {
    notifications
        .iter()
        .filter(|n| match n {
            Notification::PhaseStarted { phase: p } => started && *p == phase,
            Notification::PhaseCompleted { phase: p } => !started && *p == phase,
            _ => false,
        })
        .count()
}

// ─── S1: full cycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn full_cycle_marks_plan_and_streams_summary() {
    let h = harness(vec![
        ScriptedStep::text("The workbench contains seed.txt with seed data."),
        plan_reply(&[ITEM_ONE, ITEM_TWO]),
        ScriptedStep::tool_call("t1", "write_text_file", json!({"path": "one.txt", "content": "one"})),
        ScriptedStep::text("Item complete."),
        ScriptedStep::tool_call("t2", "write_text_file", json!({"path": "two.txt", "content": "two"})),
        ScriptedStep::text("Item complete."),
        ScriptedStep::Stream(vec!["Final summary.".into()]),
    ]);

    let (outcome, notifications) = run(&h).await;
    let outcome = outcome.expect("run must succeed");
    assert!(outcome.has_draft);

    // Plan file: inflation-guard header plus both items done.
    let plan = ArtifactStore::new(&h.paths).read("plan.md").unwrap().unwrap();
    assert!(plan.starts_with("<!-- original_count: 2 -->"));
    assert!(plan.contains("- [x] 1. Write one \u{2014} Create one.txt with content"));
    assert!(plan.contains("- [x] 2. Write two \u{2014} Create two.txt with content"));

    // Draft holds the written files.
    assert_eq!(std::fs::read_to_string(h.paths.draft().join("one.txt")).unwrap(), "one");
    assert_eq!(std::fs::read_to_string(h.paths.draft().join("two.txt")).unwrap(), "two");

    // Conversation: exactly user + assistant summary, with elapsed metadata.
    let conversation =
        loft_store::ConversationStore::new(&h.paths, Arc::new(loft_store::SystemClock));
    let entries = conversation.read_all().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "Please process files.");
    assert_eq!(entries[1].text, "Final summary.");
    assert!(entries[1].metadata.as_ref().unwrap().get("job_elapsed_ms").is_some());

    // Notifications: one started/completed per phase, two progress ticks,
    // exactly one stream delta (summary only).
    for phase in [Phase::Research, Phase::Plan, Phase::Implement, Phase::Summary] {
        assert_eq!(count_phase(&notifications, phase, true), 1, "{phase} started");
        assert_eq!(count_phase(&notifications, phase, false), 1, "{phase} completed");
    }
    let progress: Vec<_> = notifications
        .iter()
        .filter(|n| matches!(n, Notification::ImplementProgress { .. }))
        .collect();
    assert_eq!(progress.len(), 2);
    let deltas: Vec<_> = notifications
        .iter()
        .filter_map(|n| match n {
            Notification::AssistantStreamDelta { text } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec!["Final summary.".to_string()]);
}

#[tokio::test]
async fn receipts_can_be_recalled_from_the_log() {
    let h = harness(vec![
        ScriptedStep::text("research"),
        plan_reply(&[ITEM_ONE]),
        ScriptedStep::tool_call("t1", "write_text_file", json!({"path": "one.txt", "content": "one"})),
        ScriptedStep::text("Item complete."),
        ScriptedStep::Stream(vec!["Done.".into()]),
    ]);
    let (outcome, _) = run(&h).await;
    outcome.unwrap();

    let log = ToolLog::new(&h.paths);
    let entry = log.read_entry(1).expect("write was logged under id 1");
    assert_eq!(entry.tool, "write_text_file");
    // Lossless raw arguments and the full result JSON survive for recall.
    assert_eq!(entry.arguments, json!({"path": "one.txt", "content": "one"}));
    assert_eq!(entry.result.unwrap(), json!({"path": "one.txt", "bytes_written": 3}));
}

// ─── S2: research fails ──────────────────────────────────────────────────────

#[tokio::test]
async fn research_failure_attributes_subphase_and_writes_nothing() {
    let h = harness(vec![ScriptedStep::Fail(ProviderError::Unavailable("503".into()))]);
    let (outcome, _) = run(&h).await;
    let err = outcome.unwrap_err();
    assert_eq!(err.code, ErrorCode::ProviderUnavailable);
    assert_eq!(err.subphase, Some(Phase::Research));

    let artifacts = ArtifactStore::new(&h.paths);
    assert!(!artifacts.exists("research.md"));
    let conversation =
        loft_store::ConversationStore::new(&h.paths, Arc::new(loft_store::SystemClock));
    assert_eq!(conversation.read_all().unwrap().len(), 1, "only the user message");
}

// ─── S3: implement retry succeeds ────────────────────────────────────────────

#[tokio::test]
async fn implement_retry_once_succeeds() {
    let h = harness(vec![
        ScriptedStep::text("research"),
        plan_reply(&[ITEM_ONE]),
        ScriptedStep::Fail(ProviderError::Unavailable("503".into())),
        ScriptedStep::text("Item complete on retry."),
        ScriptedStep::Stream(vec!["Done.".into()]),
    ]);
    let (outcome, _) = run(&h).await;
    outcome.unwrap();

    let plan = ArtifactStore::new(&h.paths).read("plan.md").unwrap().unwrap();
    assert!(plan.contains("- [x] 1."));
    assert!(!plan.contains("- [!]"));
}

// ─── S4: retry fails, run continues ──────────────────────────────────────────

#[tokio::test]
async fn failed_item_is_marked_and_later_items_continue() {
    let h = harness(vec![
        ScriptedStep::text("research"),
        plan_reply(&[ITEM_ONE, ITEM_TWO]),
        ScriptedStep::Fail(ProviderError::Unavailable("first".into())),
        ScriptedStep::Fail(ProviderError::Unavailable("second".into())),
        ScriptedStep::text("Item two complete."),
        ScriptedStep::Stream(vec!["Done.".into()]),
    ]);
    let (outcome, _) = run(&h).await;
    outcome.unwrap();

    let plan = ArtifactStore::new(&h.paths).read("plan.md").unwrap().unwrap();
    assert!(
        plan.contains("- [!] 1. Write one \u{2014} Create one.txt with content [Failed: "),
        "item A must be failed with a reason: {plan}"
    );
    assert!(plan.contains("- [x] 2. Write two"));
}

// ─── S5: rate-limit exhaustion hard-stops ────────────────────────────────────

#[tokio::test]
async fn rate_limit_exhaustion_sleeps_schedule_then_stops() {
    let mut steps = vec![ScriptedStep::text("research"), plan_reply(&[ITEM_ONE, ITEM_TWO])];
    for _ in 0..6 {
        steps.push(ScriptedStep::Fail(ProviderError::RateLimited("429".into())));
    }
    let h = harness(steps);
    let (outcome, _) = run(&h).await;

    let err = outcome.unwrap_err();
    assert_eq!(err.code, ErrorCode::ProviderUnavailable);
    assert_eq!(err.subphase, Some(Phase::Implement));

    let secs: Vec<u64> = h.sleeper.recorded().iter().map(|d| d.as_secs()).collect();
    assert_eq!(secs, vec![10, 20, 40, 80, 160]);

    // Both items untouched; no summary message persisted.
    let plan = ArtifactStore::new(&h.paths).read("plan.md").unwrap().unwrap();
    assert!(plan.contains("- [ ] 1."));
    assert!(plan.contains("- [ ] 2."));
    let conversation =
        loft_store::ConversationStore::new(&h.paths, Arc::new(loft_store::SystemClock));
    assert_eq!(conversation.read_all().unwrap().len(), 1);
}

// ─── S6: cancel mid-run ──────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_interrupts_a_blocked_model_call() {
    let h = harness(vec![ScriptedStep::Hang]);
    let message_id = h.engine.send_user_message(WB, "Please process files.").unwrap();
    let (tx, _rx) = mpsc::channel(64);

    let engine = h.engine.clone();
    let mid = message_id.clone();
    let join = tokio::spawn(async move { engine.run_agent(WB, &mid, tx).await });

    // Give the run time to reach the hanging model call, then cancel.
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(h.engine.cancel_run(WB), "cancel_requested must be true for an active run");

    let result = tokio::time::timeout(std::time::Duration::from_secs(2), join)
        .await
        .expect("run must terminate promptly after cancel")
        .unwrap();
    let err = result.unwrap_err();
    assert_eq!(err.code, ErrorCode::UserCanceled);
    assert_eq!(err.subphase, Some(Phase::Research));

    // The run slot is free again.
    assert!(!h.engine.cancel_run(WB));
}

// ─── S7: new user message clears phase state ─────────────────────────────────

#[tokio::test]
async fn new_user_message_clears_rpi_state() {
    let h = harness(vec![
        ScriptedStep::text("research"),
        plan_reply(&[ITEM_ONE]),
        ScriptedStep::tool_call("t1", "write_text_file", json!({"path": "one.txt", "content": "one"})),
        ScriptedStep::text("Item complete."),
        ScriptedStep::Stream(vec!["Done.".into()]),
    ]);
    let (outcome, _) = run(&h).await;
    outcome.unwrap();

    let state = h.engine.state(WB);
    assert!(state.has_research && state.has_plan);

    h.engine.send_user_message(WB, "Second request.").unwrap();
    assert!(!h.paths.rpi_dir().exists(), "_rpi directory must be removed");
    let state = h.engine.state(WB);
    assert!(!state.has_research && !state.has_plan);
    // The draft from the previous run survives until published/discarded.
    assert!(state.has_draft);
}

// ─── S8: reasoning-effort plumbing ───────────────────────────────────────────

#[tokio::test]
async fn per_phase_reasoning_efforts_ride_the_requests() {
    let mut config = Config::default();
    config.engine.reasoning_effort.research = Some("none".into());
    config.engine.reasoning_effort.plan = Some("low".into());
    config.engine.reasoning_effort.implement = Some("high".into());

    let h = harness_with_config(
        vec![
            ScriptedStep::text("research"),
            plan_reply(&[ITEM_ONE]),
            ScriptedStep::text("Item complete."),
            ScriptedStep::Stream(vec!["Done.".into()]),
        ],
        config,
    );
    let (outcome, _) = run(&h).await;
    outcome.unwrap();

    let requests = h.client.requests.lock().unwrap();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].reasoning_effort, Some(ReasoningEffort::None));
    assert_eq!(requests[1].reasoning_effort, Some(ReasoningEffort::Low));
    assert_eq!(requests[2].reasoning_effort, Some(ReasoningEffort::High));
    assert_eq!(requests[3].reasoning_effort, None, "summary carries no override");
}

// ─── Degenerate plan ─────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_item_plan_skips_implement_and_reports_no_draft() {
    let h = harness(vec![
        ScriptedStep::text("research"),
        ScriptedStep::text("# Execution Plan\n\n## Items\n(nothing to do)\n"),
        ScriptedStep::Stream(vec!["Nothing to do.".into()]),
    ]);
    let (outcome, notifications) = run(&h).await;
    let outcome = outcome.unwrap();
    assert!(!outcome.has_draft);
    assert_eq!(count_phase(&notifications, Phase::Implement, true), 0);
    assert_eq!(count_phase(&notifications, Phase::Summary, false), 1);
}

#[tokio::test]
async fn malformed_plan_reply_is_a_validation_failure() {
    let h = harness(vec![
        ScriptedStep::text("research"),
        ScriptedStep::text("I think we should write some files."),
    ]);
    let (outcome, _) = run(&h).await;
    let err = outcome.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(err.subphase, Some(Phase::Plan));
}

// ─── Run lock & lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn second_run_on_same_workbench_is_rejected() {
    let h = harness(vec![ScriptedStep::Hang]);
    let message_id = h.engine.send_user_message(WB, "go").unwrap();
    let (tx, _rx) = mpsc::channel(64);

    let engine = h.engine.clone();
    let mid = message_id.clone();
    let join = tokio::spawn(async move { engine.run_agent(WB, &mid, tx).await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let (tx2, _rx2) = mpsc::channel(64);
    let err = h.engine.run_agent(WB, &message_id, tx2).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::AlreadyRunning);

    h.engine.cancel_run(WB);
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), join).await;
}

#[tokio::test]
async fn model_discovered_items_append_under_the_guard() {
    // The model proposes one extra item after finishing item 1, but
    // original_count is 1 so the guard drops it.
    let h = harness(vec![
        ScriptedStep::text("research"),
        plan_reply(&[ITEM_ONE]),
        ScriptedStep::text(
            "Item complete.\n- [ ] 2. Extra \u{2014} Proposed beyond the original count\n",
        ),
        ScriptedStep::Stream(vec!["Done.".into()]),
    ]);
    let (outcome, _) = run(&h).await;
    outcome.unwrap();

    let plan = ArtifactStore::new(&h.paths).read("plan.md").unwrap().unwrap();
    assert!(plan.contains("- [x] 1."));
    assert!(!plan.contains("Extra"), "inflation guard must drop the proposed item");
}

#[tokio::test]
async fn unknown_message_id_is_rejected() {
    let h = harness(vec![]);
    h.engine.send_user_message(WB, "hello").unwrap();
    let (tx, _rx) = mpsc::channel(16);
    let err = h.engine.run_agent(WB, "no-such-id", tx).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
}
