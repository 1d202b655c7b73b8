// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info};

use loft_config::Config;
use loft_model::{ChatMessage, LLMClient};
use loft_store::{
    artifact::{PLAN_FILE, RESEARCH_FILE},
    ArtifactStore, CheckpointMeta, CheckpointReason, CheckpointStore, Clock, ConversationMessage,
    ConversationRole, ConversationStore, DraftStore, FocusHint, FocusStore, PathChange,
    SystemClock, ToolLog, WorkbenchPaths,
};
use loft_tools::{builtin::standard_registry, ToolRegistry, ToolWorker};

use crate::cancel::CancelToken;
use crate::context::build_chat_messages;
use crate::error::{EngineError, ErrorCode};
use crate::events::Notifier;
use crate::phases::{self, EffortMap, RunCtx};
use crate::retry::{Sleeper, TokioSleeper};

/// External consent check: has the user granted this workbench the use of
/// the selected provider + model?  Credential handling itself lives outside
/// the engine.
pub trait ConsentGate: Send + Sync {
    fn is_granted(&self, workbench_id: &str, provider_id: &str, model_name: &str) -> bool;
}

/// Default gate for local/dev operation: everything is consented.
pub struct AllowAll;

impl ConsentGate for AllowAll {
    fn is_granted(&self, _workbench_id: &str, _provider_id: &str, _model_name: &str) -> bool {
        true
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub message_id: String,
    /// Whether any draft write occurred during this run.
    pub has_draft: bool,
}

/// Snapshot state report for a workbench.
#[derive(Debug, Clone, Serialize)]
pub struct WorkbenchState {
    pub has_research: bool,
    pub has_plan: bool,
    pub has_draft: bool,
    pub run_active: bool,
}

/// One per-path entry of the review change set, with the focus hint from
/// the last office write that touched the path.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewChange {
    #[serde(flatten)]
    pub change: PathChange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_hint: Option<FocusHint>,
}

/// The workbench engine: owns the run registry (one lock + cancel token per
/// workbench) and exposes the operations the RPC surface calls.  Stores are
/// constructed as per-call views; nothing is shared across workbenches.
pub struct Engine {
    config: Config,
    data_root: PathBuf,
    client: Arc<dyn LLMClient>,
    worker: Arc<dyn ToolWorker>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    consent: Arc<dyn ConsentGate>,
    runs: Mutex<HashMap<String, CancelToken>>,
}

impl Engine {
    pub fn new(config: Config, client: Arc<dyn LLMClient>, worker: Arc<dyn ToolWorker>) -> Self {
        let data_root = config.workspace.resolved_data_root();
        Self {
            config,
            data_root,
            client,
            worker,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            consent: Arc::new(AllowAll),
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_consent(mut self, consent: Arc<dyn ConsentGate>) -> Self {
        self.consent = consent;
        self
    }

    fn paths(&self, workbench_id: &str) -> WorkbenchPaths {
        WorkbenchPaths::new(&self.data_root, workbench_id)
    }

    fn run_active(&self, workbench_id: &str) -> bool {
        self.runs.lock().unwrap().contains_key(workbench_id)
    }

    fn ensure_unlocked(&self, workbench_id: &str) -> Result<(), EngineError> {
        if self.run_active(workbench_id) {
            return Err(EngineError::new(
                ErrorCode::AlreadyRunning,
                format!("a run is active on workbench {workbench_id}"),
            ));
        }
        Ok(())
    }

    // ── Messages ─────────────────────────────────────────────────────────────

    /// Record a user message.  Clears the phase artifacts of the previous
    /// run so the next run starts fresh; previous drafts and checkpoints
    /// are untouched.
    pub fn send_user_message(
        &self,
        workbench_id: &str,
        text: &str,
    ) -> Result<String, EngineError> {
        self.ensure_unlocked(workbench_id)?;
        let paths = self.paths(workbench_id);
        paths.ensure_layout().map_err(|e| {
            EngineError::new(ErrorCode::FileWriteFailed, e.to_string())
        })?;

        ArtifactStore::new(&paths)
            .remove_all()
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;

        let conversation = ConversationStore::new(&paths, self.clock.clone());
        let message_id = conversation
            .append_message(ConversationRole::User, text)
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;
        debug!(workbench_id, %message_id, "recorded user message; phase artifacts cleared");
        Ok(message_id)
    }

    /// Model-visible message list for ad-hoc chat (system preamble + capped
    /// conversation tail).  Phased runs do not use this.
    pub fn chat_messages(&self, workbench_id: &str) -> Result<Vec<ChatMessage>, EngineError> {
        let paths = self.paths(workbench_id);
        let drafts = DraftStore::new(&paths);
        let conversation = ConversationStore::new(&paths, self.clock.clone());
        build_chat_messages(&drafts, &conversation, &self.config.engine)
            .map_err(|e| EngineError::new(ErrorCode::FileReadFailed, e.to_string()))
    }

    // ── Runs ─────────────────────────────────────────────────────────────────

    /// Execute Research → Plan → Implement → Summary for a previously
    /// recorded user message.  At most one run per workbench.
    pub async fn run_agent(
        &self,
        workbench_id: &str,
        message_id: &str,
        notifier: Notifier,
    ) -> Result<RunOutcome, EngineError> {
        let cancel = {
            let mut runs = self.runs.lock().unwrap();
            if runs.contains_key(workbench_id) {
                return Err(EngineError::new(
                    ErrorCode::AlreadyRunning,
                    format!("a run is already active on workbench {workbench_id}"),
                ));
            }
            let cancel = CancelToken::new();
            runs.insert(workbench_id.to_string(), cancel.clone());
            cancel
        };
        let _guard = RunGuard { engine: self, workbench_id: workbench_id.to_string() };

        self.run_agent_locked(workbench_id, message_id, &cancel, &notifier).await
    }

    async fn run_agent_locked(
        &self,
        workbench_id: &str,
        message_id: &str,
        cancel: &CancelToken,
        notifier: &Notifier,
    ) -> Result<RunOutcome, EngineError> {
        let provider_id = self.client.provider_id();
        if !self.consent.is_granted(workbench_id, provider_id, self.client.model_name()) {
            return Err(EngineError::new(
                ErrorCode::ProviderNotConfigured,
                format!("no consent for provider {provider_id}"),
            )
            .with_provider(provider_id));
        }

        let paths = self.paths(workbench_id);
        paths
            .ensure_layout()
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;

        let conversation = ConversationStore::new(&paths, self.clock.clone());
        let user_message = conversation
            .read_all()
            .map_err(|e| EngineError::new(ErrorCode::FileReadFailed, e.to_string()))?
            .into_iter()
            .rev()
            .find(|m| m.message_id == message_id && m.role == ConversationRole::User)
            .map(|m| m.text)
            .ok_or_else(|| {
                EngineError::new(
                    ErrorCode::ValidationFailed,
                    format!("no user message with id {message_id}"),
                )
            })?;

        let artifacts = ArtifactStore::new(&paths);
        let drafts = DraftStore::new(&paths);
        let log = ToolLog::new(&paths);
        let registry = standard_registry(&paths, self.worker.clone(), self.clock.clone());
        let seq_before = log.current_seq();
        let run_started = self.clock.now();

        let ctx = RunCtx {
            client: self.client.as_ref(),
            registry: &registry,
            artifacts: &artifacts,
            drafts: &drafts,
            conversation: &conversation,
            clock: self.clock.as_ref(),
            sleeper: self.sleeper.as_ref(),
            cancel,
            notifier,
            effort: EffortMap::from_profile(&self.config.engine.reasoning_effort),
            user_message: &user_message,
            max_context_lines_per_file: self.config.engine.max_context_lines_per_file,
            run_started,
        };

        info!(workbench_id, message_id, "run started");
        phases::research::run(&ctx).await?;
        let mut plan = phases::plan::run(&ctx).await?;
        if !plan.all_done() {
            phases::implement::run(&ctx, &mut plan).await?;
        }
        phases::summary::run(&ctx, &plan.render()).await?;

        let has_draft = draft_written_since(&registry, &log, seq_before);
        info!(workbench_id, has_draft, "run completed");
        Ok(RunOutcome { message_id: message_id.to_string(), has_draft })
    }

    /// Trip the cancel token of the active run.  Returns whether a cancel
    /// was actually requested (false when no run is active).
    pub fn cancel_run(&self, workbench_id: &str) -> bool {
        match self.runs.lock().unwrap().get(workbench_id) {
            Some(cancel) => {
                info!(workbench_id, "cancel requested");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn state(&self, workbench_id: &str) -> WorkbenchState {
        let paths = self.paths(workbench_id);
        let artifacts = ArtifactStore::new(&paths);
        WorkbenchState {
            has_research: artifacts.exists(RESEARCH_FILE),
            has_plan: artifacts.exists(PLAN_FILE),
            has_draft: DraftStore::new(&paths).has_draft(),
            run_active: self.run_active(workbench_id),
        }
    }

    // ── Review & draft lifecycle ─────────────────────────────────────────────

    pub fn review_change_set(&self, workbench_id: &str) -> Result<Vec<ReviewChange>, EngineError> {
        let paths = self.paths(workbench_id);
        let changes = DraftStore::new(&paths)
            .change_set()
            .map_err(|e| EngineError::new(ErrorCode::FileReadFailed, e.to_string()))?;
        let mut hints = FocusStore::new(&paths).all();
        Ok(changes
            .into_iter()
            .map(|change| {
                let focus_hint = hints.remove(&change.path);
                ReviewChange { change, focus_hint }
            })
            .collect())
    }

    pub fn draft_publish(&self, workbench_id: &str) -> Result<(), EngineError> {
        self.ensure_unlocked(workbench_id)?;
        let paths = self.paths(workbench_id);
        DraftStore::new(&paths)
            .publish()
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;
        FocusStore::new(&paths)
            .clear()
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))
    }

    pub fn draft_discard(&self, workbench_id: &str) -> Result<(), EngineError> {
        self.ensure_unlocked(workbench_id)?;
        let paths = self.paths(workbench_id);
        DraftStore::new(&paths)
            .discard()
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;
        FocusStore::new(&paths)
            .clear()
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))
    }

    // ── Checkpoints ──────────────────────────────────────────────────────────

    pub fn checkpoints_list(&self, workbench_id: &str) -> Result<Vec<CheckpointMeta>, EngineError> {
        CheckpointStore::new(&self.paths(workbench_id), self.clock.clone())
            .list()
            .map_err(|e| EngineError::new(ErrorCode::FileReadFailed, e.to_string()))
    }

    pub fn checkpoint_get(
        &self,
        workbench_id: &str,
        checkpoint_id: &str,
    ) -> Result<Option<CheckpointMeta>, EngineError> {
        CheckpointStore::new(&self.paths(workbench_id), self.clock.clone())
            .get(checkpoint_id)
            .map_err(|e| EngineError::new(ErrorCode::FileReadFailed, e.to_string()))
    }

    pub fn checkpoint_create(
        &self,
        workbench_id: &str,
        description: &str,
    ) -> Result<CheckpointMeta, EngineError> {
        self.ensure_unlocked(workbench_id)?;
        CheckpointStore::new(&self.paths(workbench_id), self.clock.clone())
            .create(CheckpointReason::Manual, description)
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))
    }

    /// Restore a checkpoint.  Automatically snapshots the current tree as a
    /// `pre_restore` checkpoint and records a conversation system event
    /// referencing both ids.
    pub fn checkpoint_restore(
        &self,
        workbench_id: &str,
        checkpoint_id: &str,
    ) -> Result<(CheckpointMeta, CheckpointMeta), EngineError> {
        self.ensure_unlocked(workbench_id)?;
        let paths = self.paths(workbench_id);
        let (restored, pre) = CheckpointStore::new(&paths, self.clock.clone())
            .restore(checkpoint_id)
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;

        let conversation = ConversationStore::new(&paths, self.clock.clone());
        conversation
            .append(ConversationMessage::system_event(
                "checkpoint_restore",
                format!("Restored checkpoint {checkpoint_id}"),
                Some(serde_json::json!({
                    "checkpoint_id": restored.checkpoint_id,
                    "pre_restore_id": pre.checkpoint_id,
                })),
                self.clock.now(),
            ))
            .map_err(|e| EngineError::new(ErrorCode::FileWriteFailed, e.to_string()))?;
        Ok((restored, pre))
    }
}

/// Removes the run-registry entry when the run ends, however it ends.
struct RunGuard<'a> {
    engine: &'a Engine,
    workbench_id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.runs.lock().unwrap().remove(&self.workbench_id);
    }
}

/// True when any write-capable tool call succeeded after `seq_before`.
fn draft_written_since(registry: &ToolRegistry, log: &ToolLog, seq_before: u64) -> bool {
    log.read_entries().iter().any(|entry| {
        entry.id > seq_before
            && entry.error.is_none()
            && registry.get(&entry.tool).is_some_and(|t| t.is_write())
    })
}
