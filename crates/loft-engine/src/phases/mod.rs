// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod implement;
pub mod plan;
pub mod research;
pub mod summary;
mod tool_loop;

use chrono::{DateTime, Utc};
use tracing::warn;

use loft_config::{EffortProfile, Phase};
use loft_model::{LLMClient, ReasoningEffort};
use loft_store::{ArtifactStore, Clock, ConversationStore, DraftStore};
use loft_tools::ToolRegistry;

use crate::cancel::CancelToken;
use crate::events::Notifier;
use crate::retry::Sleeper;

/// Parsed per-phase reasoning-effort hints.  `None` means "no override" —
/// distinct from an explicit `effort: none`, which is forwarded as such.
#[derive(Debug, Clone, Copy, Default)]
pub struct EffortMap {
    pub research: Option<ReasoningEffort>,
    pub plan: Option<ReasoningEffort>,
    pub implement: Option<ReasoningEffort>,
}

impl EffortMap {
    pub fn from_profile(profile: &EffortProfile) -> Self {
        Self {
            research: parse_effort(profile.research.as_deref()),
            plan: parse_effort(profile.plan.as_deref()),
            implement: parse_effort(profile.implement.as_deref()),
        }
    }

    /// The hint for a phase.  Summary never carries an override.
    pub fn for_phase(&self, phase: Phase) -> Option<ReasoningEffort> {
        match phase {
            Phase::Research => self.research,
            Phase::Plan => self.plan,
            Phase::Implement => self.implement,
            Phase::Summary => None,
        }
    }
}

fn parse_effort(value: Option<&str>) -> Option<ReasoningEffort> {
    match value? {
        "none" => Some(ReasoningEffort::None),
        "low" => Some(ReasoningEffort::Low),
        "medium" => Some(ReasoningEffort::Medium),
        "high" => Some(ReasoningEffort::High),
        other => {
            warn!(effort = other, "unknown reasoning effort value; ignoring");
            None
        }
    }
}

/// Everything a phase runner needs, borrowed from the engine for the
/// duration of one run.  Per-workbench views only — never shared across
/// workbenches.
pub struct RunCtx<'a> {
    pub client: &'a dyn LLMClient,
    pub registry: &'a ToolRegistry,
    pub artifacts: &'a ArtifactStore,
    pub drafts: &'a DraftStore,
    pub conversation: &'a ConversationStore,
    pub clock: &'a dyn Clock,
    pub sleeper: &'a dyn Sleeper,
    pub cancel: &'a CancelToken,
    pub notifier: &'a Notifier,
    pub effort: EffortMap,
    pub user_message: &'a str,
    pub max_context_lines_per_file: usize,
    pub run_started: DateTime<Utc>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
