// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_provider() -> String {
    "fake".to_string()
}

fn default_model_name() -> String {
    "fake-model".to_string()
}

fn default_max_conversation_messages() -> usize {
    40
}

fn default_max_context_lines_per_file() -> usize {
    200
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier.  "fake" selects the scripted in-process
    /// transport; anything else names an external transport plugin.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model name forwarded to the provider API
    #[serde(default = "default_model_name")]
    pub name: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { provider: default_provider(), name: default_model_name() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of most-recent conversation entries sent to the model for
    /// ad-hoc chat.  The synthesized system preamble is not counted.
    #[serde(default = "default_max_conversation_messages")]
    pub max_conversation_messages: usize,
    /// Per-file line cap when inlining small file contents into the system
    /// preamble; longer files are cut and marked truncated.
    #[serde(default = "default_max_context_lines_per_file")]
    pub max_context_lines_per_file: usize,
    /// Per-phase reasoning-effort hints forwarded to the transport.
    #[serde(default)]
    pub reasoning_effort: EffortProfile,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conversation_messages: default_max_conversation_messages(),
            max_context_lines_per_file: default_max_context_lines_per_file(),
            reasoning_effort: EffortProfile::default(),
        }
    }
}

/// Effort strings per phase ("none" | "low" | "medium" | "high").
///
/// Kept as free strings here so the config crate stays independent of the
/// transport types; the engine parses and warns on unknown values.  The
/// summary phase never carries an override and has no knob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffortProfile {
    #[serde(default)]
    pub research: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub implement: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory holding one subdirectory per workbench.  Overridden by
    /// `LOFT_DATA_DIR`; defaults to the platform data dir.
    #[serde(default)]
    pub data_root: Option<PathBuf>,
    /// Use the canned-JSON tool worker instead of a real worker process.
    /// Overridden by `LOFT_FAKE_WORKER=1`.
    #[serde(default)]
    pub fake_worker: bool,
}

impl WorkspaceConfig {
    /// Resolve the effective data root: config value, else the platform
    /// data directory.
    pub fn resolved_data_root(&self) -> PathBuf {
        if let Some(root) = &self.data_root {
            return root.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".local").join("share")
            })
            .join("loft")
            .join("workbenches")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.model.provider, "fake");
        assert_eq!(c.engine.max_conversation_messages, 40);
        assert_eq!(c.engine.max_context_lines_per_file, 200);
        assert!(c.engine.reasoning_effort.research.is_none());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let c: Config = serde_yaml::from_str("model:\n  provider: fake\n").unwrap();
        assert_eq!(c.model.name, "fake-model");
        assert_eq!(c.engine.max_conversation_messages, 40);
    }

    #[test]
    fn effort_profile_parses_per_phase() {
        let c: Config = serde_yaml::from_str(
            "engine:\n  reasoning_effort:\n    research: none\n    plan: low\n    implement: high\n",
        )
        .unwrap();
        assert_eq!(c.engine.reasoning_effort.research.as_deref(), Some("none"));
        assert_eq!(c.engine.reasoning_effort.plan.as_deref(), Some("low"));
        assert_eq!(c.engine.reasoning_effort.implement.as_deref(), Some("high"));
    }

    #[test]
    fn resolved_data_root_prefers_config_value() {
        let w = WorkspaceConfig { data_root: Some(PathBuf::from("/tmp/x")), fake_worker: false };
        assert_eq!(w.resolved_data_root(), PathBuf::from("/tmp/x"));
    }
}
