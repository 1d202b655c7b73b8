// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority.  Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("loft/config.yaml"));
        paths.push(cfg.join("loft/config.yml"));
    }

    paths.push(PathBuf::from(".loft/config.yaml"));
    paths.push(PathBuf::from(".loft/config.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, then applying
/// the recognised environment toggles (`LOFT_DATA_DIR`, `LOFT_FAKE_WORKER`).
/// The `extra` argument may provide an explicit path (e.g. `--config`).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env(&mut config);
    Ok(config)
}

/// The two recognised environment knobs.  Anything else is ignored on
/// purpose — the engine's behavior must not silently depend on ambient
/// environment state.
fn apply_env(config: &mut Config) {
    if let Ok(dir) = std::env::var("LOFT_DATA_DIR") {
        if !dir.trim().is_empty() {
            config.workspace.data_root = Some(PathBuf::from(dir));
        }
    }
    if let Ok(flag) = std::env::var("LOFT_FAKE_WORKER") {
        if flag == "1" || flag.eq_ignore_ascii_case("true") {
            config.workspace.fake_worker = true;
        }
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
