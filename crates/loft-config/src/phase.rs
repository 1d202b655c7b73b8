// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// The four phases of a workbench run.  Research, Plan and Implement each
/// see a different tool subset; Summary is tool-free and is the only phase
/// that streams to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Research,
    Plan,
    Implement,
    Summary,
}

impl Phase {
    /// Wire-stable phase name used in notifications.
    pub fn name(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Plan => "plan",
            Self::Implement => "implement",
            Self::Summary => "summary",
        }
    }

    /// Wire-stable subphase label attached to error reports.
    pub fn subphase_label(self) -> &'static str {
        match self {
            Self::Research => "rpi_research",
            Self::Plan => "rpi_plan",
            Self::Implement => "rpi_implement",
            Self::Summary => "rpi_summary",
        }
    }

    /// Inverse of [`subphase_label`]: parse a wire subphase label.
    pub fn from_subphase_label(label: &str) -> Option<Self> {
        match label {
            "rpi_research" => Some(Self::Research),
            "rpi_plan" => Some(Self::Plan),
            "rpi_implement" => Some(Self::Implement),
            "rpi_summary" => Some(Self::Summary),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
