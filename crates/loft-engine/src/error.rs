// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use loft_config::Phase;
use loft_model::ProviderError;

/// Wire-stable error codes.  Clients match on these strings; never rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    ProviderNotConfigured,
    ProviderAuthFailed,
    ProviderUnavailable,
    EgressBlocked,
    NetworkUnavailable,
    UserCanceled,
    FileReadFailed,
    FileWriteFailed,
    AlreadyRunning,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::ProviderNotConfigured => "PROVIDER_NOT_CONFIGURED",
            Self::ProviderAuthFailed => "PROVIDER_AUTH_FAILED",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::EgressBlocked => "EGRESS_BLOCKED",
            Self::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            Self::UserCanceled => "USER_CANCELED",
            Self::FileReadFailed => "FILE_READ_FAILED",
            Self::FileWriteFailed => "FILE_WRITE_FAILED",
            Self::AlreadyRunning => "ALREADY_RUNNING",
        }
    }
}

/// A run failure with enough attribution for clients to act on: the stable
/// code, the subphase where it originated, and the provider involved.
///
/// On the wire `subphase` carries the `rpi_*` labels, not the bare phase
/// names (`"rpi_implement"`, never `"implement"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineError {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "subphase_label")]
    pub subphase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub detail: String,
}

/// Serde shim mapping `Option<Phase>` to the wire-stable subphase labels.
mod subphase_label {
    use loft_config::Phase;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Phase>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(phase) => serializer.serialize_some(phase.subphase_label()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Phase>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(label) => Phase::from_subphase_label(&label).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown subphase label: {label}"))
            }),
        }
    }
}

impl EngineError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self { code, subphase: None, provider_id: None, detail: detail.into() }
    }

    pub fn in_phase(code: ErrorCode, phase: Phase, detail: impl Into<String>) -> Self {
        Self { code, subphase: Some(phase), provider_id: None, detail: detail.into() }
    }

    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn user_canceled(phase: Phase) -> Self {
        Self::in_phase(ErrorCode::UserCanceled, phase, "canceled by user")
    }

    /// Classify a transport error into its wire code.  Rate limits map to
    /// `PROVIDER_UNAVAILABLE` — the backoff core only surfaces them after
    /// the capped retry schedule is exhausted.
    pub fn from_provider(err: &ProviderError, phase: Phase) -> Self {
        let code = match err {
            ProviderError::Unauthorized(_) => ErrorCode::ProviderAuthFailed,
            ProviderError::EgressBlocked(_) => ErrorCode::EgressBlocked,
            ProviderError::Unavailable(_) | ProviderError::RateLimited(_) => {
                ErrorCode::ProviderUnavailable
            }
            ProviderError::Network(_) => ErrorCode::NetworkUnavailable,
            ProviderError::Other(_) => ErrorCode::ValidationFailed,
        };
        Self::in_phase(code, phase, err.to_string())
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code.as_str())?;
        if let Some(phase) = self.subphase {
            write!(f, " ({})", phase.subphase_label())?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::ProviderUnavailable).unwrap();
        assert_eq!(json, "\"PROVIDER_UNAVAILABLE\"");
        assert_eq!(ErrorCode::UserCanceled.as_str(), "USER_CANCELED");
    }

    #[test]
    fn provider_classification_matches_the_table() {
        let cases = [
            (ProviderError::Unauthorized("401".into()), ErrorCode::ProviderAuthFailed),
            (ProviderError::EgressBlocked("denied".into()), ErrorCode::EgressBlocked),
            (ProviderError::Unavailable("503".into()), ErrorCode::ProviderUnavailable),
            (ProviderError::RateLimited("429".into()), ErrorCode::ProviderUnavailable),
            (ProviderError::Network("timeout".into()), ErrorCode::NetworkUnavailable),
            (ProviderError::Other("bad".into()), ErrorCode::ValidationFailed),
        ];
        for (err, code) in cases {
            assert_eq!(EngineError::from_provider(&err, Phase::Research).code, code);
        }
    }

    #[test]
    fn display_includes_code_and_subphase() {
        let e = EngineError::in_phase(ErrorCode::ProviderUnavailable, Phase::Implement, "503");
        let s = e.to_string();
        assert!(s.contains("PROVIDER_UNAVAILABLE"));
        assert!(s.contains("rpi_implement"));
        assert!(s.contains("503"));
    }

    #[test]
    fn subphase_serializes_as_wire_label() {
        let e = EngineError::in_phase(ErrorCode::ProviderUnavailable, Phase::Implement, "503");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""subphase":"rpi_implement""#), "{json}");
        assert!(!json.contains(r#""subphase":"implement""#));

        let back: EngineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subphase, Some(Phase::Implement));
    }

    #[test]
    fn absent_subphase_is_omitted_and_tolerated() {
        let e = EngineError::new(ErrorCode::AlreadyRunning, "busy");
        let json = serde_json::to_string(&e).unwrap();
        assert!(!json.contains("subphase"));
        let back: EngineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.subphase, None);
    }

    #[test]
    fn bare_phase_name_on_the_wire_is_rejected() {
        let json = r#"{"code":"USER_CANCELED","subphase":"research","detail":"x"}"#;
        assert!(serde_json::from_str::<EngineError>(json).is_err());
    }
}
