// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Provider-agnostic classification of transport failures.
///
/// Every concrete transport maps its wire errors (HTTP status codes, OS-level
/// deadline errors, proxy rejections) into one of these variants so the
/// retry/backoff core can make a uniform decision without knowing the
/// provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Credentials rejected.  Fatal: retrying cannot help.
    #[error("provider rejected credentials: {0}")]
    Unauthorized(String),

    /// Outbound network access denied by policy.  Fatal.
    #[error("network egress blocked: {0}")]
    EgressBlocked(String),

    /// Transient provider-side failure (5xx, overloaded, connection reset).
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider signalled a rate limit (429).  Subject to capped backoff.
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// OS-level deadline or connection failure before any provider response.
    #[error("network error: {0}")]
    Network(String),

    /// Anything else: malformed request, schema rejection, unexpected body.
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// True for errors where no amount of retrying can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::EgressBlocked(_))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
