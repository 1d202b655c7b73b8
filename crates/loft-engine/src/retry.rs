// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use loft_config::Phase;
use loft_model::ProviderError;

use crate::cancel::CancelToken;
use crate::error::{EngineError, ErrorCode};

/// Rate-limit backoff schedule: five capped exponential sleeps.  After the
/// fifth retry still comes back rate-limited, the run aborts.
pub const RATE_LIMIT_BACKOFF: [Duration; 5] = [
    Duration::from_secs(10),
    Duration::from_secs(20),
    Duration::from_secs(40),
    Duration::from_secs(80),
    Duration::from_secs(160),
];

/// Injectable sleep source so backoff behavior is testable without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeps via the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested durations and returns immediately.  Used by the
/// backoff scenario tests.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Outcome of a wrapped model call that did not succeed.
///
/// `Unavailable` is the only non-fatal variant: the implement phase retries
/// the item once and then marks it failed; research/plan escalate it to a
/// run failure directly.
#[derive(Debug)]
pub enum ModelCallError {
    Unavailable(String),
    Fatal(EngineError),
}

impl ModelCallError {
    /// Escalate to a run error; used by phases with no item-level retry.
    pub fn into_engine_error(self, phase: Phase) -> EngineError {
        match self {
            Self::Unavailable(detail) => {
                EngineError::in_phase(ErrorCode::ProviderUnavailable, phase, detail)
            }
            Self::Fatal(e) => e,
        }
    }
}

/// Uniform wrapper for every model transport call.
///
/// - observes the cancel token around the call and between backoff sleeps;
/// - engages the capped exponential backoff on rate limits;
/// - classifies everything else per the provider error table.
pub async fn call_model<T, F, Fut>(
    mut op: F,
    sleeper: &dyn Sleeper,
    cancel: &CancelToken,
    phase: Phase,
) -> Result<T, ModelCallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut rate_limit_attempts = 0usize;
    loop {
        if cancel.is_cancelled() {
            return Err(ModelCallError::Fatal(EngineError::user_canceled(phase)));
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ModelCallError::Fatal(EngineError::user_canceled(phase)));
            }
            result = op() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(ProviderError::RateLimited(detail)) => {
                if rate_limit_attempts >= RATE_LIMIT_BACKOFF.len() {
                    warn!(phase = %phase, "rate-limit backoff exhausted");
                    return Err(ModelCallError::Fatal(EngineError::in_phase(
                        ErrorCode::ProviderUnavailable,
                        phase,
                        format!("rate limit persisted through backoff: {detail}"),
                    )));
                }
                let delay = RATE_LIMIT_BACKOFF[rate_limit_attempts];
                rate_limit_attempts += 1;
                warn!(phase = %phase, attempt = rate_limit_attempts, delay_secs = delay.as_secs(),
                      "rate limited; backing off");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(ModelCallError::Fatal(EngineError::user_canceled(phase)));
                    }
                    _ = sleeper.sleep(delay) => {}
                }
            }
            Err(ProviderError::Unavailable(detail)) => {
                return Err(ModelCallError::Unavailable(detail));
            }
            Err(other) => {
                return Err(ModelCallError::Fatal(EngineError::from_provider(&other, phase)));
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn success_passes_through() {
        let sleeper = RecordingSleeper::new();
        let cancel = CancelToken::new();
        let out: Result<u32, _> =
            call_model(|| async { Ok(7u32) }, &sleeper, &cancel, Phase::Research).await;
        assert_eq!(out.unwrap(), 7);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_sleeps_the_exact_schedule_then_aborts() {
        let sleeper = RecordingSleeper::new();
        let cancel = CancelToken::new();
        let calls = AtomicUsize::new(0);
        let out: Result<u32, _> = call_model(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited("429".into())) }
            },
            &sleeper,
            &cancel,
            Phase::Implement,
        )
        .await;

        let err = match out.unwrap_err() {
            ModelCallError::Fatal(e) => e,
            other => panic!("expected fatal, got {other:?}"),
        };
        assert_eq!(err.code, ErrorCode::ProviderUnavailable);
        assert_eq!(err.subphase, Some(Phase::Implement));
        assert_eq!(calls.load(Ordering::SeqCst), 6, "initial call + five retries");
        let secs: Vec<u64> = sleeper.recorded().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![10, 20, 40, 80, 160]);
    }

    #[tokio::test]
    async fn rate_limit_recovers_mid_schedule() {
        let sleeper = RecordingSleeper::new();
        let cancel = CancelToken::new();
        let calls = AtomicUsize::new(0);
        let out: Result<u32, _> = call_model(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::RateLimited("429".into()))
                    } else {
                        Ok(1u32)
                    }
                }
            },
            &sleeper,
            &cancel,
            Phase::Research,
        )
        .await;
        assert_eq!(out.unwrap(), 1);
        let secs: Vec<u64> = sleeper.recorded().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![10, 20]);
    }

    #[tokio::test]
    async fn unavailable_is_non_fatal() {
        let sleeper = RecordingSleeper::new();
        let cancel = CancelToken::new();
        let out: Result<u32, _> = call_model(
            || async { Err(ProviderError::Unavailable("503".into())) },
            &sleeper,
            &cancel,
            Phase::Implement,
        )
        .await;
        assert!(matches!(out.unwrap_err(), ModelCallError::Unavailable(_)));
    }

    #[tokio::test]
    async fn cancel_short_circuits_backoff_sleep() {
        struct BlockingSleeper(CancelToken);
        #[async_trait]
        impl Sleeper for BlockingSleeper {
            async fn sleep(&self, _d: Duration) {
                // Trip the cancel token, then park: the select in call_model
                // must take the cancel branch rather than wait us out.
                self.0.cancel();
                futures::future::pending::<()>().await;
            }
        }

        let cancel = CancelToken::new();
        let sleeper = BlockingSleeper(cancel.clone());
        let out: Result<u32, _> = call_model(
            || async { Err(ProviderError::RateLimited("429".into())) },
            &sleeper,
            &cancel,
            Phase::Plan,
        )
        .await;
        match out.unwrap_err() {
            ModelCallError::Fatal(e) => {
                assert_eq!(e.code, ErrorCode::UserCanceled);
                assert_eq!(e.subphase, Some(Phase::Plan));
            }
            other => panic!("expected fatal cancel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_interrupts_a_hanging_call() {
        let sleeper = RecordingSleeper::new();
        let cancel = CancelToken::new();
        let c2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c2.cancel();
        });
        let out: Result<u32, _> = call_model(
            || async {
                futures::future::pending::<()>().await;
                unreachable!()
            },
            &sleeper,
            &cancel,
            Phase::Research,
        )
        .await;
        match out.unwrap_err() {
            ModelCallError::Fatal(e) => assert_eq!(e.code, ErrorCode::UserCanceled),
            other => panic!("expected cancel, got {other:?}"),
        }
    }
}
