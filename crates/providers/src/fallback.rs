//! Provider fallback: ordered candidate chain with per-candidate timeouts.
//!
//! When a candidate fails, the chain decides what happens next from the
//! failure kind: transient failures get a bounded number of retries on the
//! same candidate, protocol failures move straight to the next one, and
//! authentication failures take the candidate out of rotation for the rest
//! of the process.

use addis_core::{
    AdapterError, DomainEvent, EventBus, Exchange, OrchestrationError, ProviderAdapter,
    ProviderStep,
};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default per-call timeout for a candidate.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A single entry in the fallback chain.
struct Candidate {
    adapter: Arc<dyn ProviderAdapter>,
    timeout: Duration,
    disabled: AtomicBool,
}

/// A snapshot of one candidate, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateStatus {
    pub provider: String,
    pub model: String,
    pub timeout: Duration,
    pub disabled: bool,
}

/// Every reachable candidate failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("all providers failed after {attempts} attempt(s); last error: {last_error}")]
pub struct ChainExhausted {
    pub attempts: usize,
    pub last_error: AdapterError,
}

impl From<ChainExhausted> for OrchestrationError {
    fn from(e: ChainExhausted) -> Self {
        OrchestrationError::AllProvidersExhausted {
            attempts: e.attempts,
            last_error: e.last_error,
        }
    }
}

/// An ordered list of provider candidates.
///
/// The chain is shared by all concurrent turns; the only mutable state is
/// each candidate's `disabled` flag.
pub struct FallbackChain {
    candidates: Vec<Candidate>,
    transient_retries: u32,
    events: Option<Arc<EventBus>>,
}

impl FallbackChain {
    /// Create a new chain with no candidates.
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
            transient_retries: 1,
            events: None,
        }
    }

    /// Add a candidate with a custom timeout.
    pub fn add(mut self, adapter: Arc<dyn ProviderAdapter>, timeout: Duration) -> Self {
        self.candidates.push(Candidate {
            adapter,
            timeout,
            disabled: AtomicBool::new(false),
        });
        self
    }

    /// Add a candidate with the default timeout.
    pub fn add_default(self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.add(adapter, DEFAULT_TIMEOUT)
    }

    /// Extra attempts on the same candidate after a transient failure.
    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of candidates in the chain.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn status(&self) -> Vec<CandidateStatus> {
        self.candidates
            .iter()
            .map(|c| CandidateStatus {
                provider: c.adapter.name().to_string(),
                model: c.adapter.model().to_string(),
                timeout: c.timeout,
                disabled: c.disabled.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Try candidates in order starting at `start`, returning the index of
    /// the candidate that answered together with its step.
    ///
    /// Candidates before `start` are never consulted, so a turn that has
    /// already advanced keeps moving forward.
    pub async fn complete(
        &self,
        exchange: &Exchange,
        start: usize,
    ) -> Result<(usize, ProviderStep), ChainExhausted> {
        let mut attempts = 0usize;
        let mut last_error =
            AdapterError::ProtocolFailure("no enabled provider candidates".into());

        for (index, candidate) in self.candidates.iter().enumerate().skip(start) {
            if candidate.disabled.load(Ordering::Relaxed) {
                debug!(
                    provider = %candidate.adapter.name(),
                    model = %candidate.adapter.model(),
                    "Fallback: skipping disabled candidate"
                );
                continue;
            }

            let mut retries_left = self.transient_retries;
            loop {
                attempts += 1;
                info!(
                    provider = %candidate.adapter.name(),
                    model = %candidate.adapter.model(),
                    candidate = index + 1,
                    total = self.candidates.len(),
                    attempt = attempts,
                    "Fallback: trying provider"
                );

                let outcome =
                    match tokio::time::timeout(candidate.timeout, candidate.adapter.converse(exchange))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(AdapterError::TransientFailure(format!(
                            "{} ({}) timed out after {}ms",
                            candidate.adapter.name(),
                            candidate.adapter.model(),
                            candidate.timeout.as_millis()
                        ))),
                    };

                let err = match outcome {
                    Ok(step) => return Ok((index, step)),
                    Err(err) => err,
                };

                self.record_failure(candidate, &err);

                match &err {
                    AdapterError::AuthFailure(_) => {
                        candidate.disabled.store(true, Ordering::Relaxed);
                        error!(
                            provider = %candidate.adapter.name(),
                            model = %candidate.adapter.model(),
                            "Fallback: authentication failed, disabling candidate"
                        );
                        self.publish(DomainEvent::ProviderDisabled {
                            provider: candidate.adapter.name().to_string(),
                            model: candidate.adapter.model().to_string(),
                            timestamp: Utc::now(),
                        });
                        last_error = err;
                        break;
                    }
                    AdapterError::TransientFailure(_) if retries_left > 0 => {
                        retries_left -= 1;
                        last_error = err;
                    }
                    _ => {
                        last_error = err;
                        break;
                    }
                }
            }
        }

        Err(ChainExhausted {
            attempts,
            last_error,
        })
    }

    fn record_failure(&self, candidate: &Candidate, err: &AdapterError) {
        warn!(
            provider = %candidate.adapter.name(),
            model = %candidate.adapter.model(),
            kind = err.kind(),
            error = %err,
            "Fallback: provider failed"
        );
        self.publish(DomainEvent::ProviderFailed {
            provider: candidate.adapter.name().to_string(),
            model: candidate.adapter.model().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self::new()
    }
}
