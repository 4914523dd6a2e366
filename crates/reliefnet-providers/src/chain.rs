//! Provider fallback orchestration.
//!
//! A [`FallbackChain`] tries an ordered list of providers for one logical
//! request, short-circuiting on the first success. Providers are attempted
//! strictly sequentially - a later provider is only contacted after the
//! current one has definitively failed, so cost and rate limits are never
//! spent on providers whose result would be discarded.
//!
//! The chain never raises: exhaustion is an ordinary outcome the domain
//! service turns into a degraded result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// One provider in a fallback chain.
#[async_trait]
pub trait FallbackProvider<I, O>: Send + Sync
where
    I: Sync + ?Sized,
{
    /// Stable provider tag, also used in cache scopes and result records.
    fn name(&self) -> &'static str;

    /// Precondition: whether this provider may be attempted at all.
    /// Computed from configuration at startup, not re-checked per call.
    fn enabled(&self) -> bool {
        true
    }

    /// One attempt against the backing service.
    async fn attempt(&self, input: &I) -> Result<O, ProviderError>;
}

/// A recorded failure from one provider attempt.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub provider: &'static str,
    pub reason: String,
}

/// Outcome of walking a chain.
#[derive(Debug)]
pub enum ChainOutcome<O> {
    /// Some provider succeeded; failures of earlier providers are attached.
    Resolved {
        value: O,
        provider: &'static str,
        failures: Vec<AttemptFailure>,
    },
    /// Every eligible provider failed, or none was eligible.
    Exhausted { failures: Vec<AttemptFailure> },
}

impl<O> ChainOutcome<O> {
    /// Human-readable summary of the attempt log, for degraded results.
    pub fn failure_summary(failures: &[AttemptFailure]) -> String {
        if failures.is_empty() {
            return "no providers configured".to_string();
        }
        failures
            .iter()
            .map(|f| format!("{}: {}", f.provider, f.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Ordered provider chain with a bounded per-attempt timeout.
///
/// Order is a configuration concern: push providers in priority order
/// (paid high-accuracy first, free best-effort last).
pub struct FallbackChain<I, O>
where
    I: Sync + ?Sized,
{
    operation: &'static str,
    providers: Vec<Arc<dyn FallbackProvider<I, O>>>,
    attempt_timeout: Duration,
}

impl<I, O> FallbackChain<I, O>
where
    I: Sync + ?Sized,
{
    pub fn new(operation: &'static str, attempt_timeout: Duration) -> Self {
        Self {
            operation,
            providers: Vec::new(),
            attempt_timeout,
        }
    }

    /// Append a provider at the end of the priority order.
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn FallbackProvider<I, O>>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Names of the providers in priority order, for diagnostics.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Walk the chain. Disabled providers are skipped without an attempt;
    /// a timed-out attempt is treated like any other failure.
    pub async fn resolve(&self, input: &I) -> ChainOutcome<O> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            if !provider.enabled() {
                debug!(
                    operation = self.operation,
                    provider = provider.name(),
                    "provider disabled; skipping"
                );
                continue;
            }

            let attempt = tokio::time::timeout(self.attempt_timeout, provider.attempt(input));
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(value) => {
                    debug!(
                        operation = self.operation,
                        provider = provider.name(),
                        prior_failures = failures.len(),
                        "provider succeeded"
                    );
                    return ChainOutcome::Resolved {
                        value,
                        provider: provider.name(),
                        failures,
                    };
                }
                Err(e) => {
                    warn!(
                        operation = self.operation,
                        provider = provider.name(),
                        error = %e,
                        "provider failed; advancing to next"
                    );
                    failures.push(AttemptFailure {
                        provider: provider.name(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        ChainOutcome::Exhausted { failures }
    }
}
