// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with jittered exponential backoff for Route53 calls.
//!
//! Throttling and transient failures are retried; every other provider error fails
//! immediately. The base delay is drawn once per call from `[200ms, 800ms)` and
//! doubles with each attempt, so concurrent workers hitting the same rate limit
//! spread out instead of retrying in lockstep.

use crate::constants::{
    DEFAULT_RETRY_MAX_ATTEMPTS, RETRY_BASE_MAX_MILLIS, RETRY_BASE_MIN_MILLIS, RETRY_MULTIPLIER,
};
use crate::errors::ProviderError;
use crate::metrics;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Retry strategy for provider calls.
///
/// Constructed explicitly and handed to the [`crate::route53::Route53Client`], so
/// tests can use [`RetryPolicy::immediate`] and never sleep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included
    pub max_attempts: u32,
    /// Lower bound of the randomized base delay
    pub base_min: Duration,
    /// Upper bound (exclusive) of the randomized base delay
    pub base_max: Duration,
    /// Growth factor per attempt
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Default delays with a custom attempt count.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_min: Duration::from_millis(RETRY_BASE_MIN_MILLIS),
            base_max: Duration::from_millis(RETRY_BASE_MAX_MILLIS),
            multiplier: RETRY_MULTIPLIER,
        }
    }

    /// Retry without sleeping.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_min: Duration::ZERO,
            base_max: Duration::ZERO,
            multiplier: RETRY_MULTIPLIER,
        }
    }

    /// Start a backoff sequence for one call.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_MAX_ATTEMPTS)
    }
}

/// Backoff state for one provider call.
#[derive(Debug)]
pub struct ExponentialBackoff {
    /// Delay before the next retry
    pub current_interval: Duration,
    /// Growth factor per attempt
    pub multiplier: u32,
    /// Retries left
    remaining: u32,
}

impl ExponentialBackoff {
    fn new(policy: &RetryPolicy) -> Self {
        let base = if policy.base_max > policy.base_min {
            let millis = rand::thread_rng().gen_range(
                duration_millis(policy.base_min)..duration_millis(policy.base_max),
            );
            Duration::from_millis(millis)
        } else {
            policy.base_min
        };
        Self {
            current_interval: base,
            multiplier: policy.multiplier,
            remaining: policy.max_attempts.saturating_sub(1),
        }
    }

    /// Get the next backoff interval, or None once the attempts are used up.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let interval = self.current_interval;
        self.current_interval = interval.saturating_mul(self.multiplier);
        Some(interval)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Retry a provider call with jittered exponential backoff.
///
/// # Arguments
///
/// * `policy` - Retry strategy
/// * `operation` - Async function that performs the call
/// * `operation_name` - Provider operation name for logs and metrics
///
/// # Errors
///
/// Returns the provider error immediately when it is not retryable, or the last
/// error once the attempts are used up.
pub async fn retry_provider_call<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    operation_name: &str,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = policy.backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Route53 call succeeded after retries"
                    );
                }
                metrics::record_provider_call(operation_name, true, start_time.elapsed());
                return Ok(value);
            }
            Err(e) => {
                if !e.is_retryable() {
                    debug!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Route53 error"
                    );
                    metrics::record_provider_call(operation_name, false, start_time.elapsed());
                    return Err(e);
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Route53 error, will retry"
                    );
                    metrics::record_provider_retry(operation_name);
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Retries exhausted, giving up"
                    );
                    metrics::record_provider_call(operation_name, false, start_time.elapsed());
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
