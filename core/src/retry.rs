use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use rand::Rng;

use crate::{Error, ErrorKind};

/// Server error codes that are worth retrying even though the status alone
/// would not say so.
static RETRYABLE_ERROR_CODES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Throttling",
        "ThrottlingException",
        "RequestTimeout",
        "ServiceUnavailable",
        "InternalError",
    ])
});

/// 5xx statuses considered transient.
const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// How one failed attempt should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The transport failed before a response arrived; safe to retry.
    RetryableTransport,
    /// The service reported a transient failure; safe to retry.
    RetryableServer,
    /// Do not retry: surface the outcome as-is.
    Terminal,
}

/// Classifies attempt outcomes and computes backoff delays.
///
/// Pure and synchronous: it never sleeps and never touches the network, so
/// every decision is directly testable. The executor owns the waiting.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one. Zero disables retry entirely:
    /// the first failure is terminal.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the backoff.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Disable retrying entirely.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Classify the error of one failed attempt.
    pub fn classify(&self, err: &Error) -> Classification {
        match err.kind() {
            ErrorKind::Transport => Classification::RetryableTransport,
            ErrorKind::Service => {
                let Some(service) = err.service() else {
                    return Classification::Terminal;
                };
                if RETRYABLE_STATUSES.contains(&service.status.as_u16())
                    || RETRYABLE_ERROR_CODES.contains(service.code.as_str())
                {
                    Classification::RetryableServer
                } else {
                    Classification::Terminal
                }
            }
            // Cancellation, deadlines, integrity mismatches, and every local
            // input error cannot be fixed by sending the same bytes again.
            _ => Classification::Terminal,
        }
    }

    /// Whether another attempt may be made after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Backoff before retry number `attempt` (zero-based):
    /// `min(max_delay, base_delay * 2^attempt)` plus uniform jitter in
    /// `[0, delay)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        if exp.is_zero() {
            return exp;
        }

        let jitter = rand::thread_rng().gen_range(0..(exp.as_millis() as u64).max(1));
        exp + Duration::from_millis(jitter)
    }
}
