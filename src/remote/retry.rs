// ABOUTME: Retrying invoker with deterministic error classification and capped exponential backoff
// ABOUTME: Unclassified failures are not retried so unknown failure modes surface immediately

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::client::{HttpResponse, NetworkFailure, RequestSpec, Transport};
use crate::error::{DiffError, Result};

/// Substrings marking a failure that retrying cannot fix. Checked before the
/// retryable patterns.
const PERMANENT_PATTERNS: &[&str] = &[
    "unauthorized",
    "authentication",
    "forbidden",
    "permission denied",
    "access denied",
    "not found",
    "does not exist",
    "syntax error",
    "invalid",
    "validation",
    "malformed",
];

const TRANSIENT_PATTERNS: &[&str] = &[
    "connection reset",
    "econnreset",
    "connection refused",
    "econnrefused",
    "connection closed",
    "connection aborted",
    "broken pipe",
    "epipe",
    "socket",
    "timed out",
    "timeout",
    "etimedout",
    "network unreachable",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

/// A single failed attempt, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Network(NetworkFailure),
    Status { status: u16, body: String },
}

impl Failure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Failure::Status { status, .. } => Some(*status),
            Failure::Network(_) => None,
        }
    }

    /// Human-readable message, preferring the backend's own error field.
    pub fn message(&self) -> String {
        match self {
            Failure::Network(failure) => failure.message().to_string(),
            Failure::Status { status, body } => {
                let detail = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|value| {
                        ["error", "detail", "message"]
                            .iter()
                            .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
                    })
                    .unwrap_or_else(|| body.chars().take(500).collect());
                format!("HTTP {}: {}", status, detail)
            }
        }
    }
}

pub fn classify(failure: &Failure) -> ErrorClass {
    match failure {
        Failure::Status { status, .. } => match status {
            408 | 429 | 500..=599 => ErrorClass::Retryable,
            _ => ErrorClass::NonRetryable,
        },
        Failure::Network(NetworkFailure::Timeout(_)) | Failure::Network(NetworkFailure::Connect(_)) => {
            ErrorClass::Retryable
        }
        Failure::Network(NetworkFailure::Other(message)) => classify_message(message),
    }
}

fn classify_message(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if PERMANENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClass::NonRetryable;
    }
    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClass::Retryable;
    }
    warn!("Unclassified backend failure, not retrying: {}", message);
    ErrorClass::NonRetryable
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// No delay between attempts; used where waiting buys nothing.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// `min(base * 2^attempt + jitter, max)`, with `attempt` counted from zero.
    pub fn delay_for(&self, attempt: u32, jitter: Duration) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let exponential = self.base_delay.saturating_mul(factor);
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Executes backend requests with bounded automatic recovery. Holds no
/// per-request state, so one invoker is shared by every caller.
#[derive(Clone)]
pub struct RetryingInvoker {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn invoke(&self, request: &RequestSpec) -> Result<HttpResponse> {
        self.invoke_with(request, &self.policy).await
    }

    /// Attempts are strictly sequential; the backoff sleep is the only
    /// suspension point between them.
    pub async fn invoke_with(&self, request: &RequestSpec, policy: &RetryPolicy) -> Result<HttpResponse> {
        let mut attempt: u32 = 0;
        loop {
            let failure = match self.transport.send(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => Failure::Status {
                    status: response.status,
                    body: response.body,
                },
                Err(network) => Failure::Network(network),
            };

            match classify(&failure) {
                ErrorClass::NonRetryable => {
                    debug!("Attempt {} for {} failed permanently: {}", attempt + 1, request.path, failure.message());
                    return Err(DiffError::Permanent {
                        status: failure.status(),
                        message: failure.message(),
                    });
                }
                ErrorClass::Retryable if attempt >= policy.max_retries => {
                    return Err(DiffError::Transient {
                        attempts: attempt + 1,
                        message: failure.message(),
                    });
                }
                ErrorClass::Retryable => {
                    let delay = policy.delay_for(attempt, policy.sample_jitter());
                    warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        policy.max_retries + 1,
                        request.path,
                        failure.message(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
