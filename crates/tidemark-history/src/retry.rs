// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backoff policies and error classification.
//!
//! Every outbound dependency has a named policy; retry decisions are driven
//! entirely by the [`ServiceError`] kind, never by downcasting.

use std::future::Future;
use std::time::Duration;

use tidemark_protocol::ServiceError;
use tracing::debug;

/// Exponential backoff policy with a hard expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Upper bound on the delay between retries.
    pub maximum_interval: Duration,
    /// Total time budget across all attempts.
    pub expiration_interval: Duration,
}

impl RetryPolicy {
    /// Policy for persistence-layer operations.
    pub fn persistence() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            maximum_interval: Duration::from_secs(10),
            expiration_interval: Duration::from_secs(30),
        }
    }

    /// Policy for calls to peer history shards.
    pub fn history_service() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            maximum_interval: Duration::from_secs(10),
            expiration_interval: Duration::from_secs(30),
        }
    }

    /// Policy for calls to the matching service.
    pub fn matching_service() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            maximum_interval: Duration::from_secs(10),
            expiration_interval: Duration::from_secs(30),
        }
    }

    /// Policy for calls to the frontend service.
    pub fn frontend_service() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            maximum_interval: Duration::from_secs(5),
            expiration_interval: Duration::from_secs(15),
        }
    }

    /// Policy for calls to the admin service.
    pub fn admin_service() -> Self {
        Self {
            initial_interval: Duration::from_millis(200),
            maximum_interval: Duration::from_secs(5),
            expiration_interval: Duration::from_secs(15),
        }
    }

    /// Policy for ingest / replication publish operations.
    pub fn ingest() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            maximum_interval: Duration::from_secs(10),
            expiration_interval: Duration::from_secs(30),
        }
    }

    /// Delay before the given attempt (0-based), capped at the maximum.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial_interval
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.maximum_interval);
        doubled.min(self.maximum_interval)
    }
}

/// Transient persistence errors worth retrying.
pub fn is_persistence_transient(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::Internal(_) | ServiceError::ResourceExhausted(_)
    )
}

/// Errors that must never be retried against a service.
pub fn is_service_non_retryable(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::NotFound(_)
            | ServiceError::InvalidArgument(_)
            | ServiceError::NamespaceNotActive { .. }
            | ServiceError::WorkflowExecutionAlreadyStarted { .. }
            | ServiceError::CancellationAlreadyRequested
    )
}

/// Retryable service errors: everything not in the non-retryable set.
pub fn is_service_transient(err: &ServiceError) -> bool {
    !is_service_non_retryable(err)
}

/// The conservative whitelist used when retrying across shards: only errors
/// known to be transient qualify.
pub fn is_whitelist_transient(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::Internal(_)
            | ServiceError::ResourceExhausted(_)
            | ServiceError::ShardOwnershipLost(_)
            | ServiceError::DeadlineExceeded
            | ServiceError::Unavailable(_)
    )
}

/// Ingest errors are all treated as transient; the publisher retries until
/// the policy budget expires.
pub fn is_ingest_transient(_err: &ServiceError) -> bool {
    true
}

/// Run `op` until it succeeds, the error is classified non-retryable, or the
/// policy's expiration budget is spent.
pub async fn retry<T, F, Fut, C>(
    policy: RetryPolicy,
    is_retryable: C,
    mut op: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
    C: Fn(&ServiceError) -> bool,
{
    let deadline = tokio::time::Instant::now() + policy.expiration_interval;
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) {
                    return Err(err);
                }
                let backoff = policy.backoff_for_attempt(attempt);
                if tokio::time::Instant::now() + backoff >= deadline {
                    return Err(err);
                }
                debug!(attempt, code = err.code(), backoff_ms = backoff.as_millis() as u64, error = %err, "retrying after transient error");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}
