// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Call deadlines and long-poll validation.
//!
//! RPC handlers receive a [`CallContext`] carrying the caller's deadline and
//! a cancellation flag. A context with less than [`CONTEXT_EXPIRE_THRESHOLD`]
//! remaining is considered expired for new work, so a call that would only
//! start under an already-burned deadline fails fast instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tidemark_protocol::ServiceError;
use tokio::time::Instant;
use tracing::{error, warn};

/// Remaining time under which a context no longer admits new work.
pub const CONTEXT_EXPIRE_THRESHOLD: Duration = Duration::from_millis(10);

/// Safety margin subtracted when deriving a child deadline for outbound RPCs.
pub const CHILD_DEADLINE_MARGIN: Duration = Duration::from_millis(10);

/// Deadline and cancellation state of one inbound call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel_flag: Arc<AtomicBool>,
}

impl CallContext {
    /// A context without a deadline. Valid for regular calls, rejected for
    /// long polls.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::default()
        }
    }

    /// The absolute deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Mark the context cancelled. Safe to call from any task; clones share
    /// the flag.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Check that the context is still good for new work.
    ///
    /// Returns `DeadlineExceeded` when cancelled or when less than
    /// [`CONTEXT_EXPIRE_THRESHOLD`] remains.
    pub fn is_valid(&self) -> Result<(), ServiceError> {
        if self.is_cancelled() {
            return Err(ServiceError::DeadlineExceeded);
        }
        if let Some(remaining) = self.remaining() {
            if remaining < CONTEXT_EXPIRE_THRESHOLD {
                return Err(ServiceError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Validate the context for a long-poll handler.
    ///
    /// A missing deadline is rejected, a deadline below `min_timeout` is
    /// rejected, and a deadline below `critical_timeout` logs a warning but
    /// is allowed through.
    pub fn validate_long_poll(
        &self,
        handler_name: &str,
        min_timeout: Duration,
        critical_timeout: Duration,
    ) -> Result<(), ServiceError> {
        let Some(remaining) = self.remaining() else {
            error!(handler = handler_name, "context timeout not set for long poll");
            return Err(ServiceError::ContextTimeoutNotSet);
        };
        if remaining < min_timeout {
            error!(
                handler = handler_name,
                remaining_ms = remaining.as_millis() as u64,
                "context timeout is too short for long poll"
            );
            return Err(ServiceError::ContextTimeoutTooShort);
        }
        if remaining < critical_timeout {
            warn!(
                handler = handler_name,
                remaining_ms = remaining.as_millis() as u64,
                "context timeout is lower than the critical long-poll value"
            );
        }
        Ok(())
    }

    /// Deadline to hand to an outbound RPC: the caller's deadline minus the
    /// safety margin. `None` when the context has no deadline.
    pub fn child_deadline(&self) -> Option<Instant> {
        self.deadline
            .map(|deadline| deadline - CHILD_DEADLINE_MARGIN)
    }
}

/// Await `future`, bounding the wait. Returns `false` when the timeout wins,
/// mirroring a bounded wait on a worker group during shutdown.
pub async fn await_with_timeout<F>(future: F, timeout: Duration) -> bool
where
    F: std::future::Future<Output = ()>,
{
    tokio::time::timeout(timeout, future).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(1);
    const CRITICAL: Duration = Duration::from_secs(20);

    #[tokio::test(start_paused = true)]
    async fn five_millis_is_expired_for_new_work() {
        let ctx = CallContext::with_timeout(Duration::from_millis(5));
        assert_eq!(ctx.is_valid(), Err(ServiceError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn five_millis_is_too_short_for_long_poll() {
        let ctx = CallContext::with_timeout(Duration::from_millis(5));
        assert_eq!(
            ctx.validate_long_poll("poll_decision_task", MIN, CRITICAL),
            Err(ServiceError::ContextTimeoutTooShort)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_deadline_is_rejected_for_long_poll() {
        let ctx = CallContext::background();
        assert!(ctx.is_valid().is_ok());
        assert_eq!(
            ctx.validate_long_poll("poll_decision_task", MIN, CRITICAL),
            Err(ServiceError::ContextTimeoutNotSet)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn generous_deadline_passes_both_checks() {
        let ctx = CallContext::with_timeout(Duration::from_secs(60));
        assert!(ctx.is_valid().is_ok());
        assert!(ctx
            .validate_long_poll("poll_decision_task", MIN, CRITICAL)
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_context_is_invalid() {
        let ctx = CallContext::with_timeout(Duration::from_secs(60));
        ctx.cancel();
        assert_eq!(ctx.is_valid(), Err(ServiceError::DeadlineExceeded));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn child_deadline_subtracts_margin() {
        let ctx = CallContext::with_timeout(Duration::from_secs(10));
        let child = ctx.child_deadline().expect("deadline set");
        let parent = ctx.deadline().expect("deadline set");
        assert_eq!(parent - child, CHILD_DEADLINE_MARGIN);
    }

    #[tokio::test(start_paused = true)]
    async fn await_with_timeout_reports_outcome() {
        assert!(await_with_timeout(async {}, Duration::from_secs(1)).await);
        let never = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        };
        assert!(!await_with_timeout(never, Duration::from_secs(1)).await);
    }
}
