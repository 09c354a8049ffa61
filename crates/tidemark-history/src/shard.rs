// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow-id to shard routing and the shard-scoped context.
//!
//! A shard is a partition of workflow executions with exactly one writer at
//! a time; an external oracle grants and revokes ownership. Everything a
//! shard's processors need hangs off one [`ShardContext`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tidemark_protocol::error::{ServiceError, ServiceResult};

use crate::clients::{ArchivalClient, HistoryClient, MatchingClient, ParentClosePolicyClient};
use crate::config::HistoryConfig;
use crate::namespace_cache::NamespaceCache;
use crate::store::{ExecutionStore, HistoryStore, VisibilityStore};

/// Map a workflow id onto a shard.
///
/// Farm Fingerprint32 modulo the shard count; the fingerprint is stable
/// across processes and implementations, so every cluster member routes a
/// workflow id to the same shard.
pub fn workflow_id_to_shard(workflow_id: &str, shard_count: u32) -> u32 {
    farmhash::fingerprint32(workflow_id.as_bytes()) % shard_count
}

/// Wall-clock source. Injected so event application is deterministic under
/// test.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in nanoseconds since the epoch.
    fn now_nanos(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Manually advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

impl ManualClock {
    /// A clock frozen at the given instant.
    pub fn at(now_nanos: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(now_nanos),
        }
    }

    /// Move the clock forward.
    pub fn advance_nanos(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Everything a shard's processors need, bundled per shard.
pub struct ShardContext {
    /// The shard this context serves.
    pub shard_id: u32,
    /// Engine configuration.
    pub config: Arc<HistoryConfig>,
    /// Execution and task-queue storage.
    pub execution_store: Arc<dyn ExecutionStore>,
    /// History node storage.
    pub history_store: Arc<dyn HistoryStore>,
    /// Visibility storage.
    pub visibility_store: Arc<dyn VisibilityStore>,
    /// Matching service client.
    pub matching_client: Arc<dyn MatchingClient>,
    /// Peer history service client.
    pub history_client: Arc<dyn HistoryClient>,
    /// Archival enqueue client.
    pub archival_client: Arc<dyn ArchivalClient>,
    /// Parent-close-policy fan-out client.
    pub parent_close_policy_client: Arc<dyn ParentClosePolicyClient>,
    /// Namespace record cache.
    pub namespace_cache: Arc<NamespaceCache>,
    /// Wall-clock source.
    pub clock: Arc<dyn Clock>,
    owned: AtomicBool,
}

impl ShardContext {
    /// Bundle a shard context. Ownership starts granted.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shard_id: u32,
        config: Arc<HistoryConfig>,
        execution_store: Arc<dyn ExecutionStore>,
        history_store: Arc<dyn HistoryStore>,
        visibility_store: Arc<dyn VisibilityStore>,
        matching_client: Arc<dyn MatchingClient>,
        history_client: Arc<dyn HistoryClient>,
        archival_client: Arc<dyn ArchivalClient>,
        parent_close_policy_client: Arc<dyn ParentClosePolicyClient>,
        namespace_cache: Arc<NamespaceCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shard_id,
            config,
            execution_store,
            history_store,
            visibility_store,
            matching_client,
            history_client,
            archival_client,
            parent_close_policy_client,
            namespace_cache,
            clock,
            owned: AtomicBool::new(true),
        }
    }

    /// Revoke ownership. In-flight work observes this through
    /// [`assert_owned`](Self::assert_owned) and aborts.
    pub fn revoke_ownership(&self) {
        self.owned.store(false, Ordering::SeqCst);
    }

    /// Fail with `ShardOwnershipLost` once ownership has been revoked.
    pub fn assert_owned(&self) -> ServiceResult<()> {
        if self.owned.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::ShardOwnershipLost(self.shard_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_routing_is_deterministic_and_in_range() {
        let shard_count = 16;
        for workflow_id in ["order-1", "order-2", "", "a-very-long-workflow-identifier"] {
            let first = workflow_id_to_shard(workflow_id, shard_count);
            let second = workflow_id_to_shard(workflow_id, shard_count);
            assert_eq!(first, second);
            assert!(first < shard_count);
        }
    }

    #[test]
    fn different_ids_spread_across_shards() {
        let shard_count = 16;
        let shards: std::collections::HashSet<u32> = (0..100)
            .map(|i| workflow_id_to_shard(&format!("wf-{i}"), shard_count))
            .collect();
        assert!(shards.len() > 1);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at(1_000);
        assert_eq!(clock.now_nanos(), 1_000);
        clock.advance_nanos(500);
        assert_eq!(clock.now_nanos(), 1_500);
    }
}
