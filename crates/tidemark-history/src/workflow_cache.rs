// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-execution lock table and load-through mutable-state cache.
//!
//! Every read-modify-write of an execution goes through [`WorkflowCache::
//! acquire`], which hands back a guard holding the execution's async mutex.
//! The cached snapshot loads from the execution store on first use and is
//! invalidated on failed writes. Idle entries are evicted once the table
//! grows past its capacity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tidemark_protocol::error::ServiceResult;
use tidemark_protocol::WorkflowExecution;
use tokio::sync::OwnedMutexGuard;

use crate::mutable_state::MutableState;
use crate::store::ExecutionStore;

type Entry = Arc<tokio::sync::Mutex<Option<MutableState>>>;

/// Key of one cached execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WorkflowKey {
    namespace_id: String,
    workflow_id: String,
    run_id: String,
}

/// Load-through cache of mutable states with per-execution locking.
pub struct WorkflowCache {
    shard_id: u32,
    store: Arc<dyn ExecutionStore>,
    capacity: usize,
    entries: Mutex<HashMap<WorkflowKey, Entry>>,
}

impl WorkflowCache {
    /// Create a cache for one shard.
    pub fn new(shard_id: u32, store: Arc<dyn ExecutionStore>, capacity: usize) -> Self {
        Self {
            shard_id,
            store,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Lock an execution and load its state if not cached.
    ///
    /// The returned guard holds the execution's mutex; concurrent writers
    /// for the same run serialize here. The guard's state is `None` when
    /// the execution does not exist in the store.
    pub async fn acquire(
        &self,
        namespace_id: &str,
        execution: &WorkflowExecution,
    ) -> ServiceResult<WorkflowGuard> {
        let key = WorkflowKey {
            namespace_id: namespace_id.to_string(),
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
        };
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            if entries.len() > self.capacity {
                entries.retain(|_, entry| Arc::strong_count(entry) > 1);
            }
            entries.entry(key).or_default().clone()
        };

        let mut guard = entry.clone().lock_owned().await;
        if guard.is_none() {
            *guard = self
                .store
                .get_workflow_execution(self.shard_id, namespace_id, execution)
                .await?;
        }
        Ok(WorkflowGuard { guard })
    }

    /// Number of entries currently in the table.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one execution's cached state.
pub struct WorkflowGuard {
    guard: OwnedMutexGuard<Option<MutableState>>,
}

impl WorkflowGuard {
    /// The cached state; `None` when the execution does not exist.
    pub fn state(&self) -> Option<&MutableState> {
        self.guard.as_ref()
    }

    /// Mutable access to the cached state.
    pub fn state_mut(&mut self) -> Option<&mut MutableState> {
        self.guard.as_mut()
    }

    /// Replace the cached state after a successful persist.
    pub fn install(&mut self, state: MutableState) {
        *self.guard = Some(state);
    }

    /// Drop the cached state so the next acquire reloads from the store.
    /// Called after a failed write, when the snapshot may be stale.
    pub fn invalidate(&mut self) {
        *self.guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryExecutionStore;
    use crate::store::UpdateWorkflowExecutionRequest;

    fn seeded_store() -> Arc<MemoryExecutionStore> {
        Arc::new(MemoryExecutionStore::new())
    }

    #[tokio::test]
    async fn missing_execution_loads_as_none() {
        let cache = WorkflowCache::new(0, seeded_store(), 16);
        let guard = cache
            .acquire("ns", &WorkflowExecution::new("wf", "run"))
            .await
            .unwrap();
        assert!(guard.state().is_none());
    }

    #[tokio::test]
    async fn loads_through_and_caches() {
        let store = seeded_store();
        let state = MutableState::new("ns", WorkflowExecution::new("wf", "run"));
        store
            .update_workflow_execution(UpdateWorkflowExecutionRequest {
                shard_id: 0,
                state,
                transfer_tasks: vec![],
                timer_tasks: vec![],
            })
            .await
            .unwrap();

        let cache = WorkflowCache::new(0, store, 16);
        let execution = WorkflowExecution::new("wf", "run");
        {
            let guard = cache.acquire("ns", &execution).await.unwrap();
            assert!(guard.state().is_some());
        }
        assert_eq!(cache.len(), 1);
        let guard = cache.acquire("ns", &execution).await.unwrap();
        assert_eq!(guard.state().unwrap().execution_info.run_id, "run");
    }

    #[tokio::test]
    async fn locks_serialize_same_execution() {
        let cache = Arc::new(WorkflowCache::new(0, seeded_store(), 16));
        let execution = WorkflowExecution::new("wf", "run");

        let first = cache.acquire("ns", &execution).await.unwrap();
        let contended = {
            let cache = cache.clone();
            let execution = execution.clone();
            tokio::spawn(async move { cache.acquire("ns", &execution).await.unwrap() })
        };
        // The spawned acquire cannot finish while the first guard is held.
        tokio::task::yield_now().await;
        assert!(!contended.is_finished());
        drop(first);
        contended.await.unwrap();
    }
}
