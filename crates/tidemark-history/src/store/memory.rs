// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory reference stores.
//!
//! These back the integration tests and embedded single-process deployments.
//! They honor the same contracts as the real drivers: task ids are assigned
//! monotonically per shard at commit time, transfer tasks survive until
//! completed, and replication message ids strictly increase.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::events::HistoryEvent;
use tidemark_protocol::replication::{NamespaceReplicationTask, ReplicationMessage};
use tidemark_protocol::task::{TimerTask, TransferTask};
use tidemark_protocol::WorkflowExecution;

use crate::mutable_state::MutableState;

use super::{
    AppendHistoryNodesRequest, AppendHistoryNodesResponse, ExecutionStore, HistoryStore,
    QueueKind, RecordWorkflowClosedRequest, RecordWorkflowStartedRequest, ReplicationMessagePage,
    ReplicationQueueStore, UpdateWorkflowExecutionRequest, UpsertWorkflowSearchAttributesRequest,
    VisibilityStore,
};

/// In-memory [`ExecutionStore`].
#[derive(Default)]
pub struct MemoryExecutionStore {
    inner: Mutex<ExecutionStoreInner>,
}

#[derive(Default)]
struct ExecutionStoreInner {
    executions: HashMap<(u32, String, String, String), MutableState>,
    current_runs: HashMap<(u32, String, String), String>,
    transfer_tasks: BTreeMap<(u32, i64), TransferTask>,
    timer_tasks: BTreeMap<(u32, i64, i64), TimerTask>,
    next_task_id: HashMap<u32, i64>,
}

impl MemoryExecutionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transfer tasks currently queued on a shard.
    pub fn transfer_task_count(&self, shard_id: u32) -> usize {
        self.inner
            .lock()
            .unwrap()
            .transfer_tasks
            .keys()
            .filter(|(shard, _)| *shard == shard_id)
            .count()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn get_workflow_execution(
        &self,
        shard_id: u32,
        namespace_id: &str,
        execution: &WorkflowExecution,
    ) -> ServiceResult<Option<MutableState>> {
        let key = (
            shard_id,
            namespace_id.to_string(),
            execution.workflow_id.clone(),
            execution.run_id.clone(),
        );
        Ok(self.inner.lock().unwrap().executions.get(&key).cloned())
    }

    async fn update_workflow_execution(
        &self,
        request: UpdateWorkflowExecutionRequest,
    ) -> ServiceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let shard_id = request.shard_id;
        let info = &request.state.execution_info;
        let key = (
            shard_id,
            info.namespace_id.clone(),
            info.workflow_id.clone(),
            info.run_id.clone(),
        );
        inner.current_runs.insert(
            (shard_id, info.namespace_id.clone(), info.workflow_id.clone()),
            info.run_id.clone(),
        );

        for mut task in request.transfer_tasks {
            let id = inner.next_task_id.entry(shard_id).or_insert(0);
            *id += 1;
            task.shard_id = shard_id;
            task.task_id = *id;
            inner.transfer_tasks.insert((shard_id, task.task_id), task);
        }
        for mut task in request.timer_tasks {
            let id = inner.next_task_id.entry(shard_id).or_insert(0);
            *id += 1;
            task.shard_id = shard_id;
            task.task_id = *id;
            inner
                .timer_tasks
                .insert((shard_id, task.visibility_time, task.task_id), task);
        }

        let mut snapshot = request.state;
        snapshot.transfer_tasks.clear();
        snapshot.timer_tasks.clear();
        inner.executions.insert(key, snapshot);
        Ok(())
    }

    async fn get_current_run_id(
        &self,
        shard_id: u32,
        namespace_id: &str,
        workflow_id: &str,
    ) -> ServiceResult<Option<String>> {
        let key = (shard_id, namespace_id.to_string(), workflow_id.to_string());
        Ok(self.inner.lock().unwrap().current_runs.get(&key).cloned())
    }

    async fn get_transfer_tasks(
        &self,
        shard_id: u32,
        read_level: i64,
        batch_size: usize,
    ) -> ServiceResult<Vec<TransferTask>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transfer_tasks
            .range((shard_id, read_level + 1)..(shard_id, i64::MAX))
            .take(batch_size)
            .map(|(_, task)| task.clone())
            .collect())
    }

    async fn complete_transfer_task(&self, shard_id: u32, task_id: i64) -> ServiceResult<()> {
        self.inner
            .lock()
            .unwrap()
            .transfer_tasks
            .remove(&(shard_id, task_id));
        Ok(())
    }

    async fn get_timer_tasks(
        &self,
        shard_id: u32,
        due_before: i64,
        batch_size: usize,
    ) -> ServiceResult<Vec<TimerTask>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .timer_tasks
            .range((shard_id, i64::MIN, i64::MIN)..=(shard_id, due_before, i64::MAX))
            .take(batch_size)
            .map(|(_, task)| task.clone())
            .collect())
    }

    async fn complete_timer_task(
        &self,
        shard_id: u32,
        visibility_time: i64,
        task_id: i64,
    ) -> ServiceResult<()> {
        self.inner
            .lock()
            .unwrap()
            .timer_tasks
            .remove(&(shard_id, visibility_time, task_id));
        Ok(())
    }
}

/// In-memory [`HistoryStore`].
#[derive(Default)]
pub struct MemoryHistoryStore {
    branches: Mutex<HashMap<Vec<u8>, Vec<HistoryEvent>>>,
}

impl MemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append_history_nodes(
        &self,
        request: AppendHistoryNodesRequest,
    ) -> ServiceResult<AppendHistoryNodesResponse> {
        let size: usize = request
            .events
            .iter()
            .map(|event| serde_json::to_vec(event).map(|bytes| bytes.len()).unwrap_or(0))
            .sum();
        let mut branches = self.branches.lock().unwrap();
        let branch = branches.entry(request.branch_token.clone()).or_default();
        if let (Some(last), Some(first)) = (branch.last(), request.events.first()) {
            if first.event_id != last.event_id + 1 {
                return Err(ServiceError::invalid_argument(format!(
                    "append starts at event id {} but branch ends at {}",
                    first.event_id, last.event_id
                )));
            }
        }
        branch.extend(request.events);
        Ok(AppendHistoryNodesResponse { size })
    }

    async fn read_history_branch(
        &self,
        branch_token: &[u8],
        min_event_id: i64,
        max_event_id: i64,
    ) -> ServiceResult<Vec<HistoryEvent>> {
        let branches = self.branches.lock().unwrap();
        let branch = branches
            .get(branch_token)
            .ok_or_else(|| ServiceError::not_found("history branch not found"))?;
        Ok(branch
            .iter()
            .filter(|event| event.event_id >= min_event_id && event.event_id < max_event_id)
            .cloned()
            .collect())
    }
}

/// In-memory [`VisibilityStore`] recording every request for inspection.
#[derive(Default)]
pub struct MemoryVisibilityStore {
    /// Recorded start records.
    pub started: Mutex<Vec<RecordWorkflowStartedRequest>>,
    /// Recorded close records.
    pub closed: Mutex<Vec<RecordWorkflowClosedRequest>>,
    /// Recorded search-attribute upserts.
    pub upserts: Mutex<Vec<UpsertWorkflowSearchAttributesRequest>>,
    seen: Mutex<HashSet<(String, i64)>>,
}

impl MemoryVisibilityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn dedupe(&self, run_id: &str, task_id: i64) -> bool {
        self.seen
            .lock()
            .unwrap()
            .insert((run_id.to_string(), task_id))
    }
}

#[async_trait]
impl VisibilityStore for MemoryVisibilityStore {
    async fn record_workflow_execution_started(
        &self,
        request: RecordWorkflowStartedRequest,
    ) -> ServiceResult<()> {
        if self.dedupe(&request.execution.run_id, request.task_id) {
            self.started.lock().unwrap().push(request);
        }
        Ok(())
    }

    async fn record_workflow_execution_closed(
        &self,
        request: RecordWorkflowClosedRequest,
    ) -> ServiceResult<()> {
        if self.dedupe(&request.execution.run_id, request.task_id) {
            self.closed.lock().unwrap().push(request);
        }
        Ok(())
    }

    async fn upsert_workflow_execution(
        &self,
        request: UpsertWorkflowSearchAttributesRequest,
    ) -> ServiceResult<()> {
        if self.dedupe(&request.execution.run_id, request.task_id) {
            self.upserts.lock().unwrap().push(request);
        }
        Ok(())
    }
}

/// In-memory [`ReplicationQueueStore`].
#[derive(Default)]
pub struct MemoryReplicationQueueStore {
    inner: Mutex<ReplicationQueueInner>,
}

#[derive(Default)]
struct ReplicationQueueInner {
    queues: HashMap<QueueKind, BTreeMap<i64, ReplicationMessage>>,
    next_id: HashMap<QueueKind, i64>,
    ack_levels: HashMap<QueueKind, HashMap<String, i64>>,
}

impl MemoryReplicationQueueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReplicationQueueStore for MemoryReplicationQueueStore {
    async fn enqueue(
        &self,
        queue: QueueKind,
        task: NamespaceReplicationTask,
    ) -> ServiceResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id.entry(queue).or_insert(0);
        *id += 1;
        let message_id = *id;
        inner
            .queues
            .entry(queue)
            .or_default()
            .insert(message_id, ReplicationMessage { id: message_id, task });
        Ok(message_id)
    }

    async fn read(
        &self,
        queue: QueueKind,
        last_message_id: i64,
        max_count: usize,
    ) -> ServiceResult<Vec<ReplicationMessage>> {
        let inner = self.inner.lock().unwrap();
        let Some(messages) = inner.queues.get(&queue) else {
            return Ok(Vec::new());
        };
        Ok(messages
            .range(last_message_id + 1..)
            .take(max_count)
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn read_range(
        &self,
        queue: QueueKind,
        first_message_id: i64,
        last_message_id: i64,
        page_size: usize,
        page_token: Option<i64>,
    ) -> ServiceResult<ReplicationMessagePage> {
        let inner = self.inner.lock().unwrap();
        let start = page_token.unwrap_or(first_message_id);
        let empty = ReplicationMessagePage {
            messages: Vec::new(),
            next_page_token: None,
        };
        if start > last_message_id {
            return Ok(empty);
        }
        let Some(messages) = inner.queues.get(&queue) else {
            return Ok(empty);
        };
        let page: Vec<ReplicationMessage> = messages
            .range(start..=last_message_id)
            .take(page_size)
            .map(|(_, message)| message.clone())
            .collect();
        let next_page_token = match page.last() {
            Some(last) if messages.range(last.id + 1..=last_message_id).next().is_some() => {
                Some(last.id + 1)
            }
            _ => None,
        };
        Ok(ReplicationMessagePage {
            messages: page,
            next_page_token,
        })
    }

    async fn update_ack_level(
        &self,
        queue: QueueKind,
        message_id: i64,
        consumer: &str,
    ) -> ServiceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let levels = inner.ack_levels.entry(queue).or_default();
        let level = levels.entry(consumer.to_string()).or_insert(0);
        if message_id > *level {
            *level = message_id;
        }
        Ok(())
    }

    async fn ack_levels(&self, queue: QueueKind) -> ServiceResult<HashMap<String, i64>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .ack_levels
            .get(&queue)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_message(&self, queue: QueueKind, message_id: i64) -> ServiceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(messages) = inner.queues.get_mut(&queue) {
            messages.remove(&message_id);
        }
        Ok(())
    }

    async fn range_delete(
        &self,
        queue: QueueKind,
        first_message_id: i64,
        last_message_id: i64,
    ) -> ServiceResult<()> {
        if first_message_id > last_message_id {
            return Ok(());
        }
        let mut inner = self.inner.lock().unwrap();
        if let Some(messages) = inner.queues.get_mut(&queue) {
            let ids: Vec<i64> = messages
                .range(first_message_id..=last_message_id)
                .map(|(id, _)| *id)
                .collect();
            for id in ids {
                messages.remove(&id);
            }
        }
        Ok(())
    }
}
