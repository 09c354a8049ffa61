// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence contracts consumed by the engine.
//!
//! The real drivers live outside this crate; the engine only sees these
//! traits. [`memory`] provides the reference in-memory implementations used
//! by tests and embedded deployments.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use tidemark_protocol::error::ServiceResult;
use tidemark_protocol::events::HistoryEvent;
use tidemark_protocol::replication::{NamespaceReplicationTask, ReplicationMessage};
use tidemark_protocol::task::{TimerTask, TransferTask};
use tidemark_protocol::WorkflowExecution;

use crate::mutable_state::{CloseStatus, MutableState};

/// Write request persisting a mutable-state snapshot together with the
/// queue tasks its event batch generated. The store assigns shard-scoped
/// task ids at commit time.
#[derive(Debug)]
pub struct UpdateWorkflowExecutionRequest {
    /// Shard the execution maps to.
    pub shard_id: u32,
    /// The snapshot to persist.
    pub state: MutableState,
    /// Transfer tasks generated by the batch.
    pub transfer_tasks: Vec<TransferTask>,
    /// Timer tasks generated by the batch.
    pub timer_tasks: Vec<TimerTask>,
}

/// Per-shard execution and task-queue storage.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Load the mutable-state snapshot of one run.
    async fn get_workflow_execution(
        &self,
        shard_id: u32,
        namespace_id: &str,
        execution: &WorkflowExecution,
    ) -> ServiceResult<Option<MutableState>>;

    /// Persist a snapshot and its generated tasks atomically.
    async fn update_workflow_execution(
        &self,
        request: UpdateWorkflowExecutionRequest,
    ) -> ServiceResult<()>;

    /// The current (latest) run id of a workflow id, if any.
    async fn get_current_run_id(
        &self,
        shard_id: u32,
        namespace_id: &str,
        workflow_id: &str,
    ) -> ServiceResult<Option<String>>;

    /// Read transfer tasks with ids above `read_level`, oldest first.
    async fn get_transfer_tasks(
        &self,
        shard_id: u32,
        read_level: i64,
        batch_size: usize,
    ) -> ServiceResult<Vec<TransferTask>>;

    /// Delete a transfer task after its effect has been acknowledged.
    async fn complete_transfer_task(&self, shard_id: u32, task_id: i64) -> ServiceResult<()>;

    /// Read timer tasks due at or before `due_before`, earliest first.
    async fn get_timer_tasks(
        &self,
        shard_id: u32,
        due_before: i64,
        batch_size: usize,
    ) -> ServiceResult<Vec<TimerTask>>;

    /// Delete a timer task after it has fired.
    async fn complete_timer_task(
        &self,
        shard_id: u32,
        visibility_time: i64,
        task_id: i64,
    ) -> ServiceResult<()>;
}

/// Append request for a run's history branch.
#[derive(Debug, Clone)]
pub struct AppendHistoryNodesRequest {
    /// Shard the execution maps to.
    pub shard_id: u32,
    /// History branch to append to.
    pub branch_token: Vec<u8>,
    /// Namespace id of the run.
    pub namespace_id: String,
    /// The run.
    pub execution: WorkflowExecution,
    /// Events to append; ids must continue the branch densely.
    pub events: Vec<HistoryEvent>,
}

/// Result of a history append.
#[derive(Debug, Clone, Copy)]
pub struct AppendHistoryNodesResponse {
    /// Encoded size of the appended events, in bytes.
    pub size: usize,
}

/// Append-only history node storage with forkable branches.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append events to a branch.
    async fn append_history_nodes(
        &self,
        request: AppendHistoryNodesRequest,
    ) -> ServiceResult<AppendHistoryNodesResponse>;

    /// Read a branch's events in `[min_event_id, max_event_id)`.
    async fn read_history_branch(
        &self,
        branch_token: &[u8],
        min_event_id: i64,
        max_event_id: i64,
    ) -> ServiceResult<Vec<HistoryEvent>>;
}

/// Visibility record for a started execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWorkflowStartedRequest {
    /// Namespace id of the run.
    pub namespace_id: String,
    /// The run.
    pub execution: WorkflowExecution,
    /// Workflow type name.
    pub workflow_type: String,
    /// Start time, in nanoseconds.
    pub start_time: i64,
    /// Effective execution time (start plus backoff), in nanoseconds.
    pub execution_time: i64,
    /// Transfer task id, used by the store for dedup.
    pub task_id: i64,
    /// Search attributes at start.
    pub search_attributes: HashMap<String, serde_json::Value>,
}

/// Visibility record for a closed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWorkflowClosedRequest {
    /// Namespace id of the run.
    pub namespace_id: String,
    /// The run.
    pub execution: WorkflowExecution,
    /// Workflow type name.
    pub workflow_type: String,
    /// Start time, in nanoseconds.
    pub start_time: i64,
    /// Close time, in nanoseconds.
    pub close_time: i64,
    /// Terminal status.
    pub status: CloseStatus,
    /// Number of history events at close.
    pub history_length: i64,
    /// Transfer task id, used by the store for dedup.
    pub task_id: i64,
}

/// Visibility upsert for changed search attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertWorkflowSearchAttributesRequest {
    /// Namespace id of the run.
    pub namespace_id: String,
    /// The run.
    pub execution: WorkflowExecution,
    /// Workflow type name.
    pub workflow_type: String,
    /// Transfer task id, used by the store for dedup.
    pub task_id: i64,
    /// Current search attributes.
    pub search_attributes: HashMap<String, serde_json::Value>,
}

/// Visibility storage consumed by the transfer executor.
#[async_trait]
pub trait VisibilityStore: Send + Sync {
    /// Record a started execution. Repeated delivery with the same task id
    /// is deduplicated by the store.
    async fn record_workflow_execution_started(
        &self,
        request: RecordWorkflowStartedRequest,
    ) -> ServiceResult<()>;

    /// Record a closed execution.
    async fn record_workflow_execution_closed(
        &self,
        request: RecordWorkflowClosedRequest,
    ) -> ServiceResult<()>;

    /// Merge updated search attributes into the execution's record.
    async fn upsert_workflow_execution(
        &self,
        request: UpsertWorkflowSearchAttributesRequest,
    ) -> ServiceResult<()>;
}

/// Which replication log an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// The main namespace replication log.
    Replication,
    /// The dead-letter log.
    ReplicationDlq,
}

/// A page of DLQ messages plus the token for the next page.
#[derive(Debug, Clone)]
pub struct ReplicationMessagePage {
    /// Messages in the page, id-ordered.
    pub messages: Vec<ReplicationMessage>,
    /// Token resuming after this page; `None` when exhausted.
    pub next_page_token: Option<i64>,
}

/// Durable storage backing the namespace replication queue.
#[async_trait]
pub trait ReplicationQueueStore: Send + Sync {
    /// Append a task, assigning the next strictly-increasing message id.
    async fn enqueue(&self, queue: QueueKind, task: NamespaceReplicationTask)
        -> ServiceResult<i64>;

    /// Read messages with ids strictly above `last_message_id`, id-ordered.
    async fn read(
        &self,
        queue: QueueKind,
        last_message_id: i64,
        max_count: usize,
    ) -> ServiceResult<Vec<ReplicationMessage>>;

    /// Read a page of messages with ids in `[first, last]`.
    async fn read_range(
        &self,
        queue: QueueKind,
        first_message_id: i64,
        last_message_id: i64,
        page_size: usize,
        page_token: Option<i64>,
    ) -> ServiceResult<ReplicationMessagePage>;

    /// Raise a consumer's ack level. Levels never regress.
    async fn update_ack_level(
        &self,
        queue: QueueKind,
        message_id: i64,
        consumer: &str,
    ) -> ServiceResult<()>;

    /// All consumer ack levels for a queue.
    async fn ack_levels(&self, queue: QueueKind) -> ServiceResult<HashMap<String, i64>>;

    /// Delete one message.
    async fn delete_message(&self, queue: QueueKind, message_id: i64) -> ServiceResult<()>;

    /// Delete every message with an id in `[first, last]`.
    async fn range_delete(
        &self,
        queue: QueueKind,
        first_message_id: i64,
        last_message_id: i64,
    ) -> ServiceResult<()>;
}
