// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service client contracts.
//!
//! The engine never talks to a transport directly; the surrounding service
//! injects implementations of these traits. The transfer executor assumes
//! every call is idempotent through the request ids carried in the requests.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tidemark_protocol::error::ServiceResult;
use tidemark_protocol::{ParentClosePolicy, RetryPolicy, WorkflowExecution};

/// Dispatch request for a scheduled activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddActivityTaskRequest {
    /// Namespace the activity executes in.
    pub namespace_id: String,
    /// Namespace that owns the scheduling workflow.
    pub source_namespace_id: String,
    /// The scheduling execution.
    pub execution: WorkflowExecution,
    /// Task list to dispatch to.
    pub task_list: String,
    /// Scheduled event id of the activity.
    pub schedule_id: i64,
    /// Time the task may wait for a poller before expiring, in seconds.
    pub schedule_to_start_timeout_seconds: i32,
}

/// Dispatch request for a scheduled decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDecisionTaskRequest {
    /// Namespace of the execution.
    pub namespace_id: String,
    /// The execution the decision belongs to.
    pub execution: WorkflowExecution,
    /// Task list to dispatch to; may be the sticky list.
    pub task_list: String,
    /// Scheduled event id of the decision.
    pub schedule_id: i64,
    /// Expiry for sticky dispatch; `None` for the original list.
    pub schedule_to_start_timeout_seconds: Option<i32>,
}

/// Matching service operations consumed by the engine.
#[async_trait]
pub trait MatchingClient: Send + Sync {
    /// Make a scheduled activity pollable on its task list.
    async fn add_activity_task(&self, request: AddActivityTaskRequest) -> ServiceResult<()>;

    /// Make a scheduled decision pollable on its task list.
    async fn add_decision_task(&self, request: AddDecisionTaskRequest) -> ServiceResult<()>;
}

/// Cancellation request against a peer execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelWorkflowExecutionRequest {
    /// Namespace id of the target.
    pub namespace_id: String,
    /// The target execution; an empty run id targets the current run.
    pub execution: WorkflowExecution,
    /// Stable id deduplicating repeated delivery of the same request.
    pub cancel_request_id: String,
    /// Only cancel if the target is a child of the source execution.
    pub child_workflow_only: bool,
    /// The requesting execution.
    pub source_execution: WorkflowExecution,
}

/// Signal delivery against a peer execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWorkflowExecutionRequest {
    /// Namespace id of the target.
    pub namespace_id: String,
    /// The target execution; an empty run id targets the current run.
    pub execution: WorkflowExecution,
    /// Signal name.
    pub signal_name: String,
    /// Signal payload.
    pub input: Option<serde_json::Value>,
    /// Stable id deduplicating repeated delivery of the same signal.
    pub request_id: String,
    /// Opaque token echoed back to the sender.
    pub control: Option<String>,
    /// Only signal if the target is a child of the source execution.
    pub child_workflow_only: bool,
    /// The sending execution.
    pub source_execution: WorkflowExecution,
}

/// Prune request for a delivered signal's bookkeeping row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveSignalMutableStateRequest {
    /// Namespace id of the sender.
    pub namespace_id: String,
    /// The sending execution.
    pub execution: WorkflowExecution,
    /// Request id of the delivered signal.
    pub request_id: String,
}

/// Start request for a child workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartWorkflowExecutionRequest {
    /// Namespace id of the child.
    pub namespace_id: String,
    /// Workflow id of the child.
    pub workflow_id: String,
    /// Workflow type of the child.
    pub workflow_type: String,
    /// Task list of the child.
    pub task_list: String,
    /// Child input payload.
    pub input: Option<serde_json::Value>,
    /// Child execution timeout, in seconds.
    pub execution_timeout_seconds: i32,
    /// Child run timeout, in seconds.
    pub run_timeout_seconds: i32,
    /// Child decision task timeout, in seconds.
    pub task_timeout_seconds: i32,
    /// Stable create request id; a retry with the same id attaches to the
    /// run it already created.
    pub request_id: String,
    /// Namespace id of the parent.
    pub parent_namespace_id: String,
    /// The parent execution.
    pub parent_execution: WorkflowExecution,
    /// Initiated event id in the parent's history.
    pub parent_initiated_event_id: i64,
    /// Cron expression for the child.
    pub cron_schedule: Option<String>,
    /// Retry policy for the child.
    pub retry_policy: Option<RetryPolicy>,
    /// What to do with the child when the parent closes.
    pub parent_close_policy: ParentClosePolicy,
}

/// First-decision scheduling request for a freshly started child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDecisionTaskRequest {
    /// Namespace id of the execution.
    pub namespace_id: String,
    /// The execution to schedule a decision for.
    pub execution: WorkflowExecution,
    /// Whether this is the run's first decision task.
    pub is_first_decision: bool,
}

/// Parent notification that a child run reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordChildExecutionCompletedRequest {
    /// Namespace id of the parent.
    pub namespace_id: String,
    /// The parent execution.
    pub parent_execution: WorkflowExecution,
    /// Initiated event id in the parent's history.
    pub initiated_event_id: i64,
    /// The closed child execution.
    pub child_execution: WorkflowExecution,
    /// The child's terminal event.
    pub completion_event: tidemark_protocol::HistoryEvent,
}

/// Termination request against a peer execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminateWorkflowExecutionRequest {
    /// Namespace id of the target.
    pub namespace_id: String,
    /// The target execution; an empty run id targets the current run.
    pub execution: WorkflowExecution,
    /// Reason recorded in the target's history.
    pub reason: String,
    /// Identity recorded in the target's history.
    pub identity: String,
}

/// Response to a successful child start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartWorkflowExecutionResponse {
    /// Run id of the started (or already existing) child.
    pub run_id: String,
}

/// Peer-shard history service operations consumed by the engine.
#[async_trait]
pub trait HistoryClient: Send + Sync {
    /// Deliver a cancellation request.
    async fn request_cancel_workflow_execution(
        &self,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> ServiceResult<()>;

    /// Deliver a signal.
    async fn signal_workflow_execution(
        &self,
        request: SignalWorkflowExecutionRequest,
    ) -> ServiceResult<()>;

    /// Prune the sender-side bookkeeping for a delivered signal.
    async fn remove_signal_mutable_state(
        &self,
        request: RemoveSignalMutableStateRequest,
    ) -> ServiceResult<()>;

    /// Start a child workflow execution.
    async fn start_workflow_execution(
        &self,
        request: StartWorkflowExecutionRequest,
    ) -> ServiceResult<StartWorkflowExecutionResponse>;

    /// Schedule the first decision task of a freshly started run.
    async fn schedule_decision_task(
        &self,
        request: ScheduleDecisionTaskRequest,
    ) -> ServiceResult<()>;

    /// Tell a parent that one of its children closed.
    async fn record_child_execution_completed(
        &self,
        request: RecordChildExecutionCompletedRequest,
    ) -> ServiceResult<()>;

    /// Terminate a peer execution.
    async fn terminate_workflow_execution(
        &self,
        request: TerminateWorkflowExecutionRequest,
    ) -> ServiceResult<()>;
}

/// Archival enqueue request for a closed execution's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRequest {
    /// Namespace id of the closed execution.
    pub namespace_id: String,
    /// The closed execution.
    pub execution: WorkflowExecution,
    /// Opaque pointer to the history branch to archive.
    pub branch_token: Vec<u8>,
    /// Event id of the terminal event.
    pub close_event_id: i64,
}

/// Asynchronous archival enqueue.
#[async_trait]
pub trait ArchivalClient: Send + Sync {
    /// Enqueue an archival request; the archival workers do the copying.
    async fn archive(&self, request: ArchiveRequest) -> ServiceResult<()>;
}

/// One child to apply a parent-close policy to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentClosePolicyExecution {
    /// Namespace id of the child.
    pub namespace_id: String,
    /// The child execution.
    pub execution: WorkflowExecution,
    /// The policy to apply.
    pub policy: ParentClosePolicy,
}

/// Fan-out request handed to the parent-close-policy worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentClosePolicyRequest {
    /// Namespace id of the closed parent.
    pub namespace_id: String,
    /// The closed parent execution.
    pub parent_execution: WorkflowExecution,
    /// Children to process.
    pub executions: Vec<ParentClosePolicyExecution>,
}

/// Asynchronous parent-close-policy fan-out enqueue.
#[async_trait]
pub trait ParentClosePolicyClient: Send + Sync {
    /// Enqueue policy processing for a closed parent's children.
    async fn send(&self, request: ParentClosePolicyRequest) -> ServiceResult<()>;
}
