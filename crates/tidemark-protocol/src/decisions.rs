// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Decision attribute blocks.
//!
//! When a worker completes a decision task it returns a list of decisions;
//! each carries one of these attribute blocks. The blocks arrive unvalidated
//! and possibly incomplete; the history engine's validator checks them and
//! fills defaults in place before any event is written. Timeout fields use
//! seconds with `0` meaning "unset".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ParentClosePolicy, RetryPolicy, WorkflowExecution};

/// A single decision emitted by workflow code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Decision {
    ScheduleActivityTask(ScheduleActivityTaskAttributes),
    RequestCancelActivityTask(RequestCancelActivityTaskAttributes),
    StartTimer(StartTimerAttributes),
    CancelTimer(CancelTimerAttributes),
    RecordMarker(RecordMarkerAttributes),
    CompleteWorkflowExecution(CompleteWorkflowExecutionAttributes),
    FailWorkflowExecution(FailWorkflowExecutionAttributes),
    CancelWorkflowExecution(CancelWorkflowExecutionAttributes),
    RequestCancelExternalWorkflowExecution(RequestCancelExternalWorkflowExecutionAttributes),
    SignalExternalWorkflowExecution(SignalExternalWorkflowExecutionAttributes),
    UpsertWorkflowSearchAttributes(UpsertWorkflowSearchAttributesAttributes),
    ContinueAsNewWorkflowExecution(ContinueAsNewWorkflowExecutionAttributes),
    StartChildWorkflowExecution(StartChildWorkflowExecutionAttributes),
}

/// Schedule an activity on a task list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleActivityTaskAttributes {
    /// User-chosen activity id.
    pub activity_id: String,
    /// Activity type name.
    pub activity_type: String,
    /// Target namespace; empty means the workflow's own.
    pub namespace: String,
    /// Task list; empty inherits nothing and is rejected.
    pub task_list: String,
    /// Activity input payload.
    pub input: Option<serde_json::Value>,
    /// Schedule-to-close timeout, in seconds.
    pub schedule_to_close_timeout_seconds: i32,
    /// Schedule-to-start timeout, in seconds.
    pub schedule_to_start_timeout_seconds: i32,
    /// Start-to-close timeout, in seconds.
    pub start_to_close_timeout_seconds: i32,
    /// Heartbeat timeout, in seconds.
    pub heartbeat_timeout_seconds: i32,
    /// Retry policy.
    pub retry_policy: Option<RetryPolicy>,
}

/// Request cancellation of a scheduled activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelActivityTaskAttributes {
    /// The scheduled event id of the activity to cancel.
    pub scheduled_event_id: i64,
}

/// Start a user timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartTimerAttributes {
    /// User-chosen timer id.
    pub timer_id: String,
    /// Fire delay, in seconds. Must be positive.
    pub start_to_fire_timeout_seconds: i64,
}

/// Cancel a pending user timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelTimerAttributes {
    /// Timer id to cancel.
    pub timer_id: String,
}

/// Record a side-effect marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMarkerAttributes {
    /// Marker name.
    pub marker_name: String,
    /// Marker payload.
    pub details: Option<serde_json::Value>,
}

/// Complete the workflow successfully.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteWorkflowExecutionAttributes {
    /// Result payload.
    pub result: Option<serde_json::Value>,
}

/// Fail the workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailWorkflowExecutionAttributes {
    /// The failure to record. Required.
    pub failure: Option<crate::Failure>,
}

/// Cancel the workflow in response to a cancellation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelWorkflowExecutionAttributes {
    /// Optional details payload.
    pub details: Option<serde_json::Value>,
}

/// Request cancellation of a peer execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionAttributes {
    /// Target namespace; empty means the workflow's own.
    pub namespace: String,
    /// Workflow id of the target.
    pub workflow_id: String,
    /// Run id of the target; empty targets the current run.
    pub run_id: String,
    /// Only cancel if the target is a child of this run.
    pub child_workflow_only: bool,
}

/// Signal a peer execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionAttributes {
    /// Target namespace; empty means the workflow's own.
    pub namespace: String,
    /// The execution to signal.
    pub execution: Option<WorkflowExecution>,
    /// Signal name. Required.
    pub signal_name: String,
    /// Signal payload.
    pub input: Option<serde_json::Value>,
    /// Only signal if the target is a child of this run.
    pub child_workflow_only: bool,
}

/// Merge search attributes into the execution's visibility record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertWorkflowSearchAttributesAttributes {
    /// Indexed fields to merge. Must be non-empty.
    pub search_attributes: HashMap<String, serde_json::Value>,
}

/// Close this run and immediately start a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinueAsNewWorkflowExecutionAttributes {
    /// Workflow type of the new run; empty inherits the current type.
    pub workflow_type: String,
    /// Task list of the new run; empty inherits the current list.
    pub task_list: String,
    /// Input handed to the new run.
    pub input: Option<serde_json::Value>,
    /// Run timeout of the new run, in seconds; zero inherits.
    pub run_timeout_seconds: i32,
    /// Decision task timeout of the new run, in seconds; zero inherits.
    pub task_timeout_seconds: i32,
    /// Delay before the new run's first decision, in seconds.
    pub backoff_start_interval_seconds: i32,
    /// Search attributes seeded into the new run.
    pub search_attributes: HashMap<String, serde_json::Value>,
    /// Retry policy of the new run.
    pub retry_policy: Option<RetryPolicy>,
}

/// Start a child workflow execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionAttributes {
    /// Target namespace; empty means the workflow's own.
    pub namespace: String,
    /// Workflow id of the child. Required.
    pub workflow_id: String,
    /// Workflow type of the child. Required.
    pub workflow_type: String,
    /// Task list of the child; empty inherits the parent's list.
    pub task_list: String,
    /// Child input payload.
    pub input: Option<serde_json::Value>,
    /// Child execution timeout, in seconds; zero inherits.
    pub execution_timeout_seconds: i32,
    /// Child run timeout, in seconds; zero inherits.
    pub run_timeout_seconds: i32,
    /// Child decision task timeout, in seconds; zero inherits.
    pub task_timeout_seconds: i32,
    /// What to do with the child when the parent closes.
    pub parent_close_policy: ParentClosePolicy,
    /// Cron expression for the child.
    pub cron_schedule: String,
    /// Retry policy for the child.
    pub retry_policy: Option<RetryPolicy>,
    /// Search attributes seeded into the child.
    pub search_attributes: HashMap<String, serde_json::Value>,
}
