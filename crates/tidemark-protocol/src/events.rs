// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! History events.
//!
//! A history event is the atomic unit of durable workflow state change.
//! Events form an append-only log per run; event ids are dense and start at
//! 1. The attribute payload is a closed sum type: the state builder matches
//! exhaustively over it, so adding a kind without teaching the builder about
//! it is a compile error, and the kind count is pinned by a test below.
//!
//! Timeout fields use seconds with `0` meaning "unset", matching the wire
//! convention of the surrounding services; the decision validator is the only
//! place defaults are filled in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumDiscriminants};

use crate::{Failure, ParentClosePolicy, RetryPolicy, TimeoutKind, WorkflowExecution};

/// A single durable history event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Position in the run's history, dense and starting at 1.
    pub event_id: i64,
    /// Failover version the event was written under.
    pub version: i64,
    /// Wall-clock timestamp in nanoseconds.
    pub timestamp: i64,
    /// Type-specific payload.
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    /// The kind tag of this event.
    pub fn event_type(&self) -> EventType {
        EventType::from(&self.attributes)
    }
}

/// Event payloads, one variant per event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(EventType))]
#[strum_discriminants(derive(EnumCount, Hash, strum::Display))]
#[strum_discriminants(allow(missing_docs))]
#[allow(missing_docs)]
pub enum EventAttributes {
    WorkflowExecutionStarted(WorkflowExecutionStartedAttributes),
    WorkflowExecutionCompleted(WorkflowExecutionCompletedAttributes),
    WorkflowExecutionFailed(WorkflowExecutionFailedAttributes),
    WorkflowExecutionTimedOut(WorkflowExecutionTimedOutAttributes),
    WorkflowExecutionTerminated(WorkflowExecutionTerminatedAttributes),
    WorkflowExecutionCancelRequested(WorkflowExecutionCancelRequestedAttributes),
    WorkflowExecutionCanceled(WorkflowExecutionCanceledAttributes),
    WorkflowExecutionContinuedAsNew(WorkflowExecutionContinuedAsNewAttributes),
    WorkflowExecutionSignaled(WorkflowExecutionSignaledAttributes),
    UpsertWorkflowSearchAttributes(UpsertWorkflowSearchAttributesAttributes),
    MarkerRecorded(MarkerRecordedAttributes),

    DecisionTaskScheduled(DecisionTaskScheduledAttributes),
    DecisionTaskStarted(DecisionTaskStartedAttributes),
    DecisionTaskCompleted(DecisionTaskCompletedAttributes),
    DecisionTaskTimedOut(DecisionTaskTimedOutAttributes),
    DecisionTaskFailed(DecisionTaskFailedAttributes),

    ActivityTaskScheduled(ActivityTaskScheduledAttributes),
    ActivityTaskStarted(ActivityTaskStartedAttributes),
    ActivityTaskCompleted(ActivityTaskCompletedAttributes),
    ActivityTaskFailed(ActivityTaskFailedAttributes),
    ActivityTaskTimedOut(ActivityTaskTimedOutAttributes),
    ActivityTaskCancelRequested(ActivityTaskCancelRequestedAttributes),
    RequestCancelActivityTaskFailed(RequestCancelActivityTaskFailedAttributes),
    ActivityTaskCanceled(ActivityTaskCanceledAttributes),

    TimerStarted(TimerStartedAttributes),
    TimerFired(TimerFiredAttributes),
    CancelTimerFailed(CancelTimerFailedAttributes),
    TimerCanceled(TimerCanceledAttributes),

    StartChildWorkflowExecutionInitiated(StartChildWorkflowExecutionInitiatedAttributes),
    StartChildWorkflowExecutionFailed(StartChildWorkflowExecutionFailedAttributes),
    ChildWorkflowExecutionStarted(ChildWorkflowExecutionStartedAttributes),
    ChildWorkflowExecutionCompleted(ChildWorkflowExecutionCompletedAttributes),
    ChildWorkflowExecutionFailed(ChildWorkflowExecutionFailedAttributes),
    ChildWorkflowExecutionCanceled(ChildWorkflowExecutionCanceledAttributes),
    ChildWorkflowExecutionTimedOut(ChildWorkflowExecutionTimedOutAttributes),
    ChildWorkflowExecutionTerminated(ChildWorkflowExecutionTerminatedAttributes),

    RequestCancelExternalWorkflowExecutionInitiated(
        RequestCancelExternalWorkflowExecutionInitiatedAttributes,
    ),
    RequestCancelExternalWorkflowExecutionFailed(
        RequestCancelExternalWorkflowExecutionFailedAttributes,
    ),
    ExternalWorkflowExecutionCancelRequested(ExternalWorkflowExecutionCancelRequestedAttributes),

    SignalExternalWorkflowExecutionInitiated(SignalExternalWorkflowExecutionInitiatedAttributes),
    SignalExternalWorkflowExecutionFailed(SignalExternalWorkflowExecutionFailedAttributes),
    ExternalWorkflowExecutionSignaled(ExternalWorkflowExecutionSignaledAttributes),
}

/// Attributes of the first event of every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionStartedAttributes {
    /// Workflow type name.
    pub workflow_type: String,
    /// Task list decisions are dispatched to.
    pub task_list: String,
    /// Workflow input payload.
    pub input: Option<serde_json::Value>,
    /// Bound on the whole workflow chain, in seconds. Zero means unset.
    pub execution_timeout_seconds: i32,
    /// Bound on this run, in seconds. Zero means unset.
    pub run_timeout_seconds: i32,
    /// Bound on a single decision task, in seconds.
    pub task_timeout_seconds: i32,
    /// Namespace id of the parent, when started as a child.
    pub parent_namespace_id: Option<String>,
    /// Parent execution, when started as a child.
    pub parent_execution: Option<WorkflowExecution>,
    /// Event id of the parent's initiated event, when started as a child.
    pub parent_initiated_event_id: Option<i64>,
    /// Run id this run continued from, for continue-as-new chains.
    pub continued_from_run_id: Option<String>,
    /// Cron expression, when the workflow runs on a schedule.
    pub cron_schedule: Option<String>,
    /// Delay before the first decision task, in seconds (cron / retry backoff).
    pub first_decision_backoff_seconds: i32,
    /// Retry policy for the whole chain.
    pub retry_policy: Option<RetryPolicy>,
    /// Initial visibility search attributes.
    pub search_attributes: HashMap<String, serde_json::Value>,
    /// Absolute expiration of the chain in nanoseconds. Zero means none.
    pub expiration_timestamp: i64,
}

/// Attributes of a successful workflow completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCompletedAttributes {
    /// Result payload.
    pub result: Option<serde_json::Value>,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes of a workflow failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionFailedAttributes {
    /// The failure recorded against the run.
    pub failure: Failure,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes of a workflow run timeout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionTimedOutAttributes {
    /// Whether a retry or cron continuation follows.
    pub retry_state: Option<String>,
}

/// Attributes of an operator or service termination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionTerminatedAttributes {
    /// Reason supplied by the terminator.
    pub reason: String,
    /// Optional details payload.
    pub details: Option<serde_json::Value>,
    /// Identity of the caller.
    pub identity: String,
}

/// Attributes of an incoming cancellation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCancelRequestedAttributes {
    /// Reason supplied by the requester.
    pub cause: String,
    /// Identity of the caller.
    pub identity: String,
    /// Initiated event id in the requesting execution, when external.
    pub external_initiated_event_id: Option<i64>,
    /// The requesting execution, when external.
    pub external_execution: Option<WorkflowExecution>,
}

/// Attributes of a confirmed workflow cancellation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionCanceledAttributes {
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Optional details payload.
    pub details: Option<serde_json::Value>,
}

/// Attributes linking a closing run to its continuation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionContinuedAsNewAttributes {
    /// Run id of the continuation.
    pub new_execution_run_id: String,
    /// Workflow type of the continuation.
    pub workflow_type: String,
    /// Task list of the continuation.
    pub task_list: String,
    /// Input handed to the continuation.
    pub input: Option<serde_json::Value>,
    /// Run timeout of the continuation, in seconds.
    pub run_timeout_seconds: i32,
    /// Decision task timeout of the continuation, in seconds.
    pub task_timeout_seconds: i32,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Delay before the continuation's first decision, in seconds.
    pub backoff_start_interval_seconds: i32,
}

/// Attributes of an external signal delivered to the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionSignaledAttributes {
    /// Signal name.
    pub signal_name: String,
    /// Signal payload.
    pub input: Option<serde_json::Value>,
    /// Identity of the sender.
    pub identity: String,
}

/// Attributes of a search-attribute upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertWorkflowSearchAttributesAttributes {
    /// Indexed fields to merge into the execution's search attributes.
    pub search_attributes: HashMap<String, serde_json::Value>,
}

/// Attributes of a side-effect marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecordedAttributes {
    /// Marker name.
    pub marker_name: String,
    /// Marker payload.
    pub details: Option<serde_json::Value>,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes of a scheduled decision task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskScheduledAttributes {
    /// Task list the decision is dispatched to.
    pub task_list: String,
    /// Start-to-close timeout, in seconds.
    pub start_to_close_timeout_seconds: i32,
    /// Attempt counter, starting at 0 for the first attempt.
    pub attempt: i64,
}

/// Attributes of a decision task picked up by a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskStartedAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// Identity of the worker.
    pub identity: String,
    /// Poll request id, for started-event dedup.
    pub request_id: String,
}

/// Attributes of a completed decision task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskCompletedAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Identity of the worker.
    pub identity: String,
    /// Binary checksum of the worker build that completed the task.
    pub binary_checksum: String,
}

/// Attributes of a decision task that ran out of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskTimedOutAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event, if the task ever started.
    pub started_event_id: i64,
    /// Which timeout fired.
    pub timeout_kind: TimeoutKind,
}

/// Attributes of a failed decision task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionTaskFailedAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Failure classification supplied by the worker or the service.
    pub cause: String,
    /// Failure detail.
    pub failure: Option<Failure>,
}

/// Attributes of a scheduled activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskScheduledAttributes {
    /// User-chosen activity id, unique among pending activities.
    pub activity_id: String,
    /// Activity type name.
    pub activity_type: String,
    /// Task list the activity is dispatched to.
    pub task_list: String,
    /// Target namespace, when scheduling into another namespace.
    pub namespace: Option<String>,
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
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Retry policy for the activity.
    pub retry_policy: Option<RetryPolicy>,
}

/// Attributes of an activity picked up by a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskStartedAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// Identity of the worker.
    pub identity: String,
    /// Poll request id, for started-event dedup.
    pub request_id: String,
    /// Attempt counter.
    pub attempt: i32,
}

/// Attributes of a completed activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCompletedAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Result payload.
    pub result: Option<serde_json::Value>,
    /// Identity of the worker.
    pub identity: String,
}

/// Attributes of a failed activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskFailedAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Failure detail.
    pub failure: Failure,
    /// Identity of the worker.
    pub identity: String,
}

/// Attributes of a timed-out activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskTimedOutAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event, if the activity ever started.
    pub started_event_id: i64,
    /// Which timeout fired.
    pub timeout_kind: TimeoutKind,
}

/// Attributes recording that cancellation was requested for an activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCancelRequestedAttributes {
    /// The scheduled event of the activity being cancelled.
    pub scheduled_event_id: i64,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes recording that an activity cancel request was invalid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelActivityTaskFailedAttributes {
    /// The scheduled event id named by the bad request.
    pub scheduled_event_id: i64,
    /// Why the request failed.
    pub cause: String,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes of a cancelled activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTaskCanceledAttributes {
    /// The matching scheduled event.
    pub scheduled_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// The cancel-requested event acknowledged by the worker.
    pub latest_cancel_requested_event_id: i64,
    /// Optional details payload.
    pub details: Option<serde_json::Value>,
}

/// Attributes of a started user timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerStartedAttributes {
    /// User-chosen timer id, unique among pending timers.
    pub timer_id: String,
    /// Fire delay, in seconds. Must be positive.
    pub start_to_fire_timeout_seconds: i64,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes of a fired user timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerFiredAttributes {
    /// Timer id.
    pub timer_id: String,
    /// The matching started event.
    pub started_event_id: i64,
}

/// Attributes recording that a timer cancel request was invalid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CancelTimerFailedAttributes {
    /// Timer id named by the bad request.
    pub timer_id: String,
    /// Why the request failed.
    pub cause: String,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
}

/// Attributes of a cancelled user timer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerCanceledAttributes {
    /// Timer id.
    pub timer_id: String,
    /// The matching started event.
    pub started_event_id: i64,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Identity of the caller.
    pub identity: String,
}

/// Attributes of an initiated child workflow start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionInitiatedAttributes {
    /// Target namespace name.
    pub namespace: String,
    /// Child workflow id.
    pub workflow_id: String,
    /// Child workflow type name.
    pub workflow_type: String,
    /// Child task list.
    pub task_list: String,
    /// Child input payload.
    pub input: Option<serde_json::Value>,
    /// Child execution timeout, in seconds.
    pub execution_timeout_seconds: i32,
    /// Child run timeout, in seconds.
    pub run_timeout_seconds: i32,
    /// Child decision task timeout, in seconds.
    pub task_timeout_seconds: i32,
    /// What to do with the child when this run closes.
    pub parent_close_policy: ParentClosePolicy,
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Cron expression for the child.
    pub cron_schedule: Option<String>,
    /// Retry policy for the child.
    pub retry_policy: Option<RetryPolicy>,
}

/// Attributes of a failed child workflow start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartChildWorkflowExecutionFailedAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// Why the start failed.
    pub cause: String,
    /// Target namespace name.
    pub namespace: String,
    /// Child workflow id.
    pub workflow_id: String,
    /// Child workflow type name.
    pub workflow_type: String,
}

/// Attributes recording that a child run began.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionStartedAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The child execution.
    pub execution: WorkflowExecution,
    /// Child workflow type name.
    pub workflow_type: String,
}

/// Attributes of a completed child run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionCompletedAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The child execution.
    pub execution: WorkflowExecution,
    /// Result payload.
    pub result: Option<serde_json::Value>,
}

/// Attributes of a failed child run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionFailedAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The child execution.
    pub execution: WorkflowExecution,
    /// Failure detail.
    pub failure: Failure,
}

/// Attributes of a cancelled child run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionCanceledAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The child execution.
    pub execution: WorkflowExecution,
    /// Optional details payload.
    pub details: Option<serde_json::Value>,
}

/// Attributes of a timed-out child run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionTimedOutAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The child execution.
    pub execution: WorkflowExecution,
    /// Which timeout fired.
    pub timeout_kind: TimeoutKind,
}

/// Attributes of a terminated child run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowExecutionTerminatedAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// The matching started event.
    pub started_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The child execution.
    pub execution: WorkflowExecution,
}

/// Attributes of an initiated cancel request against a peer execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionInitiatedAttributes {
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The execution to cancel.
    pub execution: WorkflowExecution,
    /// Opaque caller token echoed on the acknowledgement.
    pub control: Option<String>,
    /// Restrict the cancel to child executions of this run.
    pub child_workflow_only: bool,
}

/// Attributes of a failed external cancel request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelExternalWorkflowExecutionFailedAttributes {
    /// Decision completion that produced the initiated event.
    pub decision_task_completed_event_id: i64,
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The execution that could not be cancelled.
    pub execution: WorkflowExecution,
    /// Why the request failed.
    pub cause: String,
}

/// Attributes acknowledging that a peer accepted a cancel request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkflowExecutionCancelRequestedAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The execution that accepted the request.
    pub execution: WorkflowExecution,
}

/// Attributes of an initiated signal against a peer execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionInitiatedAttributes {
    /// Decision completion that produced this event.
    pub decision_task_completed_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The execution to signal.
    pub execution: WorkflowExecution,
    /// Signal name.
    pub signal_name: String,
    /// Signal payload.
    pub input: Option<serde_json::Value>,
    /// Opaque caller token echoed on the acknowledgement.
    pub control: Option<String>,
    /// Restrict the signal to child executions of this run.
    pub child_workflow_only: bool,
}

/// Attributes of a failed external signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalExternalWorkflowExecutionFailedAttributes {
    /// Decision completion that produced the initiated event.
    pub decision_task_completed_event_id: i64,
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The execution that could not be signaled.
    pub execution: WorkflowExecution,
    /// Why the signal failed.
    pub cause: String,
}

/// Attributes acknowledging that a peer accepted a signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalWorkflowExecutionSignaledAttributes {
    /// The matching initiated event.
    pub initiated_event_id: i64,
    /// Target namespace name.
    pub namespace: String,
    /// The execution that accepted the signal.
    pub execution: WorkflowExecution,
    /// Opaque caller token from the initiated event.
    pub control: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::EnumCount;

    // If you see this failure you are adding a new event kind. Before
    // updating the number, make sure StateBuilder::apply_events handles the
    // new kind; otherwise cross-cluster replication will not work for it.
    #[test]
    fn event_kind_table_is_closed() {
        assert_eq!(EventType::COUNT, 42);
    }

    #[test]
    fn event_type_matches_attributes() {
        let event = HistoryEvent {
            event_id: 1,
            version: 0,
            timestamp: 0,
            attributes: EventAttributes::WorkflowExecutionStarted(Default::default()),
        };
        assert_eq!(event.event_type(), EventType::WorkflowExecutionStarted);
    }

    #[test]
    fn events_round_trip_through_serde() {
        let event = HistoryEvent {
            event_id: 6,
            version: 12,
            timestamp: 1_700_000_000_000_000_000,
            attributes: EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
                activity_id: "activity-6".to_string(),
                activity_type: "charge-card".to_string(),
                task_list: "payments".to_string(),
                schedule_to_close_timeout_seconds: 10,
                schedule_to_start_timeout_seconds: 5,
                start_to_close_timeout_seconds: 8,
                heartbeat_timeout_seconds: 3,
                decision_task_completed_event_id: 5,
                ..Default::default()
            }),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: HistoryEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }
}
