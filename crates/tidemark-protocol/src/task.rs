// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer and timer task payloads.
//!
//! A transfer task is a queued work item representing exactly one outbound
//! effect of a committed history event. Tasks are persisted atomically with
//! the events that produced them and deleted only after the effect has been
//! acknowledged, so every effect is at-least-once; the executor deduplicates
//! through the stable request ids stored on the corresponding pending entry.

use serde::{Deserialize, Serialize};

/// A queued outbound effect, keyed by `(shard_id, task_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTask {
    /// Shard the owning execution maps to.
    pub shard_id: u32,
    /// Queue position, assigned by the shard at persist time.
    pub task_id: i64,
    /// Namespace id of the owning execution.
    pub namespace_id: String,
    /// Workflow id of the owning execution.
    pub workflow_id: String,
    /// Run id of the owning execution.
    pub run_id: String,
    /// Failover version of the generating event.
    pub version: i64,
    /// Event id of the state entry this task refers to. Zero when the task
    /// is not tied to a single entry (close, visibility records).
    pub schedule_id: i64,
    /// Timestamp of the generating event, in nanoseconds.
    pub visibility_time: i64,
    /// The effect to perform.
    pub kind: TransferTaskKind,
}

/// The eight outbound effects a transfer task can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferTaskKind {
    /// Dispatch a scheduled activity to the matching service.
    ActivityTask {
        /// Namespace the activity executes in.
        target_namespace_id: String,
        /// Task list to dispatch to.
        task_list: String,
    },
    /// Dispatch a scheduled decision to the matching service.
    DecisionTask {
        /// Task list to dispatch to.
        task_list: String,
    },
    /// Record closure in visibility, notify the parent, apply parent-close
    /// policies to children, and enqueue archival.
    CloseExecution,
    /// Deliver a cancellation request to a peer execution.
    CancelExecution {
        /// Namespace id of the target.
        target_namespace_id: String,
        /// Workflow id of the target.
        target_workflow_id: String,
        /// Run id of the target; empty targets the current run.
        target_run_id: String,
        /// Only cancel if the target is a child of the source run.
        target_child_workflow_only: bool,
        /// Initiated event id in the source run.
        initiated_event_id: i64,
    },
    /// Deliver a signal to a peer execution.
    SignalExecution {
        /// Namespace id of the target.
        target_namespace_id: String,
        /// Workflow id of the target.
        target_workflow_id: String,
        /// Run id of the target; empty targets the current run.
        target_run_id: String,
        /// Only signal if the target is a child of the source run.
        target_child_workflow_only: bool,
        /// Initiated event id in the source run.
        initiated_event_id: i64,
    },
    /// Start a child workflow execution.
    StartChildExecution {
        /// Namespace id of the child.
        target_namespace_id: String,
        /// Workflow id of the child.
        target_workflow_id: String,
        /// Initiated event id in the parent run.
        initiated_event_id: i64,
    },
    /// Record the execution as started in the visibility store.
    RecordWorkflowStarted,
    /// Push updated search attributes to the visibility store.
    UpsertSearchAttributes,
}

impl TransferTaskKind {
    /// Short name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ActivityTask { .. } => "activity",
            Self::DecisionTask { .. } => "decision",
            Self::CloseExecution => "close_execution",
            Self::CancelExecution { .. } => "cancel_execution",
            Self::SignalExecution { .. } => "signal_execution",
            Self::StartChildExecution { .. } => "start_child_execution",
            Self::RecordWorkflowStarted => "record_workflow_started",
            Self::UpsertSearchAttributes => "upsert_search_attributes",
        }
    }
}

/// A queued timer, keyed by `(shard_id, visibility_time, task_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTask {
    /// Shard the owning execution maps to.
    pub shard_id: u32,
    /// Queue position within the visibility instant.
    pub task_id: i64,
    /// Namespace id of the owning execution.
    pub namespace_id: String,
    /// Workflow id of the owning execution.
    pub workflow_id: String,
    /// Run id of the owning execution.
    pub run_id: String,
    /// Failover version of the generating event.
    pub version: i64,
    /// When the timer becomes due, in nanoseconds.
    pub visibility_time: i64,
    /// What the timer drives.
    pub kind: TimerTaskKind,
}

/// The timer flavors the engine schedules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimerTaskKind {
    /// Activity schedule/start/close/heartbeat timeout sweep.
    ActivityTimeout,
    /// User timer fire sweep.
    UserTimer,
    /// Start-to-close timeout of a started decision task.
    DecisionTimeout,
    /// First decision of a cron or retry-backoff run.
    DelayedDecision,
    /// Run timeout of the whole execution.
    WorkflowTimeout,
}
