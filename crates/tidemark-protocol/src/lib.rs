// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tidemark Protocol - shared data types for the history engine
//!
//! This crate defines the data that crosses component boundaries inside the
//! Tidemark durable-workflow platform:
//!
//! - history events: the append-only record of everything a workflow
//!   execution ever did, as a closed sum type ([`events`])
//! - decision attributes: the commands a workflow emits when it completes a
//!   decision task, before validation and default-filling ([`decisions`])
//! - transfer and timer tasks: queued work items that turn committed events
//!   into outbound effects ([`task`])
//! - namespace records and their cross-cluster replication messages
//!   ([`namespace`], [`replication`])
//! - the service error taxonomy that drives retry classification ([`error`])
//!
//! Everything here is plain data with `serde` support. Transport and
//! persistence are supplied by the surrounding services; this crate has no
//! I/O of its own.

#![deny(missing_docs)]

/// Decision attribute blocks emitted by workflow code.
pub mod decisions;

/// Service error taxonomy with stable error codes.
pub mod error;

/// History events and the closed event-kind table.
pub mod events;

/// Namespace records and replication configuration.
pub mod namespace;

/// Namespace replication queue messages.
pub mod replication;

/// Transfer and timer task payloads.
pub mod task;

pub use error::{ServiceError, ServiceResult};
pub use events::{EventAttributes, EventType, HistoryEvent};
pub use namespace::{Namespace, ReplicationConfig};

use serde::{Deserialize, Serialize};

/// A single run of a workflow, addressed by user key plus run UUID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// User-chosen workflow identifier, stable across runs.
    pub workflow_id: String,
    /// Fresh UUID assigned to this run.
    pub run_id: String,
}

impl WorkflowExecution {
    /// Build an execution handle from its two identifiers.
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

/// Retry policy attached to activities and child workflows.
///
/// Zero values mean "unset"; validation lives in the history engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry, in seconds.
    pub initial_interval_seconds: i32,
    /// Multiplier applied to the interval after each attempt.
    pub backoff_coefficient: f64,
    /// Upper bound on the retry interval, in seconds. Zero means unbounded.
    pub maximum_interval_seconds: i32,
    /// Maximum number of attempts. Zero means unlimited.
    pub maximum_attempts: i32,
    /// Error types that short-circuit retrying.
    pub non_retryable_error_types: Vec<String>,
}

/// Structured failure payload recorded in terminal events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// Human-readable failure reason.
    pub message: String,
    /// When true, the failure must not be retried by any layer.
    pub non_retryable: bool,
    /// Optional application-supplied details.
    pub details: Option<serde_json::Value>,
}

impl Failure {
    /// A failure generated by the server rather than workflow code.
    pub fn server(message: impl Into<String>, non_retryable: bool) -> Self {
        Self {
            message: message.into(),
            non_retryable,
            details: None,
        }
    }
}

/// Which timeout fired for a timeout-flavored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutKind {
    /// Start-to-close timeout elapsed.
    StartToClose,
    /// Schedule-to-start timeout elapsed.
    ScheduleToStart,
    /// Schedule-to-close timeout elapsed.
    ScheduleToClose,
    /// Heartbeat timeout elapsed.
    Heartbeat,
}

/// What happens to a still-open child when its parent closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentClosePolicy {
    /// Leave the child running.
    Abandon,
    /// Terminate the child.
    #[default]
    Terminate,
    /// Ask the child to cancel.
    RequestCancel,
}
