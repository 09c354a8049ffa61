// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service error taxonomy.
//!
//! Every cross-component operation returns one of these kinds. Retry
//! decisions downstream are driven by the kind, never by type identity of a
//! wrapped error.

use serde::{Deserialize, Serialize};

/// Result type using [`ServiceError`].
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Errors that cross service boundaries inside the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// Caller-supplied data violates a precondition. Never retried.
    #[error("{0}")]
    InvalidArgument(String),

    /// The target execution or namespace does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A run with this workflow id and request id already exists.
    #[error("workflow execution already started: {workflow_id}")]
    WorkflowExecutionAlreadyStarted {
        /// Workflow id of the existing run.
        workflow_id: String,
        /// Run id of the existing run.
        run_id: String,
        /// Start request id recorded by the existing run.
        start_request_id: String,
    },

    /// Cancellation for this request id was already recorded.
    #[error("cancellation already requested")]
    CancellationAlreadyRequested,

    /// The local cluster is not authoritative for the namespace.
    #[error("namespace {namespace} is active in cluster {active_cluster}")]
    NamespaceNotActive {
        /// Namespace name.
        namespace: String,
        /// Cluster that currently owns writes for it.
        active_cluster: String,
    },

    /// The shard was revoked from this process. In-flight work must abort.
    #[error("shard {0} ownership lost")]
    ShardOwnershipLost(u32),

    /// Backpressure from a downstream dependency.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// The dependency is temporarily unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The call ran out of deadline.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A long-poll call was issued with a deadline below the minimum.
    #[error("Context timeout is too short.")]
    ContextTimeoutTooShort,

    /// A long-poll call was issued without a deadline.
    #[error("Context timeout is not set.")]
    ContextTimeoutNotSet,
}

impl ServiceError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::WorkflowExecutionAlreadyStarted { .. } => "ALREADY_STARTED",
            Self::CancellationAlreadyRequested => "CANCELLATION_ALREADY_REQUESTED",
            Self::NamespaceNotActive { .. } => "NAMESPACE_NOT_ACTIVE",
            Self::ShardOwnershipLost(_) => "SHARD_OWNERSHIP_LOST",
            Self::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            Self::Internal(_) => "INTERNAL",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::ContextTimeoutTooShort => "CONTEXT_TIMEOUT_TOO_SHORT",
            Self::ContextTimeoutNotSet => "CONTEXT_TIMEOUT_NOT_SET",
        }
    }

    /// Shorthand for an [`ServiceError::InvalidArgument`] with a message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for a [`ServiceError::NotFound`] with a message.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Shorthand for a [`ServiceError::Internal`] with a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
