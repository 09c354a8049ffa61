// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Namespace replication queue messages.

use serde::{Deserialize, Serialize};

use crate::namespace::Namespace;

/// A message in the namespace replication queue.
///
/// Message ids are assigned by the queue and strictly increase; consumers
/// track their position with per-cluster ack levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationMessage {
    /// Queue-assigned position, strictly increasing.
    pub id: i64,
    /// The replication payload.
    pub task: NamespaceReplicationTask,
}

/// A namespace change shipped between clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceReplicationTask {
    /// Whether the namespace is being created or updated.
    pub operation: NamespaceOperation,
    /// Snapshot of the namespace record after the change.
    pub namespace: Namespace,
}

/// Operation carried by a namespace replication task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceOperation {
    /// The namespace was registered.
    Create,
    /// The namespace record was updated (config, failover, rename).
    Update,
}
