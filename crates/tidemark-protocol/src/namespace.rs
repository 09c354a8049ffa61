// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Namespace records.

use serde::{Deserialize, Serialize};

/// Cross-cluster replication configuration of a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Cluster currently authoritative for writes.
    pub active_cluster: String,
    /// All clusters the namespace is replicated to, active one included.
    pub clusters: Vec<String>,
}

/// A namespace record as held by the metadata store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Stable namespace id.
    pub id: String,
    /// Mutable namespace name.
    pub name: String,
    /// Whether the namespace participates in cross-cluster replication.
    pub global: bool,
    /// Replication configuration.
    pub replication: ReplicationConfig,
    /// Failover version, bumped each time the active cluster changes.
    pub failover_version: i64,
    /// Monotone version of the record itself, bumped on every update.
    pub notification_version: i64,
    /// History retention for closed executions, in days.
    pub retention_days: i32,
}

impl Namespace {
    /// A namespace is local when it is not global, or global with a single
    /// cluster in its replication list.
    pub fn is_local(&self) -> bool {
        !self.global || self.replication.clusters.len() == 1
    }

    /// The cluster currently authoritative for this namespace's writes.
    pub fn active_cluster(&self) -> &str {
        &self.replication.active_cluster
    }

    /// Whether the given cluster is authoritative for this namespace.
    pub fn is_active_in(&self, cluster: &str) -> bool {
        !self.global || self.replication.active_cluster == cluster
    }
}
