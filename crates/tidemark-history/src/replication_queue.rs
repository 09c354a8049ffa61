// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Namespace replication queue with per-cluster acks and a DLQ.
//!
//! A durable append log carrying namespace changes between clusters.
//! Message ids strictly increase, every peer tracks its own ack level, and
//! messages that fail past policy land in the dead-letter queue with its own
//! cursor. A background flusher periodically deletes messages every peer has
//! acknowledged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tidemark_protocol::error::ServiceResult;
use tidemark_protocol::replication::{NamespaceReplicationTask, ReplicationMessage};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::retry::{is_ingest_transient, retry, RetryPolicy};
use crate::store::{QueueKind, ReplicationMessagePage, ReplicationQueueStore};

/// Consumer key tracking the DLQ cursor.
const DLQ_CONSUMER: &str = "dlq";

/// The namespace replication queue.
pub struct NamespaceReplicationQueue {
    store: Arc<dyn ReplicationQueueStore>,
    ack_interval: Duration,
    shutdown: Arc<Notify>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl NamespaceReplicationQueue {
    /// Create a queue over the given store.
    pub fn new(store: Arc<dyn ReplicationQueueStore>, ack_interval: Duration) -> Self {
        Self {
            store,
            ack_interval,
            shutdown: Arc::new(Notify::new()),
            flusher: Mutex::new(None),
        }
    }

    /// Append a task to the main log. All publish errors are treated as
    /// transient and retried until the policy budget expires.
    pub async fn publish(&self, task: NamespaceReplicationTask) -> ServiceResult<()> {
        retry(RetryPolicy::ingest(), is_ingest_transient, || {
            let task = task.clone();
            async move { self.store.enqueue(QueueKind::Replication, task).await }
        })
        .await
        .map(|_| ())
    }

    /// Append a task to the dead-letter log.
    pub async fn publish_to_dlq(&self, task: NamespaceReplicationTask) -> ServiceResult<()> {
        retry(RetryPolicy::ingest(), is_ingest_transient, || {
            let task = task.clone();
            async move { self.store.enqueue(QueueKind::ReplicationDlq, task).await }
        })
        .await
        .map(|_| ())
    }

    /// Read up to `max_count` messages after `last_message_id`. Returns the
    /// messages (a contiguous id-ordered suffix) and the id to resume from.
    pub async fn get_replication_messages(
        &self,
        last_message_id: i64,
        max_count: usize,
    ) -> ServiceResult<(Vec<ReplicationMessage>, i64)> {
        let messages = self
            .store
            .read(QueueKind::Replication, last_message_id, max_count)
            .await?;
        let next_last = messages.last().map_or(last_message_id, |message| message.id);
        Ok((messages, next_last))
    }

    /// Raise a peer cluster's ack level.
    pub async fn update_ack_level(
        &self,
        last_processed_message_id: i64,
        cluster_name: &str,
    ) -> ServiceResult<()> {
        self.store
            .update_ack_level(QueueKind::Replication, last_processed_message_id, cluster_name)
            .await
    }

    /// All peer ack levels for the main log.
    pub async fn get_ack_levels(&self) -> ServiceResult<HashMap<String, i64>> {
        self.store.ack_levels(QueueKind::Replication).await
    }

    /// Read a page of DLQ messages in `[first, last]`.
    pub async fn get_messages_from_dlq(
        &self,
        first_message_id: i64,
        last_message_id: i64,
        page_size: usize,
        page_token: Option<i64>,
    ) -> ServiceResult<ReplicationMessagePage> {
        self.store
            .read_range(
                QueueKind::ReplicationDlq,
                first_message_id,
                last_message_id,
                page_size,
                page_token,
            )
            .await
    }

    /// Raise the DLQ cursor.
    pub async fn update_dlq_ack_level(&self, last_processed_message_id: i64) -> ServiceResult<()> {
        self.store
            .update_ack_level(
                QueueKind::ReplicationDlq,
                last_processed_message_id,
                DLQ_CONSUMER,
            )
            .await
    }

    /// The DLQ cursor.
    pub async fn get_dlq_ack_level(&self) -> ServiceResult<i64> {
        Ok(self
            .store
            .ack_levels(QueueKind::ReplicationDlq)
            .await?
            .get(DLQ_CONSUMER)
            .copied()
            .unwrap_or(0))
    }

    /// Delete one DLQ message.
    pub async fn delete_message_from_dlq(&self, message_id: i64) -> ServiceResult<()> {
        self.store
            .delete_message(QueueKind::ReplicationDlq, message_id)
            .await
    }

    /// Delete every DLQ message with an id in `[first, last]`.
    pub async fn range_delete_messages_from_dlq(
        &self,
        first_message_id: i64,
        last_message_id: i64,
    ) -> ServiceResult<()> {
        self.store
            .range_delete(QueueKind::ReplicationDlq, first_message_id, last_message_id)
            .await
    }

    /// Start the background ack flusher. Idempotent.
    pub async fn start(&self) {
        let mut flusher = self.flusher.lock().await;
        if flusher.is_some() {
            return;
        }
        let store = self.store.clone();
        let ack_interval = self.ack_interval;
        let shutdown = self.shutdown.clone();
        *flusher = Some(tokio::spawn(async move {
            info!("namespace replication queue ack flusher started");
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("namespace replication queue ack flusher stopped");
                        break;
                    }
                    _ = tokio::time::sleep(ack_interval) => {
                        if let Err(err) = purge_acked_messages(store.as_ref()).await {
                            error!(error = %err, "failed to purge acked replication messages");
                        }
                    }
                }
            }
        }));
    }

    /// Stop the flusher and wait for it to exit.
    pub async fn stop(&self) {
        let handle = self.flusher.lock().await.take();
        if let Some(handle) = handle {
            // notify_one leaves a permit, so a flusher that is mid-purge
            // still observes the shutdown on its next select.
            self.shutdown.notify_one();
            let _ = handle.await;
        }
    }
}

/// Delete messages every peer has acknowledged.
async fn purge_acked_messages(store: &dyn ReplicationQueueStore) -> ServiceResult<()> {
    let levels = store.ack_levels(QueueKind::Replication).await?;
    let Some(min_ack) = levels.values().copied().min() else {
        return Ok(());
    };
    if min_ack <= 0 {
        return Ok(());
    }
    debug!(min_ack, "purging acknowledged replication messages");
    store.range_delete(QueueKind::Replication, 0, min_ack).await
}

impl Drop for NamespaceReplicationQueue {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}
