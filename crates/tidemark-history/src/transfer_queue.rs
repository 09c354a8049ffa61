// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The per-shard transfer queue processor.
//!
//! Polls the shard's transfer queue, fans tasks out to a bounded worker
//! pool, and deletes each task once its effect has been acknowledged. A
//! task that keeps failing stays in the queue and is retried on later
//! polls; losing shard ownership drains the processor.

use std::sync::Arc;
use std::time::Duration;

use tidemark_protocol::error::ServiceError;
use tidemark_protocol::task::TransferTask;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::retry::{is_whitelist_transient, retry, RetryPolicy};
use crate::shard::ShardContext;
use crate::transfer_executor::TransferTaskExecutor;

/// Background processor draining one shard's transfer queue.
pub struct TransferQueueProcessor {
    shard: Arc<ShardContext>,
    executor: Arc<TransferTaskExecutor>,
    shutdown: Arc<Notify>,
    workers: Arc<Semaphore>,
    poll_interval: Duration,
    batch_size: usize,
}

impl TransferQueueProcessor {
    /// Create a processor for the shard the executor serves.
    pub fn new(shard: Arc<ShardContext>, executor: Arc<TransferTaskExecutor>) -> Self {
        let worker_count = shard.config.transfer_worker_count.max(1);
        let poll_interval = shard.config.transfer_poll_interval;
        let batch_size = shard.config.transfer_batch_size;
        Self {
            shard,
            executor,
            shutdown: Arc::new(Notify::new()),
            workers: Arc::new(Semaphore::new(worker_count)),
            poll_interval,
            batch_size,
        }
    }

    /// Handle used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the poll loop until shutdown or shard loss.
    pub async fn run(self) {
        info!(
            shard_id = self.shard.shard_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "transfer queue processor started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!(shard_id = self.shard.shard_id, "transfer queue processor shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    match self.process_batch().await {
                        Ok(()) => {}
                        Err(ServiceError::ShardOwnershipLost(shard_id)) => {
                            info!(shard_id, "shard ownership lost, draining transfer queue processor");
                            break;
                        }
                        Err(err) => {
                            error!(shard_id = self.shard.shard_id, error = %err, "transfer queue poll failed");
                        }
                    }
                }
            }
        }
    }

    /// Read one batch and process every task concurrently, bounded by the
    /// worker pool.
    pub async fn process_batch(&self) -> Result<(), ServiceError> {
        self.shard.assert_owned()?;

        let tasks = self
            .shard
            .execution_store
            .get_transfer_tasks(self.shard.shard_id, 0, self.batch_size)
            .await?;
        if tasks.is_empty() {
            return Ok(());
        }
        debug!(
            shard_id = self.shard.shard_id,
            count = tasks.len(),
            "processing transfer tasks"
        );

        let mut join_set = JoinSet::new();
        for task in tasks {
            let permit = self
                .workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ServiceError::internal("worker pool closed"))?;
            let shard = self.shard.clone();
            let executor = self.executor.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let result = process_one(&shard, &executor, &task).await;
                (task, result)
            });
        }

        let mut shard_lost = None;
        while let Some(joined) = join_set.join_next().await {
            let Ok((task, result)) = joined else {
                error!(shard_id = self.shard.shard_id, "transfer worker panicked");
                continue;
            };
            match result {
                Ok(()) => {}
                Err(ServiceError::ShardOwnershipLost(shard_id)) => {
                    shard_lost = Some(shard_id);
                }
                Err(err) => {
                    // The task stays queued and is retried on a later poll.
                    warn!(
                        shard_id = self.shard.shard_id,
                        task_id = task.task_id,
                        task_kind = task.kind.name(),
                        error = %err,
                        "transfer task failed, leaving in queue"
                    );
                }
            }
        }

        match shard_lost {
            Some(shard_id) => Err(ServiceError::ShardOwnershipLost(shard_id)),
            None => Ok(()),
        }
    }
}

/// Execute one task under the retry policy, completing it on success or on
/// a permanent (non-retryable) outcome.
async fn process_one(
    shard: &Arc<ShardContext>,
    executor: &Arc<TransferTaskExecutor>,
    task: &TransferTask,
) -> Result<(), ServiceError> {
    let result = retry(RetryPolicy::history_service(), is_whitelist_transient, || {
        executor.execute(task, true)
    })
    .await;

    match result {
        Ok(()) => {
            shard
                .execution_store
                .complete_transfer_task(shard.shard_id, task.task_id)
                .await
        }
        Err(ServiceError::ShardOwnershipLost(shard_id)) => {
            Err(ServiceError::ShardOwnershipLost(shard_id))
        }
        Err(err) if crate::retry::is_service_non_retryable(&err) => {
            // A permanently failing effect cannot succeed later; drop the
            // task rather than poison the queue.
            warn!(
                task_id = task.task_id,
                task_kind = task.kind.name(),
                error = %err,
                "transfer task permanently failed, completing"
            );
            shard
                .execution_store
                .complete_transfer_task(shard.shard_id, task.task_id)
                .await
        }
        Err(err) => Err(err),
    }
}
