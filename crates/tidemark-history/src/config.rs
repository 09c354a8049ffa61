// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Engine configuration.

use std::time::Duration;

/// Task-list names starting with this prefix are reserved for system use.
pub const RESERVED_TASK_LIST_PREFIX: &str = "/__temporal_sys/";

/// Failure reason recorded when history size or count exceeds the limit.
pub const FAILURE_REASON_SIZE_EXCEEDS_LIMIT: &str = "Workflow history size / count exceeds limit.";

/// Failure reason recorded when a single event payload exceeds the limit.
pub const FAILURE_REASON_BLOB_EXCEEDS_LIMIT: &str = "Blob data size exceeds limit.";

/// History engine configuration.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Number of history shards. Must match across the cluster.
    pub shard_count: u32,
    /// Name of the local cluster.
    pub cluster_name: String,
    /// Workers per shard draining the transfer queue.
    pub transfer_worker_count: usize,
    /// Transfer queue poll interval when the queue is idle.
    pub transfer_poll_interval: Duration,
    /// Transfer queue read batch size.
    pub transfer_batch_size: usize,
    /// Replication queue ack-flush interval.
    pub replication_ack_interval: Duration,

    /// Uniform length cap for user-supplied identifiers.
    pub max_id_length: usize,
    /// Payload size that triggers a warning log, in bytes.
    pub blob_size_warn: usize,
    /// Payload size that fails the workflow, in bytes.
    pub blob_size_error: usize,
    /// History byte size that triggers a warning log.
    pub history_size_warn: usize,
    /// History byte size that fails the workflow.
    pub history_size_error: usize,
    /// History event count that triggers a warning log.
    pub history_count_warn: usize,
    /// History event count that fails the workflow.
    pub history_count_error: usize,

    /// Maximum number of search attribute keys per execution.
    pub search_attributes_key_limit: usize,
    /// Maximum encoded size of one search attribute value, in bytes.
    pub search_attributes_value_limit: usize,
    /// Maximum cumulative encoded size of all search attributes, in bytes.
    pub search_attributes_total_limit: usize,

    /// Pending children at or below this count have their parent-close
    /// policy applied inline; larger fan-outs go to the worker pool.
    pub parent_close_policy_inline_limit: usize,

    /// Whether closed executions are enqueued for history archival.
    pub archival_enabled: bool,

    /// Long-poll calls below this deadline are rejected.
    pub min_long_poll_timeout: Duration,
    /// Long-poll calls below this deadline log a warning.
    pub critical_long_poll_timeout: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            shard_count: 4,
            cluster_name: "active".to_string(),
            transfer_worker_count: 10,
            transfer_poll_interval: Duration::from_millis(100),
            transfer_batch_size: 100,
            replication_ack_interval: Duration::from_secs(30),

            max_id_length: 1000,
            blob_size_warn: 512 * 1024,
            blob_size_error: 2 * 1024 * 1024,
            history_size_warn: 10 * 1024 * 1024,
            history_size_error: 50 * 1024 * 1024,
            history_count_warn: 10 * 1024,
            history_count_error: 50 * 1024,

            search_attributes_key_limit: 100,
            search_attributes_value_limit: 2 * 1024,
            search_attributes_total_limit: 40 * 1024,

            parent_close_policy_inline_limit: 10,

            archival_enabled: false,

            min_long_poll_timeout: Duration::from_secs(1),
            critical_long_poll_timeout: Duration::from_secs(20),
        }
    }
}

impl HistoryConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// Recognized variables:
    /// - `TIDEMARK_SHARD_COUNT`: number of history shards
    /// - `TIDEMARK_CLUSTER_NAME`: local cluster name
    /// - `TIDEMARK_TRANSFER_WORKERS`: transfer queue worker pool size
    /// - `TIDEMARK_HISTORY_COUNT_ERROR`: event count that fails a workflow
    /// - `TIDEMARK_HISTORY_SIZE_ERROR`: history byte size that fails a workflow
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("TIDEMARK_SHARD_COUNT") {
            config.shard_count = value.parse().map_err(|_| {
                ConfigError::Invalid("TIDEMARK_SHARD_COUNT", "must be a positive integer")
            })?;
            if config.shard_count == 0 {
                return Err(ConfigError::Invalid(
                    "TIDEMARK_SHARD_COUNT",
                    "must be a positive integer",
                ));
            }
        }

        if let Ok(value) = std::env::var("TIDEMARK_CLUSTER_NAME") {
            if value.is_empty() {
                return Err(ConfigError::Invalid(
                    "TIDEMARK_CLUSTER_NAME",
                    "must not be empty",
                ));
            }
            config.cluster_name = value;
        }

        if let Ok(value) = std::env::var("TIDEMARK_TRANSFER_WORKERS") {
            config.transfer_worker_count = value.parse().map_err(|_| {
                ConfigError::Invalid("TIDEMARK_TRANSFER_WORKERS", "must be a positive integer")
            })?;
        }

        if let Ok(value) = std::env::var("TIDEMARK_HISTORY_COUNT_ERROR") {
            config.history_count_error = value.parse().map_err(|_| {
                ConfigError::Invalid("TIDEMARK_HISTORY_COUNT_ERROR", "must be a positive integer")
            })?;
        }

        if let Ok(value) = std::env::var("TIDEMARK_HISTORY_SIZE_ERROR") {
            config.history_size_error = value.parse().map_err(|_| {
                ConfigError::Invalid("TIDEMARK_HISTORY_SIZE_ERROR", "must be a positive integer")
            })?;
        }

        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
