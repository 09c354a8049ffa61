// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transfer and timer task emission.
//!
//! The state builder asks a task generator to emit queue work for every
//! state transition that needs a downstream effect. Tasks are buffered on
//! the mutable state and persisted atomically with the event batch; shard
//! and task ids are assigned at persist time, so they are zero here.
//!
//! Continue-as-new uses a second generator instance so the continuation's
//! tasks are attributed to the new run.

use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::task::{TimerTask, TimerTaskKind, TransferTask, TransferTaskKind};
use tidemark_protocol::WorkflowExecution;

use crate::mutable_state::MutableState;

/// Emits transfer and timer tasks onto a mutable state's buffers.
pub trait TaskGenerator: Send {
    /// Visibility record for a started execution.
    fn generate_record_workflow_started_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Run-timeout timer for a started execution.
    fn generate_workflow_start_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// First decision of a cron or backoff run.
    fn generate_delayed_decision_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Dispatch of a scheduled decision.
    fn generate_decision_schedule_tasks(
        &mut self,
        state: &mut MutableState,
        schedule_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Start-to-close timeout of a started decision.
    fn generate_decision_start_tasks(
        &mut self,
        state: &mut MutableState,
        schedule_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Dispatch of a scheduled activity.
    fn generate_activity_transfer_tasks(
        &mut self,
        state: &mut MutableState,
        schedule_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Start of an initiated child workflow.
    fn generate_child_workflow_tasks(
        &mut self,
        state: &mut MutableState,
        initiated_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Delivery of an initiated external cancel request. The target is
    /// resolved to a namespace id by the caller.
    fn generate_request_cancel_external_tasks(
        &mut self,
        state: &mut MutableState,
        initiated_id: i64,
        target_namespace_id: &str,
        target: &WorkflowExecution,
        child_workflow_only: bool,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Delivery of an initiated external signal. The target is resolved to
    /// a namespace id by the caller.
    fn generate_signal_external_tasks(
        &mut self,
        state: &mut MutableState,
        initiated_id: i64,
        target_namespace_id: &str,
        target: &WorkflowExecution,
        child_workflow_only: bool,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Close processing for a terminal event.
    fn generate_workflow_close_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Visibility upsert for changed search attributes.
    fn generate_workflow_search_attr_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Refresh of the earliest pending activity timeout. Emitted at the
    /// tail of every applied batch.
    fn generate_activity_timer_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;

    /// Refresh of the earliest pending user timer. Emitted at the tail of
    /// every applied batch.
    fn generate_user_timer_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()>;
}

/// Production task generator.
#[derive(Debug, Default)]
pub struct MutableStateTaskGenerator;

impl MutableStateTaskGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self
    }

    fn base_transfer_task(
        state: &MutableState,
        version: i64,
        schedule_id: i64,
        timestamp: i64,
        kind: TransferTaskKind,
    ) -> TransferTask {
        TransferTask {
            shard_id: 0,
            task_id: 0,
            namespace_id: state.execution_info.namespace_id.clone(),
            workflow_id: state.execution_info.workflow_id.clone(),
            run_id: state.execution_info.run_id.clone(),
            version,
            schedule_id,
            visibility_time: timestamp,
            kind,
        }
    }

    fn base_timer_task(
        state: &MutableState,
        version: i64,
        visibility_time: i64,
        kind: TimerTaskKind,
    ) -> TimerTask {
        TimerTask {
            shard_id: 0,
            task_id: 0,
            namespace_id: state.execution_info.namespace_id.clone(),
            workflow_id: state.execution_info.workflow_id.clone(),
            run_id: state.execution_info.run_id.clone(),
            version,
            visibility_time,
            kind,
        }
    }
}

impl TaskGenerator for MutableStateTaskGenerator {
    fn generate_record_workflow_started_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let version = state.replication.current_version;
        let task = Self::base_transfer_task(
            state,
            version,
            0,
            timestamp,
            TransferTaskKind::RecordWorkflowStarted,
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_workflow_start_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let run_timeout = state.execution_info.run_timeout_seconds;
        if run_timeout <= 0 {
            return Ok(());
        }
        let version = state.replication.current_version;
        let due = timestamp + i64::from(run_timeout) * 1_000_000_000;
        let task = Self::base_timer_task(state, version, due, TimerTaskKind::WorkflowTimeout);
        state.add_timer_task(task);
        Ok(())
    }

    fn generate_delayed_decision_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let backoff = state.execution_info.first_decision_backoff_seconds;
        if backoff <= 0 {
            return Err(ServiceError::internal(
                "delayed decision requested without a backoff interval",
            ));
        }
        let version = state.replication.current_version;
        let due = timestamp + i64::from(backoff) * 1_000_000_000;
        let task = Self::base_timer_task(state, version, due, TimerTaskKind::DelayedDecision);
        state.add_timer_task(task);
        Ok(())
    }

    fn generate_decision_schedule_tasks(
        &mut self,
        state: &mut MutableState,
        schedule_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let decision = state.get_decision(schedule_id).ok_or_else(|| {
            ServiceError::internal(format!("no pending decision for schedule id {schedule_id}"))
        })?;
        let version = decision.version;
        let task_list = decision.task_list.clone();
        let task = Self::base_transfer_task(
            state,
            version,
            schedule_id,
            timestamp,
            TransferTaskKind::DecisionTask { task_list },
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_decision_start_tasks(
        &mut self,
        state: &mut MutableState,
        schedule_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let decision = state.get_decision(schedule_id).ok_or_else(|| {
            ServiceError::internal(format!("no pending decision for schedule id {schedule_id}"))
        })?;
        let version = decision.version;
        let due = timestamp + i64::from(decision.timeout_seconds) * 1_000_000_000;
        let task = Self::base_timer_task(state, version, due, TimerTaskKind::DecisionTimeout);
        state.add_timer_task(task);
        Ok(())
    }

    fn generate_activity_transfer_tasks(
        &mut self,
        state: &mut MutableState,
        schedule_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let activity = state.get_activity(schedule_id).ok_or_else(|| {
            ServiceError::internal(format!("no pending activity for schedule id {schedule_id}"))
        })?;
        let version = activity.version;
        let target_namespace_id = activity
            .target_namespace
            .clone()
            .unwrap_or_else(|| state.execution_info.namespace_id.clone());
        let task_list = activity.task_list.clone();
        let task = Self::base_transfer_task(
            state,
            version,
            schedule_id,
            timestamp,
            TransferTaskKind::ActivityTask {
                target_namespace_id,
                task_list,
            },
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_child_workflow_tasks(
        &mut self,
        state: &mut MutableState,
        initiated_id: i64,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let child = state.get_child_execution(initiated_id).ok_or_else(|| {
            ServiceError::internal(format!("no pending child for initiated id {initiated_id}"))
        })?;
        let version = child.version;
        let kind = TransferTaskKind::StartChildExecution {
            target_namespace_id: child.namespace.clone(),
            target_workflow_id: child.workflow_id.clone(),
            initiated_event_id: initiated_id,
        };
        let task = Self::base_transfer_task(state, version, initiated_id, timestamp, kind);
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_request_cancel_external_tasks(
        &mut self,
        state: &mut MutableState,
        initiated_id: i64,
        target_namespace_id: &str,
        target: &WorkflowExecution,
        child_workflow_only: bool,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let cancel = state.get_request_cancel(initiated_id).ok_or_else(|| {
            ServiceError::internal(format!(
                "no pending cancel request for initiated id {initiated_id}"
            ))
        })?;
        let version = cancel.version;
        let task = Self::base_transfer_task(
            state,
            version,
            initiated_id,
            timestamp,
            TransferTaskKind::CancelExecution {
                target_namespace_id: target_namespace_id.to_string(),
                target_workflow_id: target.workflow_id.clone(),
                target_run_id: target.run_id.clone(),
                target_child_workflow_only: child_workflow_only,
                initiated_event_id: initiated_id,
            },
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_signal_external_tasks(
        &mut self,
        state: &mut MutableState,
        initiated_id: i64,
        target_namespace_id: &str,
        target: &WorkflowExecution,
        child_workflow_only: bool,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let signal = state.get_signal(initiated_id).ok_or_else(|| {
            ServiceError::internal(format!("no pending signal for initiated id {initiated_id}"))
        })?;
        let version = signal.version;
        let task = Self::base_transfer_task(
            state,
            version,
            initiated_id,
            timestamp,
            TransferTaskKind::SignalExecution {
                target_namespace_id: target_namespace_id.to_string(),
                target_workflow_id: target.workflow_id.clone(),
                target_run_id: target.run_id.clone(),
                target_child_workflow_only: child_workflow_only,
                initiated_event_id: initiated_id,
            },
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_workflow_close_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let version = state.replication.current_version;
        let task = Self::base_transfer_task(
            state,
            version,
            0,
            timestamp,
            TransferTaskKind::CloseExecution,
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_workflow_search_attr_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let version = state.replication.current_version;
        let task = Self::base_transfer_task(
            state,
            version,
            0,
            timestamp,
            TransferTaskKind::UpsertSearchAttributes,
        );
        state.add_transfer_task(task);
        Ok(())
    }

    fn generate_activity_timer_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let earliest = state
            .pending_activities
            .values()
            .map(|activity| {
                let timeout = if activity.started_id == 0 {
                    activity.schedule_to_start_timeout_seconds
                } else {
                    activity.start_to_close_timeout_seconds
                };
                (
                    activity.scheduled_time + i64::from(timeout) * 1_000_000_000,
                    activity.version,
                )
            })
            .min_by_key(|(due, _)| *due);
        if let Some((due, version)) = earliest {
            let due = due.max(timestamp);
            let task = Self::base_timer_task(state, version, due, TimerTaskKind::ActivityTimeout);
            state.add_timer_task(task);
        }
        Ok(())
    }

    fn generate_user_timer_tasks(
        &mut self,
        state: &mut MutableState,
        timestamp: i64,
    ) -> ServiceResult<()> {
        let earliest = state
            .pending_timers
            .values()
            .map(|timer| (timer.expiry_time, timer.version))
            .min_by_key(|(due, _)| *due);
        if let Some((due, version)) = earliest {
            let due = due.max(timestamp);
            let task = Self::base_timer_task(state, version, due, TimerTaskKind::UserTimer);
            state.add_timer_task(task);
        }
        Ok(())
    }
}
