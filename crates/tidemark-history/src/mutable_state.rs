// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The per-execution mutable-state projection.
//!
//! Mutable state is the derived, cached view of one run's history: execution
//! info, the pending activity/timer/child/cancel/signal tables, the pending
//! decision, and replication bookkeeping. It is created by the run's started
//! event, mutated only by events applied under shard ownership, and can
//! always be rebuilt from the event log.
//!
//! The `replicate_*` methods mirror event kinds one-to-one. They tolerate
//! duplicate terminal events (a replayed batch may carry them) by treating a
//! missing pending entry as a no-op.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::events::*;
use tidemark_protocol::task::{TimerTask, TransferTask};
use tidemark_protocol::{Failure, ParentClosePolicy, WorkflowExecution};

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    /// Created but no decision completed yet.
    Created,
    /// Open and progressing.
    Running,
    /// Reached a terminal event.
    Closed,
}

/// How a closed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseStatus {
    /// Completed successfully.
    Completed,
    /// Failed with a recorded failure.
    Failed,
    /// Cancelled after a cancel request.
    Canceled,
    /// Terminated by an operator or service.
    Terminated,
    /// Ran out of its run timeout.
    TimedOut,
    /// Closed in favor of a continuation run.
    ContinuedAsNew,
}

/// Execution-level fields of the mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInfo {
    /// Namespace id of the run.
    pub namespace_id: String,
    /// Workflow id of the run.
    pub workflow_id: String,
    /// Run id.
    pub run_id: String,
    /// Workflow type name.
    pub workflow_type: String,
    /// Task list decisions are dispatched to.
    pub task_list: String,
    /// Execution (chain) timeout, in seconds.
    pub execution_timeout_seconds: i32,
    /// Run timeout, in seconds.
    pub run_timeout_seconds: i32,
    /// Decision task timeout, in seconds.
    pub task_timeout_seconds: i32,
    /// Sticky task list; empty when no sticky affinity is set.
    pub sticky_task_list: String,
    /// Schedule-to-start timeout used for sticky dispatch, in seconds.
    pub sticky_schedule_to_start_timeout_seconds: i32,
    /// Namespace id of the parent, when started as a child.
    pub parent_namespace_id: Option<String>,
    /// Parent execution, when started as a child.
    pub parent_execution: Option<WorkflowExecution>,
    /// Initiated event id in the parent's history.
    pub parent_initiated_event_id: Option<i64>,
    /// Cron expression, when the workflow runs on a schedule.
    pub cron_schedule: Option<String>,
    /// Absolute expiration of the chain in nanoseconds. Zero means none.
    pub expiration_timestamp: i64,
    /// Start time of the run in nanoseconds.
    pub start_timestamp: i64,
    /// Delay before the first decision, in seconds.
    pub first_decision_backoff_seconds: i32,
    /// Visibility search attributes.
    pub search_attributes: HashMap<String, serde_json::Value>,
    /// Lifecycle state.
    pub state: WorkflowState,
    /// Terminal status, once closed.
    pub close_status: Option<CloseStatus>,
    /// Whether a cancellation request has been recorded against the run.
    pub cancel_requested: bool,
    /// Start request id, deduplicating repeated start calls.
    pub create_request_id: String,
    /// Attempt counter for the pending decision, persisted across transient
    /// decision failures.
    pub decision_attempt: i64,
    /// Number of decision tasks completed over the run's lifetime.
    pub completed_decision_count: i64,
    /// Opaque pointer to the run's history branch.
    pub branch_token: Vec<u8>,
}

/// A pending activity, keyed by its scheduled event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInfo {
    /// Scheduled event id.
    pub schedule_id: i64,
    /// Started event id; zero until a worker picks the activity up.
    pub started_id: i64,
    /// User-chosen activity id.
    pub activity_id: String,
    /// Activity type name.
    pub activity_type: String,
    /// Task list the activity dispatches to.
    pub task_list: String,
    /// Target namespace name, when scheduling across namespaces.
    pub target_namespace: Option<String>,
    /// Schedule-to-close timeout, in seconds.
    pub schedule_to_close_timeout_seconds: i32,
    /// Schedule-to-start timeout, in seconds.
    pub schedule_to_start_timeout_seconds: i32,
    /// Start-to-close timeout, in seconds.
    pub start_to_close_timeout_seconds: i32,
    /// Heartbeat timeout, in seconds.
    pub heartbeat_timeout_seconds: i32,
    /// Scheduled wall-clock time, in nanoseconds.
    pub scheduled_time: i64,
    /// Whether cancellation has been requested.
    pub cancel_requested: bool,
    /// Event id of the cancel request, when requested.
    pub cancel_requested_id: i64,
    /// Attempt counter.
    pub attempt: i32,
    /// Failover version of the scheduling event.
    pub version: i64,
}

/// A pending user timer, keyed by its timer id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerInfo {
    /// Started event id.
    pub started_id: i64,
    /// User-chosen timer id.
    pub timer_id: String,
    /// Absolute fire time, in nanoseconds.
    pub expiry_time: i64,
    /// Failover version of the starting event.
    pub version: i64,
}

/// A pending child execution, keyed by its initiated event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildExecutionInfo {
    /// Initiated event id.
    pub initiated_id: i64,
    /// Started event id; zero until the child run begins.
    pub started_id: i64,
    /// Stable create request id handed to the child start call.
    pub create_request_id: String,
    /// Target namespace name.
    pub namespace: String,
    /// Child workflow id.
    pub workflow_id: String,
    /// Child run id; empty until the child run begins.
    pub run_id: String,
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
    /// Cron expression for the child.
    pub cron_schedule: Option<String>,
    /// Retry policy for the child.
    pub retry_policy: Option<tidemark_protocol::RetryPolicy>,
    /// What to do with the child when this run closes.
    pub parent_close_policy: ParentClosePolicy,
    /// Failover version of the initiated event.
    pub version: i64,
}

/// A pending external cancel request, keyed by its initiated event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelInfo {
    /// Initiated event id.
    pub initiated_id: i64,
    /// Stable id deduplicating delivery of this cancel request.
    pub cancel_request_id: String,
    /// Failover version of the initiated event.
    pub version: i64,
}

/// A pending external signal, keyed by its initiated event id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInfo {
    /// Initiated event id.
    pub initiated_id: i64,
    /// Stable id deduplicating delivery of this signal.
    pub request_id: String,
    /// Signal name.
    pub signal_name: String,
    /// Signal payload.
    pub input: Option<serde_json::Value>,
    /// Opaque caller token.
    pub control: Option<String>,
    /// Failover version of the initiated event.
    pub version: i64,
}

/// The pending decision task. At most one exists per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInfo {
    /// Scheduled event id.
    pub schedule_id: i64,
    /// Started event id; zero until a worker picks the decision up.
    pub started_id: i64,
    /// Poll request id of the started attempt.
    pub request_id: Option<String>,
    /// Task list the decision dispatches to.
    pub task_list: String,
    /// Start-to-close timeout, in seconds.
    pub timeout_seconds: i32,
    /// Attempt counter, starting at 0.
    pub attempt: i64,
    /// Scheduled wall-clock time, in nanoseconds.
    pub scheduled_time: i64,
    /// Failover version of the scheduling event.
    pub version: i64,
}

/// Cross-cluster version bookkeeping for the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationState {
    /// Highest failover version observed.
    pub current_version: i64,
    /// Version of the last applied event.
    pub last_write_version: i64,
    /// Event id of the last applied event.
    pub last_write_event_id: i64,
    /// Version the run started under.
    pub start_version: i64,
}

/// Byte/count statistics of the persisted history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Total persisted history size, in bytes.
    pub history_size: u64,
}

/// In-memory projection of a single workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutableState {
    /// Execution-level fields.
    pub execution_info: ExecutionInfo,
    /// Next event id to be assigned; always last persisted id + 1.
    pub next_event_id: i64,
    /// Pending activities by scheduled event id.
    pub pending_activities: HashMap<i64, ActivityInfo>,
    /// Activity id to scheduled event id index.
    pub pending_activity_ids: HashMap<String, i64>,
    /// Pending user timers by timer id.
    pub pending_timers: HashMap<String, TimerInfo>,
    /// Started event id to timer id index.
    pub pending_timer_ids: HashMap<i64, String>,
    /// Pending children by initiated event id.
    pub pending_children: HashMap<i64, ChildExecutionInfo>,
    /// Pending external cancel requests by initiated event id.
    pub pending_request_cancels: HashMap<i64, RequestCancelInfo>,
    /// Pending external signals by initiated event id.
    pub pending_signals: HashMap<i64, SignalInfo>,
    /// The pending decision, if any.
    pub pending_decision: Option<DecisionInfo>,
    /// Cross-cluster version bookkeeping.
    pub replication: ReplicationState,
    /// History statistics.
    pub stats: ExecutionStats,

    /// Transfer tasks generated since the last persist.
    #[serde(skip)]
    pub transfer_tasks: Vec<TransferTask>,
    /// Timer tasks generated since the last persist.
    #[serde(skip)]
    pub timer_tasks: Vec<TimerTask>,
}

impl MutableState {
    /// An empty projection for a run that has not seen its started event.
    pub fn new(namespace_id: impl Into<String>, execution: WorkflowExecution) -> Self {
        Self {
            execution_info: ExecutionInfo {
                namespace_id: namespace_id.into(),
                workflow_id: execution.workflow_id,
                run_id: execution.run_id,
                workflow_type: String::new(),
                task_list: String::new(),
                execution_timeout_seconds: 0,
                run_timeout_seconds: 0,
                task_timeout_seconds: 0,
                sticky_task_list: String::new(),
                sticky_schedule_to_start_timeout_seconds: 0,
                parent_namespace_id: None,
                parent_execution: None,
                parent_initiated_event_id: None,
                cron_schedule: None,
                expiration_timestamp: 0,
                start_timestamp: 0,
                first_decision_backoff_seconds: 0,
                search_attributes: HashMap::new(),
                state: WorkflowState::Created,
                close_status: None,
                cancel_requested: false,
                create_request_id: String::new(),
                decision_attempt: 0,
                completed_decision_count: 0,
                branch_token: Vec::new(),
            },
            next_event_id: 1,
            pending_activities: HashMap::new(),
            pending_activity_ids: HashMap::new(),
            pending_timers: HashMap::new(),
            pending_timer_ids: HashMap::new(),
            pending_children: HashMap::new(),
            pending_request_cancels: HashMap::new(),
            pending_signals: HashMap::new(),
            pending_decision: None,
            replication: ReplicationState::default(),
            stats: ExecutionStats::default(),
            transfer_tasks: Vec::new(),
            timer_tasks: Vec::new(),
        }
    }

    /// The execution handle of this state.
    pub fn execution(&self) -> WorkflowExecution {
        WorkflowExecution {
            workflow_id: self.execution_info.workflow_id.clone(),
            run_id: self.execution_info.run_id.clone(),
        }
    }

    /// Whether the run has not reached a terminal event.
    pub fn is_workflow_running(&self) -> bool {
        self.execution_info.state != WorkflowState::Closed
    }

    /// Raise the observed failover version.
    pub fn update_replication_version(&mut self, version: i64) {
        if version > self.replication.current_version {
            self.replication.current_version = version;
        }
    }

    /// Record the last applied event.
    pub fn update_replication_last_event(&mut self, version: i64, event_id: i64) {
        self.replication.last_write_version = version;
        self.replication.last_write_event_id = event_id;
    }

    /// Reject a replicated event that regresses the version at or below the
    /// last applied event id.
    pub fn check_replicated_event(&self, event: &HistoryEvent) -> ServiceResult<()> {
        if event.event_id <= self.replication.last_write_event_id
            && event.version < self.replication.last_write_version
        {
            return Err(ServiceError::invalid_argument(format!(
                "replicated event {} version {} regresses below current version {}",
                event.event_id, event.version, self.replication.last_write_version
            )));
        }
        Ok(())
    }

    /// Drop sticky affinity. Replicated batches always do this, since a
    /// stale worker affinity never survives a failover or replay.
    pub fn clear_stickiness(&mut self) {
        self.execution_info.sticky_task_list.clear();
        self.execution_info.sticky_schedule_to_start_timeout_seconds = 0;
    }

    /// Pin the next decision to the worker that served the previous one.
    /// Only valid while the run is open and a decision has completed.
    pub fn set_sticky_task_list(&mut self, task_list: impl Into<String>, timeout_seconds: i32) {
        self.execution_info.sticky_task_list = task_list.into();
        self.execution_info.sticky_schedule_to_start_timeout_seconds = timeout_seconds;
    }

    /// Buffer a transfer task for the next persist.
    pub fn add_transfer_task(&mut self, task: TransferTask) {
        self.transfer_tasks.push(task);
    }

    /// Buffer a timer task for the next persist.
    pub fn add_timer_task(&mut self, task: TimerTask) {
        self.timer_tasks.push(task);
    }

    /// Take the buffered tasks for persisting alongside the event batch.
    pub fn drain_tasks(&mut self) -> (Vec<TransferTask>, Vec<TimerTask>) {
        (
            std::mem::take(&mut self.transfer_tasks),
            std::mem::take(&mut self.timer_tasks),
        )
    }

    // ------------------------------------------------------------------
    // Workflow lifecycle
    // ------------------------------------------------------------------

    /// Apply the run's started event.
    pub fn replicate_workflow_execution_started_event(
        &mut self,
        request_id: String,
        event: &HistoryEvent,
        attributes: &WorkflowExecutionStartedAttributes,
    ) -> ServiceResult<()> {
        let info = &mut self.execution_info;
        info.workflow_type = attributes.workflow_type.clone();
        info.task_list = attributes.task_list.clone();
        info.execution_timeout_seconds = attributes.execution_timeout_seconds;
        info.run_timeout_seconds = attributes.run_timeout_seconds;
        info.task_timeout_seconds = attributes.task_timeout_seconds;
        info.parent_namespace_id = attributes.parent_namespace_id.clone();
        info.parent_execution = attributes.parent_execution.clone();
        info.parent_initiated_event_id = attributes.parent_initiated_event_id;
        info.cron_schedule = attributes.cron_schedule.clone();
        info.expiration_timestamp = attributes.expiration_timestamp;
        info.start_timestamp = event.timestamp;
        info.first_decision_backoff_seconds = attributes.first_decision_backoff_seconds;
        info.search_attributes = attributes.search_attributes.clone();
        info.state = WorkflowState::Created;
        info.create_request_id = request_id;
        info.branch_token = info.run_id.as_bytes().to_vec();
        self.replication.start_version = event.version;
        Ok(())
    }

    fn close(&mut self, status: CloseStatus) {
        self.execution_info.state = WorkflowState::Closed;
        self.execution_info.close_status = Some(status);
        self.pending_decision = None;
        self.clear_stickiness();
    }

    /// Apply a completion event.
    pub fn replicate_workflow_execution_completed_event(
        &mut self,
        _attributes: &WorkflowExecutionCompletedAttributes,
    ) -> ServiceResult<()> {
        self.close(CloseStatus::Completed);
        Ok(())
    }

    /// Apply a failure event.
    pub fn replicate_workflow_execution_failed_event(
        &mut self,
        _attributes: &WorkflowExecutionFailedAttributes,
    ) -> ServiceResult<()> {
        self.close(CloseStatus::Failed);
        Ok(())
    }

    /// Apply a run timeout event.
    pub fn replicate_workflow_execution_timed_out_event(
        &mut self,
        _attributes: &WorkflowExecutionTimedOutAttributes,
    ) -> ServiceResult<()> {
        self.close(CloseStatus::TimedOut);
        Ok(())
    }

    /// Apply a termination event.
    pub fn replicate_workflow_execution_terminated_event(
        &mut self,
        _attributes: &WorkflowExecutionTerminatedAttributes,
    ) -> ServiceResult<()> {
        self.close(CloseStatus::Terminated);
        Ok(())
    }

    /// Record an incoming cancellation request.
    pub fn replicate_workflow_execution_cancel_requested_event(
        &mut self,
        _attributes: &WorkflowExecutionCancelRequestedAttributes,
    ) -> ServiceResult<()> {
        self.execution_info.cancel_requested = true;
        Ok(())
    }

    /// Apply a confirmed cancellation event.
    pub fn replicate_workflow_execution_canceled_event(
        &mut self,
        _attributes: &WorkflowExecutionCanceledAttributes,
    ) -> ServiceResult<()> {
        self.close(CloseStatus::Canceled);
        Ok(())
    }

    /// Apply a continued-as-new event. The continuation's state is built
    /// separately from the new run's event batch.
    pub fn replicate_workflow_execution_continued_as_new_event(
        &mut self,
        _attributes: &WorkflowExecutionContinuedAsNewAttributes,
    ) -> ServiceResult<()> {
        self.close(CloseStatus::ContinuedAsNew);
        Ok(())
    }

    /// Apply a signal event. Signals only extend history.
    pub fn replicate_workflow_execution_signaled_event(
        &mut self,
        _attributes: &WorkflowExecutionSignaledAttributes,
    ) -> ServiceResult<()> {
        Ok(())
    }

    /// Merge upserted search attributes.
    pub fn replicate_upsert_search_attributes_event(
        &mut self,
        attributes: &UpsertWorkflowSearchAttributesAttributes,
    ) {
        for (key, value) in &attributes.search_attributes {
            self.execution_info
                .search_attributes
                .insert(key.clone(), value.clone());
        }
    }

    // ------------------------------------------------------------------
    // Decision tasks
    // ------------------------------------------------------------------

    /// Append the pending decision.
    pub fn replicate_decision_task_scheduled_event(
        &mut self,
        version: i64,
        schedule_id: i64,
        task_list: &str,
        timeout_seconds: i32,
        attempt: i64,
        scheduled_time: i64,
    ) -> ServiceResult<DecisionInfo> {
        if self.pending_decision.is_some() {
            return Err(ServiceError::internal(format!(
                "decision {} scheduled while another is pending",
                schedule_id
            )));
        }
        let decision = DecisionInfo {
            schedule_id,
            started_id: 0,
            request_id: None,
            task_list: task_list.to_string(),
            timeout_seconds,
            attempt,
            scheduled_time,
            version,
        };
        self.execution_info.decision_attempt = attempt;
        self.pending_decision = Some(decision.clone());
        Ok(decision)
    }

    /// Promote the pending decision to started.
    pub fn replicate_decision_task_started_event(
        &mut self,
        schedule_id: i64,
        started_id: i64,
        request_id: &str,
    ) -> ServiceResult<()> {
        match self.pending_decision.as_mut() {
            Some(decision) if decision.schedule_id == schedule_id => {
                decision.started_id = started_id;
                decision.request_id = Some(request_id.to_string());
                self.execution_info.state = WorkflowState::Running;
                Ok(())
            }
            _ => Err(ServiceError::internal(format!(
                "decision started event for unknown schedule id {}",
                schedule_id
            ))),
        }
    }

    /// Release the pending decision after completion.
    pub fn replicate_decision_task_completed_event(
        &mut self,
        _attributes: &DecisionTaskCompletedAttributes,
    ) -> ServiceResult<()> {
        self.pending_decision = None;
        self.execution_info.decision_attempt = 0;
        self.execution_info.completed_decision_count += 1;
        Ok(())
    }

    /// Release the pending decision after a timeout.
    pub fn replicate_decision_task_timed_out_event(&mut self) -> ServiceResult<()> {
        self.pending_decision = None;
        Ok(())
    }

    /// Release the pending decision after a failure.
    pub fn replicate_decision_task_failed_event(&mut self) -> ServiceResult<()> {
        self.pending_decision = None;
        Ok(())
    }

    /// Schedule the next transient decision attempt. Transient attempts do
    /// not consume history event ids.
    pub fn replicate_transient_decision_task_scheduled(&mut self) -> ServiceResult<DecisionInfo> {
        let attempt = self.execution_info.decision_attempt + 1;
        let decision = DecisionInfo {
            schedule_id: self.next_event_id,
            started_id: 0,
            request_id: None,
            task_list: self.execution_info.task_list.clone(),
            timeout_seconds: self.execution_info.task_timeout_seconds,
            attempt,
            scheduled_time: 0,
            version: self.replication.current_version,
        };
        self.execution_info.decision_attempt = attempt;
        self.pending_decision = Some(decision.clone());
        Ok(decision)
    }

    /// The pending decision, if it matches the given scheduled event id.
    pub fn get_decision(&self, schedule_id: i64) -> Option<&DecisionInfo> {
        self.pending_decision
            .as_ref()
            .filter(|decision| decision.schedule_id == schedule_id)
    }

    // ------------------------------------------------------------------
    // Activities
    // ------------------------------------------------------------------

    /// Add a pending activity.
    pub fn replicate_activity_task_scheduled_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &ActivityTaskScheduledAttributes,
    ) -> ServiceResult<ActivityInfo> {
        let info = ActivityInfo {
            schedule_id: event.event_id,
            started_id: 0,
            activity_id: attributes.activity_id.clone(),
            activity_type: attributes.activity_type.clone(),
            task_list: attributes.task_list.clone(),
            target_namespace: attributes.namespace.clone(),
            schedule_to_close_timeout_seconds: attributes.schedule_to_close_timeout_seconds,
            schedule_to_start_timeout_seconds: attributes.schedule_to_start_timeout_seconds,
            start_to_close_timeout_seconds: attributes.start_to_close_timeout_seconds,
            heartbeat_timeout_seconds: attributes.heartbeat_timeout_seconds,
            scheduled_time: event.timestamp,
            cancel_requested: false,
            cancel_requested_id: 0,
            attempt: 0,
            version: event.version,
        };
        self.pending_activities.insert(event.event_id, info.clone());
        self.pending_activity_ids
            .insert(attributes.activity_id.clone(), event.event_id);
        Ok(info)
    }

    /// Promote a pending activity to started.
    pub fn replicate_activity_task_started_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &ActivityTaskStartedAttributes,
    ) -> ServiceResult<()> {
        match self.pending_activities.get_mut(&attributes.scheduled_event_id) {
            Some(activity) => {
                activity.started_id = event.event_id;
                activity.attempt = attributes.attempt;
                activity.version = event.version;
                Ok(())
            }
            None => Err(ServiceError::internal(format!(
                "activity started event for unknown schedule id {}",
                attributes.scheduled_event_id
            ))),
        }
    }

    fn remove_activity(&mut self, schedule_id: i64) {
        if let Some(activity) = self.pending_activities.remove(&schedule_id) {
            self.pending_activity_ids.remove(&activity.activity_id);
        }
    }

    /// Drop a pending activity after its completion event.
    pub fn replicate_activity_task_completed_event(
        &mut self,
        attributes: &ActivityTaskCompletedAttributes,
    ) -> ServiceResult<()> {
        self.remove_activity(attributes.scheduled_event_id);
        Ok(())
    }

    /// Drop a pending activity after its failure event.
    pub fn replicate_activity_task_failed_event(
        &mut self,
        attributes: &ActivityTaskFailedAttributes,
    ) -> ServiceResult<()> {
        self.remove_activity(attributes.scheduled_event_id);
        Ok(())
    }

    /// Drop a pending activity after its timeout event.
    pub fn replicate_activity_task_timed_out_event(
        &mut self,
        attributes: &ActivityTaskTimedOutAttributes,
    ) -> ServiceResult<()> {
        self.remove_activity(attributes.scheduled_event_id);
        Ok(())
    }

    /// Flag a pending activity as cancel-requested.
    pub fn replicate_activity_task_cancel_requested_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &ActivityTaskCancelRequestedAttributes,
    ) -> ServiceResult<()> {
        if let Some(activity) = self.pending_activities.get_mut(&attributes.scheduled_event_id) {
            activity.cancel_requested = true;
            activity.cancel_requested_id = event.event_id;
        }
        Ok(())
    }

    /// Drop a pending activity after its cancellation event.
    pub fn replicate_activity_task_canceled_event(
        &mut self,
        attributes: &ActivityTaskCanceledAttributes,
    ) -> ServiceResult<()> {
        self.remove_activity(attributes.scheduled_event_id);
        Ok(())
    }

    /// A pending activity by scheduled event id.
    pub fn get_activity(&self, schedule_id: i64) -> Option<&ActivityInfo> {
        self.pending_activities.get(&schedule_id)
    }

    // ------------------------------------------------------------------
    // User timers
    // ------------------------------------------------------------------

    /// Add a pending timer.
    pub fn replicate_timer_started_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &TimerStartedAttributes,
    ) -> ServiceResult<TimerInfo> {
        let expiry =
            event.timestamp + attributes.start_to_fire_timeout_seconds * 1_000_000_000;
        let info = TimerInfo {
            started_id: event.event_id,
            timer_id: attributes.timer_id.clone(),
            expiry_time: expiry,
            version: event.version,
        };
        self.pending_timers
            .insert(attributes.timer_id.clone(), info.clone());
        self.pending_timer_ids
            .insert(event.event_id, attributes.timer_id.clone());
        Ok(info)
    }

    fn remove_timer(&mut self, timer_id: &str) {
        if let Some(timer) = self.pending_timers.remove(timer_id) {
            self.pending_timer_ids.remove(&timer.started_id);
        }
    }

    /// Drop a pending timer after its fired event.
    pub fn replicate_timer_fired_event(
        &mut self,
        attributes: &TimerFiredAttributes,
    ) -> ServiceResult<()> {
        self.remove_timer(&attributes.timer_id);
        Ok(())
    }

    /// Drop a pending timer after its cancellation event.
    pub fn replicate_timer_canceled_event(
        &mut self,
        attributes: &TimerCanceledAttributes,
    ) -> ServiceResult<()> {
        self.remove_timer(&attributes.timer_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Child workflows
    // ------------------------------------------------------------------

    /// Add a pending child.
    pub fn replicate_start_child_workflow_initiated_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &StartChildWorkflowExecutionInitiatedAttributes,
        create_request_id: String,
    ) -> ServiceResult<ChildExecutionInfo> {
        let info = ChildExecutionInfo {
            initiated_id: event.event_id,
            started_id: 0,
            create_request_id,
            namespace: attributes.namespace.clone(),
            workflow_id: attributes.workflow_id.clone(),
            run_id: String::new(),
            workflow_type: attributes.workflow_type.clone(),
            task_list: attributes.task_list.clone(),
            input: attributes.input.clone(),
            execution_timeout_seconds: attributes.execution_timeout_seconds,
            run_timeout_seconds: attributes.run_timeout_seconds,
            task_timeout_seconds: attributes.task_timeout_seconds,
            cron_schedule: attributes.cron_schedule.clone(),
            retry_policy: attributes.retry_policy.clone(),
            parent_close_policy: attributes.parent_close_policy,
            version: event.version,
        };
        self.pending_children.insert(event.event_id, info.clone());
        Ok(info)
    }

    /// Drop a pending child after a failed start.
    pub fn replicate_start_child_workflow_failed_event(
        &mut self,
        attributes: &StartChildWorkflowExecutionFailedAttributes,
    ) -> ServiceResult<()> {
        self.pending_children.remove(&attributes.initiated_event_id);
        Ok(())
    }

    /// Record that a pending child's run began.
    pub fn replicate_child_workflow_execution_started_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &ChildWorkflowExecutionStartedAttributes,
    ) -> ServiceResult<()> {
        match self.pending_children.get_mut(&attributes.initiated_event_id) {
            Some(child) => {
                child.started_id = event.event_id;
                child.run_id = attributes.execution.run_id.clone();
                Ok(())
            }
            None => Err(ServiceError::internal(format!(
                "child started event for unknown initiated id {}",
                attributes.initiated_event_id
            ))),
        }
    }

    /// Drop a pending child after a terminal child event.
    pub fn replicate_child_workflow_terminal_event(&mut self, initiated_event_id: i64) {
        self.pending_children.remove(&initiated_event_id);
    }

    /// A pending child by initiated event id.
    pub fn get_child_execution(&self, initiated_id: i64) -> Option<&ChildExecutionInfo> {
        self.pending_children.get(&initiated_id)
    }

    // ------------------------------------------------------------------
    // External cancels and signals
    // ------------------------------------------------------------------

    /// Add a pending external cancel request.
    pub fn replicate_request_cancel_external_initiated_event(
        &mut self,
        event: &HistoryEvent,
        _attributes: &RequestCancelExternalWorkflowExecutionInitiatedAttributes,
        cancel_request_id: String,
    ) -> ServiceResult<RequestCancelInfo> {
        let info = RequestCancelInfo {
            initiated_id: event.event_id,
            cancel_request_id,
            version: event.version,
        };
        self.pending_request_cancels
            .insert(event.event_id, info.clone());
        Ok(info)
    }

    /// Drop a pending cancel request after its failure event.
    pub fn replicate_request_cancel_external_failed_event(
        &mut self,
        attributes: &RequestCancelExternalWorkflowExecutionFailedAttributes,
    ) -> ServiceResult<()> {
        self.pending_request_cancels
            .remove(&attributes.initiated_event_id);
        Ok(())
    }

    /// Drop a pending cancel request after the peer acknowledged it.
    pub fn replicate_external_workflow_cancel_requested_event(
        &mut self,
        attributes: &ExternalWorkflowExecutionCancelRequestedAttributes,
    ) -> ServiceResult<()> {
        self.pending_request_cancels
            .remove(&attributes.initiated_event_id);
        Ok(())
    }

    /// A pending cancel request by initiated event id.
    pub fn get_request_cancel(&self, initiated_id: i64) -> Option<&RequestCancelInfo> {
        self.pending_request_cancels.get(&initiated_id)
    }

    /// Add a pending external signal.
    pub fn replicate_signal_external_initiated_event(
        &mut self,
        event: &HistoryEvent,
        attributes: &SignalExternalWorkflowExecutionInitiatedAttributes,
        request_id: String,
    ) -> ServiceResult<SignalInfo> {
        let info = SignalInfo {
            initiated_id: event.event_id,
            request_id,
            signal_name: attributes.signal_name.clone(),
            input: attributes.input.clone(),
            control: attributes.control.clone(),
            version: event.version,
        };
        self.pending_signals.insert(event.event_id, info.clone());
        Ok(info)
    }

    /// Drop a pending signal after its failure event.
    pub fn replicate_signal_external_failed_event(
        &mut self,
        attributes: &SignalExternalWorkflowExecutionFailedAttributes,
    ) -> ServiceResult<()> {
        self.pending_signals.remove(&attributes.initiated_event_id);
        Ok(())
    }

    /// Drop a pending signal after the peer acknowledged it.
    pub fn replicate_external_workflow_signaled_event(
        &mut self,
        attributes: &ExternalWorkflowExecutionSignaledAttributes,
    ) -> ServiceResult<()> {
        self.pending_signals.remove(&attributes.initiated_event_id);
        Ok(())
    }

    /// A pending signal by initiated event id.
    pub fn get_signal(&self, initiated_id: i64) -> Option<&SignalInfo> {
        self.pending_signals.get(&initiated_id)
    }

    /// Drop a pending signal's bookkeeping row once the delivery has been
    /// acknowledged out-of-band.
    pub fn remove_signal_by_request_id(&mut self, request_id: &str) -> bool {
        let key = self
            .pending_signals
            .iter()
            .find(|(_, signal)| signal.request_id == request_id)
            .map(|(id, _)| *id);
        match key {
            Some(id) => {
                self.pending_signals.remove(&id);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Failure injection used by the size checker
    // ------------------------------------------------------------------

    /// Append a server-generated failure event and close the run. Returns
    /// the constructed event; the caller persists it with the batch.
    pub fn add_fail_workflow_event(
        &mut self,
        timestamp: i64,
        failure: Failure,
    ) -> ServiceResult<HistoryEvent> {
        if !self.is_workflow_running() {
            return Err(ServiceError::internal(
                "cannot fail a workflow that is already closed",
            ));
        }
        let event = HistoryEvent {
            event_id: self.next_event_id,
            version: self.replication.current_version,
            timestamp,
            attributes: EventAttributes::WorkflowExecutionFailed(
                WorkflowExecutionFailedAttributes {
                    failure,
                    decision_task_completed_event_id: self
                        .pending_decision
                        .as_ref()
                        .map(|decision| decision.started_id)
                        .unwrap_or(0),
                },
            ),
        };
        self.next_event_id += 1;
        self.update_replication_last_event(event.version, event.event_id);
        self.close(CloseStatus::Failed);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_event() -> HistoryEvent {
        HistoryEvent {
            event_id: 1,
            version: 7,
            timestamp: 1_000,
            attributes: EventAttributes::WorkflowExecutionStarted(
                WorkflowExecutionStartedAttributes {
                    workflow_type: "order".into(),
                    task_list: "orders".into(),
                    run_timeout_seconds: 60,
                    task_timeout_seconds: 10,
                    ..Default::default()
                },
            ),
        }
    }

    fn fresh_state() -> MutableState {
        let mut state = MutableState::new(
            "ns-id",
            WorkflowExecution::new("wf", "run-1"),
        );
        let event = started_event();
        if let EventAttributes::WorkflowExecutionStarted(attrs) = &event.attributes {
            state
                .replicate_workflow_execution_started_event("req-1".into(), &event, attrs)
                .unwrap();
        }
        state.next_event_id = 2;
        state
    }

    #[test]
    fn duplicate_activity_terminal_event_is_noop() {
        let mut state = fresh_state();
        let schedule = HistoryEvent {
            event_id: 5,
            version: 7,
            timestamp: 2_000,
            attributes: EventAttributes::ActivityTaskScheduled(Default::default()),
        };
        let attrs = ActivityTaskScheduledAttributes {
            activity_id: "a1".into(),
            ..Default::default()
        };
        state
            .replicate_activity_task_scheduled_event(&schedule, &attrs)
            .unwrap();
        assert!(state.get_activity(5).is_some());

        let completed = ActivityTaskCompletedAttributes {
            scheduled_event_id: 5,
            ..Default::default()
        };
        state.replicate_activity_task_completed_event(&completed).unwrap();
        assert!(state.get_activity(5).is_none());
        assert!(state.pending_activity_ids.is_empty());

        // Second terminal event for the same schedule id changes nothing.
        state.replicate_activity_task_completed_event(&completed).unwrap();
        assert!(state.pending_activities.is_empty());
    }

    #[test]
    fn at_most_one_pending_decision() {
        let mut state = fresh_state();
        state
            .replicate_decision_task_scheduled_event(7, 2, "orders", 10, 0, 0)
            .unwrap();
        let err = state
            .replicate_decision_task_scheduled_event(7, 3, "orders", 10, 0, 0)
            .unwrap_err();
        assert_eq!(err.code(), "INTERNAL");
    }

    #[test]
    fn version_regression_is_rejected() {
        let mut state = fresh_state();
        state.update_replication_version(10);
        state.update_replication_last_event(10, 4);

        let stale = HistoryEvent {
            event_id: 3,
            version: 9,
            timestamp: 0,
            attributes: EventAttributes::WorkflowExecutionSignaled(Default::default()),
        };
        assert!(state.check_replicated_event(&stale).is_err());

        let fresh = HistoryEvent {
            event_id: 5,
            version: 9,
            timestamp: 0,
            attributes: EventAttributes::WorkflowExecutionSignaled(Default::default()),
        };
        assert!(state.check_replicated_event(&fresh).is_ok());
    }

    #[test]
    fn closing_clears_decision_and_stickiness() {
        let mut state = fresh_state();
        state.set_sticky_task_list("sticky-host", 5);
        state
            .replicate_decision_task_scheduled_event(7, 2, "orders", 10, 0, 0)
            .unwrap();
        state
            .replicate_workflow_execution_completed_event(&Default::default())
            .unwrap();
        assert!(!state.is_workflow_running());
        assert!(state.pending_decision.is_none());
        assert!(state.execution_info.sticky_task_list.is_empty());
        assert_eq!(
            state.execution_info.close_status,
            Some(CloseStatus::Completed)
        );
    }

    #[test]
    fn fail_workflow_event_closes_and_advances_ids() {
        let mut state = fresh_state();
        let before = state.next_event_id;
        let event = state
            .add_fail_workflow_event(9_000, Failure::server("too big", true))
            .unwrap();
        assert_eq!(event.event_id, before);
        assert_eq!(state.next_event_id, before + 1);
        assert_eq!(state.execution_info.close_status, Some(CloseStatus::Failed));
        assert!(state.add_fail_workflow_event(9_001, Failure::server("x", true)).is_err());
    }

    #[test]
    fn signal_row_removed_by_request_id() {
        let mut state = fresh_state();
        let event = HistoryEvent {
            event_id: 8,
            version: 7,
            timestamp: 0,
            attributes: EventAttributes::SignalExternalWorkflowExecutionInitiated(
                Default::default(),
            ),
        };
        let attrs = SignalExternalWorkflowExecutionInitiatedAttributes {
            signal_name: "poke".into(),
            ..Default::default()
        };
        state
            .replicate_signal_external_initiated_event(&event, &attrs, "sig-req".into())
            .unwrap();
        assert!(state.remove_signal_by_request_id("sig-req"));
        assert!(!state.remove_signal_by_request_id("sig-req"));
    }
}
