// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The active transfer-task executor.
//!
//! Each transfer task is one outbound effect of a committed history event.
//! The executor reloads the owning mutable state under its per-execution
//! lock, verifies the task still matches a live state entry (same schedule
//! id, same failover version), performs the effect, and lets the queue mark
//! the task complete. A task whose entry is gone or superseded is dropped
//! without side effects; the targets deduplicate through the stable request
//! ids stored on the pending entries, so repeated delivery is safe.

use std::sync::Arc;

use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::events::{
    ChildWorkflowExecutionStartedAttributes, EventAttributes,
    ExternalWorkflowExecutionCancelRequestedAttributes,
    ExternalWorkflowExecutionSignaledAttributes,
    RequestCancelExternalWorkflowExecutionFailedAttributes,
    SignalExternalWorkflowExecutionFailedAttributes, StartChildWorkflowExecutionFailedAttributes,
    HistoryEvent,
};
use tidemark_protocol::task::{TransferTask, TransferTaskKind};
use tidemark_protocol::{ParentClosePolicy, WorkflowExecution};
use tracing::{debug, info, instrument};

use crate::clients::{
    AddActivityTaskRequest, AddDecisionTaskRequest, ArchiveRequest, ParentClosePolicyExecution,
    ParentClosePolicyRequest, RecordChildExecutionCompletedRequest,
    RemoveSignalMutableStateRequest, RequestCancelWorkflowExecutionRequest,
    ScheduleDecisionTaskRequest, SignalWorkflowExecutionRequest, StartWorkflowExecutionRequest,
    TerminateWorkflowExecutionRequest,
};
use crate::mutable_state::MutableState;
use crate::shard::ShardContext;
use crate::state_builder::derived_request_id;
use crate::store::{
    AppendHistoryNodesRequest, RecordWorkflowClosedRequest, RecordWorkflowStartedRequest,
    UpdateWorkflowExecutionRequest, UpsertWorkflowSearchAttributesRequest,
};
use crate::workflow_cache::{WorkflowCache, WorkflowGuard};

/// Executes transfer tasks for one shard.
pub struct TransferTaskExecutor {
    shard: Arc<ShardContext>,
    cache: Arc<WorkflowCache>,
}

impl TransferTaskExecutor {
    /// Create an executor over a shard context and its workflow cache.
    pub fn new(shard: Arc<ShardContext>, cache: Arc<WorkflowCache>) -> Self {
        Self { shard, cache }
    }

    /// Perform the task's effect. `should_process` false acknowledges the
    /// task without side effects (the standby path for non-active
    /// namespaces).
    #[instrument(skip(self, task), fields(
        namespace_id = %task.namespace_id,
        workflow_id = %task.workflow_id,
        run_id = %task.run_id,
        task_id = task.task_id,
        task_kind = task.kind.name(),
    ))]
    pub async fn execute(&self, task: &TransferTask, should_process: bool) -> ServiceResult<()> {
        if !should_process {
            return Ok(());
        }
        self.shard.assert_owned()?;

        match &task.kind {
            TransferTaskKind::ActivityTask {
                target_namespace_id,
                task_list,
            } => {
                self.process_activity_task(task, target_namespace_id, task_list)
                    .await
            }
            TransferTaskKind::DecisionTask { task_list } => {
                self.process_decision_task(task, task_list).await
            }
            TransferTaskKind::CloseExecution => self.process_close_execution(task).await,
            TransferTaskKind::CancelExecution {
                target_namespace_id,
                target_workflow_id,
                target_run_id,
                target_child_workflow_only,
                initiated_event_id,
            } => {
                self.process_cancel_execution(
                    task,
                    target_namespace_id,
                    &WorkflowExecution::new(target_workflow_id.clone(), target_run_id.clone()),
                    *target_child_workflow_only,
                    *initiated_event_id,
                )
                .await
            }
            TransferTaskKind::SignalExecution {
                target_namespace_id,
                target_workflow_id,
                target_run_id,
                target_child_workflow_only,
                initiated_event_id,
            } => {
                self.process_signal_execution(
                    task,
                    target_namespace_id,
                    &WorkflowExecution::new(target_workflow_id.clone(), target_run_id.clone()),
                    *target_child_workflow_only,
                    *initiated_event_id,
                )
                .await
            }
            TransferTaskKind::StartChildExecution {
                target_namespace_id,
                target_workflow_id,
                initiated_event_id,
            } => {
                self.process_start_child_execution(
                    task,
                    target_namespace_id,
                    target_workflow_id,
                    *initiated_event_id,
                )
                .await
            }
            TransferTaskKind::RecordWorkflowStarted => {
                self.process_record_workflow_started(task).await
            }
            TransferTaskKind::UpsertSearchAttributes => {
                self.process_upsert_search_attributes(task).await
            }
        }
    }

    fn task_execution(task: &TransferTask) -> WorkflowExecution {
        WorkflowExecution::new(task.workflow_id.clone(), task.run_id.clone())
    }

    async fn process_activity_task(
        &self,
        task: &TransferTask,
        target_namespace_id: &str,
        task_list: &str,
    ) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let request = {
            let guard = self.cache.acquire(&task.namespace_id, &execution).await?;
            let Some(state) = guard.state() else {
                debug!("dropping activity task for missing execution");
                return Ok(());
            };
            if !state.is_workflow_running() {
                return Ok(());
            }
            let Some(activity) = state.get_activity(task.schedule_id) else {
                debug!("dropping activity task for removed schedule id");
                return Ok(());
            };
            if activity.version != task.version || activity.started_id != 0 {
                debug!("dropping superseded activity task");
                return Ok(());
            }
            AddActivityTaskRequest {
                namespace_id: target_namespace_id.to_string(),
                source_namespace_id: task.namespace_id.clone(),
                execution,
                task_list: task_list.to_string(),
                schedule_id: task.schedule_id,
                schedule_to_start_timeout_seconds: activity.schedule_to_start_timeout_seconds,
            }
        };
        self.shard.matching_client.add_activity_task(request).await
    }

    async fn process_decision_task(
        &self,
        task: &TransferTask,
        task_list: &str,
    ) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let request = {
            let guard = self.cache.acquire(&task.namespace_id, &execution).await?;
            let Some(state) = guard.state() else {
                debug!("dropping decision task for missing execution");
                return Ok(());
            };
            if !state.is_workflow_running() {
                return Ok(());
            }
            let Some(decision) = state.get_decision(task.schedule_id) else {
                debug!("dropping decision task for removed schedule id");
                return Ok(());
            };
            if decision.version != task.version || decision.started_id != 0 {
                debug!("dropping superseded decision task");
                return Ok(());
            }

            // A decision task dispatches to the sticky list only while the
            // task's list still matches the execution's sticky assignment;
            // otherwise the original list (and no sticky expiry) wins.
            let sticky = &state.execution_info.sticky_task_list;
            let (list, sticky_timeout) = if !sticky.is_empty() && task_list == sticky {
                (
                    sticky.clone(),
                    Some(
                        state
                            .execution_info
                            .sticky_schedule_to_start_timeout_seconds,
                    ),
                )
            } else {
                (task_list.to_string(), None)
            };
            AddDecisionTaskRequest {
                namespace_id: task.namespace_id.clone(),
                execution,
                task_list: list,
                schedule_id: task.schedule_id,
                schedule_to_start_timeout_seconds: sticky_timeout,
            }
        };
        self.shard.matching_client.add_decision_task(request).await
    }

    async fn process_close_execution(&self, task: &TransferTask) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let guard = self.cache.acquire(&task.namespace_id, &execution).await?;
        let Some(state) = guard.state() else {
            debug!("dropping close task for missing execution");
            return Ok(());
        };
        let info = state.execution_info.clone();
        let history_length = state.next_event_id - 1;
        let close_status = info.close_status.ok_or_else(|| {
            ServiceError::internal("close task for an execution that is not closed")
        })?;
        let children: Vec<_> = state.pending_children.values().cloned().collect();
        let branch_token = info.branch_token.clone();
        let close_event_id = history_length;
        drop(guard);

        // Visibility first; the store deduplicates by task id.
        self.shard
            .visibility_store
            .record_workflow_execution_closed(RecordWorkflowClosedRequest {
                namespace_id: task.namespace_id.clone(),
                execution: execution.clone(),
                workflow_type: info.workflow_type.clone(),
                start_time: info.start_timestamp,
                close_time: task.visibility_time,
                status: close_status,
                history_length,
                task_id: task.task_id,
            })
            .await?;

        if self.shard.config.archival_enabled {
            self.shard
                .archival_client
                .archive(ArchiveRequest {
                    namespace_id: task.namespace_id.clone(),
                    execution: execution.clone(),
                    branch_token: branch_token.clone(),
                    close_event_id,
                })
                .await?;
        }

        // Notify the parent, tolerating a parent that is already gone.
        if let (Some(parent_namespace_id), Some(parent_execution), Some(initiated_id)) = (
            info.parent_namespace_id.clone(),
            info.parent_execution.clone(),
            info.parent_initiated_event_id,
        ) {
            let completion_event = self
                .read_close_event(&branch_token, close_event_id)
                .await?;
            let result = self
                .shard
                .history_client
                .record_child_execution_completed(RecordChildExecutionCompletedRequest {
                    namespace_id: parent_namespace_id,
                    parent_execution,
                    initiated_event_id: initiated_id,
                    child_execution: execution.clone(),
                    completion_event,
                })
                .await;
            match result {
                Ok(()) | Err(ServiceError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        self.process_parent_close_policy(task, &execution, &children)
            .await
    }

    async fn read_close_event(
        &self,
        branch_token: &[u8],
        close_event_id: i64,
    ) -> ServiceResult<HistoryEvent> {
        let events = self
            .shard
            .history_store
            .read_history_branch(branch_token, close_event_id, close_event_id + 1)
            .await?;
        events
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::internal("close event missing from history branch"))
    }

    async fn process_parent_close_policy(
        &self,
        task: &TransferTask,
        parent: &WorkflowExecution,
        children: &[crate::mutable_state::ChildExecutionInfo],
    ) -> ServiceResult<()> {
        let active: Vec<_> = children
            .iter()
            .filter(|child| child.parent_close_policy != ParentClosePolicy::Abandon)
            .collect();
        if active.is_empty() {
            return Ok(());
        }

        if active.len() > self.shard.config.parent_close_policy_inline_limit {
            // Large fan-outs go to the worker pool so the queue is not
            // blocked behind hundreds of child calls.
            let request = ParentClosePolicyRequest {
                namespace_id: task.namespace_id.clone(),
                parent_execution: parent.clone(),
                executions: active
                    .iter()
                    .map(|child| ParentClosePolicyExecution {
                        namespace_id: child.namespace.clone(),
                        execution: WorkflowExecution::new(
                            child.workflow_id.clone(),
                            child.run_id.clone(),
                        ),
                        policy: child.parent_close_policy,
                    })
                    .collect(),
            };
            return self.shard.parent_close_policy_client.send(request).await;
        }

        for child in active {
            let child_execution =
                WorkflowExecution::new(child.workflow_id.clone(), child.run_id.clone());
            let result = match child.parent_close_policy {
                ParentClosePolicy::Abandon => continue,
                ParentClosePolicy::Terminate => {
                    self.shard
                        .history_client
                        .terminate_workflow_execution(TerminateWorkflowExecutionRequest {
                            namespace_id: child.namespace.clone(),
                            execution: child_execution,
                            reason: "by parent close policy".to_string(),
                            identity: "history-service".to_string(),
                        })
                        .await
                }
                ParentClosePolicy::RequestCancel => {
                    self.shard
                        .history_client
                        .request_cancel_workflow_execution(
                            RequestCancelWorkflowExecutionRequest {
                                namespace_id: child.namespace.clone(),
                                execution: child_execution,
                                cancel_request_id: derived_request_id(
                                    &task.run_id,
                                    child.initiated_id,
                                ),
                                child_workflow_only: true,
                                source_execution: parent.clone(),
                            },
                        )
                        .await
                }
            };
            match result {
                Ok(())
                | Err(ServiceError::NotFound(_))
                | Err(ServiceError::CancellationAlreadyRequested) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    async fn process_cancel_execution(
        &self,
        task: &TransferTask,
        target_namespace_id: &str,
        target: &WorkflowExecution,
        child_workflow_only: bool,
        initiated_event_id: i64,
    ) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let mut guard = self.cache.acquire(&task.namespace_id, &execution).await?;
        let Some(state) = guard.state() else {
            debug!("dropping cancel task for missing execution");
            return Ok(());
        };
        if !state.is_workflow_running() {
            return Ok(());
        }
        let Some(cancel) = state.get_request_cancel(initiated_event_id) else {
            debug!("dropping cancel task for acknowledged request");
            return Ok(());
        };
        if cancel.version != task.version {
            debug!("dropping superseded cancel task");
            return Ok(());
        }
        let cancel_request_id = cancel.cancel_request_id.clone();

        let result = self
            .shard
            .history_client
            .request_cancel_workflow_execution(RequestCancelWorkflowExecutionRequest {
                namespace_id: target_namespace_id.to_string(),
                execution: target.clone(),
                cancel_request_id,
                child_workflow_only,
                source_execution: execution.clone(),
            })
            .await;

        let target_namespace = self.namespace_name(target_namespace_id).await;
        let ack_event = match result {
            Ok(()) | Err(ServiceError::CancellationAlreadyRequested) => {
                info!(target_workflow_id = %target.workflow_id, "cancel request delivered");
                EventAttributes::ExternalWorkflowExecutionCancelRequested(
                    ExternalWorkflowExecutionCancelRequestedAttributes {
                        initiated_event_id,
                        namespace: target_namespace,
                        execution: target.clone(),
                    },
                )
            }
            Err(ServiceError::NotFound(_)) => {
                info!(target_workflow_id = %target.workflow_id, "cancel target gone, recording failure");
                EventAttributes::RequestCancelExternalWorkflowExecutionFailed(
                    RequestCancelExternalWorkflowExecutionFailedAttributes {
                        decision_task_completed_event_id: 0,
                        initiated_event_id,
                        namespace: target_namespace,
                        execution: target.clone(),
                        cause: "external workflow execution not found".to_string(),
                    },
                )
            }
            Err(err) => return Err(err),
        };

        self.append_ack_event(task, &mut guard, ack_event).await
    }

    async fn process_signal_execution(
        &self,
        task: &TransferTask,
        target_namespace_id: &str,
        target: &WorkflowExecution,
        child_workflow_only: bool,
        initiated_event_id: i64,
    ) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let mut guard = self.cache.acquire(&task.namespace_id, &execution).await?;
        let Some(state) = guard.state() else {
            debug!("dropping signal task for missing execution");
            return Ok(());
        };
        if !state.is_workflow_running() {
            return Ok(());
        }
        let Some(signal) = state.get_signal(initiated_event_id) else {
            debug!("dropping signal task for acknowledged signal");
            return Ok(());
        };
        if signal.version != task.version {
            debug!("dropping superseded signal task");
            return Ok(());
        }
        let signal = signal.clone();

        let result = self
            .shard
            .history_client
            .signal_workflow_execution(SignalWorkflowExecutionRequest {
                namespace_id: target_namespace_id.to_string(),
                execution: target.clone(),
                signal_name: signal.signal_name.clone(),
                input: signal.input.clone(),
                request_id: signal.request_id.clone(),
                control: signal.control.clone(),
                child_workflow_only,
                source_execution: execution.clone(),
            })
            .await;

        let target_namespace = self.namespace_name(target_namespace_id).await;
        let delivered = match result {
            Ok(()) => true,
            Err(ServiceError::NotFound(_)) => false,
            Err(err) => return Err(err),
        };
        let ack_event = if delivered {
            EventAttributes::ExternalWorkflowExecutionSignaled(
                ExternalWorkflowExecutionSignaledAttributes {
                    initiated_event_id,
                    namespace: target_namespace,
                    execution: target.clone(),
                    control: signal.control.clone(),
                },
            )
        } else {
            EventAttributes::SignalExternalWorkflowExecutionFailed(
                SignalExternalWorkflowExecutionFailedAttributes {
                    decision_task_completed_event_id: 0,
                    initiated_event_id,
                    namespace: target_namespace,
                    execution: target.clone(),
                    cause: "external workflow execution not found".to_string(),
                },
            )
        };
        self.append_ack_event(task, &mut guard, ack_event).await?;
        drop(guard);

        if delivered {
            // Prune the delivery bookkeeping once the signal has landed.
            self.shard
                .history_client
                .remove_signal_mutable_state(RemoveSignalMutableStateRequest {
                    namespace_id: task.namespace_id.clone(),
                    execution,
                    request_id: signal.request_id.clone(),
                })
                .await?;
        }
        Ok(())
    }

    async fn process_start_child_execution(
        &self,
        task: &TransferTask,
        target_namespace_id: &str,
        target_workflow_id: &str,
        initiated_event_id: i64,
    ) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let mut guard = self.cache.acquire(&task.namespace_id, &execution).await?;
        let Some(state) = guard.state() else {
            debug!("dropping start-child task for missing execution");
            return Ok(());
        };
        if !state.is_workflow_running() {
            return Ok(());
        }
        let Some(child) = state.get_child_execution(initiated_event_id) else {
            debug!("dropping start-child task for resolved child");
            return Ok(());
        };
        if child.version != task.version {
            debug!("dropping superseded start-child task");
            return Ok(());
        }
        let child = child.clone();

        if child.started_id != 0 && !child.run_id.is_empty() {
            // The child already started; a crashed worker may have lost the
            // first-decision dispatch, so re-issue it.
            drop(guard);
            return self
                .shard
                .history_client
                .schedule_decision_task(ScheduleDecisionTaskRequest {
                    namespace_id: target_namespace_id.to_string(),
                    execution: WorkflowExecution::new(child.workflow_id, child.run_id),
                    is_first_decision: true,
                })
                .await;
        }

        let result = self
            .shard
            .history_client
            .start_workflow_execution(StartWorkflowExecutionRequest {
                namespace_id: target_namespace_id.to_string(),
                workflow_id: target_workflow_id.to_string(),
                workflow_type: child.workflow_type.clone(),
                task_list: child.task_list.clone(),
                input: child.input.clone(),
                execution_timeout_seconds: child.execution_timeout_seconds,
                run_timeout_seconds: child.run_timeout_seconds,
                task_timeout_seconds: child.task_timeout_seconds,
                request_id: child.create_request_id.clone(),
                parent_namespace_id: task.namespace_id.clone(),
                parent_execution: execution.clone(),
                parent_initiated_event_id: initiated_event_id,
                cron_schedule: child.cron_schedule.clone(),
                retry_policy: child.retry_policy.clone(),
                parent_close_policy: child.parent_close_policy,
            })
            .await;

        let target_namespace = self.namespace_name(target_namespace_id).await;
        let child_run_id = match result {
            Ok(response) => Some(response.run_id),
            // The create request id is stable, so an already-started child
            // is this task's own earlier delivery; attach to that run.
            Err(ServiceError::WorkflowExecutionAlreadyStarted { run_id, .. }) => Some(run_id),
            Err(err) if crate::retry::is_service_non_retryable(&err) => None,
            Err(err) => return Err(err),
        };

        match child_run_id {
            Some(run_id) => {
                let child_execution =
                    WorkflowExecution::new(target_workflow_id.to_string(), run_id);
                self.append_ack_event(
                    task,
                    &mut guard,
                    EventAttributes::ChildWorkflowExecutionStarted(
                        ChildWorkflowExecutionStartedAttributes {
                            initiated_event_id,
                            namespace: target_namespace,
                            execution: child_execution.clone(),
                            workflow_type: child.workflow_type.clone(),
                        },
                    ),
                )
                .await?;
                drop(guard);
                self.shard
                    .history_client
                    .schedule_decision_task(ScheduleDecisionTaskRequest {
                        namespace_id: target_namespace_id.to_string(),
                        execution: child_execution,
                        is_first_decision: true,
                    })
                    .await
            }
            None => {
                self.append_ack_event(
                    task,
                    &mut guard,
                    EventAttributes::StartChildWorkflowExecutionFailed(
                        StartChildWorkflowExecutionFailedAttributes {
                            initiated_event_id,
                            cause: "child workflow start failed".to_string(),
                            namespace: target_namespace,
                            workflow_id: target_workflow_id.to_string(),
                            workflow_type: child.workflow_type.clone(),
                        },
                    ),
                )
                .await
            }
        }
    }

    async fn process_record_workflow_started(&self, task: &TransferTask) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let request = {
            let guard = self.cache.acquire(&task.namespace_id, &execution).await?;
            let Some(state) = guard.state() else {
                debug!("dropping record-started task for missing execution");
                return Ok(());
            };
            if task.version != state.replication.start_version {
                debug!("dropping record-started task from a superseded start");
                return Ok(());
            }
            let info = &state.execution_info;
            // Visibility orders cron runs by effective execution time, the
            // start plus the first-decision backoff.
            let execution_time = info.start_timestamp
                + i64::from(info.first_decision_backoff_seconds) * 1_000_000_000;
            RecordWorkflowStartedRequest {
                namespace_id: task.namespace_id.clone(),
                execution,
                workflow_type: info.workflow_type.clone(),
                start_time: info.start_timestamp,
                execution_time,
                task_id: task.task_id,
                search_attributes: info.search_attributes.clone(),
            }
        };
        self.shard
            .visibility_store
            .record_workflow_execution_started(request)
            .await
    }

    async fn process_upsert_search_attributes(&self, task: &TransferTask) -> ServiceResult<()> {
        let execution = Self::task_execution(task);
        let request = {
            let guard = self.cache.acquire(&task.namespace_id, &execution).await?;
            let Some(state) = guard.state() else {
                debug!("dropping upsert task for missing execution");
                return Ok(());
            };
            let info = &state.execution_info;
            UpsertWorkflowSearchAttributesRequest {
                namespace_id: task.namespace_id.clone(),
                execution,
                workflow_type: info.workflow_type.clone(),
                task_id: task.task_id,
                search_attributes: info.search_attributes.clone(),
            }
        };
        self.shard
            .visibility_store
            .upsert_workflow_execution(request)
            .await
    }

    /// Append a locally-generated acknowledgement event, apply it to the
    /// state, and persist both atomically. Invalidates the cached state on
    /// failure so the next attempt reloads.
    async fn append_ack_event(
        &self,
        task: &TransferTask,
        guard: &mut WorkflowGuard,
        attributes: EventAttributes,
    ) -> ServiceResult<()> {
        let state = guard
            .state_mut()
            .ok_or_else(|| ServiceError::internal("state disappeared under lock"))?;
        let event = HistoryEvent {
            event_id: state.next_event_id,
            version: state.replication.current_version,
            timestamp: self.shard.clock.now_nanos(),
            attributes,
        };
        apply_ack_event(state, &event)?;
        state.next_event_id = event.event_id + 1;
        state.update_replication_last_event(event.version, event.event_id);

        let result = self.persist(task, state, vec![event]).await;
        if result.is_err() {
            guard.invalidate();
        }
        result
    }

    async fn persist(
        &self,
        task: &TransferTask,
        state: &mut MutableState,
        events: Vec<HistoryEvent>,
    ) -> ServiceResult<()> {
        let response = self
            .shard
            .history_store
            .append_history_nodes(AppendHistoryNodesRequest {
                shard_id: self.shard.shard_id,
                branch_token: state.execution_info.branch_token.clone(),
                namespace_id: task.namespace_id.clone(),
                execution: state.execution(),
                events,
            })
            .await?;
        state.stats.history_size += response.size as u64;

        let (transfer_tasks, timer_tasks) = state.drain_tasks();
        self.shard
            .execution_store
            .update_workflow_execution(UpdateWorkflowExecutionRequest {
                shard_id: self.shard.shard_id,
                state: state.clone(),
                transfer_tasks,
                timer_tasks,
            })
            .await
    }

    async fn namespace_name(&self, namespace_id: &str) -> String {
        match self
            .shard
            .namespace_cache
            .get_namespace_by_id(namespace_id)
            .await
        {
            Ok(namespace) => namespace.name.clone(),
            Err(_) => namespace_id.to_string(),
        }
    }
}

/// Route an acknowledgement event to its replicate method.
fn apply_ack_event(state: &mut MutableState, event: &HistoryEvent) -> ServiceResult<()> {
    match &event.attributes {
        EventAttributes::ExternalWorkflowExecutionCancelRequested(attrs) => {
            state.replicate_external_workflow_cancel_requested_event(attrs)
        }
        EventAttributes::RequestCancelExternalWorkflowExecutionFailed(attrs) => {
            state.replicate_request_cancel_external_failed_event(attrs)
        }
        EventAttributes::ExternalWorkflowExecutionSignaled(attrs) => {
            state.replicate_external_workflow_signaled_event(attrs)
        }
        EventAttributes::SignalExternalWorkflowExecutionFailed(attrs) => {
            state.replicate_signal_external_failed_event(attrs)
        }
        EventAttributes::ChildWorkflowExecutionStarted(attrs) => {
            state.replicate_child_workflow_execution_started_event(event, attrs)
        }
        EventAttributes::StartChildWorkflowExecutionFailed(attrs) => {
            state.replicate_start_child_workflow_failed_event(attrs)
        }
        _ => Err(ServiceError::internal(
            "unexpected acknowledgement event kind",
        )),
    }
}
