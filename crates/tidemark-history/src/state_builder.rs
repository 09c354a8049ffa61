// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ordered application of history event batches.
//!
//! The state builder advances a mutable state through a batch of history
//! events, locally produced or replicated from a peer cluster, and asks the
//! task generator for the queue work each transition needs. The dispatch is
//! an exhaustive `match` over every event kind: a new kind that is not
//! taught here is a compile error.
//!
//! Request ids for initiated children, cancels, and signals are derived from
//! `(run_id, initiated event id)`, so re-applying a batch (crash replay,
//! cross-cluster replication) produces the same idempotence keys and the
//! downstream effects deduplicate.

use std::sync::Arc;

use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::events::{EventAttributes, HistoryEvent};
use tidemark_protocol::WorkflowExecution;
use tracing::debug;

use crate::mutable_state::MutableState;
use crate::namespace_cache::NamespaceCache;
use crate::task_generator::{MutableStateTaskGenerator, TaskGenerator};

/// Stable request id for an entry initiated by a history event.
pub fn derived_request_id(run_id: &str, initiated_event_id: i64) -> String {
    format!("{run_id}:{initiated_event_id}")
}

/// Applies event batches to mutable states.
pub struct StateBuilder {
    namespace_cache: Arc<NamespaceCache>,
}

impl StateBuilder {
    /// Create a builder over the given namespace cache.
    pub fn new(namespace_cache: Arc<NamespaceCache>) -> Self {
        Self { namespace_cache }
    }

    /// Apply `events` to `state` in order, generating tasks through
    /// `generator`.
    ///
    /// When the batch closes the run with continue-as-new and
    /// `new_run_events` is non-empty, a second mutable state is built for
    /// the continuation (with its own task generator, so the continuation's
    /// tasks belong to the new run) and returned.
    pub async fn apply_events(
        &self,
        state: &mut MutableState,
        generator: &mut dyn TaskGenerator,
        request_id: &str,
        events: &[HistoryEvent],
        new_run_events: &[HistoryEvent],
    ) -> ServiceResult<Option<MutableState>> {
        let continued_as_new = self
            .apply_batch(state, generator, request_id, events)
            .await?;

        let Some(new_run_id) = continued_as_new else {
            return Ok(None);
        };
        if new_run_events.is_empty() {
            return Ok(None);
        }

        let mut new_state = MutableState::new(
            state.execution_info.namespace_id.clone(),
            WorkflowExecution::new(state.execution_info.workflow_id.clone(), new_run_id.clone()),
        );
        let mut new_generator = MutableStateTaskGenerator::new();
        let new_request_id = derived_request_id(&new_run_id, 0);
        self.apply_batch(
            &mut new_state,
            &mut new_generator,
            &new_request_id,
            new_run_events,
        )
        .await?;
        Ok(Some(new_state))
    }

    /// Apply one batch. Returns the continuation run id when the batch ended
    /// in continue-as-new.
    async fn apply_batch(
        &self,
        state: &mut MutableState,
        generator: &mut dyn TaskGenerator,
        request_id: &str,
        events: &[HistoryEvent],
    ) -> ServiceResult<Option<String>> {
        let Some(last_event) = events.last() else {
            return Err(ServiceError::invalid_argument("empty event batch"));
        };

        let mut continued_run_id = None;
        let mut previous_id: Option<i64> = None;
        for event in events {
            if let Some(previous) = previous_id {
                if event.event_id != previous + 1 {
                    return Err(ServiceError::invalid_argument(format!(
                        "event id {} does not follow {} in batch",
                        event.event_id, previous
                    )));
                }
            } else if event.event_id != state.next_event_id {
                return Err(ServiceError::invalid_argument(format!(
                    "batch starts at event id {} but next event id is {}",
                    event.event_id, state.next_event_id
                )));
            }
            previous_id = Some(event.event_id);

            state.check_replicated_event(event)?;
            state.update_replication_version(event.version);
            state.update_replication_last_event(event.version, event.event_id);
            state.next_event_id = event.event_id + 1;

            if let Some(run_id) = self
                .apply_event(state, generator, request_id, event)
                .await?
            {
                continued_run_id = Some(run_id);
            }
        }

        // The batch tail always refreshes the timer sweeps and drops sticky
        // affinity; a replicated event implies any worker affinity is stale.
        generator.generate_activity_timer_tasks(state, last_event.timestamp)?;
        generator.generate_user_timer_tasks(state, last_event.timestamp)?;
        state.clear_stickiness();

        debug!(
            namespace_id = %state.execution_info.namespace_id,
            workflow_id = %state.execution_info.workflow_id,
            run_id = %state.execution_info.run_id,
            batch_len = events.len(),
            next_event_id = state.next_event_id,
            "applied event batch"
        );
        Ok(continued_run_id)
    }

    async fn apply_event(
        &self,
        state: &mut MutableState,
        generator: &mut dyn TaskGenerator,
        request_id: &str,
        event: &HistoryEvent,
    ) -> ServiceResult<Option<String>> {
        let run_id = state.execution_info.run_id.clone();
        match &event.attributes {
            EventAttributes::WorkflowExecutionStarted(attrs) => {
                state.replicate_workflow_execution_started_event(
                    request_id.to_string(),
                    event,
                    attrs,
                )?;
                generator.generate_record_workflow_started_tasks(state, event.timestamp)?;
                generator.generate_workflow_start_tasks(state, event.timestamp)?;
                if attrs.first_decision_backoff_seconds > 0 {
                    generator.generate_delayed_decision_tasks(state, event.timestamp)?;
                }
            }

            EventAttributes::WorkflowExecutionCompleted(attrs) => {
                state.replicate_workflow_execution_completed_event(attrs)?;
                generator.generate_workflow_close_tasks(state, event.timestamp)?;
            }
            EventAttributes::WorkflowExecutionFailed(attrs) => {
                state.replicate_workflow_execution_failed_event(attrs)?;
                generator.generate_workflow_close_tasks(state, event.timestamp)?;
            }
            EventAttributes::WorkflowExecutionTimedOut(attrs) => {
                state.replicate_workflow_execution_timed_out_event(attrs)?;
                generator.generate_workflow_close_tasks(state, event.timestamp)?;
            }
            EventAttributes::WorkflowExecutionTerminated(attrs) => {
                state.replicate_workflow_execution_terminated_event(attrs)?;
                generator.generate_workflow_close_tasks(state, event.timestamp)?;
            }
            EventAttributes::WorkflowExecutionCanceled(attrs) => {
                state.replicate_workflow_execution_canceled_event(attrs)?;
                generator.generate_workflow_close_tasks(state, event.timestamp)?;
            }
            EventAttributes::WorkflowExecutionContinuedAsNew(attrs) => {
                state.replicate_workflow_execution_continued_as_new_event(attrs)?;
                generator.generate_workflow_close_tasks(state, event.timestamp)?;
                return Ok(Some(attrs.new_execution_run_id.clone()));
            }
            EventAttributes::WorkflowExecutionCancelRequested(attrs) => {
                state.replicate_workflow_execution_cancel_requested_event(attrs)?;
            }
            EventAttributes::WorkflowExecutionSignaled(attrs) => {
                state.replicate_workflow_execution_signaled_event(attrs)?;
            }
            EventAttributes::UpsertWorkflowSearchAttributes(attrs) => {
                state.replicate_upsert_search_attributes_event(attrs);
                generator.generate_workflow_search_attr_tasks(state, event.timestamp)?;
            }
            EventAttributes::MarkerRecorded(_) => {}

            EventAttributes::DecisionTaskScheduled(attrs) => {
                state.replicate_decision_task_scheduled_event(
                    event.version,
                    event.event_id,
                    &attrs.task_list,
                    attrs.start_to_close_timeout_seconds,
                    attrs.attempt,
                    event.timestamp,
                )?;
                generator.generate_decision_schedule_tasks(
                    state,
                    event.event_id,
                    event.timestamp,
                )?;
            }
            EventAttributes::DecisionTaskStarted(attrs) => {
                state.replicate_decision_task_started_event(
                    attrs.scheduled_event_id,
                    event.event_id,
                    &attrs.request_id,
                )?;
                generator.generate_decision_start_tasks(
                    state,
                    attrs.scheduled_event_id,
                    event.timestamp,
                )?;
            }
            EventAttributes::DecisionTaskCompleted(attrs) => {
                state.replicate_decision_task_completed_event(attrs)?;
            }
            EventAttributes::DecisionTaskTimedOut(_) => {
                state.replicate_decision_task_timed_out_event()?;
                let transient = state.replicate_transient_decision_task_scheduled()?;
                generator.generate_decision_schedule_tasks(
                    state,
                    transient.schedule_id,
                    event.timestamp,
                )?;
            }
            EventAttributes::DecisionTaskFailed(_) => {
                state.replicate_decision_task_failed_event()?;
                let transient = state.replicate_transient_decision_task_scheduled()?;
                generator.generate_decision_schedule_tasks(
                    state,
                    transient.schedule_id,
                    event.timestamp,
                )?;
            }

            EventAttributes::ActivityTaskScheduled(attrs) => {
                state.replicate_activity_task_scheduled_event(event, attrs)?;
                generator.generate_activity_transfer_tasks(
                    state,
                    event.event_id,
                    event.timestamp,
                )?;
            }
            EventAttributes::ActivityTaskStarted(attrs) => {
                state.replicate_activity_task_started_event(event, attrs)?;
            }
            EventAttributes::ActivityTaskCompleted(attrs) => {
                state.replicate_activity_task_completed_event(attrs)?;
            }
            EventAttributes::ActivityTaskFailed(attrs) => {
                state.replicate_activity_task_failed_event(attrs)?;
            }
            EventAttributes::ActivityTaskTimedOut(attrs) => {
                state.replicate_activity_task_timed_out_event(attrs)?;
            }
            EventAttributes::ActivityTaskCancelRequested(attrs) => {
                state.replicate_activity_task_cancel_requested_event(event, attrs)?;
            }
            EventAttributes::RequestCancelActivityTaskFailed(_) => {}
            EventAttributes::ActivityTaskCanceled(attrs) => {
                state.replicate_activity_task_canceled_event(attrs)?;
            }

            EventAttributes::TimerStarted(attrs) => {
                state.replicate_timer_started_event(event, attrs)?;
            }
            EventAttributes::TimerFired(attrs) => {
                state.replicate_timer_fired_event(attrs)?;
            }
            EventAttributes::CancelTimerFailed(_) => {}
            EventAttributes::TimerCanceled(attrs) => {
                state.replicate_timer_canceled_event(attrs)?;
            }

            EventAttributes::StartChildWorkflowExecutionInitiated(attrs) => {
                let create_request_id = derived_request_id(&run_id, event.event_id);
                state.replicate_start_child_workflow_initiated_event(
                    event,
                    attrs,
                    create_request_id,
                )?;
                generator.generate_child_workflow_tasks(state, event.event_id, event.timestamp)?;
            }
            EventAttributes::StartChildWorkflowExecutionFailed(attrs) => {
                state.replicate_start_child_workflow_failed_event(attrs)?;
            }
            EventAttributes::ChildWorkflowExecutionStarted(attrs) => {
                state.replicate_child_workflow_execution_started_event(event, attrs)?;
            }
            EventAttributes::ChildWorkflowExecutionCompleted(attrs) => {
                state.replicate_child_workflow_terminal_event(attrs.initiated_event_id);
            }
            EventAttributes::ChildWorkflowExecutionFailed(attrs) => {
                state.replicate_child_workflow_terminal_event(attrs.initiated_event_id);
            }
            EventAttributes::ChildWorkflowExecutionCanceled(attrs) => {
                state.replicate_child_workflow_terminal_event(attrs.initiated_event_id);
            }
            EventAttributes::ChildWorkflowExecutionTimedOut(attrs) => {
                state.replicate_child_workflow_terminal_event(attrs.initiated_event_id);
            }
            EventAttributes::ChildWorkflowExecutionTerminated(attrs) => {
                state.replicate_child_workflow_terminal_event(attrs.initiated_event_id);
            }

            EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(attrs) => {
                let cancel_request_id = derived_request_id(&run_id, event.event_id);
                state.replicate_request_cancel_external_initiated_event(
                    event,
                    attrs,
                    cancel_request_id,
                )?;
                let target_namespace_id = self.resolve_namespace_id(state, &attrs.namespace).await?;
                generator.generate_request_cancel_external_tasks(
                    state,
                    event.event_id,
                    &target_namespace_id,
                    &attrs.execution,
                    attrs.child_workflow_only,
                    event.timestamp,
                )?;
            }
            EventAttributes::RequestCancelExternalWorkflowExecutionFailed(attrs) => {
                state.replicate_request_cancel_external_failed_event(attrs)?;
            }
            EventAttributes::ExternalWorkflowExecutionCancelRequested(attrs) => {
                state.replicate_external_workflow_cancel_requested_event(attrs)?;
            }

            EventAttributes::SignalExternalWorkflowExecutionInitiated(attrs) => {
                let signal_request_id = derived_request_id(&run_id, event.event_id);
                state.replicate_signal_external_initiated_event(event, attrs, signal_request_id)?;
                let target_namespace_id = self.resolve_namespace_id(state, &attrs.namespace).await?;
                generator.generate_signal_external_tasks(
                    state,
                    event.event_id,
                    &target_namespace_id,
                    &attrs.execution,
                    attrs.child_workflow_only,
                    event.timestamp,
                )?;
            }
            EventAttributes::SignalExternalWorkflowExecutionFailed(attrs) => {
                state.replicate_signal_external_failed_event(attrs)?;
            }
            EventAttributes::ExternalWorkflowExecutionSignaled(attrs) => {
                state.replicate_external_workflow_signaled_event(attrs)?;
            }
        }
        Ok(None)
    }

    /// Resolve an event's target namespace name to an id; an empty name
    /// means the execution's own namespace.
    async fn resolve_namespace_id(
        &self,
        state: &MutableState,
        namespace_name: &str,
    ) -> ServiceResult<String> {
        if namespace_name.is_empty() {
            return Ok(state.execution_info.namespace_id.clone());
        }
        let namespace = self.namespace_cache.get_namespace(namespace_name).await?;
        Ok(namespace.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace_cache::InMemoryNamespaceProvider;
    use tidemark_protocol::events::WorkflowExecutionStartedAttributes;

    fn builder() -> StateBuilder {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        StateBuilder::new(Arc::new(NamespaceCache::new(provider)))
    }

    fn started(event_id: i64) -> HistoryEvent {
        HistoryEvent {
            event_id,
            version: 1,
            timestamp: 100,
            attributes: EventAttributes::WorkflowExecutionStarted(
                WorkflowExecutionStartedAttributes {
                    workflow_type: "t".into(),
                    task_list: "tl".into(),
                    run_timeout_seconds: 30,
                    ..Default::default()
                },
            ),
        }
    }

    fn signaled(event_id: i64) -> HistoryEvent {
        HistoryEvent {
            event_id,
            version: 1,
            timestamp: 200,
            attributes: EventAttributes::WorkflowExecutionSignaled(Default::default()),
        }
    }

    #[tokio::test]
    async fn rejects_gapped_event_ids() {
        let builder = builder();
        let mut state = MutableState::new("ns", WorkflowExecution::new("wf", "run"));
        let mut generator = MutableStateTaskGenerator::new();
        let err = builder
            .apply_events(
                &mut state,
                &mut generator,
                "req",
                &[started(1), signaled(3)],
                &[],
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn rejects_batch_not_starting_at_next_event_id() {
        let builder = builder();
        let mut state = MutableState::new("ns", WorkflowExecution::new("wf", "run"));
        let mut generator = MutableStateTaskGenerator::new();
        let err = builder
            .apply_events(&mut state, &mut generator, "req", &[signaled(5)], &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn rejects_empty_batch() {
        let builder = builder();
        let mut state = MutableState::new("ns", WorkflowExecution::new("wf", "run"));
        let mut generator = MutableStateTaskGenerator::new();
        let err = builder
            .apply_events(&mut state, &mut generator, "req", &[], &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn advances_next_event_id_by_batch_length() {
        let builder = builder();
        let mut state = MutableState::new("ns", WorkflowExecution::new("wf", "run"));
        let mut generator = MutableStateTaskGenerator::new();
        builder
            .apply_events(
                &mut state,
                &mut generator,
                "req",
                &[started(1), signaled(2)],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(state.next_event_id, 3);
        assert_eq!(state.replication.last_write_event_id, 2);
    }
}
