// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! History and blob size enforcement.
//!
//! Two bounds protect the store: the size of any single event payload, and
//! the total size/count of a run's history. Each has a warn threshold that
//! logs and an error threshold that fails the workflow with a non-retryable
//! failure event.

use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::events::HistoryEvent;
use tidemark_protocol::Failure;
use tracing::{error, warn};

use crate::config::{FAILURE_REASON_BLOB_EXCEEDS_LIMIT, FAILURE_REASON_SIZE_EXCEEDS_LIMIT};
use crate::mutable_state::MutableState;
use crate::task_generator::TaskGenerator;

/// Check one payload against the blob limits. Logs above the warn limit and
/// fails above the error limit.
pub fn check_event_blob_size_limit(
    actual_size: usize,
    warn_limit: usize,
    error_limit: usize,
    namespace_id: &str,
    workflow_id: &str,
    run_id: &str,
    operation: &str,
) -> ServiceResult<()> {
    if actual_size > warn_limit {
        warn!(
            namespace_id,
            workflow_id,
            run_id,
            size = actual_size,
            operation,
            "blob size exceeds warn limit"
        );
        if actual_size > error_limit {
            return Err(ServiceError::invalid_argument(
                FAILURE_REASON_BLOB_EXCEEDS_LIMIT,
            ));
        }
    }
    Ok(())
}

/// Per-execution size enforcement.
pub struct WorkflowSizeChecker {
    blob_size_warn: usize,
    blob_size_error: usize,
    history_size_warn: usize,
    history_size_error: usize,
    history_count_warn: usize,
    history_count_error: usize,
}

impl WorkflowSizeChecker {
    /// Create a checker with explicit limits.
    pub fn new(
        blob_size_warn: usize,
        blob_size_error: usize,
        history_size_warn: usize,
        history_size_error: usize,
        history_count_warn: usize,
        history_count_error: usize,
    ) -> Self {
        Self {
            blob_size_warn,
            blob_size_error,
            history_size_warn,
            history_size_error,
            history_count_warn,
            history_count_error,
        }
    }

    /// Create a checker from engine configuration.
    pub fn from_config(config: &crate::config::HistoryConfig) -> Self {
        Self::new(
            config.blob_size_warn,
            config.blob_size_error,
            config.history_size_warn,
            config.history_size_error,
            config.history_count_warn,
            config.history_count_error,
        )
    }

    /// Fail the workflow when `payload_size` exceeds the blob error limit.
    ///
    /// `message` names the violating operation (complete result, failure
    /// detail, cancel detail) and becomes the recorded failure reason.
    /// Returns the appended failure event when the workflow was failed.
    pub fn fail_workflow_if_payload_size_exceeds_limit(
        &self,
        state: &mut MutableState,
        generator: &mut dyn TaskGenerator,
        payload_size: usize,
        message: &str,
        now_nanos: i64,
    ) -> ServiceResult<Option<HistoryEvent>> {
        let info = &state.execution_info;
        let within = check_event_blob_size_limit(
            payload_size,
            self.blob_size_warn,
            self.blob_size_error,
            &info.namespace_id,
            &info.workflow_id,
            &info.run_id,
            message,
        );
        if within.is_ok() {
            return Ok(None);
        }

        let event = state.add_fail_workflow_event(now_nanos, Failure::server(message, true))?;
        generator.generate_workflow_close_tasks(state, now_nanos)?;
        Ok(Some(event))
    }

    /// Fail the workflow when its history size or count exceeds the error
    /// limit. Returns the appended failure event when the workflow was
    /// failed.
    pub fn fail_workflow_size_exceeds_limit(
        &self,
        state: &mut MutableState,
        generator: &mut dyn TaskGenerator,
        now_nanos: i64,
    ) -> ServiceResult<Option<HistoryEvent>> {
        let history_count = (state.next_event_id - 1) as usize;
        let history_size = state.stats.history_size as usize;
        let info = &state.execution_info;

        if history_size > self.history_size_error || history_count > self.history_count_error {
            error!(
                namespace_id = %info.namespace_id,
                workflow_id = %info.workflow_id,
                run_id = %info.run_id,
                history_size,
                history_count,
                "history size exceeds error limit"
            );
            let event = state.add_fail_workflow_event(
                now_nanos,
                Failure::server(FAILURE_REASON_SIZE_EXCEEDS_LIMIT, true),
            )?;
            generator.generate_workflow_close_tasks(state, now_nanos)?;
            return Ok(Some(event));
        }

        if history_size > self.history_size_warn || history_count > self.history_count_warn {
            warn!(
                namespace_id = %info.namespace_id,
                workflow_id = %info.workflow_id,
                run_id = %info.run_id,
                history_size,
                history_count,
                "history size exceeds warn limit"
            );
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutable_state::CloseStatus;
    use crate::task_generator::MutableStateTaskGenerator;
    use tidemark_protocol::events::EventAttributes;
    use tidemark_protocol::task::TransferTaskKind;
    use tidemark_protocol::WorkflowExecution;

    fn running_state(event_count: i64) -> MutableState {
        let mut state = MutableState::new("ns", WorkflowExecution::new("wf", "run"));
        state.execution_info.workflow_type = "t".into();
        state.next_event_id = event_count + 1;
        state
    }

    fn checker() -> WorkflowSizeChecker {
        WorkflowSizeChecker::new(100, 200, 1_000, 2_000, 500, 1_000)
    }

    #[test]
    fn under_limits_is_untouched() {
        let mut state = running_state(10);
        let mut generator = MutableStateTaskGenerator::new();
        let failed = checker()
            .fail_workflow_size_exceeds_limit(&mut state, &mut generator, 0)
            .unwrap();
        assert!(failed.is_none());
        assert!(state.is_workflow_running());
    }

    #[test]
    fn count_over_error_limit_fails_workflow() {
        // 1001 events against a 1000-event error limit.
        let mut state = running_state(1_001);
        let mut generator = MutableStateTaskGenerator::new();
        let event = checker()
            .fail_workflow_size_exceeds_limit(&mut state, &mut generator, 42)
            .unwrap()
            .expect("workflow must fail");

        match &event.attributes {
            EventAttributes::WorkflowExecutionFailed(attrs) => {
                assert_eq!(
                    attrs.failure.message,
                    "Workflow history size / count exceeds limit."
                );
                assert!(attrs.failure.non_retryable);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(!state.is_workflow_running());
        assert_eq!(state.execution_info.close_status, Some(CloseStatus::Failed));
        assert!(state
            .transfer_tasks
            .iter()
            .any(|task| task.kind == TransferTaskKind::CloseExecution));
    }

    #[test]
    fn size_over_error_limit_fails_workflow() {
        let mut state = running_state(10);
        state.stats.history_size = 5_000;
        let mut generator = MutableStateTaskGenerator::new();
        let event = checker()
            .fail_workflow_size_exceeds_limit(&mut state, &mut generator, 0)
            .unwrap();
        assert!(event.is_some());
    }

    #[test]
    fn payload_over_error_limit_fails_workflow_with_message() {
        let mut state = running_state(5);
        let mut generator = MutableStateTaskGenerator::new();
        let event = checker()
            .fail_workflow_if_payload_size_exceeds_limit(
                &mut state,
                &mut generator,
                500,
                "Complete result exceeds size limit.",
                0,
            )
            .unwrap()
            .expect("workflow must fail");
        match &event.attributes {
            EventAttributes::WorkflowExecutionFailed(attrs) => {
                assert_eq!(attrs.failure.message, "Complete result exceeds size limit.");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn payload_between_warn_and_error_only_warns() {
        let mut state = running_state(5);
        let mut generator = MutableStateTaskGenerator::new();
        let event = checker()
            .fail_workflow_if_payload_size_exceeds_limit(&mut state, &mut generator, 150, "x", 0)
            .unwrap();
        assert!(event.is_none());
        assert!(state.is_workflow_running());
    }
}
