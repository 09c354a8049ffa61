// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recording mock clients.
//!
//! Each mock records every request and answers from a queue of scripted
//! results; an empty queue answers `Ok` with the default response. Tests
//! inspect the recorded requests to assert on outbound effects.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tidemark_protocol::error::{ServiceError, ServiceResult};

use super::{
    AddActivityTaskRequest, AddDecisionTaskRequest, ArchivalClient, ArchiveRequest, HistoryClient,
    MatchingClient, ParentClosePolicyClient, ParentClosePolicyRequest,
    RecordChildExecutionCompletedRequest, RemoveSignalMutableStateRequest,
    RequestCancelWorkflowExecutionRequest, ScheduleDecisionTaskRequest,
    SignalWorkflowExecutionRequest, StartWorkflowExecutionRequest, StartWorkflowExecutionResponse,
    TerminateWorkflowExecutionRequest,
};

/// Recording [`MatchingClient`].
#[derive(Default)]
pub struct MockMatchingClient {
    /// Recorded activity dispatches.
    pub activity_tasks: Mutex<Vec<AddActivityTaskRequest>>,
    /// Recorded decision dispatches.
    pub decision_tasks: Mutex<Vec<AddDecisionTaskRequest>>,
    errors: Mutex<VecDeque<ServiceError>>,
}

impl MockMatchingClient {
    /// Script the next call to fail with `err`.
    pub fn push_error(&self, err: ServiceError) {
        self.errors.lock().unwrap().push_back(err);
    }

    /// Drop any unconsumed scripted errors.
    pub fn clear_errors(&self) {
        self.errors.lock().unwrap().clear();
    }

    fn next_result(&self) -> ServiceResult<()> {
        match self.errors.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MatchingClient for MockMatchingClient {
    async fn add_activity_task(&self, request: AddActivityTaskRequest) -> ServiceResult<()> {
        self.activity_tasks.lock().unwrap().push(request);
        self.next_result()
    }

    async fn add_decision_task(&self, request: AddDecisionTaskRequest) -> ServiceResult<()> {
        self.decision_tasks.lock().unwrap().push(request);
        self.next_result()
    }
}

/// Recording [`HistoryClient`].
#[derive(Default)]
pub struct MockHistoryClient {
    /// Recorded cancellation requests.
    pub cancel_requests: Mutex<Vec<RequestCancelWorkflowExecutionRequest>>,
    /// Recorded signals.
    pub signals: Mutex<Vec<SignalWorkflowExecutionRequest>>,
    /// Recorded signal-bookkeeping prunes.
    pub removed_signals: Mutex<Vec<RemoveSignalMutableStateRequest>>,
    /// Recorded child starts.
    pub started_children: Mutex<Vec<StartWorkflowExecutionRequest>>,
    /// Recorded first-decision schedules.
    pub scheduled_decisions: Mutex<Vec<ScheduleDecisionTaskRequest>>,
    /// Recorded parent notifications.
    pub child_completions: Mutex<Vec<RecordChildExecutionCompletedRequest>>,
    /// Recorded terminations.
    pub terminations: Mutex<Vec<TerminateWorkflowExecutionRequest>>,
    cancel_errors: Mutex<VecDeque<ServiceError>>,
    signal_errors: Mutex<VecDeque<ServiceError>>,
    start_results: Mutex<VecDeque<ServiceResult<StartWorkflowExecutionResponse>>>,
}

impl MockHistoryClient {
    /// Script the next cancellation to fail with `err`.
    pub fn push_cancel_error(&self, err: ServiceError) {
        self.cancel_errors.lock().unwrap().push_back(err);
    }

    /// Script the next signal to fail with `err`.
    pub fn push_signal_error(&self, err: ServiceError) {
        self.signal_errors.lock().unwrap().push_back(err);
    }

    /// Script the next child start outcome.
    pub fn push_start_result(&self, result: ServiceResult<StartWorkflowExecutionResponse>) {
        self.start_results.lock().unwrap().push_back(result);
    }
}

fn pop_or_ok(queue: &Mutex<VecDeque<ServiceError>>) -> ServiceResult<()> {
    match queue.lock().unwrap().pop_front() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[async_trait]
impl HistoryClient for MockHistoryClient {
    async fn request_cancel_workflow_execution(
        &self,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> ServiceResult<()> {
        self.cancel_requests.lock().unwrap().push(request);
        pop_or_ok(&self.cancel_errors)
    }

    async fn signal_workflow_execution(
        &self,
        request: SignalWorkflowExecutionRequest,
    ) -> ServiceResult<()> {
        self.signals.lock().unwrap().push(request);
        pop_or_ok(&self.signal_errors)
    }

    async fn remove_signal_mutable_state(
        &self,
        request: RemoveSignalMutableStateRequest,
    ) -> ServiceResult<()> {
        self.removed_signals.lock().unwrap().push(request);
        Ok(())
    }

    async fn start_workflow_execution(
        &self,
        request: StartWorkflowExecutionRequest,
    ) -> ServiceResult<StartWorkflowExecutionResponse> {
        self.started_children.lock().unwrap().push(request);
        match self.start_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(StartWorkflowExecutionResponse {
                run_id: uuid::Uuid::new_v4().to_string(),
            }),
        }
    }

    async fn schedule_decision_task(
        &self,
        request: ScheduleDecisionTaskRequest,
    ) -> ServiceResult<()> {
        self.scheduled_decisions.lock().unwrap().push(request);
        Ok(())
    }

    async fn record_child_execution_completed(
        &self,
        request: RecordChildExecutionCompletedRequest,
    ) -> ServiceResult<()> {
        self.child_completions.lock().unwrap().push(request);
        Ok(())
    }

    async fn terminate_workflow_execution(
        &self,
        request: TerminateWorkflowExecutionRequest,
    ) -> ServiceResult<()> {
        self.terminations.lock().unwrap().push(request);
        Ok(())
    }
}

/// Recording [`ArchivalClient`].
#[derive(Default)]
pub struct MockArchivalClient {
    /// Recorded archival enqueues.
    pub requests: Mutex<Vec<ArchiveRequest>>,
}

#[async_trait]
impl ArchivalClient for MockArchivalClient {
    async fn archive(&self, request: ArchiveRequest) -> ServiceResult<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Recording [`ParentClosePolicyClient`].
#[derive(Default)]
pub struct MockParentClosePolicyClient {
    /// Recorded fan-out enqueues.
    pub requests: Mutex<Vec<ParentClosePolicyRequest>>,
}

#[async_trait]
impl ParentClosePolicyClient for MockParentClosePolicyClient {
    async fn send(&self, request: ParentClosePolicyRequest) -> ServiceResult<()> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}
