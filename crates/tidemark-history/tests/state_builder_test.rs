// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for event batch application.

mod common;

use common::*;
use tidemark_history::mutable_state::{CloseStatus, MutableState, WorkflowState};
use tidemark_history::task_generator::MutableStateTaskGenerator;
use tidemark_protocol::task::{TimerTaskKind, TransferTaskKind};

fn fresh_state() -> MutableState {
    MutableState::new(NAMESPACE_ID, execution())
}

#[tokio::test]
async fn start_decide_activity_complete_flow() {
    let ctx = TestContext::new();
    let mut state = fresh_state();

    // Start through the first activity schedule in one batch.
    let mut events = first_decision_prefix();
    events.push(activity_scheduled(5, 4));
    ctx.apply_and_persist(&mut state, &events, &[]).await;

    assert_eq!(state.next_event_id, 6);
    assert_eq!(state.pending_activities.len(), 1);
    let activity = state.get_activity(5).expect("pending activity");
    assert_eq!(activity.schedule_to_start_timeout_seconds, 5);
    assert_eq!(activity.schedule_to_close_timeout_seconds, 10);
    assert_eq!(activity.heartbeat_timeout_seconds, 3);

    // The batch queued a dispatch for the activity; run it.
    let task = ctx
        .transfer_task_where(|task| matches!(task.kind, TransferTaskKind::ActivityTask { .. }))
        .await;
    ctx.executor.execute(&task, true).await.unwrap();

    let dispatches = ctx.matching_client.activity_tasks.lock().unwrap().clone();
    assert_eq!(dispatches.len(), 1);
    assert_eq!(dispatches[0].schedule_id, 5);
    assert_eq!(dispatches[0].schedule_to_start_timeout_seconds, 5);
    assert_eq!(dispatches[0].task_list, "some-task-list");

    // Activity starts and completes; the pending row must drop.
    let events = vec![activity_started(6, 5), activity_completed(7, 5)];
    ctx.apply_and_persist(&mut state, &events, &[]).await;
    assert!(state.pending_activities.is_empty());
    assert!(state.pending_activity_ids.is_empty());
    assert_eq!(state.next_event_id, 8);
}

#[tokio::test]
async fn next_event_id_advances_by_batch_length() {
    let ctx = TestContext::new();
    let mut state = fresh_state();

    let events = first_decision_prefix();
    let old_next = state.next_event_id;
    ctx.apply_and_persist(&mut state, &events, &[]).await;
    assert_eq!(state.next_event_id, old_next + events.len() as i64);
}

#[tokio::test]
async fn applying_the_same_batch_twice_is_deterministic() {
    let ctx = TestContext::new();

    let mut events = first_decision_prefix();
    events.push(activity_scheduled(5, 4));
    events.push(child_initiated(
        6,
        4,
        "child-wf",
        tidemark_protocol::ParentClosePolicy::Terminate,
    ));
    events.push(cancel_external_initiated(7, 4, &target_execution()));

    let mut first = fresh_state();
    let mut second = fresh_state();
    let mut generator_a = MutableStateTaskGenerator::new();
    let mut generator_b = MutableStateTaskGenerator::new();
    ctx.state_builder
        .apply_events(&mut first, &mut generator_a, "req", &events, &[])
        .await
        .unwrap();
    ctx.state_builder
        .apply_events(&mut second, &mut generator_b, "req", &events, &[])
        .await
        .unwrap();

    assert_eq!(first, second);
    // Derived request ids must be stable across replays too.
    assert_eq!(
        first.get_child_execution(6).unwrap().create_request_id,
        second.get_child_execution(6).unwrap().create_request_id,
    );
    assert_eq!(
        first.get_request_cancel(7).unwrap().cancel_request_id,
        second.get_request_cancel(7).unwrap().cancel_request_id,
    );
}

#[tokio::test]
async fn continue_as_new_builds_second_state() {
    let ctx = TestContext::new();
    let mut state = fresh_state();
    let new_run_id = "c0a8a1b4-0000-4000-8000-0000000000aa";

    let mut events = first_decision_prefix();
    events.push(continued_as_new(5, 4, new_run_id));

    let new_run_events = vec![
        workflow_started(1),
        workflow_signaled(2),
        decision_scheduled(3),
    ];
    let new_state = ctx
        .apply_and_persist(&mut state, &events, &new_run_events)
        .await
        .expect("continuation state");

    // First run closed as continued-as-new.
    assert_eq!(state.execution_info.state, WorkflowState::Closed);
    assert_eq!(
        state.execution_info.close_status,
        Some(CloseStatus::ContinuedAsNew)
    );

    // Continuation has its own state with the scheduled decision pending.
    assert_eq!(new_state.execution_info.run_id, new_run_id);
    assert_eq!(new_state.next_event_id, 4);
    let decision = new_state.pending_decision.as_ref().expect("pending decision");
    assert_eq!(decision.schedule_id, 3);
    assert_eq!(decision.started_id, 0);
    assert!(new_state.is_workflow_running());
}

#[tokio::test]
async fn continue_as_new_with_empty_new_run_batch_only_closes() {
    let ctx = TestContext::new();
    let mut state = fresh_state();

    let mut events = first_decision_prefix();
    events.push(continued_as_new(5, 4, "c0a8a1b4-0000-4000-8000-0000000000ab"));

    let new_state = ctx.apply_and_persist(&mut state, &events, &[]).await;
    assert!(new_state.is_none());
    assert!(!state.is_workflow_running());
}

#[tokio::test]
async fn duplicate_terminal_event_is_a_noop() {
    let ctx = TestContext::new();
    let mut state = fresh_state();

    let mut events = first_decision_prefix();
    events.push(activity_scheduled(5, 4));
    events.push(activity_started(6, 5));
    events.push(activity_completed(7, 5));
    // A replicated batch may replay the terminal event under a new id.
    events.push(activity_completed(8, 5));
    ctx.apply_and_persist(&mut state, &events, &[]).await;

    assert!(state.pending_activities.is_empty());
    assert_eq!(state.next_event_id, 9);
}

#[tokio::test]
async fn close_generates_close_task_and_timers_refresh_at_tail() {
    let ctx = TestContext::new();
    let mut state = fresh_state();

    let mut events = first_decision_prefix();
    events.push(workflow_completed(5, 4));

    let mut generator = MutableStateTaskGenerator::new();
    ctx.state_builder
        .apply_events(&mut state, &mut generator, "req", &events, &[])
        .await
        .unwrap();

    assert!(state
        .transfer_tasks
        .iter()
        .any(|task| task.kind == TransferTaskKind::CloseExecution));
    // Run-timeout timer from the started event.
    assert!(state
        .timer_tasks
        .iter()
        .any(|task| task.kind == TimerTaskKind::WorkflowTimeout));
    // Stickiness is always dropped at the batch tail.
    assert!(state.execution_info.sticky_task_list.is_empty());
}

#[tokio::test]
async fn replicated_stale_version_is_rejected() {
    let ctx = TestContext::new();
    let mut state = fresh_state();
    ctx.apply_and_persist(&mut state, &first_decision_prefix(), &[])
        .await;

    // An event at an already-applied id with an older version must fail.
    let mut stale = workflow_signaled(4);
    stale.version = VERSION - 1;
    state.next_event_id = 4;
    let mut generator = MutableStateTaskGenerator::new();
    let err = ctx
        .state_builder
        .apply_events(&mut state, &mut generator, "req", &[stale], &[])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");
}

#[tokio::test]
async fn transfer_tasks_carry_entry_versions() {
    let ctx = TestContext::new();
    let mut state = fresh_state();

    let mut events = first_decision_prefix();
    events.push(activity_scheduled(5, 4));
    ctx.apply_and_persist(&mut state, &events, &[]).await;

    for task in ctx.transfer_tasks().await {
        match task.kind {
            TransferTaskKind::ActivityTask { .. } => {
                let activity = state.get_activity(task.schedule_id).unwrap();
                assert_eq!(task.version, activity.version);
            }
            TransferTaskKind::DecisionTask { .. } => {
                // The decision completed within the batch; its task is
                // allowed to outlive the entry and will be dropped as stale.
                assert_eq!(task.version, VERSION);
            }
            _ => {}
        }
    }
}
