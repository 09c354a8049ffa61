// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for engine integration tests.
//!
//! Builds a single-shard engine over the in-memory stores and recording
//! mock clients, plus helpers for constructing history event batches.

#![allow(dead_code)]

use std::sync::Arc;

use tidemark_history::clients::mock::{
    MockArchivalClient, MockHistoryClient, MockMatchingClient, MockParentClosePolicyClient,
};
use tidemark_history::config::HistoryConfig;
use tidemark_history::mutable_state::MutableState;
use tidemark_history::namespace_cache::{InMemoryNamespaceProvider, NamespaceCache};
use tidemark_history::shard::{ManualClock, ShardContext};
use tidemark_history::state_builder::StateBuilder;
use tidemark_history::store::memory::{
    MemoryExecutionStore, MemoryHistoryStore, MemoryVisibilityStore,
};
use tidemark_history::store::{
    AppendHistoryNodesRequest, ExecutionStore, HistoryStore, UpdateWorkflowExecutionRequest,
};
use tidemark_history::task_generator::MutableStateTaskGenerator;
use tidemark_history::transfer_executor::TransferTaskExecutor;
use tidemark_history::workflow_cache::WorkflowCache;
use tidemark_protocol::events::*;
use tidemark_protocol::task::TransferTask;
use tidemark_protocol::{
    Namespace, ParentClosePolicy, ReplicationConfig, WorkflowExecution,
};

pub const SHARD_ID: u32 = 0;
pub const NAMESPACE_ID: &str = "ns-id";
pub const NAMESPACE: &str = "orders";
pub const TARGET_NAMESPACE_ID: &str = "target-ns-id";
pub const TARGET_NAMESPACE: &str = "target-ns";
pub const VERSION: i64 = 12;
pub const NOW: i64 = 1_700_000_000_000_000_000;

/// Single-shard engine wired over memory stores and mock clients.
pub struct TestContext {
    pub config: Arc<HistoryConfig>,
    pub execution_store: Arc<MemoryExecutionStore>,
    pub history_store: Arc<MemoryHistoryStore>,
    pub visibility_store: Arc<MemoryVisibilityStore>,
    pub matching_client: Arc<MockMatchingClient>,
    pub history_client: Arc<MockHistoryClient>,
    pub archival_client: Arc<MockArchivalClient>,
    pub parent_close_policy_client: Arc<MockParentClosePolicyClient>,
    pub namespace_provider: Arc<InMemoryNamespaceProvider>,
    pub namespace_cache: Arc<NamespaceCache>,
    pub clock: Arc<ManualClock>,
    pub shard: Arc<ShardContext>,
    pub workflow_cache: Arc<WorkflowCache>,
    pub executor: Arc<TransferTaskExecutor>,
    pub state_builder: StateBuilder,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        let config = Arc::new(config);
        let execution_store = Arc::new(MemoryExecutionStore::new());
        let history_store = Arc::new(MemoryHistoryStore::new());
        let visibility_store = Arc::new(MemoryVisibilityStore::new());
        let matching_client = Arc::new(MockMatchingClient::default());
        let history_client = Arc::new(MockHistoryClient::default());
        let archival_client = Arc::new(MockArchivalClient::default());
        let parent_close_policy_client = Arc::new(MockParentClosePolicyClient::default());

        let namespace_provider = Arc::new(InMemoryNamespaceProvider::new());
        namespace_provider.put(local_namespace(NAMESPACE_ID, NAMESPACE));
        namespace_provider.put(local_namespace(TARGET_NAMESPACE_ID, TARGET_NAMESPACE));
        let namespace_cache = Arc::new(NamespaceCache::new(namespace_provider.clone()));

        let clock = Arc::new(ManualClock::at(NOW));
        let shard = Arc::new(ShardContext::new(
            SHARD_ID,
            config.clone(),
            execution_store.clone(),
            history_store.clone(),
            visibility_store.clone(),
            matching_client.clone(),
            history_client.clone(),
            archival_client.clone(),
            parent_close_policy_client.clone(),
            namespace_cache.clone(),
            clock.clone(),
        ));
        let workflow_cache = Arc::new(WorkflowCache::new(
            SHARD_ID,
            execution_store.clone(),
            1024,
        ));
        let executor = Arc::new(TransferTaskExecutor::new(
            shard.clone(),
            workflow_cache.clone(),
        ));
        let state_builder = StateBuilder::new(namespace_cache.clone());

        Self {
            config,
            execution_store,
            history_store,
            visibility_store,
            matching_client,
            history_client,
            archival_client,
            parent_close_policy_client,
            namespace_provider,
            namespace_cache,
            clock,
            shard,
            workflow_cache,
            executor,
            state_builder,
        }
    }

    /// Apply a batch through the state builder and persist the snapshot,
    /// events, and generated tasks the way the engine does. Returns the
    /// continuation state for continue-as-new batches.
    pub async fn apply_and_persist(
        &self,
        state: &mut MutableState,
        events: &[HistoryEvent],
        new_run_events: &[HistoryEvent],
    ) -> Option<MutableState> {
        let mut generator = MutableStateTaskGenerator::new();
        let new_state = self
            .state_builder
            .apply_events(state, &mut generator, "start-req", events, new_run_events)
            .await
            .expect("apply events");

        let response = self
            .history_store
            .append_history_nodes(AppendHistoryNodesRequest {
                shard_id: SHARD_ID,
                branch_token: state.execution_info.branch_token.clone(),
                namespace_id: state.execution_info.namespace_id.clone(),
                execution: state.execution(),
                events: events.to_vec(),
            })
            .await
            .expect("append history");
        state.stats.history_size += response.size as u64;

        let (transfer_tasks, timer_tasks) = state.drain_tasks();
        self.execution_store
            .update_workflow_execution(UpdateWorkflowExecutionRequest {
                shard_id: SHARD_ID,
                state: state.clone(),
                transfer_tasks,
                timer_tasks,
            })
            .await
            .expect("persist execution");

        if let Some(mut new_state) = new_state {
            let response = self
                .history_store
                .append_history_nodes(AppendHistoryNodesRequest {
                    shard_id: SHARD_ID,
                    branch_token: new_state.execution_info.branch_token.clone(),
                    namespace_id: new_state.execution_info.namespace_id.clone(),
                    execution: new_state.execution(),
                    events: new_run_events.to_vec(),
                })
                .await
                .expect("append continuation history");
            new_state.stats.history_size += response.size as u64;

            let (transfer_tasks, timer_tasks) = new_state.drain_tasks();
            self.execution_store
                .update_workflow_execution(UpdateWorkflowExecutionRequest {
                    shard_id: SHARD_ID,
                    state: new_state.clone(),
                    transfer_tasks,
                    timer_tasks,
                })
                .await
                .expect("persist continuation");
            return Some(new_state);
        }
        None
    }

    /// All transfer tasks currently queued on the shard.
    pub async fn transfer_tasks(&self) -> Vec<TransferTask> {
        self.execution_store
            .get_transfer_tasks(SHARD_ID, 0, 1000)
            .await
            .expect("read transfer tasks")
    }

    /// The queued transfer task matching a predicate, failing when absent.
    pub async fn transfer_task_where(
        &self,
        predicate: impl Fn(&TransferTask) -> bool,
    ) -> TransferTask {
        self.transfer_tasks()
            .await
            .into_iter()
            .find(|task| predicate(task))
            .expect("expected transfer task not queued")
    }
}

pub fn local_namespace(id: &str, name: &str) -> Namespace {
    Namespace {
        id: id.to_string(),
        name: name.to_string(),
        global: false,
        replication: ReplicationConfig {
            active_cluster: "active".to_string(),
            clusters: vec!["active".to_string()],
        },
        failover_version: 0,
        notification_version: 0,
        retention_days: 7,
    }
}

pub fn execution() -> WorkflowExecution {
    WorkflowExecution::new("some-workflow-id", "c0a8a1b4-0000-4000-8000-000000000001")
}

pub fn target_execution() -> WorkflowExecution {
    WorkflowExecution::new("target-workflow-id", "c0a8a1b4-0000-4000-8000-00000000beef")
}

pub fn event(event_id: i64, attributes: EventAttributes) -> HistoryEvent {
    HistoryEvent {
        event_id,
        version: VERSION,
        timestamp: NOW,
        attributes,
    }
}

pub fn workflow_started(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionStarted(WorkflowExecutionStartedAttributes {
            workflow_type: "some-workflow-type".to_string(),
            task_list: "some-task-list".to_string(),
            execution_timeout_seconds: 120,
            run_timeout_seconds: 60,
            task_timeout_seconds: 10,
            ..Default::default()
        }),
    )
}

pub fn decision_scheduled(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::DecisionTaskScheduled(DecisionTaskScheduledAttributes {
            task_list: "some-task-list".to_string(),
            start_to_close_timeout_seconds: 10,
            attempt: 0,
        }),
    )
}

pub fn decision_started(event_id: i64, scheduled_event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::DecisionTaskStarted(DecisionTaskStartedAttributes {
            scheduled_event_id,
            identity: "worker-1".to_string(),
            request_id: "poll-req-1".to_string(),
        }),
    )
}

pub fn decision_completed(event_id: i64, scheduled_event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::DecisionTaskCompleted(DecisionTaskCompletedAttributes {
            scheduled_event_id,
            started_event_id: scheduled_event_id + 1,
            identity: "worker-1".to_string(),
            binary_checksum: String::new(),
        }),
    )
}

pub fn activity_scheduled(event_id: i64, decision_completed_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskScheduled(ActivityTaskScheduledAttributes {
            activity_id: format!("activity-{event_id}"),
            activity_type: "some-activity-type".to_string(),
            task_list: "some-task-list".to_string(),
            schedule_to_close_timeout_seconds: 10,
            schedule_to_start_timeout_seconds: 5,
            start_to_close_timeout_seconds: 8,
            heartbeat_timeout_seconds: 3,
            decision_task_completed_event_id: decision_completed_id,
            ..Default::default()
        }),
    )
}

pub fn activity_started(event_id: i64, scheduled_event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskStarted(ActivityTaskStartedAttributes {
            scheduled_event_id,
            identity: "worker-1".to_string(),
            request_id: "poll-req-2".to_string(),
            attempt: 0,
        }),
    )
}

pub fn activity_completed(event_id: i64, scheduled_event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ActivityTaskCompleted(ActivityTaskCompletedAttributes {
            scheduled_event_id,
            started_event_id: scheduled_event_id + 1,
            result: None,
            identity: "worker-1".to_string(),
        }),
    )
}

pub fn workflow_completed(event_id: i64, decision_completed_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionCompleted(WorkflowExecutionCompletedAttributes {
            result: None,
            decision_task_completed_event_id: decision_completed_id,
        }),
    )
}

pub fn workflow_signaled(event_id: i64) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionSignaled(WorkflowExecutionSignaledAttributes {
            signal_name: "some-signal".to_string(),
            input: None,
            identity: "sender".to_string(),
        }),
    )
}

pub fn continued_as_new(event_id: i64, decision_completed_id: i64, new_run_id: &str) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::WorkflowExecutionContinuedAsNew(
            WorkflowExecutionContinuedAsNewAttributes {
                new_execution_run_id: new_run_id.to_string(),
                workflow_type: "some-workflow-type".to_string(),
                task_list: "some-task-list".to_string(),
                input: None,
                run_timeout_seconds: 60,
                task_timeout_seconds: 10,
                decision_task_completed_event_id: decision_completed_id,
                backoff_start_interval_seconds: 0,
            },
        ),
    )
}

pub fn cancel_external_initiated(
    event_id: i64,
    decision_completed_id: i64,
    target: &WorkflowExecution,
) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::RequestCancelExternalWorkflowExecutionInitiated(
            RequestCancelExternalWorkflowExecutionInitiatedAttributes {
                decision_task_completed_event_id: decision_completed_id,
                namespace: TARGET_NAMESPACE.to_string(),
                execution: target.clone(),
                control: None,
                child_workflow_only: false,
            },
        ),
    )
}

pub fn signal_external_initiated(
    event_id: i64,
    decision_completed_id: i64,
    target: &WorkflowExecution,
) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::SignalExternalWorkflowExecutionInitiated(
            SignalExternalWorkflowExecutionInitiatedAttributes {
                decision_task_completed_event_id: decision_completed_id,
                namespace: TARGET_NAMESPACE.to_string(),
                execution: target.clone(),
                signal_name: "some-signal".to_string(),
                input: None,
                control: None,
                child_workflow_only: false,
            },
        ),
    )
}

pub fn child_initiated(
    event_id: i64,
    decision_completed_id: i64,
    child_workflow_id: &str,
    policy: ParentClosePolicy,
) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::StartChildWorkflowExecutionInitiated(
            StartChildWorkflowExecutionInitiatedAttributes {
                namespace: TARGET_NAMESPACE.to_string(),
                workflow_id: child_workflow_id.to_string(),
                workflow_type: "some-child-type".to_string(),
                task_list: "some-task-list".to_string(),
                input: None,
                execution_timeout_seconds: 120,
                run_timeout_seconds: 60,
                task_timeout_seconds: 10,
                parent_close_policy: policy,
                decision_task_completed_event_id: decision_completed_id,
                cron_schedule: None,
                retry_policy: None,
            },
        ),
    )
}

pub fn child_started(
    event_id: i64,
    initiated_event_id: i64,
    child: &WorkflowExecution,
) -> HistoryEvent {
    event(
        event_id,
        EventAttributes::ChildWorkflowExecutionStarted(ChildWorkflowExecutionStartedAttributes {
            initiated_event_id,
            namespace: TARGET_NAMESPACE.to_string(),
            execution: child.clone(),
            workflow_type: "some-child-type".to_string(),
        }),
    )
}

/// A `{Started, DecisionScheduled, DecisionStarted, DecisionCompleted}`
/// prefix; follow-on events start at id 5.
pub fn first_decision_prefix() -> Vec<HistoryEvent> {
    vec![
        workflow_started(1),
        decision_scheduled(2),
        decision_started(3, 2),
        decision_completed(4, 2),
    ]
}
