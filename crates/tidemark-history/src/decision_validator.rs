// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Decision attribute validation and default-filling.
//!
//! Stateless checks applied to every decision a worker returns, before any
//! event is written. Besides rejecting malformed attributes, the validator
//! fills defaults in place: activity timeouts are deduced from what is set,
//! and continue-as-new / child-workflow attributes inherit from the parent
//! execution. Default-filling is idempotent, so validating an already-filled
//! block leaves it unchanged.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tidemark_protocol::decisions::*;
use tidemark_protocol::error::{ServiceError, ServiceResult};
use tidemark_protocol::RetryPolicy;
use uuid::Uuid;

use crate::config::RESERVED_TASK_LIST_PREFIX;
use crate::mutable_state::ExecutionInfo;
use crate::namespace_cache::NamespaceCache;

/// Enforces the per-namespace search attribute budget.
pub struct SearchAttributesValidator {
    key_limit: usize,
    value_limit: usize,
    total_limit: usize,
}

impl SearchAttributesValidator {
    /// Create a validator with the given budget.
    pub fn new(key_limit: usize, value_limit: usize, total_limit: usize) -> Self {
        Self {
            key_limit,
            value_limit,
            total_limit,
        }
    }

    /// Check an attribute map against the budget.
    pub fn validate(
        &self,
        attributes: &HashMap<String, serde_json::Value>,
        namespace: &str,
    ) -> ServiceResult<()> {
        if attributes.len() > self.key_limit {
            return Err(ServiceError::invalid_argument(format!(
                "number of search attributes {} exceeds limit {} for namespace {}",
                attributes.len(),
                self.key_limit,
                namespace
            )));
        }
        let mut total = 0usize;
        for (key, value) in attributes {
            let size = serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0);
            if size > self.value_limit {
                return Err(ServiceError::invalid_argument(format!(
                    "search attribute {} value size {} exceeds limit {} for namespace {}",
                    key, size, self.value_limit, namespace
                )));
            }
            total += key.len() + size;
        }
        if total > self.total_limit {
            return Err(ServiceError::invalid_argument(format!(
                "total search attributes size {} exceeds limit {} for namespace {}",
                total, self.total_limit, namespace
            )));
        }
        Ok(())
    }
}

/// Validate a user-supplied retry policy. `None` means no retries and is
/// always valid.
pub fn validate_retry_policy(policy: Option<&RetryPolicy>) -> ServiceResult<()> {
    let Some(policy) = policy else {
        return Ok(());
    };
    if policy.initial_interval_seconds < 0 {
        return Err(ServiceError::invalid_argument(
            "InitialIntervalInSeconds cannot be negative on retry policy.",
        ));
    }
    if policy.backoff_coefficient < 1.0 {
        return Err(ServiceError::invalid_argument(
            "BackoffCoefficient cannot be less than 1 on retry policy.",
        ));
    }
    if policy.maximum_interval_seconds < 0 {
        return Err(ServiceError::invalid_argument(
            "MaximumIntervalInSeconds cannot be negative on retry policy.",
        ));
    }
    if policy.maximum_interval_seconds > 0
        && policy.maximum_interval_seconds < policy.initial_interval_seconds
    {
        return Err(ServiceError::invalid_argument(
            "MaximumIntervalInSeconds cannot be less than InitialIntervalInSeconds on retry policy.",
        ));
    }
    if policy.maximum_attempts < 0 {
        return Err(ServiceError::invalid_argument(
            "MaximumAttempts cannot be negative on retry policy.",
        ));
    }
    Ok(())
}

/// Validate a cron expression. Standard 5-field Unix syntax; the empty
/// string means no schedule and is valid.
pub fn validate_cron_schedule(schedule: &str) -> ServiceResult<()> {
    if schedule.is_empty() {
        return Ok(());
    }
    // The cron crate wants 6 fields with seconds; prepend second 0 for the
    // standard 5-field form.
    let fields = schedule.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {schedule}")
    } else {
        schedule.to_string()
    };
    cron::Schedule::from_str(&normalized)
        .map(|_| ())
        .map_err(|err| {
            ServiceError::invalid_argument(format!("Invalid CronSchedule: {err}"))
        })
}

/// Seconds until the next cron occurrence after `now_nanos`. Returns zero
/// for an empty schedule (no backoff).
pub fn first_decision_backoff_seconds(schedule: &str, now_nanos: i64) -> ServiceResult<i32> {
    if schedule.is_empty() {
        return Ok(0);
    }
    let fields = schedule.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {schedule}")
    } else {
        schedule.to_string()
    };
    let parsed = cron::Schedule::from_str(&normalized)
        .map_err(|err| ServiceError::invalid_argument(format!("Invalid CronSchedule: {err}")))?;
    let now = chrono::DateTime::from_timestamp_nanos(now_nanos);
    let next = parsed
        .after(&now)
        .next()
        .ok_or_else(|| ServiceError::invalid_argument("CronSchedule has no next occurrence"))?;
    let delta_seconds = (next - now).num_seconds();
    Ok(i32::try_from(delta_seconds.max(1)).unwrap_or(i32::MAX))
}

/// Stateless validator for decision attribute blocks.
pub struct DecisionAttrValidator {
    namespace_cache: Arc<NamespaceCache>,
    max_id_length: usize,
    search_attributes_validator: SearchAttributesValidator,
}

impl DecisionAttrValidator {
    /// Create a validator.
    pub fn new(
        namespace_cache: Arc<NamespaceCache>,
        max_id_length: usize,
        search_attributes_validator: SearchAttributesValidator,
    ) -> Self {
        Self {
            namespace_cache,
            max_id_length,
            search_attributes_validator,
        }
    }

    /// Validate and default-fill one decision, resolving its target
    /// namespace and dispatching to the per-kind check. Invoked for every
    /// decision in a decision-task completion.
    pub async fn validate_decision(
        &self,
        decision: &mut Decision,
        execution_info: &ExecutionInfo,
        now_nanos: i64,
    ) -> ServiceResult<()> {
        let namespace_id = execution_info.namespace_id.clone();
        match decision {
            Decision::ScheduleActivityTask(attrs) => {
                let target = self
                    .target_namespace_id(&namespace_id, &attrs.namespace)
                    .await?;
                self.validate_activity_schedule_attributes(
                    &namespace_id,
                    &target,
                    attrs,
                    execution_info.run_timeout_seconds,
                )
                .await
            }
            Decision::RequestCancelActivityTask(attrs) => {
                self.validate_activity_cancel_attributes(attrs)
            }
            Decision::StartTimer(attrs) => self.validate_timer_schedule_attributes(attrs),
            Decision::CancelTimer(attrs) => self.validate_timer_cancel_attributes(attrs),
            Decision::RecordMarker(attrs) => self.validate_record_marker_attributes(attrs),
            Decision::CompleteWorkflowExecution(attrs) => {
                self.validate_complete_workflow_execution_attributes(attrs)
            }
            Decision::FailWorkflowExecution(attrs) => {
                self.validate_fail_workflow_execution_attributes(attrs)
            }
            Decision::CancelWorkflowExecution(attrs) => {
                self.validate_cancel_workflow_execution_attributes(attrs)
            }
            Decision::RequestCancelExternalWorkflowExecution(attrs) => {
                let target = self
                    .target_namespace_id(&namespace_id, &attrs.namespace)
                    .await?;
                self.validate_cancel_external_workflow_execution_attributes(
                    &namespace_id,
                    &target,
                    attrs,
                )
                .await
            }
            Decision::SignalExternalWorkflowExecution(attrs) => {
                let target = self
                    .target_namespace_id(&namespace_id, &attrs.namespace)
                    .await?;
                self.validate_signal_external_workflow_execution_attributes(
                    &namespace_id,
                    &target,
                    attrs,
                )
                .await
            }
            Decision::UpsertWorkflowSearchAttributes(attrs) => {
                let namespace = self.namespace_cache.get_namespace_by_id(&namespace_id).await?;
                self.validate_upsert_workflow_search_attributes(&namespace.name, attrs)
            }
            Decision::ContinueAsNewWorkflowExecution(attrs) => {
                self.validate_continue_as_new_workflow_execution_attributes(
                    attrs,
                    execution_info,
                    now_nanos,
                )
                .await
            }
            Decision::StartChildWorkflowExecution(attrs) => {
                let target = self
                    .target_namespace_id(&namespace_id, &attrs.namespace)
                    .await?;
                self.validate_start_child_execution_attributes(
                    &namespace_id,
                    &target,
                    attrs,
                    execution_info,
                )
                .await
            }
        }
    }

    /// Resolve a decision's target namespace name to an id; blank means the
    /// workflow's own namespace.
    async fn target_namespace_id(
        &self,
        own_namespace_id: &str,
        namespace_name: &str,
    ) -> ServiceResult<String> {
        if namespace_name.is_empty() {
            return Ok(own_namespace_id.to_string());
        }
        Ok(self
            .namespace_cache
            .get_namespace(namespace_name)
            .await?
            .id
            .clone())
    }

    /// Validate and default-fill a schedule-activity decision.
    pub async fn validate_activity_schedule_attributes(
        &self,
        namespace_id: &str,
        target_namespace_id: &str,
        attributes: &mut ScheduleActivityTaskAttributes,
        run_timeout_seconds: i32,
    ) -> ServiceResult<()> {
        self.validate_cross_namespace_call(namespace_id, target_namespace_id)
            .await?;

        self.validated_task_list(&mut attributes.task_list, "")?;

        if attributes.activity_id.is_empty() {
            return Err(ServiceError::invalid_argument(
                "ActivityId is not set on decision.",
            ));
        }
        if attributes.activity_type.is_empty() {
            return Err(ServiceError::invalid_argument(
                "ActivityType is not set on decision.",
            ));
        }
        validate_retry_policy(attributes.retry_policy.as_ref())?;
        if attributes.activity_id.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "ActivityID exceeds length limit.",
            ));
        }
        if attributes.activity_type.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "ActivityType exceeds length limit.",
            ));
        }
        if attributes.namespace.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "Namespace exceeds length limit.",
            ));
        }

        // Only deduce unspecified timeouts when every timeout is non-negative.
        if attributes.schedule_to_close_timeout_seconds < 0
            || attributes.schedule_to_start_timeout_seconds < 0
            || attributes.start_to_close_timeout_seconds < 0
            || attributes.heartbeat_timeout_seconds < 0
        {
            return Err(ServiceError::invalid_argument(
                "A valid timeout may not be negative.",
            ));
        }

        let valid_schedule_to_close = attributes.schedule_to_close_timeout_seconds > 0;
        let valid_schedule_to_start = attributes.schedule_to_start_timeout_seconds > 0;
        let valid_start_to_close = attributes.start_to_close_timeout_seconds > 0;

        if valid_schedule_to_close {
            if valid_schedule_to_start {
                attributes.schedule_to_start_timeout_seconds = attributes
                    .schedule_to_start_timeout_seconds
                    .min(attributes.schedule_to_close_timeout_seconds);
            } else {
                attributes.schedule_to_start_timeout_seconds =
                    attributes.schedule_to_close_timeout_seconds;
            }
            if valid_start_to_close {
                attributes.start_to_close_timeout_seconds = attributes
                    .start_to_close_timeout_seconds
                    .min(attributes.schedule_to_close_timeout_seconds);
            } else {
                attributes.start_to_close_timeout_seconds =
                    attributes.schedule_to_close_timeout_seconds;
            }
        } else if valid_start_to_close {
            attributes.schedule_to_close_timeout_seconds = run_timeout_seconds;
            if !valid_schedule_to_start {
                attributes.schedule_to_start_timeout_seconds = run_timeout_seconds;
            }
        } else {
            // Not enough information to fill in the missing timeouts.
            return Err(ServiceError::invalid_argument(
                "A valid StartToClose or ScheduleToCloseTimeout is not set on decision.",
            ));
        }

        // An activity timeout never outlives the workflow run timeout.
        if run_timeout_seconds > 0 {
            if attributes.schedule_to_close_timeout_seconds > run_timeout_seconds {
                attributes.schedule_to_close_timeout_seconds = run_timeout_seconds;
            }
            if attributes.schedule_to_start_timeout_seconds > run_timeout_seconds {
                attributes.schedule_to_start_timeout_seconds = run_timeout_seconds;
            }
            if attributes.start_to_close_timeout_seconds > run_timeout_seconds {
                attributes.start_to_close_timeout_seconds = run_timeout_seconds;
            }
            if attributes.heartbeat_timeout_seconds > run_timeout_seconds {
                attributes.heartbeat_timeout_seconds = run_timeout_seconds;
            }
        }
        if attributes.heartbeat_timeout_seconds > attributes.schedule_to_close_timeout_seconds {
            attributes.heartbeat_timeout_seconds = attributes.schedule_to_close_timeout_seconds;
        }
        Ok(())
    }

    /// Validate a start-timer decision.
    pub fn validate_timer_schedule_attributes(
        &self,
        attributes: &StartTimerAttributes,
    ) -> ServiceResult<()> {
        if attributes.timer_id.is_empty() {
            return Err(ServiceError::invalid_argument(
                "TimerId is not set on decision.",
            ));
        }
        if attributes.timer_id.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "TimerId exceeds length limit.",
            ));
        }
        if attributes.start_to_fire_timeout_seconds <= 0 {
            return Err(ServiceError::invalid_argument(
                "A valid StartToFireTimeoutSeconds is not set on decision.",
            ));
        }
        Ok(())
    }

    /// Validate an activity-cancel decision.
    pub fn validate_activity_cancel_attributes(
        &self,
        attributes: &RequestCancelActivityTaskAttributes,
    ) -> ServiceResult<()> {
        if attributes.scheduled_event_id <= 0 {
            return Err(ServiceError::invalid_argument(
                "ScheduledEventId is not set on decision.",
            ));
        }
        Ok(())
    }

    /// Validate a timer-cancel decision.
    pub fn validate_timer_cancel_attributes(
        &self,
        attributes: &CancelTimerAttributes,
    ) -> ServiceResult<()> {
        if attributes.timer_id.is_empty() {
            return Err(ServiceError::invalid_argument(
                "TimerId is not set on decision.",
            ));
        }
        if attributes.timer_id.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "TimerId exceeds length limit.",
            ));
        }
        Ok(())
    }

    /// Validate a record-marker decision.
    pub fn validate_record_marker_attributes(
        &self,
        attributes: &RecordMarkerAttributes,
    ) -> ServiceResult<()> {
        if attributes.marker_name.is_empty() {
            return Err(ServiceError::invalid_argument(
                "MarkerName is not set on decision.",
            ));
        }
        if attributes.marker_name.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "MarkerName exceeds length limit.",
            ));
        }
        Ok(())
    }

    /// Validate a complete-workflow decision.
    pub fn validate_complete_workflow_execution_attributes(
        &self,
        _attributes: &CompleteWorkflowExecutionAttributes,
    ) -> ServiceResult<()> {
        Ok(())
    }

    /// Validate a fail-workflow decision.
    pub fn validate_fail_workflow_execution_attributes(
        &self,
        attributes: &FailWorkflowExecutionAttributes,
    ) -> ServiceResult<()> {
        if attributes.failure.is_none() {
            return Err(ServiceError::invalid_argument(
                "Failure is not set on decision.",
            ));
        }
        Ok(())
    }

    /// Validate a cancel-workflow decision.
    pub fn validate_cancel_workflow_execution_attributes(
        &self,
        _attributes: &CancelWorkflowExecutionAttributes,
    ) -> ServiceResult<()> {
        Ok(())
    }

    /// Validate a cancel-external-workflow decision.
    pub async fn validate_cancel_external_workflow_execution_attributes(
        &self,
        namespace_id: &str,
        target_namespace_id: &str,
        attributes: &RequestCancelExternalWorkflowExecutionAttributes,
    ) -> ServiceResult<()> {
        self.validate_cross_namespace_call(namespace_id, target_namespace_id)
            .await?;

        if attributes.workflow_id.is_empty() {
            return Err(ServiceError::invalid_argument(
                "WorkflowId is not set on decision.",
            ));
        }
        if attributes.namespace.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "Namespace exceeds length limit.",
            ));
        }
        if attributes.workflow_id.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "WorkflowId exceeds length limit.",
            ));
        }
        if !attributes.run_id.is_empty() && Uuid::parse_str(&attributes.run_id).is_err() {
            return Err(ServiceError::invalid_argument(
                "Invalid RunId set on decision.",
            ));
        }
        Ok(())
    }

    /// Validate a signal-external-workflow decision.
    pub async fn validate_signal_external_workflow_execution_attributes(
        &self,
        namespace_id: &str,
        target_namespace_id: &str,
        attributes: &SignalExternalWorkflowExecutionAttributes,
    ) -> ServiceResult<()> {
        self.validate_cross_namespace_call(namespace_id, target_namespace_id)
            .await?;

        let Some(execution) = &attributes.execution else {
            return Err(ServiceError::invalid_argument("Execution is nil on decision."));
        };
        if execution.workflow_id.is_empty() {
            return Err(ServiceError::invalid_argument(
                "WorkflowId is not set on decision.",
            ));
        }
        if attributes.namespace.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "Namespace exceeds length limit.",
            ));
        }
        if execution.workflow_id.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "WorkflowId exceeds length limit.",
            ));
        }
        if !execution.run_id.is_empty() && Uuid::parse_str(&execution.run_id).is_err() {
            return Err(ServiceError::invalid_argument(
                "Invalid RunId set on decision.",
            ));
        }
        if attributes.signal_name.is_empty() {
            return Err(ServiceError::invalid_argument(
                "SignalName is not set on decision.",
            ));
        }
        Ok(())
    }

    /// Validate an upsert-search-attributes decision.
    pub fn validate_upsert_workflow_search_attributes(
        &self,
        namespace: &str,
        attributes: &UpsertWorkflowSearchAttributesAttributes,
    ) -> ServiceResult<()> {
        if attributes.search_attributes.is_empty() {
            return Err(ServiceError::invalid_argument(
                "IndexedFields is empty on decision.",
            ));
        }
        self.search_attributes_validator
            .validate(&attributes.search_attributes, namespace)
    }

    /// Validate and default-fill a continue-as-new decision. Blank fields
    /// inherit from the closing run; the run timeout is reduced so the
    /// continuation cannot outlive the chain's expiration.
    pub async fn validate_continue_as_new_workflow_execution_attributes(
        &self,
        attributes: &mut ContinueAsNewWorkflowExecutionAttributes,
        execution_info: &ExecutionInfo,
        now_nanos: i64,
    ) -> ServiceResult<()> {
        if attributes.workflow_type.is_empty() {
            attributes.workflow_type = execution_info.workflow_type.clone();
        }
        if attributes.workflow_type.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "WorkflowType exceeds length limit.",
            ));
        }

        self.validated_task_list(&mut attributes.task_list, &execution_info.task_list)?;

        // Reduce the run timeout when it would cross the chain expiration.
        // The result may be negative; the continue-as-new handler treats a
        // non-positive timeout as an immediately-expiring run.
        if execution_info.expiration_timestamp > 0 {
            let remaining_nanos = execution_info.expiration_timestamp - now_nanos;
            let remaining_seconds = (remaining_nanos + 999_999_999).div_euclid(1_000_000_000);
            let remaining_seconds = i32::try_from(remaining_seconds).unwrap_or(i32::MAX);
            attributes.run_timeout_seconds = if attributes.run_timeout_seconds > 0 {
                attributes.run_timeout_seconds.min(remaining_seconds)
            } else {
                execution_info.run_timeout_seconds.min(remaining_seconds)
            };
        } else if attributes.run_timeout_seconds == 0 {
            attributes.run_timeout_seconds = execution_info.run_timeout_seconds;
        }

        if attributes.task_timeout_seconds <= 0 {
            attributes.task_timeout_seconds = execution_info.task_timeout_seconds;
        }

        if attributes.backoff_start_interval_seconds < 0 {
            return Err(ServiceError::invalid_argument(
                "BackoffStartInterval is less than 0.",
            ));
        }
        validate_retry_policy(attributes.retry_policy.as_ref())?;

        let namespace = self
            .namespace_cache
            .get_namespace_by_id(&execution_info.namespace_id)
            .await?;
        self.search_attributes_validator
            .validate(&attributes.search_attributes, &namespace.name)
    }

    /// Validate and default-fill a start-child-workflow decision. Blank
    /// task list and timeouts inherit from the parent execution.
    pub async fn validate_start_child_execution_attributes(
        &self,
        namespace_id: &str,
        target_namespace_id: &str,
        attributes: &mut StartChildWorkflowExecutionAttributes,
        parent_info: &ExecutionInfo,
    ) -> ServiceResult<()> {
        self.validate_cross_namespace_call(namespace_id, target_namespace_id)
            .await?;

        if attributes.workflow_id.is_empty() {
            return Err(ServiceError::invalid_argument(
                "Required field WorkflowId is not set on decision.",
            ));
        }
        if attributes.workflow_type.is_empty() {
            return Err(ServiceError::invalid_argument(
                "Required field WorkflowType is not set on decision.",
            ));
        }
        if attributes.namespace.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "Namespace exceeds length limit.",
            ));
        }
        if attributes.workflow_id.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "WorkflowId exceeds length limit.",
            ));
        }
        if attributes.workflow_type.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(
                "WorkflowType exceeds length limit.",
            ));
        }
        validate_retry_policy(attributes.retry_policy.as_ref())?;
        validate_cron_schedule(&attributes.cron_schedule)?;

        self.validated_task_list(&mut attributes.task_list, &parent_info.task_list)?;

        if attributes.execution_timeout_seconds <= 0 {
            attributes.execution_timeout_seconds = parent_info.execution_timeout_seconds;
        }
        if attributes.run_timeout_seconds <= 0 {
            attributes.run_timeout_seconds = parent_info.run_timeout_seconds;
        }
        if attributes.task_timeout_seconds <= 0 {
            attributes.task_timeout_seconds = parent_info.task_timeout_seconds;
        }
        Ok(())
    }

    /// Check a task-list name, filling in `default` when blank. Names over
    /// the length cap or under the reserved system prefix are rejected.
    pub fn validated_task_list(
        &self,
        task_list: &mut String,
        default: &str,
    ) -> ServiceResult<()> {
        if task_list.is_empty() {
            if default.is_empty() {
                return Err(ServiceError::invalid_argument("missing task list name"));
            }
            *task_list = default.to_string();
            return Ok(());
        }
        if task_list.len() > self.max_id_length {
            return Err(ServiceError::invalid_argument(format!(
                "task list name exceeds length limit of {}",
                self.max_id_length
            )));
        }
        if task_list.starts_with(RESERVED_TASK_LIST_PREFIX) {
            return Err(ServiceError::invalid_argument(format!(
                "task list name cannot start with reserved prefix {RESERVED_TASK_LIST_PREFIX}"
            )));
        }
        Ok(())
    }

    /// Permit a cross-namespace call only when both namespaces are
    /// effectively local to the same cluster, or identical.
    pub async fn validate_cross_namespace_call(
        &self,
        namespace_id: &str,
        target_namespace_id: &str,
    ) -> ServiceResult<()> {
        if namespace_id == target_namespace_id {
            return Ok(());
        }

        let namespace = self.namespace_cache.get_namespace_by_id(namespace_id).await?;
        let target = self
            .namespace_cache
            .get_namespace_by_id(target_namespace_id)
            .await?;

        if !namespace.global && !target.global {
            return Ok(());
        }

        // A global namespace with one replication cluster behaves like a
        // local one.
        let clusters = &namespace.replication.clusters;
        let target_clusters = &target.replication.clusters;
        if clusters.len() == 1 && target_clusters.len() == 1 && clusters[0] == target_clusters[0] {
            return Ok(());
        }

        Err(ServiceError::invalid_argument(format!(
            "cannot make cross namespace call between {} and {}",
            namespace.name, target.name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace_cache::InMemoryNamespaceProvider;
    use tidemark_protocol::{Namespace, ReplicationConfig, WorkflowExecution};

    fn validator_with(provider: Arc<InMemoryNamespaceProvider>) -> DecisionAttrValidator {
        DecisionAttrValidator::new(
            Arc::new(NamespaceCache::new(provider)),
            1000,
            SearchAttributesValidator::new(10, 1024, 4096),
        )
    }

    fn validator() -> DecisionAttrValidator {
        validator_with(Arc::new(InMemoryNamespaceProvider::new()))
    }

    fn namespace(id: &str, name: &str, global: bool, clusters: &[&str]) -> Namespace {
        Namespace {
            id: id.to_string(),
            name: name.to_string(),
            global,
            replication: ReplicationConfig {
                active_cluster: clusters.first().unwrap_or(&"active").to_string(),
                clusters: clusters.iter().map(|c| c.to_string()).collect(),
            },
            failover_version: 0,
            notification_version: 0,
            retention_days: 7,
        }
    }

    fn activity_attrs() -> ScheduleActivityTaskAttributes {
        ScheduleActivityTaskAttributes {
            activity_id: "a1".into(),
            activity_type: "charge".into(),
            task_list: "payments".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn activity_timeouts_deduced_from_schedule_to_close() {
        let v = validator();
        let mut attrs = activity_attrs();
        attrs.schedule_to_close_timeout_seconds = 30;
        v.validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap();
        assert_eq!(attrs.schedule_to_start_timeout_seconds, 30);
        assert_eq!(attrs.start_to_close_timeout_seconds, 30);
    }

    #[tokio::test]
    async fn activity_schedule_to_close_bounds_other_timeouts() {
        let v = validator();
        let mut attrs = activity_attrs();
        attrs.schedule_to_close_timeout_seconds = 10;
        attrs.schedule_to_start_timeout_seconds = 20;
        attrs.start_to_close_timeout_seconds = 25;
        attrs.heartbeat_timeout_seconds = 40;
        v.validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap();
        assert_eq!(attrs.schedule_to_start_timeout_seconds, 10);
        assert_eq!(attrs.start_to_close_timeout_seconds, 10);
        assert_eq!(attrs.heartbeat_timeout_seconds, 10);
    }

    #[tokio::test]
    async fn activity_start_to_close_alone_defaults_to_run_timeout() {
        let v = validator();
        let mut attrs = activity_attrs();
        attrs.start_to_close_timeout_seconds = 8;
        v.validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap();
        assert_eq!(attrs.schedule_to_close_timeout_seconds, 60);
        assert_eq!(attrs.schedule_to_start_timeout_seconds, 60);
        assert_eq!(attrs.start_to_close_timeout_seconds, 8);
    }

    #[tokio::test]
    async fn activity_without_deducible_timeouts_is_rejected() {
        let v = validator();
        // schedule-to-close unset with only schedule-to-start set cannot be
        // deduced.
        let mut attrs = activity_attrs();
        attrs.schedule_to_start_timeout_seconds = 5;
        let err = v
            .validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("StartToClose or ScheduleToClose"));
    }

    #[tokio::test]
    async fn activity_timeouts_capped_at_run_timeout() {
        let v = validator();
        let mut attrs = activity_attrs();
        attrs.schedule_to_close_timeout_seconds = 500;
        attrs.heartbeat_timeout_seconds = 400;
        v.validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap();
        assert_eq!(attrs.schedule_to_close_timeout_seconds, 60);
        assert_eq!(attrs.heartbeat_timeout_seconds, 60);
    }

    #[tokio::test]
    async fn activity_negative_timeout_is_rejected() {
        let v = validator();
        let mut attrs = activity_attrs();
        attrs.start_to_close_timeout_seconds = -1;
        let err = v
            .validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("may not be negative"));
    }

    #[tokio::test]
    async fn activity_default_filling_is_idempotent() {
        let v = validator();
        let mut attrs = activity_attrs();
        attrs.schedule_to_close_timeout_seconds = 30;
        v.validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap();
        let filled = attrs.clone();
        v.validate_activity_schedule_attributes("ns", "ns", &mut attrs, 60)
            .await
            .unwrap();
        assert_eq!(attrs, filled);
    }

    #[test]
    fn timer_start_to_fire_zero_is_rejected() {
        let v = validator();
        let attrs = StartTimerAttributes {
            timer_id: "t1".into(),
            start_to_fire_timeout_seconds: 0,
        };
        let err = v.validate_timer_schedule_attributes(&attrs).unwrap_err();
        assert!(err.to_string().contains("StartToFireTimeoutSeconds"));
    }

    #[test]
    fn task_list_over_length_limit_is_rejected() {
        let v = validator();
        let mut name = "x".repeat(1001);
        let err = v.validated_task_list(&mut name, "").unwrap_err();
        assert!(err.to_string().contains("length limit"));

        let mut ok_name = "x".repeat(1000);
        v.validated_task_list(&mut ok_name, "").unwrap();
    }

    #[test]
    fn reserved_task_list_prefix_is_rejected() {
        let v = validator();
        let mut name = format!("{RESERVED_TASK_LIST_PREFIX}sweeper");
        let err = v.validated_task_list(&mut name, "").unwrap_err();
        assert!(err.to_string().contains("reserved prefix"));
    }

    #[test]
    fn blank_task_list_inherits_default() {
        let v = validator();
        let mut name = String::new();
        v.validated_task_list(&mut name, "parent-list").unwrap();
        assert_eq!(name, "parent-list");

        let mut no_default = String::new();
        assert!(v.validated_task_list(&mut no_default, "").is_err());
    }

    #[tokio::test]
    async fn cross_namespace_between_different_active_clusters_is_rejected() {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        provider.put(namespace("ns-a", "alpha", true, &["cluster-east"]));
        provider.put(namespace("ns-b", "beta", true, &["cluster-west"]));
        let v = validator_with(provider);

        let err = v
            .validate_cross_namespace_call("ns-a", "ns-b")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("alpha") && message.contains("beta"), "{message}");
    }

    #[tokio::test]
    async fn cross_namespace_allowed_cases() {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        provider.put(namespace("ns-a", "alpha", false, &["cluster-east"]));
        provider.put(namespace("ns-b", "beta", false, &["cluster-east"]));
        provider.put(namespace("ns-c", "gamma", true, &["cluster-east"]));
        provider.put(namespace("ns-d", "delta", true, &["cluster-east"]));
        let v = validator_with(provider);

        // Identical ids never need a lookup.
        v.validate_cross_namespace_call("ns-x", "ns-x").await.unwrap();
        // Two local namespaces.
        v.validate_cross_namespace_call("ns-a", "ns-b").await.unwrap();
        // Two single-cluster global namespaces on the same cluster.
        v.validate_cross_namespace_call("ns-c", "ns-d").await.unwrap();
    }

    #[test]
    fn retry_policy_validation() {
        assert!(validate_retry_policy(None).is_ok());
        let ok = RetryPolicy {
            initial_interval_seconds: 1,
            backoff_coefficient: 2.0,
            maximum_interval_seconds: 10,
            maximum_attempts: 3,
            non_retryable_error_types: vec![],
        };
        assert!(validate_retry_policy(Some(&ok)).is_ok());

        let mut bad = ok.clone();
        bad.backoff_coefficient = 0.5;
        assert!(validate_retry_policy(Some(&bad)).is_err());

        let mut bad = ok.clone();
        bad.maximum_interval_seconds = 1;
        bad.initial_interval_seconds = 5;
        assert!(validate_retry_policy(Some(&bad)).is_err());
    }

    #[test]
    fn cron_schedule_validation() {
        assert!(validate_cron_schedule("").is_ok());
        assert!(validate_cron_schedule("*/5 * * * *").is_ok());
        assert!(validate_cron_schedule("not a cron").is_err());
    }

    #[test]
    fn cron_backoff_lands_on_next_occurrence() {
        // 2023-11-14T22:13:20Z; the next 5-minute boundary is 22:15:00.
        let now = 1_700_000_000_000_000_000;
        let backoff = first_decision_backoff_seconds("*/5 * * * *", now).unwrap();
        assert_eq!(backoff, 100);
        assert_eq!(first_decision_backoff_seconds("", now).unwrap(), 0);
        assert!(first_decision_backoff_seconds("junk", now).is_err());
    }

    #[tokio::test]
    async fn validate_decision_dispatches_and_fills_defaults() {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        provider.put(namespace("ns-id", "orders", false, &["active"]));
        let v = validator_with(provider);
        let info = ExecutionInfo {
            run_timeout_seconds: 60,
            task_list: "orders".into(),
            ..blank_execution_info()
        };

        let mut decision = Decision::ScheduleActivityTask(ScheduleActivityTaskAttributes {
            activity_id: "a1".into(),
            activity_type: "charge".into(),
            task_list: "payments".into(),
            schedule_to_close_timeout_seconds: 30,
            ..Default::default()
        });
        v.validate_decision(&mut decision, &info, 0).await.unwrap();
        match decision {
            Decision::ScheduleActivityTask(attrs) => {
                assert_eq!(attrs.start_to_close_timeout_seconds, 30);
            }
            other => panic!("unexpected decision {other:?}"),
        }

        let mut bad_timer = Decision::StartTimer(StartTimerAttributes::default());
        assert!(v.validate_decision(&mut bad_timer, &info, 0).await.is_err());
    }

    #[tokio::test]
    async fn signal_external_requires_execution_and_name() {
        let v = validator();
        let missing_execution = SignalExternalWorkflowExecutionAttributes::default();
        let err = v
            .validate_signal_external_workflow_execution_attributes("ns", "ns", &missing_execution)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Execution"));

        let missing_name = SignalExternalWorkflowExecutionAttributes {
            execution: Some(WorkflowExecution::new("wf", "")),
            ..Default::default()
        };
        let err = v
            .validate_signal_external_workflow_execution_attributes("ns", "ns", &missing_name)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("WorkflowId"));
    }

    #[tokio::test]
    async fn cancel_external_run_id_must_be_uuid() {
        let v = validator();
        let attrs = RequestCancelExternalWorkflowExecutionAttributes {
            workflow_id: "target".into(),
            run_id: "not-a-uuid".into(),
            ..Default::default()
        };
        let err = v
            .validate_cancel_external_workflow_execution_attributes("ns", "ns", &attrs)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid RunId"));
    }

    #[tokio::test]
    async fn continue_as_new_inherits_and_reduces_run_timeout() {
        let provider = Arc::new(InMemoryNamespaceProvider::new());
        provider.put(namespace("ns-id", "orders", false, &["active"]));
        let v = validator_with(provider);

        let mut info = ExecutionInfo {
            workflow_type: "order".into(),
            task_list: "orders".into(),
            run_timeout_seconds: 600,
            task_timeout_seconds: 10,
            ..blank_execution_info()
        };
        // Chain expires 60s from "now".
        let now = 1_000_000_000_000;
        info.expiration_timestamp = now + 60 * 1_000_000_000;

        let mut attrs = ContinueAsNewWorkflowExecutionAttributes::default();
        v.validate_continue_as_new_workflow_execution_attributes(&mut attrs, &info, now)
            .await
            .unwrap();
        assert_eq!(attrs.workflow_type, "order");
        assert_eq!(attrs.task_list, "orders");
        assert_eq!(attrs.run_timeout_seconds, 60);
        assert_eq!(attrs.task_timeout_seconds, 10);
    }

    #[tokio::test]
    async fn start_child_inherits_parent_defaults() {
        let v = validator();
        let info = ExecutionInfo {
            task_list: "parent-list".into(),
            execution_timeout_seconds: 100,
            run_timeout_seconds: 50,
            task_timeout_seconds: 10,
            ..blank_execution_info()
        };
        let mut attrs = StartChildWorkflowExecutionAttributes {
            workflow_id: "child".into(),
            workflow_type: "child-type".into(),
            ..Default::default()
        };
        v.validate_start_child_execution_attributes("ns", "ns", &mut attrs, &info)
            .await
            .unwrap();
        assert_eq!(attrs.task_list, "parent-list");
        assert_eq!(attrs.execution_timeout_seconds, 100);
        assert_eq!(attrs.run_timeout_seconds, 50);
        assert_eq!(attrs.task_timeout_seconds, 10);
    }

    fn blank_execution_info() -> ExecutionInfo {
        let state = crate::mutable_state::MutableState::new(
            "ns-id",
            WorkflowExecution::new("wf", "run"),
        );
        state.execution_info
    }
}
