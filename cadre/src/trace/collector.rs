//! Trace collection service.
//!
//! Creates, appends to, and queries [`TraceRecord`] and [`FailureRecord`]
//! instances. Storage is an in-memory keyed store; all mutation happens
//! inside the collector's methods under a short lock.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;

use super::failure::{FailureCategory, FailureClassification, FailureRecord, FailureSeverity};
use super::models::{
    ActionStatus, TraceAction, TraceAgentContext, TraceRecord, TraceStatus, TraceStep,
};

/// Default query limit.
const DEFAULT_LIMIT: usize = 100;

/// Errors from the trace collector.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The referenced trace does not exist.
    #[error("trace not found: {0}")]
    TraceNotFound(String),
    /// The referenced failure record does not exist.
    #[error("failure not found: {0}")]
    FailureNotFound(String),
}

/// Filters for [`TraceCollector::list_traces`].
#[derive(Debug, Clone, Default)]
pub struct TraceFilter {
    /// Restrict to a tenant.
    pub tenant_id: Option<String>,
    /// Restrict to a final status.
    pub status: Option<TraceStatus>,
    /// Restrict to a task.
    pub task_id: Option<String>,
    /// Restrict to a failure category (matched against the trace outcome).
    pub category: Option<FailureCategory>,
    /// Maximum number of results (default 100).
    pub limit: Option<usize>,
}

/// In-memory trace and failure collection service.
#[derive(Debug, Default)]
pub struct TraceCollector {
    traces: Mutex<HashMap<String, TraceRecord>>,
    failures: Mutex<HashMap<String, FailureRecord>>,
}

impl TraceCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new trace in `Running` state and return its ID.
    #[allow(clippy::too_many_arguments)]
    pub fn start_trace(
        &self,
        task_id: &str,
        session_id: &str,
        run_id: &str,
        tenant_id: &str,
        agent_id: &str,
        agent_role: &str,
        model: &str,
    ) -> TraceRecord {
        let mut trace = TraceRecord::new(TraceAgentContext {
            agent_id: agent_id.to_string(),
            agent_role: agent_role.to_string(),
            model: model.to_string(),
        });
        trace.task_id = task_id.to_string();
        trace.session_id = session_id.to_string();
        trace.run_id = run_id.to_string();
        trace.tenant_id = tenant_id.to_string();

        let snapshot = trace.clone();
        self.traces
            .lock()
            .expect("trace map lock")
            .insert(trace.trace_id.clone(), trace);
        info!(trace_id = %snapshot.trace_id, task_id, agent_id, "trace_started");
        snapshot
    }

    /// Get a snapshot of a trace by ID.
    pub fn get_trace(&self, trace_id: &str) -> Result<TraceRecord, TraceError> {
        self.traces
            .lock()
            .expect("trace map lock")
            .get(trace_id)
            .cloned()
            .ok_or_else(|| TraceError::TraceNotFound(trace_id.to_string()))
    }

    /// Append a new open step to a trace.
    pub fn add_step(&self, trace_id: &str, step_id: &str) -> Result<(), TraceError> {
        let mut traces = self.traces.lock().expect("trace map lock");
        let trace = traces
            .get_mut(trace_id)
            .ok_or_else(|| TraceError::TraceNotFound(trace_id.to_string()))?;
        trace.execution.push(TraceStep::new(step_id));
        Ok(())
    }

    /// Append an action to a step, creating the step if absent.
    #[allow(clippy::too_many_arguments)]
    pub fn add_action(
        &self,
        trace_id: &str,
        step_id: &str,
        action_id: &str,
        tool: &str,
        input: &str,
        output: &str,
        exit_code: Option<i32>,
        duration_ms: u64,
        status: ActionStatus,
    ) -> Result<(), TraceError> {
        let mut traces = self.traces.lock().expect("trace map lock");
        let trace = traces
            .get_mut(trace_id)
            .ok_or_else(|| TraceError::TraceNotFound(trace_id.to_string()))?;

        if !trace.execution.iter().any(|s| s.step_id == step_id) {
            trace.execution.push(TraceStep::new(step_id));
        }
        let step = trace
            .execution
            .iter_mut()
            .find(|s| s.step_id == step_id)
            .expect("step present after insert");

        step.actions.push(TraceAction {
            action_id: action_id.to_string(),
            tool: tool.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            exit_code,
            duration_ms,
            status,
        });
        Ok(())
    }

    /// Complete a trace, closing any open steps at the completion timestamp.
    /// Idempotent.
    pub fn complete_trace(
        &self,
        trace_id: &str,
        status: TraceStatus,
        failure_code: &str,
        failure_message: &str,
    ) -> Result<TraceRecord, TraceError> {
        let mut traces = self.traces.lock().expect("trace map lock");
        let trace = traces
            .get_mut(trace_id)
            .ok_or_else(|| TraceError::TraceNotFound(trace_id.to_string()))?;

        trace.complete(status, failure_code, failure_message);
        let completed_at = trace.completed_at;
        for step in &mut trace.execution {
            if step.completed_at.is_none() {
                step.completed_at = completed_at;
            }
        }
        info!(
            trace_id,
            status = ?trace.outcome.status,
            duration_ms = trace.duration_ms,
            "trace_completed"
        );
        Ok(trace.clone())
    }

    /// Record a failure against a trace. Also copies the category and message
    /// into the trace outcome so traces can be filtered by category alone.
    pub fn record_failure(
        &self,
        trace_id: &str,
        message: &str,
        category: FailureCategory,
        severity: FailureSeverity,
        subcode: &str,
    ) -> FailureRecord {
        let failure = FailureRecord::new(
            trace_id,
            FailureClassification::new(category, severity, subcode),
            message,
        );
        self.failures
            .lock()
            .expect("failure map lock")
            .insert(failure.failure_id.clone(), failure.clone());

        if let Some(trace) = self
            .traces
            .lock()
            .expect("trace map lock")
            .get_mut(trace_id)
        {
            trace.outcome.failure_code = subcode.to_string();
            trace.outcome.failure_message = message.to_string();
            trace.outcome.failure_category = category.as_str().to_string();
        }

        info!(
            failure_id = %failure.failure_id,
            trace_id,
            category = %category,
            "failure_recorded"
        );
        failure
    }

    /// Get a failure record by ID.
    pub fn get_failure(&self, failure_id: &str) -> Result<FailureRecord, TraceError> {
        self.failures
            .lock()
            .expect("failure map lock")
            .get(failure_id)
            .cloned()
            .ok_or_else(|| TraceError::FailureNotFound(failure_id.to_string()))
    }

    /// List traces matching the filter, most recent first.
    #[must_use]
    pub fn list_traces(&self, filter: &TraceFilter) -> Vec<TraceRecord> {
        let traces = self.traces.lock().expect("trace map lock");
        let mut results: Vec<TraceRecord> = traces
            .values()
            .filter(|t| {
                filter
                    .tenant_id
                    .as_ref()
                    .is_none_or(|tenant| &t.tenant_id == tenant)
            })
            .filter(|t| filter.status.is_none_or(|s| t.outcome.status == s))
            .filter(|t| filter.task_id.as_ref().is_none_or(|task| &t.task_id == task))
            .filter(|t| {
                filter
                    .category
                    .is_none_or(|c| t.outcome.failure_category == c.as_str())
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        results.truncate(filter.limit.unwrap_or(DEFAULT_LIMIT));
        results
    }

    /// List failure records, most recent first.
    #[must_use]
    pub fn list_failures(
        &self,
        trace_id: Option<&str>,
        category: Option<FailureCategory>,
        limit: Option<usize>,
    ) -> Vec<FailureRecord> {
        let failures = self.failures.lock().expect("failure map lock");
        let mut results: Vec<FailureRecord> = failures
            .values()
            .filter(|f| trace_id.is_none_or(|t| f.trace_id == t))
            .filter(|f| category.is_none_or(|c| f.classification.category == c))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        results.truncate(limit.unwrap_or(DEFAULT_LIMIT));
        results
    }

    /// Number of traces currently held.
    #[must_use]
    pub fn trace_count(&self) -> usize {
        self.traces.lock().expect("trace map lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector_with_trace() -> (TraceCollector, String) {
        let collector = TraceCollector::new();
        let trace = collector.start_trace("task-1", "", "", "acme", "planner", "orchestrator", "m");
        (collector, trace.trace_id)
    }

    #[test]
    fn add_action_creates_missing_step() {
        let (collector, trace_id) = collector_with_trace();
        collector
            .add_action(
                &trace_id,
                "step-1",
                "a1",
                "shell",
                "ls",
                "ok",
                Some(0),
                12,
                ActionStatus::Success,
            )
            .unwrap();
        let trace = collector.get_trace(&trace_id).unwrap();
        assert_eq!(trace.execution.len(), 1);
        assert_eq!(trace.execution[0].actions.len(), 1);
        assert_eq!(trace.execution[0].actions[0].tool, "shell");
    }

    #[test]
    fn actions_stay_in_insertion_order() {
        let (collector, trace_id) = collector_with_trace();
        for i in 0..5 {
            collector
                .add_action(
                    &trace_id,
                    "step-1",
                    &format!("a{i}"),
                    "echo",
                    "",
                    "",
                    None,
                    0,
                    ActionStatus::Success,
                )
                .unwrap();
        }
        let trace = collector.get_trace(&trace_id).unwrap();
        let ids: Vec<&str> = trace.execution[0]
            .actions
            .iter()
            .map(|a| a.action_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a0", "a1", "a2", "a3", "a4"]);
    }

    #[test]
    fn complete_closes_open_steps() {
        let (collector, trace_id) = collector_with_trace();
        collector.add_step(&trace_id, "step-1").unwrap();
        collector.add_step(&trace_id, "step-2").unwrap();
        let trace = collector
            .complete_trace(&trace_id, TraceStatus::Completed, "", "")
            .unwrap();
        for step in &trace.execution {
            assert_eq!(step.completed_at, trace.completed_at);
        }
    }

    #[test]
    fn complete_is_idempotent() {
        let (collector, trace_id) = collector_with_trace();
        let first = collector
            .complete_trace(&trace_id, TraceStatus::Timeout, "F-RES-TL04", "ceiling")
            .unwrap();
        let second = collector
            .complete_trace(&trace_id, TraceStatus::Completed, "", "")
            .unwrap();
        assert_eq!(first.completed_at, second.completed_at);
        assert_eq!(second.outcome.status, TraceStatus::Timeout);
    }

    #[test]
    fn record_failure_updates_trace_outcome() {
        let (collector, trace_id) = collector_with_trace();
        collector.record_failure(
            &trace_id,
            "governance blocked",
            FailureCategory::Security,
            FailureSeverity::High,
            "F-SEC-TL03",
        );
        let trace = collector.get_trace(&trace_id).unwrap();
        assert_eq!(trace.outcome.failure_category, "security");
        assert_eq!(trace.outcome.failure_code, "F-SEC-TL03");

        let listed = collector.list_traces(&TraceFilter {
            category: Some(FailureCategory::Security),
            ..TraceFilter::default()
        });
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn list_traces_filters_by_tenant_and_status() {
        let collector = TraceCollector::new();
        let a = collector.start_trace("t", "", "", "acme", "", "", "");
        let _b = collector.start_trace("t", "", "", "globex", "", "", "");
        collector
            .complete_trace(&a.trace_id, TraceStatus::Failed, "", "")
            .unwrap();

        let failed = collector.list_traces(&TraceFilter {
            tenant_id: Some("acme".into()),
            status: Some(TraceStatus::Failed),
            ..TraceFilter::default()
        });
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].trace_id, a.trace_id);
    }

    #[test]
    fn list_respects_limit() {
        let collector = TraceCollector::new();
        for _ in 0..5 {
            collector.start_trace("t", "", "", "", "", "", "");
        }
        let listed = collector.list_traces(&TraceFilter {
            limit: Some(3),
            ..TraceFilter::default()
        });
        assert_eq!(listed.len(), 3);
    }
}
