//! Trace record data model.
//!
//! A trace is an append-only record of a single agent execution: ordered
//! steps, each holding ordered actions, plus correlators and a final outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::new_id;

/// Lifecycle status of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Trace is open and accepting steps/actions.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
    /// Hit a time or iteration ceiling.
    Timeout,
    /// Cancelled by a budget or an external signal.
    Cancelled,
}

/// Status of a single action inside a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action succeeded.
    Success,
    /// The action failed.
    Failure,
    /// The action timed out.
    Timeout,
    /// The action was skipped.
    Skipped,
}

/// A single tool invocation (or equivalent) within a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceAction {
    /// Opaque action ID.
    pub action_id: String,
    /// Tool that was invoked.
    pub tool: String,
    /// Input summary.
    pub input: String,
    /// Output summary.
    pub output: String,
    /// Exit code, for subprocess-backed tools.
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Outcome status.
    pub status: ActionStatus,
}

/// A step inside a trace, holding an ordered list of actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    /// Step identifier (workflow step ID or loop iteration label).
    pub step_id: String,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step completed; set on trace completion if still open.
    pub completed_at: Option<DateTime<Utc>>,
    /// Ordered actions, append-only.
    pub actions: Vec<TraceAction>,
}

impl TraceStep {
    /// Create an open step starting now.
    #[must_use]
    pub fn new(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            actions: Vec::new(),
        }
    }
}

/// Agent context captured at trace start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceAgentContext {
    /// Agent identifier.
    pub agent_id: String,
    /// Agent role at the time of execution.
    pub agent_role: String,
    /// Model that served the execution.
    pub model: String,
}

/// Final outcome of a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceOutcome {
    /// Final status.
    pub status: TraceStatus,
    /// Failure subcode (empty when not failed).
    pub failure_code: String,
    /// Failure message (empty when not failed).
    pub failure_message: String,
    /// Failure category string (empty when not failed).
    pub failure_category: String,
}

impl TraceOutcome {
    /// Outcome for a running trace.
    #[must_use]
    pub fn running() -> Self {
        Self {
            status: TraceStatus::Running,
            failure_code: String::new(),
            failure_message: String::new(),
            failure_category: String::new(),
        }
    }

    /// Outcome for a completed trace with the given status.
    #[must_use]
    pub fn with_status(status: TraceStatus) -> Self {
        Self {
            status,
            ..Self::running()
        }
    }
}

/// Append-only record of a single agent execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Opaque stable trace ID.
    pub trace_id: String,
    /// Task correlator.
    pub task_id: String,
    /// Session correlator.
    pub session_id: String,
    /// Run correlator.
    pub run_id: String,
    /// Tenant that owns this trace.
    pub tenant_id: String,
    /// Agent context at start.
    pub context: TraceAgentContext,
    /// Ordered steps, append-only.
    pub execution: Vec<TraceStep>,
    /// When the trace started.
    pub started_at: DateTime<Utc>,
    /// When the trace completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Total duration in milliseconds, computed on completion.
    pub duration_ms: u64,
    /// Final outcome.
    pub outcome: TraceOutcome,
}

impl TraceRecord {
    /// Create a new trace in `Running` state.
    #[must_use]
    pub fn new(context: TraceAgentContext) -> Self {
        Self {
            trace_id: new_id("TRC"),
            task_id: String::new(),
            session_id: String::new(),
            run_id: String::new(),
            tenant_id: String::new(),
            context,
            execution: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            outcome: TraceOutcome::running(),
        }
    }

    /// Whether the trace has been completed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Complete the trace. Idempotent: completing a completed trace is a
    /// no-op.
    pub fn complete(&mut self, status: TraceStatus, failure_code: &str, failure_message: &str) {
        if self.is_complete() {
            return;
        }
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.outcome.status = status;
        if !failure_code.is_empty() {
            self.outcome.failure_code = failure_code.to_string();
        }
        if !failure_message.is_empty() {
            self.outcome.failure_message = failure_message.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trace_is_running() {
        let trace = TraceRecord::new(TraceAgentContext::default());
        assert_eq!(trace.outcome.status, TraceStatus::Running);
        assert!(!trace.is_complete());
    }

    #[test]
    fn complete_sets_timestamps_and_duration() {
        let mut trace = TraceRecord::new(TraceAgentContext::default());
        trace.complete(TraceStatus::Completed, "", "");
        let completed = trace.completed_at.expect("completed_at set");
        assert!(completed >= trace.started_at);
        assert_eq!(
            trace.duration_ms,
            (completed - trace.started_at).num_milliseconds() as u64
        );
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let mut trace = TraceRecord::new(TraceAgentContext::default());
        trace.complete(TraceStatus::Failed, "F-EXE-TL02", "boom");
        let first = trace.completed_at;
        trace.complete(TraceStatus::Completed, "", "");
        assert_eq!(trace.completed_at, first);
        assert_eq!(trace.outcome.status, TraceStatus::Failed);
    }
}
