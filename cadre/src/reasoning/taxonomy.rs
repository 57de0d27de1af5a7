//! Failure-taxonomy alignment for the tool-use loop.
//!
//! Maps loop termination reasons to taxonomy subcodes and trace outcomes.
//! `completed` is not a failure; `max_iterations` maps to trace status
//! `timeout` and `budget_exceeded` to `cancelled`.

use crate::trace::{
    FailureCategory, FailureClassification, FailureRecord, FailureSeverity, TraceOutcome,
    TraceStatus,
};

use super::tool_loop::{TerminationReason, ToolLoopResult};

/// Subcode used when a termination reason cannot be classified.
pub const SUBCODE_UNKNOWN: &str = "F-UNK-TL00";

/// Taxonomy metadata for one termination reason.
#[derive(Debug, Clone, Copy)]
pub struct SubcodeInfo {
    /// Stable subcode.
    pub subcode: &'static str,
    /// What the subcode covers.
    pub description: &'static str,
    /// Failure category.
    pub category: FailureCategory,
    /// Failure severity.
    pub severity: FailureSeverity,
}

/// Taxonomy entry for a termination reason; `None` for `completed`.
#[must_use]
pub fn subcode_info(reason: TerminationReason) -> Option<SubcodeInfo> {
    use TerminationReason::{
        BudgetExceeded, Completed, ContextExhausted, Error, LeakageDetected, MaxIterations,
        ToolArgumentError, ToolExecutionError, ToolGovernanceDenied,
    };
    let info = match reason {
        Completed => return None,
        ToolArgumentError => SubcodeInfo {
            subcode: "F-EXE-TL01",
            description: "Model provided invalid arguments to a tool",
            category: FailureCategory::Execution,
            severity: FailureSeverity::Medium,
        },
        ToolExecutionError => SubcodeInfo {
            subcode: "F-EXE-TL02",
            description: "Tool execution failed",
            category: FailureCategory::Execution,
            severity: FailureSeverity::Medium,
        },
        ToolGovernanceDenied => SubcodeInfo {
            subcode: "F-SEC-TL03",
            description: "Tool call blocked by governance",
            category: FailureCategory::Security,
            severity: FailureSeverity::High,
        },
        MaxIterations => SubcodeInfo {
            subcode: "F-RES-TL04",
            description: "Tool loop hit max iterations without final answer",
            category: FailureCategory::Resource,
            severity: FailureSeverity::Medium,
        },
        ContextExhausted => SubcodeInfo {
            subcode: "F-RES-TL05",
            description: "Context window exhausted during tool loop",
            category: FailureCategory::Resource,
            severity: FailureSeverity::High,
        },
        BudgetExceeded => SubcodeInfo {
            subcode: "F-RES-TL06",
            description: "Autonomy budget exhausted",
            category: FailureCategory::Resource,
            severity: FailureSeverity::Medium,
        },
        LeakageDetected => SubcodeInfo {
            subcode: "F-VAL-TL07",
            description: "Answer leakage detected in tool output",
            category: FailureCategory::Validation,
            severity: FailureSeverity::Low,
        },
        Error => SubcodeInfo {
            subcode: "F-EXE-TL08",
            description: "Consecutive error threshold exceeded",
            category: FailureCategory::Execution,
            severity: FailureSeverity::High,
        },
    };
    Some(info)
}

/// Classify a termination reason. `completed` yields an empty
/// classification; anything unmapped would fall back to [`SUBCODE_UNKNOWN`].
#[must_use]
pub fn classify(reason: TerminationReason) -> FailureClassification {
    match subcode_info(reason) {
        Some(info) => FailureClassification::new(info.category, info.severity, info.subcode),
        None => FailureClassification {
            code: String::new(),
            subcode: String::new(),
            category: FailureCategory::Unknown,
            severity: FailureSeverity::Low,
        },
    }
}

/// Classify a free-form reason string, mapping unknown reasons to
/// [`SUBCODE_UNKNOWN`] with medium severity.
#[must_use]
pub fn classify_reason_str(reason: &str) -> FailureClassification {
    TerminationReason::from_str_loose(reason).map_or_else(
        || {
            FailureClassification::new(
                FailureCategory::Unknown,
                FailureSeverity::Medium,
                SUBCODE_UNKNOWN,
            )
        },
        classify,
    )
}

/// Map a loop result to a trace outcome.
#[must_use]
pub fn to_trace_outcome(result: &ToolLoopResult) -> TraceOutcome {
    let status = match result.termination_reason {
        TerminationReason::Completed => return TraceOutcome::with_status(TraceStatus::Completed),
        TerminationReason::MaxIterations => TraceStatus::Timeout,
        TerminationReason::BudgetExceeded => TraceStatus::Cancelled,
        _ => TraceStatus::Failed,
    };

    let info = subcode_info(result.termination_reason);
    let mut outcome = TraceOutcome::with_status(status);
    if let Some(info) = info {
        outcome.failure_code = info.subcode.to_string();
        outcome.failure_message = info.description.to_string();
        outcome.failure_category = info.category.as_str().to_string();
    }
    outcome
}

/// Build a failure record from a failed loop result; `None` for successful
/// completions.
#[must_use]
pub fn to_failure_record(result: &ToolLoopResult, trace_id: &str) -> Option<FailureRecord> {
    let info = subcode_info(result.termination_reason)?;
    let record = FailureRecord::new(
        trace_id,
        FailureClassification::new(info.category, info.severity, info.subcode),
        info.description,
    )
    .with_context("termination_reason", result.termination_reason.as_str())
    .with_context("iterations", result.iterations.to_string())
    .with_context("tool_calls_made", result.tool_calls_made.to_string())
    .with_context("tools_used", result.tools_used.join(","))
    .with_context("model", result.model.clone());
    Some(record)
}
