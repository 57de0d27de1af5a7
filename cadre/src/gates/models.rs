//! Data model for the regression gate framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::new_id;

/// Regression gate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateType {
    /// Pre-merge gate.
    #[serde(rename = "G-PR")]
    Pr,
    /// Merge gate.
    #[serde(rename = "G-MRG")]
    Merge,
    /// Release gate.
    #[serde(rename = "G-REL")]
    Release,
    /// Continuous monitoring gate.
    #[serde(rename = "G-MON")]
    Monitor,
}

/// Action taken when a threshold is breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAction {
    /// Breach fails the gate.
    Block,
    /// Breach downgrades the gate to warn.
    Warn,
    /// Breach pages but does not change the outcome.
    Alert,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateOutcome {
    /// All thresholds satisfied.
    Pass,
    /// At least one warn-level breach.
    Warn,
    /// At least one blocking breach.
    Fail,
}

/// Evaluation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricId {
    /// Success rate (%).
    #[serde(rename = "M-01")]
    SuccessRate,
    /// Time-to-green (ms).
    #[serde(rename = "M-02")]
    TimeToGreen,
    /// Rework rate (%).
    #[serde(rename = "M-03")]
    ReworkRate,
    /// Diff size (lines).
    #[serde(rename = "M-04")]
    DiffSize,
    /// Scope adherence (%).
    #[serde(rename = "M-05")]
    ScopeAdherence,
}

/// Canonical task gating tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoldenTag {
    /// Must pass before merge.
    #[serde(rename = "GT-CRITICAL")]
    Critical,
    /// Must pass before release.
    #[serde(rename = "GT-RELEASE")]
    Release,
    /// Fast pre-merge smoke set.
    #[serde(rename = "GT-SMOKE")]
    Smoke,
    /// Regression sentinel set.
    #[serde(rename = "GT-REGRESSION")]
    Regression,
    /// Monitored but non-gating.
    #[serde(rename = "GT-OPTIONAL")]
    Optional,
}

/// Result of a single canonical task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    /// All checks passed.
    Pass,
    /// One or more checks failed.
    Fail,
    /// The task was not executed.
    Skip,
    /// The harness itself errored.
    Error,
}

/// Comparison operators for thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOperator {
    /// Actual must be >= target.
    Gte,
    /// Actual must be <= target.
    Lte,
    /// Actual must equal target (within 0.001).
    Eq,
    /// Actual must be > target.
    Gt,
    /// Actual must be < target.
    Lt,
}

impl ThresholdOperator {
    /// Evaluate `actual` against `target`.
    #[must_use]
    pub fn evaluate(self, actual: f64, target: f64) -> bool {
        match self {
            Self::Gte => actual >= target,
            Self::Lte => actual <= target,
            Self::Eq => (actual - target).abs() < 0.001,
            Self::Gt => actual > target,
            Self::Lt => actual < target,
        }
    }
}

/// A single threshold rule for a gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateThreshold {
    /// Metric the rule applies to.
    pub metric_id: MetricId,
    /// Gate the rule belongs to.
    pub gate: GateType,
    /// Comparison operator.
    pub operator: ThresholdOperator,
    /// Target value.
    pub value: f64,
    /// Action on breach.
    pub action: GateAction,
    /// Whether an operator may bypass the rule.
    pub bypass_allowed: bool,
}

/// Result of evaluating one threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCheckResult {
    /// The rule that was evaluated.
    pub threshold: GateThreshold,
    /// Observed metric value.
    pub actual_value: f64,
    /// Whether the rule was satisfied.
    pub passed: bool,
}

/// Result of executing a single canonical task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunResult {
    /// Task or case ID (GT-XX / GC-XX).
    pub item_id: String,
    /// Outcome.
    pub result: TaskOutcome,
    /// Checks passed.
    pub checks_passed: u32,
    /// Checks total.
    pub checks_total: u32,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Free-form notes.
    pub notes: String,
    /// Whether the task was flaky at baseline time.
    #[serde(default)]
    pub flaky: bool,
}

impl TaskRunResult {
    /// Result with the given outcome and empty metadata.
    #[must_use]
    pub fn new(item_id: impl Into<String>, result: TaskOutcome) -> Self {
        Self {
            item_id: item_id.into(),
            result,
            checks_passed: 0,
            checks_total: 0,
            duration_ms: 0,
            notes: String::new(),
            flaky: false,
        }
    }
}

/// A computed metric value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricValue {
    /// Metric ID.
    pub metric_id: MetricId,
    /// Value in the metric's unit.
    pub value: f64,
}

/// Full report of a gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    /// Gate that was evaluated.
    pub gate: GateType,
    /// Overall outcome.
    pub overall: GateOutcome,
    /// Per-threshold results.
    pub check_results: Vec<GateCheckResult>,
    /// Canonical task results considered.
    pub task_results: Vec<TaskRunResult>,
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
}

/// A baseline metrics snapshot for regression comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    /// Opaque stable ID.
    pub baseline_id: String,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Commit the snapshot was taken at.
    pub commit_hash: String,
    /// Branch the snapshot was taken on.
    pub branch: String,
    /// Metric values at baseline.
    pub metrics: Vec<MetricValue>,
    /// Task results at baseline.
    pub task_results: Vec<TaskRunResult>,
}

impl BaselineSnapshot {
    /// Empty snapshot with a fresh ID.
    #[must_use]
    pub fn new(commit_hash: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            baseline_id: new_id("BSL"),
            created_at: Utc::now(),
            commit_hash: commit_hash.into(),
            branch: branch.into(),
            metrics: Vec::new(),
            task_results: Vec::new(),
        }
    }
}

/// Regression indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegressionIndicator {
    /// Previously passing task now fails.
    #[serde(rename = "RI-01")]
    TaskNowFails,
    /// A metric crossed its threshold.
    #[serde(rename = "RI-02")]
    MetricBreach,
    /// A new failure category appeared.
    #[serde(rename = "RI-03")]
    NewFailureCategory,
    /// Time-to-green increased significantly.
    #[serde(rename = "RI-04")]
    TimeToGreenIncrease,
    /// A flaky task became a consistent failure.
    #[serde(rename = "RI-05")]
    FlakyNowConsistent,
}

impl RegressionIndicator {
    /// Default severity for this indicator.
    #[must_use]
    pub const fn default_severity(self) -> RegressionSeverity {
        match self {
            Self::TaskNowFails | Self::FlakyNowConsistent => RegressionSeverity::High,
            Self::MetricBreach | Self::NewFailureCategory => RegressionSeverity::Medium,
            Self::TimeToGreenIncrease => RegressionSeverity::Low,
        }
    }
}

/// Severity of a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionSeverity {
    /// Minor.
    Low,
    /// Noticeable.
    Medium,
    /// Serious.
    High,
    /// Ship-stopping.
    Critical,
}

/// Triage status for a regression record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageStatus {
    /// Not yet looked at.
    New,
    /// Someone is investigating.
    Investigating,
    /// Root cause identified.
    Identified,
    /// A fix is in progress.
    Fixing,
    /// Fixed and verified.
    Resolved,
    /// Accepted as-is.
    Wontfix,
}

/// A detected regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionRecord {
    /// Opaque stable ID.
    pub regression_id: String,
    /// When it was detected.
    pub detected_at: DateTime<Utc>,
    /// Which indicator fired.
    pub indicator: RegressionIndicator,
    /// Human-readable description.
    pub description: String,
    /// Affected metric, when metric-based.
    pub metric_id: Option<MetricId>,
    /// Baseline value.
    pub previous_value: f64,
    /// Current value.
    pub current_value: f64,
    /// Threshold involved, when any.
    pub threshold_value: f64,
    /// Affected task IDs.
    pub affected_tasks: Vec<String>,
    /// Severity.
    pub severity: RegressionSeverity,
    /// Triage status.
    pub triage_status: TriageStatus,
    /// Current assignee.
    pub assignee: String,
    /// When the regression was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Commit that fixed it.
    pub fix_commit: String,
}

impl RegressionRecord {
    /// New untriaged record for an indicator.
    #[must_use]
    pub fn new(indicator: RegressionIndicator, description: impl Into<String>) -> Self {
        Self {
            regression_id: new_id("REG"),
            detected_at: Utc::now(),
            indicator,
            description: description.into(),
            metric_id: None,
            previous_value: 0.0,
            current_value: 0.0,
            threshold_value: 0.0,
            affected_tasks: Vec::new(),
            severity: indicator.default_severity(),
            triage_status: TriageStatus::New,
            assignee: String::new(),
            resolved_at: None,
            fix_commit: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_evaluate_correctly() {
        assert!(ThresholdOperator::Gte.evaluate(80.0, 80.0));
        assert!(!ThresholdOperator::Gte.evaluate(79.9, 80.0));
        assert!(ThresholdOperator::Lte.evaluate(20.0, 20.0));
        assert!(ThresholdOperator::Eq.evaluate(100.0004, 100.0));
        assert!(!ThresholdOperator::Eq.evaluate(100.1, 100.0));
        assert!(ThresholdOperator::Gt.evaluate(1.1, 1.0));
        assert!(ThresholdOperator::Lt.evaluate(0.9, 1.0));
    }

    #[test]
    fn gate_ids_serialize_to_spec_names() {
        assert_eq!(serde_json::to_string(&GateType::Pr).unwrap(), "\"G-PR\"");
        assert_eq!(
            serde_json::to_string(&MetricId::ReworkRate).unwrap(),
            "\"M-03\""
        );
        assert_eq!(
            serde_json::to_string(&RegressionIndicator::TaskNowFails).unwrap(),
            "\"RI-01\""
        );
        assert_eq!(
            serde_json::to_string(&GoldenTag::Smoke).unwrap(),
            "\"GT-SMOKE\""
        );
    }

    #[test]
    fn indicator_severities_match_the_matrix() {
        assert_eq!(
            RegressionIndicator::TaskNowFails.default_severity(),
            RegressionSeverity::High
        );
        assert_eq!(
            RegressionIndicator::TimeToGreenIncrease.default_severity(),
            RegressionSeverity::Low
        );
        assert_eq!(
            RegressionIndicator::FlakyNowConsistent.default_severity(),
            RegressionSeverity::High
        );
    }
}
