//! Regression gate engine: threshold evaluation, canonical task gating,
//! regression detection, and the golden task catalog.

mod engine;
mod golden;
mod models;
mod regression;

pub use engine::{GateEnforcer, default_thresholds, required_tag};
pub use golden::{
    GOLDEN_CASES, GOLDEN_TASKS, GoldenCaseDef, GoldenTaskDef, golden_task, tasks_with_tag,
};
pub use models::{
    BaselineSnapshot, GateAction, GateCheckResult, GateOutcome, GateReport, GateThreshold,
    GateType, GoldenTag, MetricId, MetricValue, RegressionIndicator, RegressionRecord,
    RegressionSeverity, TaskOutcome, TaskRunResult, ThresholdOperator, TriageStatus,
};
pub use regression::{RegressionDetector, RegressionRecorder, TTG_INCREASE_FACTOR};
