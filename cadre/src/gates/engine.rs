//! Gate evaluation.
//!
//! Evaluates metric values and canonical task outcomes against per-gate
//! thresholds. A blocking breach fails the gate, a warn breach downgrades it
//! to warn, and non-pass canonical tasks fail the merge and release gates.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use super::models::{
    GateAction, GateCheckResult, GateOutcome, GateReport, GateThreshold, GateType, GoldenTag,
    MetricId, TaskOutcome, TaskRunResult, ThresholdOperator,
};

/// The default gating threshold matrix.
#[must_use]
pub fn default_thresholds() -> Vec<GateThreshold> {
    use GateAction::{Block, Warn};
    use GateType::{Merge, Pr, Release};
    use MetricId::{ReworkRate, ScopeAdherence, SuccessRate};
    use ThresholdOperator::{Eq, Gte, Lte};

    let rule = |metric_id, gate, operator, value, action| GateThreshold {
        metric_id,
        gate,
        operator,
        value,
        action,
        bypass_allowed: false,
    };

    vec![
        // M-01: success rate.
        rule(SuccessRate, Pr, Gte, 80.0, Block),
        rule(SuccessRate, Merge, Gte, 90.0, Block),
        rule(SuccessRate, Release, Gte, 95.0, Block),
        // M-03: rework rate.
        rule(ReworkRate, Pr, Lte, 30.0, Warn),
        rule(ReworkRate, Merge, Lte, 20.0, Block),
        rule(ReworkRate, Release, Lte, 10.0, Block),
        // M-05: scope adherence.
        rule(ScopeAdherence, Pr, Gte, 90.0, Block),
        rule(ScopeAdherence, Merge, Eq, 100.0, Block),
    ]
}

/// The canonical task tag each gate requires.
#[must_use]
pub const fn required_tag(gate: GateType) -> GoldenTag {
    match gate {
        GateType::Pr => GoldenTag::Smoke,
        GateType::Merge => GoldenTag::Critical,
        GateType::Release => GoldenTag::Release,
        GateType::Monitor => GoldenTag::Optional,
    }
}

/// Evaluates metrics and canonical task results against gate thresholds.
#[derive(Debug, Clone)]
pub struct GateEnforcer {
    thresholds: Vec<GateThreshold>,
}

impl Default for GateEnforcer {
    fn default() -> Self {
        Self::new(default_thresholds())
    }
}

impl GateEnforcer {
    /// Enforcer over a custom threshold set.
    #[must_use]
    pub fn new(thresholds: Vec<GateThreshold>) -> Self {
        Self { thresholds }
    }

    /// Thresholds applicable to one gate.
    #[must_use]
    pub fn thresholds_for(&self, gate: GateType) -> Vec<GateThreshold> {
        self.thresholds
            .iter()
            .filter(|t| t.gate == gate)
            .copied()
            .collect()
    }

    /// Run all threshold checks for the given gate.
    #[must_use]
    pub fn check_gate(
        &self,
        gate: GateType,
        metric_values: &HashMap<MetricId, f64>,
        task_results: Option<&[TaskRunResult]>,
    ) -> GateReport {
        let mut overall = GateOutcome::Pass;
        let mut check_results = Vec::new();

        for threshold in self.thresholds.iter().filter(|t| t.gate == gate) {
            let actual = metric_values
                .get(&threshold.metric_id)
                .copied()
                .unwrap_or(0.0);
            let passed = threshold.operator.evaluate(actual, threshold.value);
            check_results.push(GateCheckResult {
                threshold: *threshold,
                actual_value: actual,
                passed,
            });

            if !passed {
                match threshold.action {
                    GateAction::Block => overall = GateOutcome::Fail,
                    GateAction::Warn => {
                        if overall != GateOutcome::Fail {
                            overall = GateOutcome::Warn;
                        }
                    }
                    GateAction::Alert => {
                        warn!(metric = ?threshold.metric_id, actual, "gate_alert");
                    }
                }
            }
        }

        let task_results_vec = task_results.map(<[TaskRunResult]>::to_vec).unwrap_or_default();
        if task_results.is_some() && matches!(gate, GateType::Merge | GateType::Release) {
            let failed = task_results_vec
                .iter()
                .filter(|r| !matches!(r.result, TaskOutcome::Pass | TaskOutcome::Skip))
                .count();
            if failed > 0 {
                warn!(gate = ?gate, failed, "gate_failed_on_canonical_tasks");
                overall = GateOutcome::Fail;
            }
        }

        if overall == GateOutcome::Pass {
            info!(gate = ?gate, "gate_passed");
        }

        GateReport {
            gate,
            overall,
            check_results,
            task_results: task_results_vec,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(values: &[(MetricId, f64)]) -> HashMap<MetricId, f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn healthy_pr_metrics_pass() {
        let enforcer = GateEnforcer::default();
        let report = enforcer.check_gate(
            GateType::Pr,
            &metrics(&[
                (MetricId::SuccessRate, 92.0),
                (MetricId::ReworkRate, 10.0),
                (MetricId::ScopeAdherence, 98.0),
            ]),
            None,
        );
        assert_eq!(report.overall, GateOutcome::Pass);
        assert_eq!(report.check_results.len(), 3);
    }

    #[test]
    fn rework_breach_warns_on_pr() {
        // M-01 85 passes (>=80), M-03 35 breaches the warn rule, M-05 92
        // passes (>=90): overall warn.
        let enforcer = GateEnforcer::default();
        let report = enforcer.check_gate(
            GateType::Pr,
            &metrics(&[
                (MetricId::SuccessRate, 85.0),
                (MetricId::ReworkRate, 35.0),
                (MetricId::ScopeAdherence, 92.0),
            ]),
            None,
        );
        assert_eq!(report.overall, GateOutcome::Warn);
        let failed: Vec<_> = report.check_results.iter().filter(|c| !c.passed).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].threshold.metric_id, MetricId::ReworkRate);
    }

    #[test]
    fn block_breach_beats_warn() {
        let enforcer = GateEnforcer::default();
        let report = enforcer.check_gate(
            GateType::Pr,
            &metrics(&[
                (MetricId::SuccessRate, 50.0),
                (MetricId::ReworkRate, 35.0),
                (MetricId::ScopeAdherence, 95.0),
            ]),
            None,
        );
        assert_eq!(report.overall, GateOutcome::Fail);
    }

    #[test]
    fn merge_gate_requires_exact_scope_adherence() {
        let enforcer = GateEnforcer::default();
        let report = enforcer.check_gate(
            GateType::Merge,
            &metrics(&[
                (MetricId::SuccessRate, 95.0),
                (MetricId::ReworkRate, 5.0),
                (MetricId::ScopeAdherence, 99.5),
            ]),
            None,
        );
        assert_eq!(report.overall, GateOutcome::Fail);
    }

    #[test]
    fn failed_canonical_task_fails_merge_but_not_pr() {
        let enforcer = GateEnforcer::default();
        let healthy = metrics(&[
            (MetricId::SuccessRate, 99.0),
            (MetricId::ReworkRate, 1.0),
            (MetricId::ScopeAdherence, 100.0),
        ]);
        let tasks = vec![
            TaskRunResult::new("GT-01", TaskOutcome::Pass),
            TaskRunResult::new("GT-02", TaskOutcome::Fail),
        ];

        let merge = enforcer.check_gate(GateType::Merge, &healthy, Some(&tasks));
        assert_eq!(merge.overall, GateOutcome::Fail);

        let pr = enforcer.check_gate(GateType::Pr, &healthy, Some(&tasks));
        assert_eq!(pr.overall, GateOutcome::Pass);
    }

    #[test]
    fn skipped_tasks_do_not_fail_gates() {
        let enforcer = GateEnforcer::default();
        let tasks = vec![
            TaskRunResult::new("GT-01", TaskOutcome::Pass),
            TaskRunResult::new("GT-03", TaskOutcome::Skip),
        ];
        let report = enforcer.check_gate(
            GateType::Release,
            &metrics(&[
                (MetricId::SuccessRate, 99.0),
                (MetricId::ReworkRate, 1.0),
            ]),
            Some(&tasks),
        );
        assert_eq!(report.overall, GateOutcome::Pass);
    }

    #[test]
    fn missing_metrics_default_to_zero_and_fail() {
        let enforcer = GateEnforcer::default();
        let report = enforcer.check_gate(GateType::Pr, &HashMap::new(), None);
        assert_eq!(report.overall, GateOutcome::Fail);
    }

    #[test]
    fn required_tags_follow_the_execution_matrix() {
        assert_eq!(required_tag(GateType::Pr), GoldenTag::Smoke);
        assert_eq!(required_tag(GateType::Merge), GoldenTag::Critical);
        assert_eq!(required_tag(GateType::Release), GoldenTag::Release);
        assert_eq!(required_tag(GateType::Monitor), GoldenTag::Optional);
    }
}
