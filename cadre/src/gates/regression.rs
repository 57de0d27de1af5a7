//! Regression detection and recording.
//!
//! Compares a baseline snapshot to current results using the five
//! indicators RI-01..RI-05. Threshold direction depends on the metric:
//! success rate and scope adherence regress downward, rework rate upward.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::info;

use super::models::{
    BaselineSnapshot, MetricId, MetricValue, RegressionIndicator, RegressionRecord,
    RegressionSeverity, TaskOutcome, TaskRunResult, TriageStatus,
};

/// Time-to-green increase factor considered significant.
pub const TTG_INCREASE_FACTOR: f64 = 1.5;

/// Detects regressions by comparing current results to a baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionDetector;

impl RegressionDetector {
    /// Compare a current evaluation to a baseline and return all detected
    /// regressions.
    #[must_use]
    pub fn detect(
        &self,
        baseline: &BaselineSnapshot,
        current_metrics: &[MetricValue],
        current_results: &[TaskRunResult],
        current_failure_categories: &[String],
        baseline_failure_categories: &[String],
        thresholds: &HashMap<MetricId, f64>,
    ) -> Vec<RegressionRecord> {
        let mut regressions = Vec::new();

        regressions.extend(detect_task_regressions(
            &baseline.task_results,
            current_results,
        ));
        regressions.extend(detect_threshold_breaches(
            &baseline.metrics,
            current_metrics,
            thresholds,
        ));
        regressions.extend(detect_new_failure_categories(
            baseline_failure_categories,
            current_failure_categories,
        ));
        regressions.extend(detect_ttg_increase(&baseline.metrics, current_metrics));
        regressions.extend(detect_flaky_now_consistent(
            &baseline.task_results,
            current_results,
        ));

        for regression in &regressions {
            info!(
                regression_id = %regression.regression_id,
                indicator = ?regression.indicator,
                severity = ?regression.severity,
                "regression_detected"
            );
        }
        regressions
    }
}

/// RI-01: a previously passing task now fails.
fn detect_task_regressions(
    baseline: &[TaskRunResult],
    current: &[TaskRunResult],
) -> Vec<RegressionRecord> {
    let baseline_map: HashMap<&str, &TaskRunResult> =
        baseline.iter().map(|r| (r.item_id.as_str(), r)).collect();

    current
        .iter()
        .filter(|now| {
            baseline_map.get(now.item_id.as_str()).is_some_and(|prev| {
                prev.result == TaskOutcome::Pass && now.result == TaskOutcome::Fail && !prev.flaky
            })
        })
        .map(|now| {
            let mut record = RegressionRecord::new(
                RegressionIndicator::TaskNowFails,
                format!(
                    "Task {} previously passed but now fails: {}",
                    now.item_id, now.notes
                ),
            );
            record.affected_tasks = vec![now.item_id.clone()];
            record
        })
        .collect()
}

/// RI-02: a metric crossed its threshold in the regressing direction.
fn detect_threshold_breaches(
    baseline: &[MetricValue],
    current: &[MetricValue],
    thresholds: &HashMap<MetricId, f64>,
) -> Vec<RegressionRecord> {
    let baseline_map: HashMap<MetricId, f64> =
        baseline.iter().map(|m| (m.metric_id, m.value)).collect();
    let current_map: HashMap<MetricId, f64> =
        current.iter().map(|m| (m.metric_id, m.value)).collect();

    let mut regressions = Vec::new();
    for (&metric_id, &threshold) in thresholds {
        let now = current_map.get(&metric_id).copied().unwrap_or(0.0);
        let prev = baseline_map.get(&metric_id).copied().unwrap_or(0.0);

        let breached = match metric_id {
            // Higher is better: regression when we drop below the line.
            MetricId::SuccessRate | MetricId::ScopeAdherence => {
                now < threshold && prev >= threshold
            }
            // Lower is better: regression when we rise above it.
            MetricId::ReworkRate => now > threshold && prev <= threshold,
            MetricId::TimeToGreen | MetricId::DiffSize => false,
        };

        if breached {
            let mut record = RegressionRecord::new(
                RegressionIndicator::MetricBreach,
                format!(
                    "Metric {metric_id:?} crossed threshold: {now} (threshold: {threshold}, was: {prev})"
                ),
            );
            record.metric_id = Some(metric_id);
            record.previous_value = prev;
            record.current_value = now;
            record.threshold_value = threshold;
            regressions.push(record);
        }
    }
    regressions
}

/// RI-03: a failure category appears that the baseline never produced.
fn detect_new_failure_categories(
    baseline: &[String],
    current: &[String],
) -> Vec<RegressionRecord> {
    let known: HashSet<&str> = baseline.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::new();

    current
        .iter()
        .filter(|category| !known.contains(category.as_str()) && seen.insert(category.as_str()))
        .map(|category| {
            RegressionRecord::new(
                RegressionIndicator::NewFailureCategory,
                format!("New failure category appeared: {category}"),
            )
        })
        .collect()
}

/// RI-04: time-to-green increased by more than the significance factor.
fn detect_ttg_increase(
    baseline: &[MetricValue],
    current: &[MetricValue],
) -> Vec<RegressionRecord> {
    let find = |metrics: &[MetricValue]| {
        metrics
            .iter()
            .find(|m| m.metric_id == MetricId::TimeToGreen)
            .map_or(0.0, |m| m.value)
    };
    let prev = find(baseline);
    let now = find(current);

    if prev > 0.0 && now > prev * TTG_INCREASE_FACTOR {
        let mut record = RegressionRecord::new(
            RegressionIndicator::TimeToGreenIncrease,
            format!(
                "Time-to-green increased {:.1}x ({prev:.0}ms -> {now:.0}ms)",
                now / prev
            ),
        );
        record.metric_id = Some(MetricId::TimeToGreen);
        record.previous_value = prev;
        record.current_value = now;
        vec![record]
    } else {
        Vec::new()
    }
}

/// RI-05: a task flaky at baseline now fails consistently.
fn detect_flaky_now_consistent(
    baseline: &[TaskRunResult],
    current: &[TaskRunResult],
) -> Vec<RegressionRecord> {
    let flaky: HashSet<&str> = baseline
        .iter()
        .filter(|r| r.flaky)
        .map(|r| r.item_id.as_str())
        .collect();

    current
        .iter()
        .filter(|now| now.result == TaskOutcome::Fail && flaky.contains(now.item_id.as_str()))
        .map(|now| {
            let mut record = RegressionRecord::new(
                RegressionIndicator::FlakyNowConsistent,
                format!("Flaky task {} is now a consistent failure", now.item_id),
            );
            record.affected_tasks = vec![now.item_id.clone()];
            record
        })
        .collect()
}

/// In-memory storage for regression records with triage tracking.
#[derive(Debug, Default)]
pub struct RegressionRecorder {
    records: HashMap<String, RegressionRecord>,
}

impl RegressionRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, returning its ID.
    pub fn record(&mut self, regression: RegressionRecord) -> String {
        let id = regression.regression_id.clone();
        self.records.insert(id.clone(), regression);
        id
    }

    /// Store many records, returning how many were stored.
    pub fn record_many(&mut self, regressions: Vec<RegressionRecord>) -> usize {
        let count = regressions.len();
        for regression in regressions {
            self.records
                .insert(regression.regression_id.clone(), regression);
        }
        count
    }

    /// Get a record by ID.
    #[must_use]
    pub fn get(&self, regression_id: &str) -> Option<&RegressionRecord> {
        self.records.get(regression_id)
    }

    /// List records, optionally filtered, most recent first.
    #[must_use]
    pub fn list(
        &self,
        status: Option<TriageStatus>,
        severity: Option<RegressionSeverity>,
        limit: usize,
    ) -> Vec<RegressionRecord> {
        let mut records: Vec<RegressionRecord> = self
            .records
            .values()
            .filter(|r| status.is_none_or(|s| r.triage_status == s))
            .filter(|r| severity.is_none_or(|s| r.severity == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        records.truncate(limit);
        records
    }

    /// Update the triage status and optional assignee.
    pub fn update_triage(
        &mut self,
        regression_id: &str,
        status: TriageStatus,
        assignee: &str,
    ) -> Option<&RegressionRecord> {
        let record = self.records.get_mut(regression_id)?;
        record.triage_status = status;
        if !assignee.is_empty() {
            record.assignee = assignee.to_string();
        }
        Some(record)
    }

    /// Mark a regression resolved with the fixing commit.
    pub fn resolve(
        &mut self,
        regression_id: &str,
        fix_commit: &str,
    ) -> Option<&RegressionRecord> {
        let record = self.records.get_mut(regression_id)?;
        record.triage_status = TriageStatus::Resolved;
        record.resolved_at = Some(Utc::now());
        record.fix_commit = fix_commit.to_string();
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline_with_tasks(tasks: Vec<TaskRunResult>) -> BaselineSnapshot {
        let mut baseline = BaselineSnapshot::new("abc123", "main");
        baseline.task_results = tasks;
        baseline
    }

    #[test]
    fn ri01_previously_passing_task_now_fails() {
        let baseline =
            baseline_with_tasks(vec![TaskRunResult::new("GT-01", TaskOutcome::Pass)]);
        let current = vec![TaskRunResult::new("GT-01", TaskOutcome::Fail)];
        let regressions = RegressionDetector.detect(
            &baseline,
            &[],
            &current,
            &[],
            &[],
            &HashMap::new(),
        );
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].indicator, RegressionIndicator::TaskNowFails);
        assert_eq!(regressions[0].severity, RegressionSeverity::High);
        assert_eq!(regressions[0].affected_tasks, vec!["GT-01"]);
    }

    #[test]
    fn ri02_direction_depends_on_metric() {
        let mut baseline = BaselineSnapshot::new("abc", "main");
        baseline.metrics = vec![
            MetricValue {
                metric_id: MetricId::SuccessRate,
                value: 92.0,
            },
            MetricValue {
                metric_id: MetricId::ReworkRate,
                value: 15.0,
            },
        ];
        let current = vec![
            MetricValue {
                metric_id: MetricId::SuccessRate,
                value: 75.0,
            },
            MetricValue {
                metric_id: MetricId::ReworkRate,
                value: 28.0,
            },
        ];
        let thresholds =
            HashMap::from([(MetricId::SuccessRate, 80.0), (MetricId::ReworkRate, 20.0)]);

        let regressions =
            RegressionDetector.detect(&baseline, &current, &[], &[], &[], &thresholds);
        assert_eq!(regressions.len(), 2);
        assert!(
            regressions
                .iter()
                .all(|r| r.indicator == RegressionIndicator::MetricBreach)
        );
    }

    #[test]
    fn ri02_no_breach_when_baseline_already_below() {
        let mut baseline = BaselineSnapshot::new("abc", "main");
        baseline.metrics = vec![MetricValue {
            metric_id: MetricId::SuccessRate,
            value: 70.0,
        }];
        let current = vec![MetricValue {
            metric_id: MetricId::SuccessRate,
            value: 65.0,
        }];
        let thresholds = HashMap::from([(MetricId::SuccessRate, 80.0)]);
        let regressions =
            RegressionDetector.detect(&baseline, &current, &[], &[], &[], &thresholds);
        assert!(regressions.is_empty());
    }

    #[test]
    fn ri03_new_failure_category() {
        let baseline = BaselineSnapshot::new("abc", "main");
        let regressions = RegressionDetector.detect(
            &baseline,
            &[],
            &[],
            &["security".to_string(), "execution".to_string()],
            &["execution".to_string()],
            &HashMap::new(),
        );
        assert_eq!(regressions.len(), 1);
        assert!(regressions[0].description.contains("security"));
        assert_eq!(regressions[0].severity, RegressionSeverity::Medium);
    }

    #[test]
    fn ri04_time_to_green_increase() {
        let mut baseline = BaselineSnapshot::new("abc", "main");
        baseline.metrics = vec![MetricValue {
            metric_id: MetricId::TimeToGreen,
            value: 1000.0,
        }];
        let current = vec![MetricValue {
            metric_id: MetricId::TimeToGreen,
            value: 1600.0,
        }];
        let regressions =
            RegressionDetector.detect(&baseline, &current, &[], &[], &[], &HashMap::new());
        assert_eq!(regressions.len(), 1);
        assert_eq!(
            regressions[0].indicator,
            RegressionIndicator::TimeToGreenIncrease
        );
        assert_eq!(regressions[0].severity, RegressionSeverity::Low);

        // A 1.4x increase is not significant.
        let mild = vec![MetricValue {
            metric_id: MetricId::TimeToGreen,
            value: 1400.0,
        }];
        let none = RegressionDetector.detect(&baseline, &mild, &[], &[], &[], &HashMap::new());
        assert!(none.is_empty());
    }

    #[test]
    fn ri05_flaky_task_now_consistent_failure() {
        let mut flaky_task = TaskRunResult::new("GT-04", TaskOutcome::Pass);
        flaky_task.flaky = true;
        let baseline = baseline_with_tasks(vec![flaky_task]);
        let current = vec![TaskRunResult::new("GT-04", TaskOutcome::Fail)];

        let regressions =
            RegressionDetector.detect(&baseline, &[], &current, &[], &[], &HashMap::new());
        assert_eq!(regressions.len(), 1);
        assert_eq!(
            regressions[0].indicator,
            RegressionIndicator::FlakyNowConsistent
        );
        assert_eq!(regressions[0].severity, RegressionSeverity::High);
    }

    #[test]
    fn recorder_triage_round_trip() {
        let mut recorder = RegressionRecorder::new();
        let id = recorder.record(RegressionRecord::new(
            RegressionIndicator::TaskNowFails,
            "GT-01 broke",
        ));

        recorder
            .update_triage(&id, TriageStatus::Investigating, "sam")
            .unwrap();
        assert_eq!(
            recorder.get(&id).unwrap().triage_status,
            TriageStatus::Investigating
        );

        recorder.resolve(&id, "deadbeef").unwrap();
        let resolved = recorder.get(&id).unwrap();
        assert_eq!(resolved.triage_status, TriageStatus::Resolved);
        assert_eq!(resolved.fix_commit, "deadbeef");
        assert!(resolved.resolved_at.is_some());

        let open = recorder.list(Some(TriageStatus::New), None, 10);
        assert!(open.is_empty());
    }
}
