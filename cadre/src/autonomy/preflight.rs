//! Preflight checks PF-01 through PF-10.
//!
//! PF-01..PF-04 are mandatory and block activation; PF-05..PF-10 are
//! advisory. Overall status is the worst of the ten.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::models::{AutonomyBudget, BudgetState, PreflightStatus};

/// Result of a single preflight check.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightCheck {
    /// Check identifier (PF-01 .. PF-10).
    pub check_id: &'static str,
    /// Check name.
    pub name: &'static str,
    /// Outcome.
    pub status: PreflightStatus,
    /// Explanation for non-pass outcomes.
    pub message: String,
}

impl PreflightCheck {
    fn pass(check_id: &'static str, name: &'static str) -> Self {
        Self {
            check_id,
            name,
            status: PreflightStatus::Pass,
            message: String::new(),
        }
    }

    fn warn(check_id: &'static str, name: &'static str, message: impl Into<String>) -> Self {
        Self {
            check_id,
            name,
            status: PreflightStatus::Warn,
            message: message.into(),
        }
    }

    fn fail(check_id: &'static str, name: &'static str, message: impl Into<String>) -> Self {
        Self {
            check_id,
            name,
            status: PreflightStatus::Fail,
            message: message.into(),
        }
    }
}

/// Complete preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Budget that was checked.
    pub budget_id: String,
    /// Worst status across all checks.
    pub overall: PreflightStatus,
    /// All ten checks in order.
    pub checks: Vec<PreflightCheck>,
    /// When the report was generated.
    pub timestamp: DateTime<Utc>,
}

/// Run all ten preflight checks on a budget.
#[must_use]
pub fn run_preflight(budget: &AutonomyBudget) -> PreflightReport {
    let checks = vec![
        pf01_budget_exists(budget),
        pf02_budget_valid(budget),
        pf03_not_expired(budget),
        pf04_scope_defined(budget),
        pf05_files_scoped(budget),
        pf06_commands_scoped(budget),
        pf07_network_scoped(budget),
        pf08_limits_set(budget),
        pf09_stop_conditions(budget),
        pf10_escalation_path(budget),
    ];

    let overall = checks
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(PreflightStatus::Pass);

    info!(budget_id = %budget.budget_id, ?overall, "preflight_complete");
    PreflightReport {
        budget_id: budget.budget_id.clone(),
        overall,
        checks,
        timestamp: Utc::now(),
    }
}

fn pf01_budget_exists(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.budget_id.is_empty() {
        PreflightCheck::fail("PF-01", "Budget exists", "budget has no ID")
    } else {
        PreflightCheck::pass("PF-01", "Budget exists")
    }
}

fn pf02_budget_valid(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.state == BudgetState::Active {
        PreflightCheck::pass("PF-02", "Budget valid")
    } else {
        PreflightCheck::fail(
            "PF-02",
            "Budget valid",
            format!("budget state is {:?}, must be active", budget.state),
        )
    }
}

fn pf03_not_expired(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.is_expired() {
        PreflightCheck::fail("PF-03", "Budget not expired", "budget has expired")
    } else {
        PreflightCheck::pass("PF-03", "Budget not expired")
    }
}

fn pf04_scope_defined(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.in_scope.is_empty() {
        PreflightCheck::fail("PF-04", "Scope defined", "no in_scope items defined")
    } else {
        PreflightCheck::pass("PF-04", "Scope defined")
    }
}

fn pf05_files_scoped(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.files.read.is_empty() && budget.files.write.is_empty() {
        PreflightCheck::warn(
            "PF-05",
            "Files scoped",
            "no file read/write patterns defined",
        )
    } else {
        PreflightCheck::pass("PF-05", "Files scoped")
    }
}

fn pf06_commands_scoped(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.allowed_commands.is_empty() {
        PreflightCheck::warn("PF-06", "Commands scoped", "no command allowlist defined")
    } else {
        PreflightCheck::pass("PF-06", "Commands scoped")
    }
}

fn pf07_network_scoped(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.network.enabled && budget.network.allowed_domains.is_empty() {
        PreflightCheck::warn(
            "PF-07",
            "Network scoped",
            "network enabled but no domains specified",
        )
    } else {
        PreflightCheck::pass("PF-07", "Network scoped")
    }
}

fn pf08_limits_set(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.limits.max_iterations == 0 || budget.limits.max_duration_minutes == 0 {
        PreflightCheck::warn("PF-08", "Limits set", "iteration or duration limit not set")
    } else {
        PreflightCheck::pass("PF-08", "Limits set")
    }
}

fn pf09_stop_conditions(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.stop_conditions.is_empty() {
        PreflightCheck::warn("PF-09", "Stop conditions", "no stop conditions defined")
    } else {
        PreflightCheck::pass("PF-09", "Stop conditions")
    }
}

fn pf10_escalation_path(budget: &AutonomyBudget) -> PreflightCheck {
    if budget.escalation_triggers.is_empty() && budget.default_escalation_target.is_empty() {
        PreflightCheck::warn(
            "PF-10",
            "Escalation path",
            "no escalation triggers or default target",
        )
    } else {
        PreflightCheck::pass("PF-10", "Escalation path")
    }
}
