//! Runtime budget enforcement.
//!
//! Before every tool call the enforcer checks the live counters against the
//! budget's resource limits. On a violation it fires the first matching stop
//! condition: `stop` aborts, `escalate` records an escalation and aborts,
//! `warn` records a warning and continues.

use tracing::warn;

use super::models::{
    AutonomyBudget, EnforcementContext, EscalationRecord, StopAction,
};

/// Outcome of an enforcement check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementOutcome {
    /// Within budget; proceed.
    Allowed,
    /// A limit was breached under a `warn` stop condition; proceed.
    Warned(String),
    /// A limit was breached; abort.
    Stopped(String),
    /// A limit was breached under an `escalate` stop condition; abort.
    Escalated(String),
}

impl EnforcementOutcome {
    /// Whether the caller may continue.
    #[must_use]
    pub const fn may_continue(&self) -> bool {
        matches!(self, Self::Allowed | Self::Warned(_))
    }
}

/// Enforces one budget over one execution.
#[derive(Debug)]
pub struct RuntimeEnforcer {
    budget: AutonomyBudget,
    context: EnforcementContext,
    escalations: Vec<EscalationRecord>,
}

impl RuntimeEnforcer {
    /// Create an enforcer for an (already active) budget.
    #[must_use]
    pub fn new(budget: AutonomyBudget) -> Self {
        let context = EnforcementContext::new(budget.budget_id.clone());
        Self {
            budget,
            context,
            escalations: Vec::new(),
        }
    }

    /// The live enforcement context.
    #[must_use]
    pub const fn context(&self) -> &EnforcementContext {
        &self.context
    }

    /// The budget being enforced.
    #[must_use]
    pub const fn budget(&self) -> &AutonomyBudget {
        &self.budget
    }

    /// Escalations raised so far.
    #[must_use]
    pub fn escalations(&self) -> &[EscalationRecord] {
        &self.escalations
    }

    pub(crate) fn escalations_mut(&mut self) -> &mut Vec<EscalationRecord> {
        &mut self.escalations
    }

    /// Record one loop iteration.
    pub fn record_iteration(&mut self) {
        self.context.record_iteration();
    }

    /// Record one tool call.
    pub fn record_tool_call(&mut self) {
        self.context.record_tool_call();
    }

    /// Record a file modification.
    pub fn record_file_modified(&mut self, lines: u32) {
        self.context.record_file_modified(lines);
    }

    /// Record a network request.
    pub fn record_network_request(&mut self) {
        self.context.record_network_request();
    }

    /// Check every limit; returns the first violation's outcome or
    /// `Allowed`.
    pub fn check_limits(&mut self) -> EnforcementOutcome {
        if self.context.stopped {
            return EnforcementOutcome::Stopped(self.context.stop_reason.clone());
        }

        let violation = self.first_violation();
        let Some(violation) = violation else {
            return EnforcementOutcome::Allowed;
        };

        warn!(
            budget_id = %self.budget.budget_id,
            %violation,
            "budget_violation"
        );
        self.context.violations.push(violation.clone());
        self.apply_stop_condition(violation)
    }

    fn first_violation(&self) -> Option<String> {
        let limits = &self.budget.limits;
        let ctx = &self.context;

        if limits.max_iterations > 0 && ctx.iterations >= limits.max_iterations {
            return Some(format!(
                "iteration limit reached ({}/{})",
                ctx.iterations, limits.max_iterations
            ));
        }
        if limits.max_tool_calls > 0 && ctx.tool_calls >= limits.max_tool_calls {
            return Some(format!(
                "tool call limit reached ({}/{})",
                ctx.tool_calls, limits.max_tool_calls
            ));
        }
        if limits.max_duration_minutes > 0
            && ctx.elapsed_minutes() >= f64::from(limits.max_duration_minutes)
        {
            return Some(format!(
                "duration limit reached ({} min)",
                limits.max_duration_minutes
            ));
        }
        if limits.max_files_modified > 0 && ctx.files_modified >= limits.max_files_modified {
            return Some(format!(
                "files modified limit reached ({}/{})",
                ctx.files_modified, limits.max_files_modified
            ));
        }
        if limits.max_lines_changed > 0 && ctx.lines_changed >= limits.max_lines_changed {
            return Some(format!(
                "lines changed limit reached ({}/{})",
                ctx.lines_changed, limits.max_lines_changed
            ));
        }
        if self.budget.network.max_requests > 0
            && ctx.network_requests >= self.budget.network.max_requests
        {
            return Some(format!(
                "network request limit reached ({}/{})",
                ctx.network_requests, self.budget.network.max_requests
            ));
        }
        None
    }

    fn apply_stop_condition(&mut self, violation: String) -> EnforcementOutcome {
        let action = self
            .budget
            .stop_conditions
            .first()
            .map_or(StopAction::Stop, |c| c.action);

        match action {
            StopAction::Warn => {
                self.context.warnings.push(violation.clone());
                EnforcementOutcome::Warned(violation)
            }
            StopAction::Stop => {
                self.context.mark_stopped(violation.clone());
                EnforcementOutcome::Stopped(violation)
            }
            StopAction::Escalate => {
                let trigger = self.budget.escalation_triggers.first();
                let (description, target, urgency) = trigger.map_or_else(
                    || {
                        (
                            violation.clone(),
                            self.budget.default_escalation_target.clone(),
                            super::models::EscalationUrgency::Normal,
                        )
                    },
                    |t| (t.description.clone(), t.target.clone(), t.urgency),
                );
                self.escalations.push(EscalationRecord::new(
                    self.budget.budget_id.clone(),
                    description,
                    target,
                    urgency,
                ));
                self.context.mark_stopped(violation.clone());
                EnforcementOutcome::Escalated(violation)
            }
        }
    }
}
