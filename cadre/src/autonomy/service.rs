//! Autonomy budget service: CRUD, lifecycle, preflight, and enforcement
//! orchestration.

use std::collections::HashMap;

use tracing::info;

use super::enforcement::RuntimeEnforcer;
use super::models::{AutonomyBudget, BudgetState, EscalationRecord};
use super::preflight::{PreflightReport, run_preflight};

/// Errors from the autonomy service.
#[derive(Debug, thiserror::Error)]
pub enum AutonomyError {
    /// The referenced budget does not exist.
    #[error("budget not found: {0}")]
    BudgetNotFound(String),
    /// The requested lifecycle transition is not in the transition graph.
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        /// State the budget is currently in.
        from: BudgetState,
        /// Requested target state.
        to: BudgetState,
    },
}

/// Budget CRUD, lifecycle management, and enforcement orchestration.
#[derive(Debug, Default)]
pub struct AutonomyService {
    budgets: HashMap<String, AutonomyBudget>,
    enforcers: HashMap<String, RuntimeEnforcer>,
}

impl AutonomyService {
    /// Create an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new budget (in whatever state it carries, `Draft` by
    /// default) and return its ID.
    pub fn create_budget(&mut self, budget: AutonomyBudget) -> String {
        let id = budget.budget_id.clone();
        info!(budget_id = %id, task_id = %budget.task_id, "budget_created");
        self.budgets.insert(id.clone(), budget);
        id
    }

    /// Get a budget by ID.
    pub fn get_budget(&self, budget_id: &str) -> Result<&AutonomyBudget, AutonomyError> {
        self.budgets
            .get(budget_id)
            .ok_or_else(|| AutonomyError::BudgetNotFound(budget_id.to_string()))
    }

    /// List budgets, optionally filtered by state, most recent first.
    #[must_use]
    pub fn list_budgets(&self, state: Option<BudgetState>, limit: usize) -> Vec<&AutonomyBudget> {
        let mut budgets: Vec<&AutonomyBudget> = self
            .budgets
            .values()
            .filter(|b| state.is_none_or(|s| b.state == s))
            .collect();
        budgets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        budgets.truncate(limit);
        budgets
    }

    /// Delete a budget. Only `Draft` and `Rejected` budgets may be deleted.
    pub fn delete_budget(&mut self, budget_id: &str) -> Result<(), AutonomyError> {
        let budget = self.get_budget(budget_id)?;
        if !matches!(budget.state, BudgetState::Draft | BudgetState::Rejected) {
            return Err(AutonomyError::InvalidStateTransition {
                from: budget.state,
                to: BudgetState::Draft,
            });
        }
        self.budgets.remove(budget_id);
        Ok(())
    }

    /// Transition a budget along the lifecycle graph.
    pub fn transition(
        &mut self,
        budget_id: &str,
        to: BudgetState,
        approved_by: &str,
    ) -> Result<&AutonomyBudget, AutonomyError> {
        let budget = self
            .budgets
            .get_mut(budget_id)
            .ok_or_else(|| AutonomyError::BudgetNotFound(budget_id.to_string()))?;

        if !budget.state.valid_targets().contains(&to) {
            return Err(AutonomyError::InvalidStateTransition {
                from: budget.state,
                to,
            });
        }

        budget.state = to;
        if !approved_by.is_empty() {
            budget.approved_by = approved_by.to_string();
        }
        info!(budget_id, to = ?to, "budget_transition");
        Ok(budget)
    }

    /// Activate a budget (from `Draft` or `PendingApproval`).
    pub fn activate(
        &mut self,
        budget_id: &str,
        approved_by: &str,
    ) -> Result<&AutonomyBudget, AutonomyError> {
        self.transition(budget_id, BudgetState::Active, approved_by)
    }

    /// Suspend an active budget.
    pub fn suspend(&mut self, budget_id: &str) -> Result<&AutonomyBudget, AutonomyError> {
        self.transition(budget_id, BudgetState::Suspended, "")
    }

    /// Mark a budget completed.
    pub fn complete(&mut self, budget_id: &str) -> Result<&AutonomyBudget, AutonomyError> {
        self.transition(budget_id, BudgetState::Completed, "")
    }

    /// Run the preflight checks on a budget.
    pub fn run_preflight(&self, budget_id: &str) -> Result<PreflightReport, AutonomyError> {
        Ok(run_preflight(self.get_budget(budget_id)?))
    }

    /// Create a runtime enforcer for an active budget.
    pub fn create_enforcer(&mut self, budget_id: &str) -> Result<&mut RuntimeEnforcer, AutonomyError> {
        let budget = self.get_budget(budget_id)?.clone();
        if budget.state != BudgetState::Active {
            return Err(AutonomyError::InvalidStateTransition {
                from: budget.state,
                to: BudgetState::Active,
            });
        }
        let enforcer = RuntimeEnforcer::new(budget);
        self.enforcers.insert(budget_id.to_string(), enforcer);
        Ok(self
            .enforcers
            .get_mut(budget_id)
            .expect("enforcer inserted above"))
    }

    /// Get the enforcer for a budget, if one exists.
    #[must_use]
    pub fn get_enforcer(&mut self, budget_id: &str) -> Option<&mut RuntimeEnforcer> {
        self.enforcers.get_mut(budget_id)
    }

    /// Take the enforcer for a budget out of the service.
    #[must_use]
    pub fn take_enforcer(&mut self, budget_id: &str) -> Option<RuntimeEnforcer> {
        self.enforcers.remove(budget_id)
    }

    /// Put an enforcer back after external use.
    pub fn restore_enforcer(&mut self, budget_id: &str, enforcer: RuntimeEnforcer) {
        self.enforcers.insert(budget_id.to_string(), enforcer);
    }

    /// List escalations across all enforcers, most recent first.
    #[must_use]
    pub fn list_escalations(
        &self,
        budget_id: Option<&str>,
        unresolved_only: bool,
        limit: usize,
    ) -> Vec<EscalationRecord> {
        let mut all: Vec<EscalationRecord> = self
            .enforcers
            .values()
            .flat_map(|e| e.escalations().iter().cloned())
            .filter(|e| budget_id.is_none_or(|id| e.budget_id == id))
            .filter(|e| !unresolved_only || !e.resolved)
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        all
    }

    /// Acknowledge an escalation. Returns `true` if found.
    pub fn acknowledge_escalation(&mut self, escalation_id: &str) -> bool {
        self.update_escalation(escalation_id, |e| e.acknowledged = true)
    }

    /// Resolve an escalation. Returns `true` if found.
    pub fn resolve_escalation(&mut self, escalation_id: &str) -> bool {
        self.update_escalation(escalation_id, |e| e.resolved = true)
    }

    fn update_escalation(
        &mut self,
        escalation_id: &str,
        update: impl Fn(&mut EscalationRecord),
    ) -> bool {
        for enforcer in self.enforcers.values_mut() {
            // Escalations are owned by their enforcer; mutate in place.
            for esc in enforcer.escalations_mut().iter_mut() {
                if esc.escalation_id == escalation_id {
                    update(esc);
                    return true;
                }
            }
        }
        false
    }
}
