//! Autonomy budgets, preflight checks, and runtime enforcement.

mod enforcement;
mod models;
mod preflight;
mod service;

pub use enforcement::{EnforcementOutcome, RuntimeEnforcer};
pub use models::{
    AutonomyBudget, BudgetState, CommandPermission, EnforcementContext, EscalationRecord,
    EscalationTrigger, EscalationUrgency, FileScope, NetworkScope, PreflightStatus,
    ResourceLimits, StopAction, StopCondition,
};
pub use preflight::{PreflightCheck, PreflightReport, run_preflight};
pub use service::{AutonomyError, AutonomyService};
