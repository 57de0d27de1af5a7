//! Convenience re-exports for common engine usage.

pub use crate::agents::{AgentDefinition, AgentRegistry, AgentRole, AutonomyLevel};
pub use crate::autonomy::{AutonomyBudget, AutonomyService, BudgetState, RuntimeEnforcer};
pub use crate::comparative::{AgentScore, ComparativeService};
pub use crate::engine::{AgentInvokeResult, Engine, EngineBuilder, EngineError};
pub use crate::gates::{GateEnforcer, GateOutcome, GateType, MetricId, TaskOutcome, TaskRunResult};
pub use crate::governance::{Decision, GovernanceConfig, ToolGovernance};
pub use crate::hooks::{
    FailMode, Hook, HookContext, HookEventType, HookRegistry, HookResult, Next,
};
pub use crate::reasoning::{TerminationReason, ToolLoop, ToolLoopConfig, ToolLoopResult};
pub use crate::router::{ChatMessage, CompletionRequest, ModelProvider, ModelRouter};
pub use crate::tools::{Tool, ToolContext, ToolRegistry, ToolResult};
pub use crate::trace::{TraceCollector, TraceFilter, TraceStatus};
pub use crate::workflow::{
    StepAction, WorkflowDefinition, WorkflowRunner, WorkflowStatus, WorkflowStep,
};
