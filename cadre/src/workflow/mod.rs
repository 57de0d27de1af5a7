//! Workflow definitions, the dependency-aware DAG scheduler, action
//! adapters, and the deterministic graph layout.

mod actions;
mod dag;
mod definition;
mod graph;
mod runner;

pub use actions::{
    ActionAdapters, ActionError, AgentInvoker, SharedContext, check_url_allowed, eval_condition,
};
pub use dag::{Dag, DagError};
pub use definition::{
    ExecutionMode, ParameterDef, StepAction, StepRetry, WorkflowDefinition,
    WorkflowDefinitionError, WorkflowExecution, WorkflowStep, WorkflowTriggers,
};
pub use graph::{GraphEdge, GraphNode, generate_workflow_graph};
pub use runner::{
    StepResult, StepStatus, WorkflowError, WorkflowResult, WorkflowRunner, WorkflowStatus,
};
