//! Agent definitions, the capability taxonomy, the registry, and loop
//! stuck-detection heuristics.

mod capabilities;
mod definition;
mod registry;
mod stuck;

pub use capabilities::{
    CAPABILITY_CATALOG, Capability, CapabilityCategory, capability_by_id, unknown_capabilities,
};
pub use definition::{
    AgentConstraints, AgentDefinition, AgentDependency, AgentOwnership, AgentParameter,
    AgentPrompts, AgentRole, AgentStatus, AutonomyLevel, DefinitionError, GovernanceConstraints,
};
pub use registry::AgentRegistry;
pub use stuck::{
    HeuristicStuckDetector, LoopStep, StuckDetection, StuckDetector, StuckDetectorConfig,
};
