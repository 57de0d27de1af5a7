//! Agent definition model.
//!
//! A named, versioned descriptor of an agent's identity, capabilities,
//! constraints, prompts, governance envelope, and lifecycle status. Loaded
//! from JSON files or built programmatically.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::capabilities::unknown_capabilities;

/// Errors raised while loading or validating an agent definition.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// The definition file could not be read.
    #[error("failed to read definition: {0}")]
    Io(#[from] std::io::Error),
    /// The definition file is not valid JSON or fails the schema.
    #[error("invalid definition: {0}")]
    Parse(#[from] serde_json::Error),
    /// A semantic constraint was violated.
    #[error("invalid definition: {0}")]
    Invalid(String),
}

/// Allowed agent roles. The two legacy aliases are accepted on input and
/// normalised at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    /// Coordinates other agents.
    Orchestrator,
    /// Owns a workstream and delegates.
    Director,
    /// Writes code and artifacts.
    Implementer,
    /// Verifies outputs.
    Qa,
    /// Reviews artifacts.
    Reviewer,
    /// Gathers information.
    Researcher,
    /// Writes documentation.
    Documentation,
    /// Security analysis.
    Security,
    /// System design.
    Architect,
    /// Test authoring.
    TestEngineer,
    /// Legacy alias, normalised to `Implementer` at load time.
    Worker,
    /// Legacy alias, normalised to `Qa` at load time.
    Validator,
}

impl AgentRole {
    /// Map legacy aliases onto their modern equivalents.
    #[must_use]
    pub const fn normalised(self) -> Self {
        match self {
            Self::Worker => Self::Implementer,
            Self::Validator => Self::Qa,
            other => other,
        }
    }

    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Director => "director",
            Self::Implementer => "implementer",
            Self::Qa => "qa",
            Self::Reviewer => "reviewer",
            Self::Researcher => "researcher",
            Self::Documentation => "documentation",
            Self::Security => "security",
            Self::Architect => "architect",
            Self::TestEngineer => "test-engineer",
            Self::Worker => "worker",
            Self::Validator => "validator",
        }
    }
}

/// How much the agent may do without a human in the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutonomyLevel {
    /// May only observe; write-capable tools are denied.
    ReadOnly,
    /// Destructive operations are flagged for approval.
    #[default]
    Supervised,
    /// Full tool access within the governance envelope.
    Autonomous,
}

/// Lifecycle status of a definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// In active use.
    #[default]
    Active,
    /// Kept for existing references only.
    Deprecated,
    /// Not yet stable.
    Experimental,
}

/// A single input or output parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentParameter {
    /// Parameter type name.
    #[serde(rename = "type")]
    pub kind: String,
    /// Description shown to callers.
    #[serde(default)]
    pub description: String,
    /// Whether the parameter must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Default value when omitted.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// A dependency on another agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDependency {
    /// Name of the agent depended on.
    pub agent: String,
    /// Whether the dependency is optional.
    #[serde(default)]
    pub optional: bool,
    /// Why the dependency exists.
    #[serde(default)]
    pub purpose: String,
}

/// Prompt template references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPrompts {
    /// System prompt template path or inline reference.
    #[serde(default)]
    pub system: String,
    /// User prompt template.
    #[serde(default)]
    pub user: String,
    /// Few-shot example references.
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Execution constraints with hard validation ranges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentConstraints {
    /// Token ceiling, 100..=200_000.
    #[serde(default = "AgentConstraints::default_max_tokens")]
    pub max_tokens: u32,
    /// Timeout in seconds, 10..=3600.
    #[serde(default = "AgentConstraints::default_timeout_seconds")]
    pub timeout_seconds: u32,
    /// Retry ceiling, 0..=10.
    #[serde(default = "AgentConstraints::default_max_retries")]
    pub max_retries: u32,
    /// Whether the agent may run inside a parallel group.
    #[serde(default = "AgentConstraints::default_parallel_allowed")]
    pub parallel_allowed: bool,
}

impl AgentConstraints {
    const fn default_max_tokens() -> u32 {
        4096
    }
    const fn default_timeout_seconds() -> u32 {
        120
    }
    const fn default_max_retries() -> u32 {
        2
    }
    const fn default_parallel_allowed() -> bool {
        true
    }

    /// Check the hard ranges.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if !(100..=200_000).contains(&self.max_tokens) {
            return Err(DefinitionError::Invalid(format!(
                "max_tokens {} outside 100..=200000",
                self.max_tokens
            )));
        }
        if !(10..=3600).contains(&self.timeout_seconds) {
            return Err(DefinitionError::Invalid(format!(
                "timeout_seconds {} outside 10..=3600",
                self.timeout_seconds
            )));
        }
        if self.max_retries > 10 {
            return Err(DefinitionError::Invalid(format!(
                "max_retries {} outside 0..=10",
                self.max_retries
            )));
        }
        Ok(())
    }
}

impl Default for AgentConstraints {
    fn default() -> Self {
        Self {
            max_tokens: Self::default_max_tokens(),
            timeout_seconds: Self::default_timeout_seconds(),
            max_retries: Self::default_max_retries(),
            parallel_allowed: Self::default_parallel_allowed(),
        }
    }
}

/// Declarative governance envelope carried by a definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConstraints {
    /// In-scope description.
    #[serde(default)]
    pub scope: String,
    /// Command envelope description.
    #[serde(default)]
    pub commands: String,
    /// Network envelope description.
    #[serde(default)]
    pub network: String,
    /// Operations that always require approval.
    #[serde(default)]
    pub approval_required: Vec<String>,
}

/// Ownership and escalation metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOwnership {
    /// Owning team or person.
    #[serde(default)]
    pub owner: String,
    /// Where escalations go.
    #[serde(default)]
    pub escalation_target: String,
}

/// Full agent definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique lowercase name.
    pub name: String,
    /// Semver version.
    pub version: String,
    /// Role; legacy aliases normalised at load.
    pub role: AgentRole,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Declared capability identifiers from the fixed catalog.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Input parameter schema.
    #[serde(default)]
    pub inputs: HashMap<String, AgentParameter>,
    /// Output parameter schema.
    #[serde(default)]
    pub outputs: HashMap<String, AgentParameter>,
    /// Dependencies on other agents.
    #[serde(default)]
    pub dependencies: Vec<AgentDependency>,
    /// Prompt template references.
    #[serde(default)]
    pub prompts: AgentPrompts,
    /// Execution constraints.
    #[serde(default)]
    pub constraints: AgentConstraints,
    /// Autonomy level.
    #[serde(default)]
    pub autonomy: AutonomyLevel,
    /// Governance envelope.
    #[serde(default)]
    pub governance: GovernanceConstraints,
    /// Ownership metadata.
    #[serde(default)]
    pub ownership: AgentOwnership,
    /// Lifecycle status.
    #[serde(default)]
    pub status: AgentStatus,
}

impl AgentDefinition {
    /// Minimal definition with defaults, used by builders and tests.
    #[must_use]
    pub fn new(name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            role: role.normalised(),
            description: String::new(),
            capabilities: Vec::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            dependencies: Vec::new(),
            prompts: AgentPrompts::default(),
            constraints: AgentConstraints::default(),
            autonomy: AutonomyLevel::default(),
            governance: GovernanceConstraints::default(),
            ownership: AgentOwnership::default(),
            status: AgentStatus::default(),
        }
    }

    /// Validate name/version shape, constraint ranges, and capability IDs,
    /// then normalise legacy roles.
    pub fn validate(mut self) -> Result<Self, DefinitionError> {
        if self.name.len() < 2
            || self.name.len() > 64
            || !self
                .name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase())
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DefinitionError::Invalid(format!(
                "name '{}' must be a 2-64 char lowercase slug",
                self.name
            )));
        }
        let semver_ok = {
            let parts: Vec<&str> = self.version.split('.').collect();
            parts.len() == 3 && parts.iter().all(|p| p.parse::<u32>().is_ok())
        };
        if !semver_ok {
            return Err(DefinitionError::Invalid(format!(
                "version '{}' is not MAJOR.MINOR.PATCH",
                self.version
            )));
        }
        self.constraints.validate()?;
        let unknown = unknown_capabilities(&self.capabilities);
        if !unknown.is_empty() {
            return Err(DefinitionError::Invalid(format!(
                "unknown capabilities: {}",
                unknown.join(", ")
            )));
        }
        self.role = self.role.normalised();
        Ok(self)
    }

    /// Load and validate a definition from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let raw = std::fs::read_to_string(path)?;
        let mut value: serde_json::Value = serde_json::from_str(&raw)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
        }
        let definition: Self = serde_json::from_value(value)?;
        definition.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_roles_normalise_on_validate() {
        let def = AgentDefinition::new("fixer", AgentRole::Worker);
        assert_eq!(def.role, AgentRole::Implementer);

        let json = serde_json::json!({
            "name": "checker",
            "version": "1.0.0",
            "role": "validator",
        });
        let def: AgentDefinition = serde_json::from_value(json).unwrap();
        let def = def.validate().unwrap();
        assert_eq!(def.role, AgentRole::Qa);
    }

    #[test]
    fn constraint_ranges_are_enforced() {
        let mut def = AgentDefinition::new("tight", AgentRole::Implementer);
        def.constraints.max_tokens = 50;
        assert!(def.validate().is_err());

        let mut def = AgentDefinition::new("tight", AgentRole::Implementer);
        def.constraints.timeout_seconds = 4000;
        assert!(def.validate().is_err());
    }

    #[test]
    fn bad_names_are_rejected() {
        assert!(
            AgentDefinition::new("X", AgentRole::Qa)
                .validate()
                .is_err()
        );
        assert!(
            AgentDefinition::new("Nope", AgentRole::Qa)
                .validate()
                .is_err()
        );
        assert!(
            AgentDefinition::new("fine-name-2", AgentRole::Qa)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn unknown_capability_ids_are_rejected() {
        let mut def = AgentDefinition::new("capable", AgentRole::Researcher);
        def.capabilities = vec!["X-01".into(), "nope".into()];
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
