//! Workflow definition model.
//!
//! A workflow is a named, versioned list of steps with triggers, parameter
//! schemas, and an execution config. Invariants: step IDs are unique and
//! every `depends_on` target exists in the same workflow.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised while loading or validating a workflow definition.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowDefinitionError {
    /// The definition file could not be read.
    #[error("failed to read workflow: {0}")]
    Io(#[from] std::io::Error),
    /// The definition is not valid JSON.
    #[error("invalid workflow: {0}")]
    Parse(#[from] serde_json::Error),
    /// A semantic constraint was violated.
    #[error("invalid workflow: {0}")]
    Invalid(String),
}

/// Available step actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepAction {
    /// Run an agent through the reasoning loop.
    InvokeAgent,
    /// Run a command through the code executor.
    RunCommand,
    /// Check required inputs in-process.
    Validate,
    /// Reshape inputs in-process.
    Transform,
    /// Branch on a condition expression.
    Conditional,
    /// Run child steps concurrently.
    ParallelGroup,
    /// Sleep or poll a condition.
    Wait,
    /// Run a contract through a tool adapter.
    ExecuteCode,
    /// Perform an outbound HTTP request.
    HttpRequest,
}

/// Workflow execution modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Steps run one after another in listed order.
    #[default]
    Sequential,
    /// All steps run concurrently, bounded by the parallel limit.
    Parallel,
    /// Steps run in dependency layers.
    DependencyAware,
}

/// Retry configuration for a step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepRetry {
    /// Attempt ceiling, 1..=10.
    #[serde(default = "StepRetry::default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in seconds, >= 1.
    #[serde(default = "StepRetry::default_delay_seconds")]
    pub delay_seconds: u64,
}

impl StepRetry {
    const fn default_max_attempts() -> u32 {
        1
    }
    const fn default_delay_seconds() -> u64 {
        1
    }
}

impl Default for StepRetry {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            delay_seconds: Self::default_delay_seconds(),
        }
    }
}

/// A single step within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step slug, unique within the workflow.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// What the step does.
    pub action: StepAction,
    /// Agent binding for `invoke-agent`.
    #[serde(default)]
    pub agent: Option<String>,
    /// Command binding for `run-command`.
    #[serde(default)]
    pub command: Option<String>,
    /// Step inputs, merged with workflow inputs and upstream outputs.
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    /// Declared outputs.
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    /// Condition expression for `conditional`.
    #[serde(default)]
    pub condition: Option<String>,
    /// Upstream step IDs.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Retry configuration.
    #[serde(default)]
    pub retry: StepRetry,
    /// Per-step timeout in seconds, >= 10.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Child steps for `parallel-group`.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    /// Branch taken when the condition holds.
    #[serde(default, rename = "then")]
    pub then_steps: Vec<WorkflowStep>,
    /// Branch taken otherwise.
    #[serde(default, rename = "else")]
    pub else_steps: Vec<WorkflowStep>,
    /// Sleep duration for `wait`.
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    /// Polled context key for `wait`.
    #[serde(default)]
    pub wait_condition: Option<String>,
    /// Target URL for `http-request`.
    #[serde(default)]
    pub url: Option<String>,
    /// HTTP method for `http-request`.
    #[serde(default)]
    pub method: Option<String>,
    /// Request headers for `http-request`.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Tool binding for `execute-code`.
    #[serde(default)]
    pub tool_id: Option<String>,
    /// Adapter override for `execute-code`.
    #[serde(default)]
    pub adapter_id: Option<String>,
    /// Sandbox parameters for `execute-code`.
    #[serde(default)]
    pub sandbox: Option<Value>,
}

impl WorkflowStep {
    /// Minimal step with defaults.
    #[must_use]
    pub fn new(id: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            name: None,
            action,
            agent: None,
            command: None,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            condition: None,
            depends_on: Vec::new(),
            retry: StepRetry::default(),
            timeout_seconds: None,
            steps: Vec::new(),
            then_steps: Vec::new(),
            else_steps: Vec::new(),
            duration_seconds: None,
            wait_condition: None,
            url: None,
            method: None,
            headers: None,
            tool_id: None,
            adapter_id: None,
            sandbox: None,
        }
    }

    /// Add dependencies.
    #[must_use]
    pub fn depends(mut self, upstream: &[&str]) -> Self {
        self.depends_on = upstream.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Bind a command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attach an input.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }
}

/// Trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTriggers {
    /// Manual execution allowed.
    #[serde(default = "WorkflowTriggers::default_manual")]
    pub manual: bool,
    /// Paths whose changes trigger the workflow.
    #[serde(default)]
    pub on_change: Vec<String>,
    /// Cron-style schedule.
    #[serde(default)]
    pub schedule: Option<String>,
    /// System events that trigger the workflow.
    #[serde(default)]
    pub on_event: Vec<String>,
}

impl WorkflowTriggers {
    const fn default_manual() -> bool {
        true
    }
}

impl Default for WorkflowTriggers {
    fn default() -> Self {
        Self {
            manual: true,
            on_change: Vec::new(),
            schedule: None,
            on_event: Vec::new(),
        }
    }
}

/// Workflow input/output parameter definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter type name.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the parameter is required.
    #[serde(default)]
    pub required: bool,
    /// Default when omitted.
    #[serde(default)]
    pub default: Option<Value>,
}

/// Execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Scheduling mode.
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Concurrent step ceiling, 1..=32.
    #[serde(default = "WorkflowExecution::default_parallel_limit")]
    pub parallel_limit: usize,
    /// Keep scheduling after a step fails.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Stop scheduling as soon as a step fails.
    #[serde(default = "WorkflowExecution::default_fail_fast")]
    pub fail_fast: bool,
    /// Overall timeout in seconds, 60..=86400.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Resolve and log without side effects.
    #[serde(default)]
    pub dry_run: bool,
}

impl WorkflowExecution {
    const fn default_parallel_limit() -> usize {
        4
    }
    const fn default_fail_fast() -> bool {
        true
    }
}

impl Default for WorkflowExecution {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            parallel_limit: Self::default_parallel_limit(),
            continue_on_error: false,
            fail_fast: true,
            timeout_seconds: None,
            dry_run: false,
        }
    }
}

/// Complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique lowercase name.
    pub name: String,
    /// Semver version.
    pub version: String,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Trigger configuration.
    #[serde(default)]
    pub triggers: WorkflowTriggers,
    /// Input parameter schema.
    #[serde(default)]
    pub inputs: HashMap<String, ParameterDef>,
    /// Output parameter schema.
    #[serde(default)]
    pub outputs: HashMap<String, ParameterDef>,
    /// Ordered step list.
    pub steps: Vec<WorkflowStep>,
    /// Execution configuration.
    #[serde(default)]
    pub execution: WorkflowExecution,
}

impl WorkflowDefinition {
    /// Minimal definition for builders and tests.
    #[must_use]
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            name: name.into(),
            version: "0.1.0".to_string(),
            description: None,
            triggers: WorkflowTriggers::default(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            steps,
            execution: WorkflowExecution::default(),
        }
    }

    /// Validate invariants: name/version shape, non-empty unique steps,
    /// resolvable dependencies, and range constraints.
    pub fn validate(&self) -> Result<(), WorkflowDefinitionError> {
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
            return Err(WorkflowDefinitionError::Invalid(format!(
                "name '{}' must be a 2-64 char lowercase slug",
                self.name
            )));
        }

        let semver_ok = {
            let parts: Vec<&str> = self.version.split('.').collect();
            parts.len() == 3 && parts.iter().all(|p| p.parse::<u32>().is_ok())
        };
        if !semver_ok {
            return Err(WorkflowDefinitionError::Invalid(format!(
                "version '{}' is not MAJOR.MINOR.PATCH",
                self.version
            )));
        }

        if self.steps.is_empty() {
            return Err(WorkflowDefinitionError::Invalid(
                "workflow has no steps".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(WorkflowDefinitionError::Invalid(format!(
                    "duplicate step ID '{}'",
                    step.id
                )));
            }
        }
        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(WorkflowDefinitionError::Invalid(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.id, dep
                    )));
                }
            }
        }

        if !(1..=32).contains(&self.execution.parallel_limit) {
            return Err(WorkflowDefinitionError::Invalid(format!(
                "parallel_limit {} outside 1..=32",
                self.execution.parallel_limit
            )));
        }
        if let Some(timeout) = self.execution.timeout_seconds
            && !(60..=86_400).contains(&timeout)
        {
            return Err(WorkflowDefinitionError::Invalid(format!(
                "timeout_seconds {timeout} outside 60..=86400"
            )));
        }

        for step in &self.steps {
            Self::validate_step(step)?;
        }
        Ok(())
    }

    fn validate_step(step: &WorkflowStep) -> Result<(), WorkflowDefinitionError> {
        if !(1..=10).contains(&step.retry.max_attempts) {
            return Err(WorkflowDefinitionError::Invalid(format!(
                "step '{}': retry.max_attempts {} outside 1..=10",
                step.id, step.retry.max_attempts
            )));
        }
        if step.retry.delay_seconds == 0 {
            return Err(WorkflowDefinitionError::Invalid(format!(
                "step '{}': retry.delay_seconds must be >= 1",
                step.id
            )));
        }
        if let Some(timeout) = step.timeout_seconds
            && timeout < 10
        {
            return Err(WorkflowDefinitionError::Invalid(format!(
                "step '{}': timeout_seconds {timeout} below minimum 10",
                step.id
            )));
        }
        for child in step
            .steps
            .iter()
            .chain(&step.then_steps)
            .chain(&step.else_steps)
        {
            Self::validate_step(child)?;
        }
        Ok(())
    }

    /// Load and validate a definition from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, WorkflowDefinitionError> {
        let raw = std::fs::read_to_string(path)?;
        let mut value: Value = serde_json::from_str(&raw)?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
        }
        let definition: Self = serde_json::from_value(value)?;
        definition.validate()?;
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_steps() -> Vec<WorkflowStep> {
        vec![
            WorkflowStep::new("build", StepAction::RunCommand).with_command("make"),
            WorkflowStep::new("test", StepAction::RunCommand)
                .with_command("make test")
                .depends(&["build"]),
        ]
    }

    #[test]
    fn valid_definition_passes() {
        let def = WorkflowDefinition::new("ci-pipeline", two_steps());
        assert!(def.validate().is_ok());
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let def = WorkflowDefinition::new(
            "dupes",
            vec![
                WorkflowStep::new("a", StepAction::Validate),
                WorkflowStep::new("a", StepAction::Validate),
            ],
        );
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let def = WorkflowDefinition::new(
            "bad-dep",
            vec![WorkflowStep::new("a", StepAction::Validate).depends(&["ghost"])],
        );
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn parallel_limit_range_is_enforced() {
        let mut def = WorkflowDefinition::new("wide", two_steps());
        def.execution.parallel_limit = 33;
        assert!(def.validate().is_err());
        def.execution.parallel_limit = 0;
        assert!(def.validate().is_err());
    }

    #[test]
    fn retry_and_timeout_ranges_are_enforced() {
        let mut step = WorkflowStep::new("s", StepAction::Validate);
        step.retry.max_attempts = 11;
        let def = WorkflowDefinition::new("retry-heavy", vec![step]);
        assert!(def.validate().is_err());

        let mut step = WorkflowStep::new("s", StepAction::Validate);
        step.timeout_seconds = Some(5);
        let def = WorkflowDefinition::new("short-fuse", vec![step]);
        assert!(def.validate().is_err());
    }

    #[test]
    fn definitions_round_trip_through_json() {
        let def = WorkflowDefinition::new("round-trip", two_steps());
        let json = serde_json::to_string(&def).unwrap();
        let back: WorkflowDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "round-trip");
        assert_eq!(back.steps.len(), 2);
        assert_eq!(back.steps[1].depends_on, vec!["build"]);
    }

    #[test]
    fn http_request_step_carries_headers() {
        let json = serde_json::json!({
            "id": "notify",
            "action": "http-request",
            "url": "https://example.com/hook",
            "method": "POST",
            "headers": {"authorization": "Bearer token-123"},
        });
        let step: WorkflowStep = serde_json::from_value(json).unwrap();
        let headers = step.headers.unwrap();
        assert_eq!(headers["authorization"], "Bearer token-123");
    }

    #[test]
    fn conditional_branches_deserialize_from_then_else() {
        let json = serde_json::json!({
            "id": "gate",
            "action": "conditional",
            "condition": "ready",
            "then": [{"id": "go", "action": "validate"}],
            "else": [{"id": "stop", "action": "validate"}],
        });
        let step: WorkflowStep = serde_json::from_value(json).unwrap();
        assert_eq!(step.then_steps.len(), 1);
        assert_eq!(step.else_steps.len(), 1);
    }
}
