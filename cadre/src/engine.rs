//! Engine root context.
//!
//! Owns the process singletons (registries, trace collector, hook registry,
//! governance, autonomy service, activity feed) and exposes the engine's
//! surface: agent invoke, workflow execute, trace query, and gate
//! evaluation. Nothing reads mutable global state; collaborators are passed
//! down through this context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

use crate::agents::{AgentDefinition, AgentRegistry};
use crate::autonomy::{AutonomyError, AutonomyService};
use crate::comparative::ComparativeService;
use crate::gates::{GateEnforcer, GateReport, GateType, MetricId, TaskRunResult};
use crate::governance::{GovernanceConfig, ToolGovernance};
use crate::hooks::{HookContext, HookEventType, HookRegistry};
use crate::reasoning::{
    TerminationReason, ToolLoop, ToolLoopConfig, ToolLoopRequest, ToolLoopResult, to_failure_record,
    to_trace_outcome,
};
use crate::router::{ChatMessage, ModelRouter};
use crate::skills::SkillRegistry;
use crate::tools::{CodeExecutor, ToolContext, ToolRegistry};
use crate::trace::{ActionStatus, ActivityFeed, TraceCollector, TraceFilter, TraceRecord};
use crate::workflow::{
    ActionAdapters, AgentInvoker, WorkflowDefinition, WorkflowError, WorkflowResult,
    WorkflowRunner,
};

/// Errors from the engine surface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The named agent is not registered.
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    /// The named workflow is not registered.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),
    /// A pre-hook aborted the invocation.
    #[error("aborted by hook: {0}")]
    Aborted(String),
    /// Workflow execution failed structurally.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    /// Autonomy operation failed.
    #[error(transparent)]
    Autonomy(#[from] AutonomyError),
}

/// Result of invoking one agent through the reasoning loop.
#[derive(Debug, Clone)]
pub struct AgentInvokeResult {
    /// Agent that ran.
    pub agent: String,
    /// Final output text.
    pub output: String,
    /// Why the loop stopped.
    pub termination_reason: TerminationReason,
    /// Iterations consumed.
    pub iterations: usize,
    /// Trace recorded for the run.
    pub trace_id: String,
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    router: Option<Arc<ModelRouter>>,
    executor: Option<Arc<dyn CodeExecutor>>,
    governance_config: Option<GovernanceConfig>,
    loop_config: Option<ToolLoopConfig>,
    default_model: Option<String>,
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder").finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Use the given model router.
    #[must_use]
    pub fn router(mut self, router: Arc<ModelRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Use the given code executor for workflow command steps.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn CodeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Override the governance configuration.
    #[must_use]
    pub fn governance(mut self, config: GovernanceConfig) -> Self {
        self.governance_config = Some(config);
        self
    }

    /// Override the tool-loop configuration.
    #[must_use]
    pub fn loop_config(mut self, config: ToolLoopConfig) -> Self {
        self.loop_config = Some(config);
        self
    }

    /// Model used when an invocation does not specify one.
    #[must_use]
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Assemble the engine.
    #[must_use]
    pub fn build(self) -> Arc<Engine> {
        Arc::new(Engine {
            agents: Arc::new(AgentRegistry::new()),
            tools: Arc::new(ToolRegistry::new()),
            skills: Arc::new(SkillRegistry::new()),
            hooks: Arc::new(HookRegistry::default()),
            governance: Arc::new(ToolGovernance::new(
                self.governance_config.unwrap_or_default(),
            )),
            router: self.router.unwrap_or_else(|| Arc::new(ModelRouter::new())),
            traces: Arc::new(TraceCollector::new()),
            autonomy: Mutex::new(AutonomyService::new()),
            gates: GateEnforcer::default(),
            comparative: Mutex::new(ComparativeService::new()),
            activity: ActivityFeed::default(),
            workflows: RwLock::new(HashMap::new()),
            executor: self.executor,
            loop_config: self.loop_config.unwrap_or_default(),
            default_model: self.default_model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        })
    }
}

/// The engine: owner of all shared state and the exposed surface.
pub struct Engine {
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    skills: Arc<SkillRegistry>,
    hooks: Arc<HookRegistry>,
    governance: Arc<ToolGovernance>,
    router: Arc<ModelRouter>,
    traces: Arc<TraceCollector>,
    autonomy: Mutex<AutonomyService>,
    gates: GateEnforcer,
    comparative: Mutex<ComparativeService>,
    activity: ActivityFeed,
    workflows: RwLock<HashMap<String, WorkflowDefinition>>,
    executor: Option<Arc<dyn CodeExecutor>>,
    loop_config: ToolLoopConfig,
    default_model: String,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("agents", &self.agents.len())
            .field("tools", &self.tools.len())
            .field("hooks", &self.hooks.count())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The agent registry.
    #[must_use]
    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// The tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The skill registry.
    #[must_use]
    pub fn skills(&self) -> &SkillRegistry {
        &self.skills
    }

    /// The hook registry.
    #[must_use]
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The governance instance.
    #[must_use]
    pub fn governance(&self) -> &ToolGovernance {
        &self.governance
    }

    /// The trace collector.
    #[must_use]
    pub fn traces(&self) -> &TraceCollector {
        &self.traces
    }

    /// The activity feed.
    #[must_use]
    pub const fn activity(&self) -> &ActivityFeed {
        &self.activity
    }

    /// Run a closure against the autonomy service.
    pub fn with_autonomy<T>(&self, f: impl FnOnce(&mut AutonomyService) -> T) -> T {
        f(&mut self.autonomy.lock().expect("autonomy lock"))
    }

    /// Run a closure against the comparative service.
    pub fn with_comparative<T>(&self, f: impl FnOnce(&mut ComparativeService) -> T) -> T {
        f(&mut self.comparative.lock().expect("comparative lock"))
    }

    /// Register a workflow definition after validating it.
    pub fn register_workflow(&self, definition: WorkflowDefinition) -> Result<(), WorkflowError> {
        definition.validate()?;
        info!(workflow = %definition.name, "workflow_registered");
        self.workflows
            .write()
            .expect("workflow registry lock")
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Registered workflow names, sorted.
    #[must_use]
    pub fn workflow_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .workflows
            .read()
            .expect("workflow registry lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Register the built-in metrics and audit hooks.
    pub fn register_builtin_hooks(&self) -> usize {
        self.hooks.register_builtins()
    }

    /// Invoke an agent through the reasoning loop, recording a trace.
    pub async fn invoke_agent(
        &self,
        agent_name: &str,
        inputs: Value,
        tenant_id: &str,
    ) -> Result<AgentInvokeResult, EngineError> {
        let definition = self
            .agents
            .get(agent_name)
            .ok_or_else(|| EngineError::AgentNotFound(agent_name.to_string()))?;

        // Pre-invocation hooks; abort short-circuits the run.
        let pre_ctx = HookContext::new(HookEventType::AgentInvokePre, tenant_id)
            .with_field("agent_name", agent_name)
            .with_field("inputs", inputs.clone())
            .with_field("model", self.default_model.clone());
        let pre_ctx = self
            .hooks
            .chain_runner(HookEventType::AgentInvokePre, tenant_id)
            .run(pre_ctx)
            .await;
        if pre_ctx.abort {
            return Err(EngineError::Aborted(pre_ctx.abort_reason));
        }

        let trace = self.traces.start_trace(
            agent_name,
            "",
            "",
            tenant_id,
            &definition.name,
            definition.role.as_str(),
            &self.default_model,
        );

        let result = self
            .run_loop(&definition, &inputs, tenant_id)
            .await;
        self.record_loop_trace(&trace.trace_id, &result);

        // Post-invocation hooks run concurrently; they cannot abort.
        let post_ctx = HookContext::new(HookEventType::AgentInvokePost, tenant_id)
            .with_field("agent_name", agent_name)
            .with_field(
                "termination_reason",
                result.termination_reason.as_str(),
            )
            .with_field("iterations", result.iterations as i64);
        let _ = self
            .hooks
            .concurrent_runner(HookEventType::AgentInvokePost, tenant_id)
            .run(post_ctx)
            .await;

        self.activity.record(
            "agent.invoked",
            tenant_id,
            &format!(
                "{agent_name} finished with {}",
                result.termination_reason.as_str()
            ),
        );

        Ok(AgentInvokeResult {
            agent: agent_name.to_string(),
            output: result.final_output.clone(),
            termination_reason: result.termination_reason,
            iterations: result.iterations,
            trace_id: trace.trace_id,
        })
    }

    async fn run_loop(
        &self,
        definition: &AgentDefinition,
        inputs: &Value,
        tenant_id: &str,
    ) -> ToolLoopResult {
        let tool_loop = ToolLoop::new(
            Arc::clone(&self.router),
            Arc::clone(&self.tools),
            Arc::clone(&self.governance),
            self.loop_config.clone(),
        );

        let system_prompt = build_system_prompt(definition);
        let task = serde_json::to_string_pretty(inputs).unwrap_or_else(|_| inputs.to_string());

        let mut tool_context = ToolContext::with_scope("tools:execute");
        tool_context.tenant_id = tenant_id.to_string();

        tool_loop
            .run(
                ToolLoopRequest {
                    messages: vec![ChatMessage::user(task)],
                    model: self.default_model.clone(),
                    system_prompt: Some(system_prompt),
                    tool_context,
                    autonomy_level: Some(definition.autonomy),
                },
                None,
            )
            .await
    }

    /// Record a loop result against its trace: one step per run, one action
    /// per tool call, outcome from the taxonomy mapping.
    fn record_loop_trace(&self, trace_id: &str, result: &ToolLoopResult) {
        let _ = self.traces.add_step(trace_id, "reasoning");
        for (index, call) in result.tool_calls.iter().enumerate() {
            let _ = self.traces.add_action(
                trace_id,
                "reasoning",
                &format!("action-{index}"),
                &call.tool,
                &call.arguments.to_string(),
                &call.output,
                None,
                call.duration_ms,
                if call.success {
                    ActionStatus::Success
                } else {
                    ActionStatus::Failure
                },
            );
        }

        let outcome = to_trace_outcome(result);
        let _ = self.traces.complete_trace(
            trace_id,
            outcome.status,
            &outcome.failure_code,
            &outcome.failure_message,
        );
        if let Some(failure) = to_failure_record(result, trace_id) {
            self.traces.record_failure(
                trace_id,
                &failure.message,
                failure.classification.category,
                failure.classification.severity,
                &failure.classification.subcode,
            );
        }
    }

    /// Execute a registered workflow.
    pub async fn execute_workflow(
        self: &Arc<Self>,
        workflow_name: &str,
        inputs: HashMap<String, Value>,
        tenant_id: &str,
    ) -> Result<WorkflowResult, EngineError> {
        let definition = self
            .workflows
            .read()
            .expect("workflow registry lock")
            .get(workflow_name)
            .cloned()
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_name.to_string()))?;

        let adapters = ActionAdapters {
            agent_invoker: Some(Arc::clone(self) as Arc<dyn AgentInvoker>),
            executor: self.executor.clone(),
        };
        let runner = WorkflowRunner::new(adapters).with_hooks(Arc::clone(&self.hooks));
        let result = runner.run(&definition, inputs, tenant_id).await?;

        self.activity.record(
            "workflow.executed",
            tenant_id,
            &format!("{workflow_name} finished with {:?}", result.status),
        );
        Ok(result)
    }

    /// List traces through the collector.
    #[must_use]
    pub fn query_traces(&self, filter: &TraceFilter) -> Vec<TraceRecord> {
        self.traces.list_traces(filter)
    }

    /// Evaluate a gate against metric values and canonical task results.
    #[must_use]
    pub fn evaluate_gate(
        &self,
        gate: GateType,
        metrics: &HashMap<MetricId, f64>,
        task_results: Option<&[TaskRunResult]>,
    ) -> GateReport {
        self.gates.check_gate(gate, metrics, task_results)
    }
}

#[async_trait]
impl AgentInvoker for Engine {
    async fn invoke_agent(
        &self,
        agent: &str,
        inputs: Value,
        tenant_id: &str,
    ) -> Result<Value, String> {
        let result = Engine::invoke_agent(self, agent, inputs, tenant_id)
            .await
            .map_err(|e| e.to_string())?;
        if result.termination_reason == TerminationReason::Completed {
            Ok(json!({
                "output": result.output,
                "iterations": result.iterations,
                "trace_id": result.trace_id,
            }))
        } else {
            Err(format!(
                "agent '{agent}' terminated with {}",
                result.termination_reason.as_str()
            ))
        }
    }
}

fn build_system_prompt(definition: &AgentDefinition) -> String {
    let mut prompt = format!(
        "You are '{}', a {} agent.",
        definition.name,
        definition.role.as_str()
    );
    if !definition.description.is_empty() {
        prompt.push(' ');
        prompt.push_str(&definition.description);
    }
    if !definition.capabilities.is_empty() {
        prompt.push_str("\nDeclared capabilities: ");
        prompt.push_str(&definition.capabilities.join(", "));
    }
    if !definition.prompts.system.is_empty() {
        prompt.push('\n');
        prompt.push_str(&definition.prompts.system);
    }
    prompt
}
