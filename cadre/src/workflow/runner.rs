//! Workflow execution.
//!
//! Walks dependency layers in order, runs up to `parallel_limit` steps of a
//! layer concurrently, retries failed steps per their retry config, and
//! records step outputs into a shared context keyed by step ID so
//! downstream steps can reference them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::hooks::{HookContext, HookEventType, HookRegistry};

use super::actions::{
    ActionAdapters, ActionError, SharedContext, eval_condition, run_leaf_action,
};
use super::dag::{Dag, DagError};
use super::definition::{
    ExecutionMode, StepAction, WorkflowDefinition, WorkflowDefinitionError, WorkflowStep,
};

/// Default per-step timeout when a step declares none.
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors that abort a whole workflow run.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The definition is invalid.
    #[error(transparent)]
    Definition(#[from] WorkflowDefinitionError),
    /// The dependency graph is invalid.
    #[error(transparent)]
    Dag(#[from] DagError),
    /// The overall workflow timeout elapsed.
    #[error("workflow timed out after {0} s")]
    Timeout(u64),
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step succeeded.
    Success,
    /// The step failed after all retry attempts.
    Failed,
    /// The step never ran.
    Skipped,
}

/// Result of one step.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StepResult {
    /// Step ID.
    pub step_id: String,
    /// Outcome.
    pub status: StepStatus,
    /// Output value recorded into the shared context.
    pub output: Value,
    /// Attempts consumed (including the successful one).
    pub attempts: u32,
    /// Error from the final attempt, when failed.
    pub error: Option<String>,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

/// Final status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every step succeeded (or was tolerated by continue-on-error).
    Completed,
    /// At least one step failed.
    Failed,
}

/// Result of a workflow run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkflowResult {
    /// Workflow name.
    pub workflow: String,
    /// Overall status.
    pub status: WorkflowStatus,
    /// Per-step results in completion order.
    pub step_results: Vec<StepResult>,
    /// Step ID → recorded output.
    pub outputs: HashMap<String, Value>,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

/// Drives workflow definitions to completion.
#[derive(Debug, Default)]
pub struct WorkflowRunner {
    adapters: ActionAdapters,
    hooks: Option<Arc<HookRegistry>>,
}

impl WorkflowRunner {
    /// Runner over the given action adapters.
    #[must_use]
    pub fn new(adapters: ActionAdapters) -> Self {
        Self {
            adapters,
            hooks: None,
        }
    }

    /// Fire `workflow.step.pre` / `workflow.step.post` hooks around every
    /// step.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Execute a workflow with the given inputs.
    pub async fn run(
        &self,
        definition: &WorkflowDefinition,
        inputs: HashMap<String, Value>,
        tenant_id: &str,
    ) -> Result<WorkflowResult, WorkflowError> {
        definition.validate()?;
        let started = Instant::now();

        let run = self.run_inner(definition, inputs, tenant_id, started);
        match definition.execution.timeout_seconds {
            Some(limit) => tokio::time::timeout(Duration::from_secs(limit), run)
                .await
                .map_err(|_| WorkflowError::Timeout(limit))?,
            None => run.await,
        }
    }

    async fn run_inner(
        &self,
        definition: &WorkflowDefinition,
        inputs: HashMap<String, Value>,
        tenant_id: &str,
        started: Instant,
    ) -> Result<WorkflowResult, WorkflowError> {
        let layers: Vec<Vec<String>> = match definition.execution.mode {
            ExecutionMode::Sequential => definition
                .steps
                .iter()
                .map(|s| vec![s.id.clone()])
                .collect(),
            ExecutionMode::Parallel => {
                vec![definition.steps.iter().map(|s| s.id.clone()).collect()]
            }
            ExecutionMode::DependencyAware => {
                Dag::from_steps(&definition.steps)?.parallel_groups()?
            }
        };

        let step_map: HashMap<&str, &WorkflowStep> = definition
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s))
            .collect();
        let context: SharedContext = Arc::new(tokio::sync::Mutex::new(HashMap::new()));
        let mut step_results: Vec<StepResult> = Vec::with_capacity(definition.steps.len());
        let mut failed = false;

        info!(
            workflow = %definition.name,
            layers = layers.len(),
            mode = ?definition.execution.mode,
            "workflow_started"
        );

        for (layer_index, layer) in layers.iter().enumerate() {
            if failed && !definition.execution.continue_on_error {
                for step_id in layer {
                    step_results.push(StepResult {
                        step_id: step_id.clone(),
                        status: StepStatus::Skipped,
                        output: Value::Null,
                        attempts: 0,
                        error: Some("skipped after earlier failure".to_string()),
                        duration_ms: 0,
                    });
                }
                continue;
            }

            let steps: Vec<&WorkflowStep> = layer
                .iter()
                .filter_map(|id| step_map.get(id.as_str()).copied())
                .collect();

            let layer_results: Vec<StepResult> = futures::stream::iter(steps)
                .map(|step| self.run_step(step, definition, &inputs, &context, tenant_id))
                .buffer_unordered(definition.execution.parallel_limit.max(1))
                .collect()
                .await;

            for result in layer_results {
                if result.status == StepStatus::Failed {
                    failed = true;
                    warn!(
                        workflow = %definition.name,
                        step = %result.step_id,
                        layer = layer_index,
                        error = result.error.as_deref().unwrap_or(""),
                        "workflow_step_failed"
                    );
                }
                step_results.push(result);
            }
        }

        let outputs = context.lock().await.clone();
        let status = if failed {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Completed
        };
        info!(workflow = %definition.name, ?status, "workflow_finished");

        Ok(WorkflowResult {
            workflow: definition.name.clone(),
            status,
            step_results,
            outputs,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn run_step(
        &self,
        step: &WorkflowStep,
        definition: &WorkflowDefinition,
        workflow_inputs: &HashMap<String, Value>,
        context: &SharedContext,
        tenant_id: &str,
    ) -> StepResult {
        let started = Instant::now();

        if let Some(abort_reason) = self
            .fire_step_hook(HookEventType::WorkflowStepPre, step, definition, tenant_id, None)
            .await
        {
            return StepResult {
                step_id: step.id.clone(),
                status: StepStatus::Skipped,
                output: Value::Null,
                attempts: 0,
                error: Some(format!("aborted by hook: {abort_reason}")),
                duration_ms: 0,
            };
        }

        let merged = merge_inputs(step, workflow_inputs, context).await;
        let timeout = step
            .timeout_seconds
            .map_or(DEFAULT_STEP_TIMEOUT, Duration::from_secs);

        let mut attempts = 0;
        let mut last_error: Option<String> = None;
        let mut output: Option<Value> = None;

        while attempts < step.retry.max_attempts {
            attempts += 1;
            let attempt = tokio::time::timeout(
                timeout,
                self.execute_action(step, &merged, context, definition, tenant_id),
            )
            .await;

            match attempt {
                Ok(Ok(value)) => {
                    output = Some(value);
                    break;
                }
                Ok(Err(ActionError(message))) => last_error = Some(message),
                Err(_) => {
                    last_error = Some(format!(
                        "step timed out after {} s",
                        timeout.as_secs()
                    ));
                }
            }

            if attempts < step.retry.max_attempts {
                tokio::time::sleep(Duration::from_secs(step.retry.delay_seconds)).await;
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = match output {
            Some(value) => {
                context
                    .lock()
                    .await
                    .insert(step.id.clone(), value.clone());
                StepResult {
                    step_id: step.id.clone(),
                    status: StepStatus::Success,
                    output: value,
                    attempts,
                    error: None,
                    duration_ms,
                }
            }
            None => StepResult {
                step_id: step.id.clone(),
                status: StepStatus::Failed,
                output: Value::Null,
                attempts,
                error: last_error,
                duration_ms,
            },
        };

        let _ = self
            .fire_step_hook(
                HookEventType::WorkflowStepPost,
                step,
                definition,
                tenant_id,
                Some(&result),
            )
            .await;
        result
    }

    /// Run the step hook chain; returns the abort reason when the chain
    /// aborted.
    async fn fire_step_hook(
        &self,
        event: HookEventType,
        step: &WorkflowStep,
        definition: &WorkflowDefinition,
        tenant_id: &str,
        result: Option<&StepResult>,
    ) -> Option<String> {
        let hooks = self.hooks.as_ref()?;
        let mut ctx = HookContext::new(event, tenant_id)
            .with_field("workflow_name", definition.name.clone())
            .with_field("step_id", step.id.clone())
            .with_field("step_action", json!(step.action));
        if let Some(result) = result {
            ctx = ctx
                .with_field("status", json!(result.status))
                .with_field("duration_ms", result.duration_ms);
        }
        let ctx = hooks.chain_runner(event, tenant_id).run(ctx).await;
        ctx.abort.then_some(ctx.abort_reason)
    }

    /// Execute one action, recursing into structural steps.
    fn execute_action<'a>(
        &'a self,
        step: &'a WorkflowStep,
        merged: &'a HashMap<String, Value>,
        context: &'a SharedContext,
        definition: &'a WorkflowDefinition,
        tenant_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ActionError>> + Send + 'a>> {
        Box::pin(async move {
            match step.action {
                StepAction::Conditional => {
                    let condition = step.condition.as_deref().unwrap_or("");
                    let holds = eval_condition(condition, merged);
                    let branch = if holds {
                        &step.then_steps
                    } else {
                        &step.else_steps
                    };

                    let mut outputs = serde_json::Map::new();
                    for child in branch {
                        let child_inputs = merge_inputs(child, merged, context).await;
                        let value = self
                            .execute_action(child, &child_inputs, context, definition, tenant_id)
                            .await?;
                        context
                            .lock()
                            .await
                            .insert(child.id.clone(), value.clone());
                        outputs.insert(child.id.clone(), value);
                    }
                    Ok(json!({
                        "branch": if holds { "then" } else { "else" },
                        "outputs": outputs,
                    }))
                }
                StepAction::ParallelGroup => {
                    let mut child_inputs = Vec::with_capacity(step.steps.len());
                    for child in &step.steps {
                        child_inputs.push(merge_inputs(child, merged, context).await);
                    }
                    let futures = step.steps.iter().zip(child_inputs.iter()).map(
                        |(child, inputs)| async move {
                            let value = self
                                .execute_action(child, inputs, context, definition, tenant_id)
                                .await?;
                            Ok::<(String, Value), ActionError>((child.id.clone(), value))
                        },
                    );
                    let results = futures::future::join_all(futures).await;

                    let mut outputs = serde_json::Map::new();
                    for result in results {
                        let (id, value) = result?;
                        context.lock().await.insert(id.clone(), value.clone());
                        outputs.insert(id, value);
                    }
                    Ok(Value::Object(outputs))
                }
                _ => {
                    run_leaf_action(
                        step,
                        merged,
                        &self.adapters,
                        context,
                        tenant_id,
                        definition.execution.dry_run,
                    )
                    .await
                }
            }
        })
    }
}

/// Resolve a step's inputs: workflow inputs, then upstream outputs keyed by
/// step ID, then the step's own inputs (highest precedence).
async fn merge_inputs(
    step: &WorkflowStep,
    base: &HashMap<String, Value>,
    context: &SharedContext,
) -> HashMap<String, Value> {
    let mut merged = base.clone();
    {
        let ctx = context.lock().await;
        for dep in &step.depends_on {
            if let Some(value) = ctx.get(dep) {
                merged.insert(dep.clone(), value.clone());
            }
        }
    }
    for (key, value) in &step.inputs {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
