//! Bounded reasoning / tool-use loop.
//!
//! Alternates model completions and tool executions until the model returns
//! a final message or a bound is hit. Every proposed tool call passes, in
//! order: argument validation against the tool's JSON schema, governance,
//! autonomy enforcement, then execution. Observations are appended as
//! tool-role messages (truncated to a configurable cap) so the model can
//! react to failures.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::agents::{AutonomyLevel, LoopStep, StuckDetection, StuckDetector};
use crate::autonomy::RuntimeEnforcer;
use crate::governance::{Decision, ToolGovernance};
use crate::router::{ChatMessage, CompletionRequest, FinishReason, ModelRouter};
use crate::tools::{ToolContext, ToolRegistry, ToolResult};
use crate::util::truncate_chars;

/// Why the loop terminated. Each failure reason maps 1:1 to a taxonomy
/// subcode (see [`super::taxonomy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model produced a final answer.
    Completed,
    /// Arguments failed schema validation.
    ToolArgumentError,
    /// A tool failed irrecoverably.
    ToolExecutionError,
    /// Governance denied a tool call.
    ToolGovernanceDenied,
    /// The iteration ceiling was reached.
    MaxIterations,
    /// The context budget was exhausted.
    ContextExhausted,
    /// The autonomy budget was exhausted.
    BudgetExceeded,
    /// A leakage marker appeared in tool output.
    LeakageDetected,
    /// Consecutive errors exceeded the threshold, or the model call failed.
    Error,
}

impl TerminationReason {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::ToolArgumentError => "tool_argument_error",
            Self::ToolExecutionError => "tool_execution_error",
            Self::ToolGovernanceDenied => "tool_governance_denied",
            Self::MaxIterations => "max_iterations",
            Self::ContextExhausted => "context_exhausted",
            Self::BudgetExceeded => "budget_exceeded",
            Self::LeakageDetected => "leakage_detected",
            Self::Error => "error",
        }
    }

    /// Parse a snake_case reason name.
    #[must_use]
    pub fn from_str_loose(value: &str) -> Option<Self> {
        let all = [
            Self::Completed,
            Self::ToolArgumentError,
            Self::ToolExecutionError,
            Self::ToolGovernanceDenied,
            Self::MaxIterations,
            Self::ContextExhausted,
            Self::BudgetExceeded,
            Self::LeakageDetected,
            Self::Error,
        ];
        all.into_iter().find(|r| r.as_str() == value)
    }
}

/// Loop configuration.
#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    /// Iteration ceiling.
    pub max_iterations: usize,
    /// Consecutive recoverable errors tolerated before terminating.
    pub consecutive_error_limit: usize,
    /// Tool output truncation cap in characters.
    pub max_tool_output_chars: usize,
    /// Rough context budget in characters across all messages.
    pub context_char_budget: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Terminate with `leakage_detected` when a tool output contains this
    /// marker. The predicate itself is deployment-specific.
    pub leakage_marker: Option<String>,
    /// Terminate on the first tool failure instead of letting the model
    /// recover.
    pub break_on_tool_error: bool,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            consecutive_error_limit: 3,
            max_tool_output_chars: 8_000,
            context_char_budget: 200_000,
            temperature: 0.7,
            leakage_marker: None,
            break_on_tool_error: false,
        }
    }
}

/// One executed (or attempted) tool call.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Call ID from the model.
    pub id: String,
    /// Tool name.
    pub tool: String,
    /// Parsed arguments.
    pub arguments: Value,
    /// Observation appended to the conversation.
    pub output: String,
    /// Whether the call succeeded.
    pub success: bool,
    /// Execution duration.
    pub duration_ms: u64,
}

/// Final result of a loop run.
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    /// Final assistant text (empty for most failure reasons).
    pub final_output: String,
    /// Iterations consumed.
    pub iterations: usize,
    /// Total tool calls attempted.
    pub tool_calls_made: usize,
    /// Ordered tool names, one per attempted call.
    pub tools_used: Vec<String>,
    /// Per-call records.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Why the loop stopped.
    pub termination_reason: TerminationReason,
    /// Model that served the run.
    pub model: String,
    /// Stuck-pattern detection, when one fired.
    pub stuck: Option<StuckDetection>,
}

/// A loop invocation.
#[derive(Debug, Clone)]
pub struct ToolLoopRequest {
    /// Initial conversation (without the system prompt).
    pub messages: Vec<ChatMessage>,
    /// Model identifier.
    pub model: String,
    /// Optional system prompt, prepended when present.
    pub system_prompt: Option<String>,
    /// Caller context threaded into governance and tools.
    pub tool_context: ToolContext,
    /// Autonomy level applied by governance.
    pub autonomy_level: Option<AutonomyLevel>,
}

/// The bounded reasoning driver.
pub struct ToolLoop {
    router: Arc<ModelRouter>,
    tools: Arc<ToolRegistry>,
    governance: Arc<ToolGovernance>,
    config: ToolLoopConfig,
    stuck_detector: Option<Box<dyn StuckDetector>>,
}

impl std::fmt::Debug for ToolLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLoop")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Outcome of processing one proposed tool call.
enum CallOutcome {
    /// Keep processing.
    Continue,
    /// Terminate the loop with this reason.
    Terminate(TerminationReason),
}

impl ToolLoop {
    /// Create a loop over the given router, tool registry, and governance.
    #[must_use]
    pub fn new(
        router: Arc<ModelRouter>,
        tools: Arc<ToolRegistry>,
        governance: Arc<ToolGovernance>,
        config: ToolLoopConfig,
    ) -> Self {
        Self {
            router,
            tools,
            governance,
            config,
            stuck_detector: None,
        }
    }

    /// Attach a stuck detector.
    #[must_use]
    pub fn with_stuck_detector(mut self, detector: Box<dyn StuckDetector>) -> Self {
        self.stuck_detector = Some(detector);
        self
    }

    /// Run the loop to termination.
    pub async fn run(
        &self,
        request: ToolLoopRequest,
        mut enforcer: Option<&mut RuntimeEnforcer>,
    ) -> ToolLoopResult {
        let mut state = LoopState::new(&request);
        let tool_definitions = self.tools.definitions();

        let mut messages: Vec<ChatMessage> = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(request.messages.iter().cloned());

        loop {
            if state.iterations >= self.config.max_iterations {
                return state.finish(TerminationReason::MaxIterations);
            }
            state.iterations += 1;

            if let Some(e) = enforcer.as_deref_mut() {
                e.record_iteration();
                if !e.check_limits().may_continue() {
                    return state.finish(TerminationReason::BudgetExceeded);
                }
            }

            let context_chars: usize = messages.iter().map(|m| m.content.len()).sum();
            if context_chars > self.config.context_char_budget {
                warn!(context_chars, "context budget exhausted");
                return state.finish(TerminationReason::ContextExhausted);
            }

            debug!(iteration = state.iterations, "requesting completion");
            let response = match self
                .router
                .complete(CompletionRequest {
                    messages: messages.clone(),
                    model: request.model.clone(),
                    temperature: self.config.temperature,
                    max_tokens: None,
                    tools: tool_definitions.clone(),
                })
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    warn!(error = %err, "model call failed");
                    return state.finish(TerminationReason::Error);
                }
            };

            if response.finish_reason != FinishReason::ToolCalls || response.tool_calls.is_empty() {
                state.final_output = response.content;
                return state.finish(TerminationReason::Completed);
            }

            let mut assistant = ChatMessage::assistant(response.content.clone());
            assistant.tool_calls = response.tool_calls.clone();
            messages.push(assistant);

            for call in &response.tool_calls {
                let outcome = self
                    .process_call(call, &request, &mut state, &mut messages, &mut enforcer)
                    .await;
                if let CallOutcome::Terminate(reason) = outcome {
                    return state.finish(reason);
                }
            }

            if let Some(detector) = &self.stuck_detector
                && let Some(hit) = detector.detect(&state.loop_steps)
            {
                warn!(pattern = %hit.pattern, "stuck pattern detected");
                state.stuck = Some(hit);
                return state.finish(TerminationReason::Error);
            }
        }
    }

    async fn process_call(
        &self,
        call: &crate::router::ToolCallRequest,
        request: &ToolLoopRequest,
        state: &mut LoopState,
        messages: &mut Vec<ChatMessage>,
        enforcer: &mut Option<&mut RuntimeEnforcer>,
    ) -> CallOutcome {
        state.tool_calls_made += 1;
        state.tools_used.push(call.name.clone());

        // Parse and validate arguments against the tool's schema. Both
        // failures are recoverable observations until the consecutive
        // threshold is hit.
        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(err) => {
                return self.recoverable_error(
                    call,
                    state,
                    messages,
                    format!("invalid tool arguments: {err}"),
                );
            }
        };

        let Some(tool) = self.tools.get(&call.name) else {
            return self.recoverable_error(
                call,
                state,
                messages,
                format!("unknown tool '{}'", call.name),
            );
        };

        if let Err(err) = validate_arguments(&tool.parameters_schema(), &args) {
            return self.recoverable_error(
                call,
                state,
                messages,
                format!("arguments failed schema validation: {err}"),
            );
        }

        // Governance.
        if let Decision::Deny(reason) = self.governance.pre_execute_check(
            &call.name,
            &args,
            &request.tool_context,
            request.autonomy_level,
        ) {
            warn!(tool = %call.name, %reason, "tool call denied");
            messages.push(ChatMessage::tool(
                format!("Tool call denied: {reason}"),
                &call.id,
                &call.name,
            ));
            return CallOutcome::Terminate(TerminationReason::ToolGovernanceDenied);
        }

        // Autonomy.
        if let Some(e) = enforcer.as_deref_mut() {
            e.record_tool_call();
            if !e.check_limits().may_continue() {
                return CallOutcome::Terminate(TerminationReason::BudgetExceeded);
            }
        }

        // Execute.
        let started = Instant::now();
        let result = tool.execute(args.clone(), &request.tool_context).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        self.governance.log_execution(&call.name, &args, &result);

        let observation = if result.success {
            result.content.clone()
        } else {
            format!(
                "Tool '{}' failed: {}",
                call.name,
                result.error.as_deref().unwrap_or("unknown error")
            )
        };
        let truncated = truncate_chars(&observation, self.config.max_tool_output_chars);
        messages.push(ChatMessage::tool(truncated.clone(), &call.id, &call.name));

        state.tool_calls.push(ToolCallRecord {
            id: call.id.clone(),
            tool: call.name.clone(),
            arguments: args,
            output: truncated,
            success: result.success,
            duration_ms,
        });
        state.loop_steps.push(LoopStep {
            action: call.name.clone(),
            result: observation.clone(),
            reasoning: String::new(),
        });

        if result.success {
            state.consecutive_errors = 0;
        } else {
            if self.config.break_on_tool_error {
                return CallOutcome::Terminate(TerminationReason::ToolExecutionError);
            }
            state.consecutive_errors += 1;
            if state.consecutive_errors >= self.config.consecutive_error_limit {
                return CallOutcome::Terminate(TerminationReason::Error);
            }
        }

        if let Some(marker) = &self.config.leakage_marker
            && observation.contains(marker.as_str())
        {
            warn!(tool = %call.name, "leakage marker found in tool output");
            return CallOutcome::Terminate(TerminationReason::LeakageDetected);
        }

        CallOutcome::Continue
    }

    /// Append an error observation; terminate with the generic `error`
    /// reason once the consecutive threshold is reached.
    fn recoverable_error(
        &self,
        call: &crate::router::ToolCallRequest,
        state: &mut LoopState,
        messages: &mut Vec<ChatMessage>,
        error: String,
    ) -> CallOutcome {
        debug!(tool = %call.name, %error, "recoverable tool error");
        messages.push(ChatMessage::tool(error.clone(), &call.id, &call.name));
        state.loop_steps.push(LoopStep {
            action: call.name.clone(),
            result: error,
            reasoning: String::new(),
        });
        state.consecutive_errors += 1;
        if state.consecutive_errors >= self.config.consecutive_error_limit {
            CallOutcome::Terminate(TerminationReason::Error)
        } else {
            CallOutcome::Continue
        }
    }
}

/// Mutable accumulation across a run.
struct LoopState {
    iterations: usize,
    consecutive_errors: usize,
    tool_calls_made: usize,
    tools_used: Vec<String>,
    tool_calls: Vec<ToolCallRecord>,
    loop_steps: Vec<LoopStep>,
    final_output: String,
    stuck: Option<StuckDetection>,
    model: String,
}

impl LoopState {
    fn new(request: &ToolLoopRequest) -> Self {
        Self {
            iterations: 0,
            consecutive_errors: 0,
            tool_calls_made: 0,
            tools_used: Vec::new(),
            tool_calls: Vec::new(),
            loop_steps: Vec::new(),
            final_output: String::new(),
            stuck: None,
            model: request.model.clone(),
        }
    }

    fn finish(self, reason: TerminationReason) -> ToolLoopResult {
        ToolLoopResult {
            final_output: self.final_output,
            iterations: self.iterations,
            tool_calls_made: self.tool_calls_made,
            tools_used: self.tools_used,
            tool_calls: self.tool_calls,
            termination_reason: reason,
            model: self.model,
            stuck: self.stuck,
        }
    }
}

fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|err| format!("invalid tool schema: {err}"))?;
    validator.validate(args).map_err(|err| err.to_string())
}

/// Convenience used by tests: a [`ToolResult`] rendered the way the loop
/// renders observations.
#[doc(hidden)]
#[must_use]
pub fn render_observation(tool: &str, result: &ToolResult) -> String {
    if result.success {
        result.content.clone()
    } else {
        format!(
            "Tool '{tool}' failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::GovernanceConfig;
    use crate::router::MockProvider;
    use crate::tools::EchoTool;

    fn harness(script: Vec<crate::router::CompletionResponse>) -> ToolLoop {
        let router = Arc::new(ModelRouter::new());
        router.register("mock", Arc::new(MockProvider::scripted(script)));
        let tools = Arc::new(ToolRegistry::new());
        tools.register(Arc::new(EchoTool));
        ToolLoop::new(
            router,
            tools,
            Arc::new(ToolGovernance::new(GovernanceConfig::default())),
            ToolLoopConfig::default(),
        )
    }

    fn loop_request() -> ToolLoopRequest {
        ToolLoopRequest {
            messages: vec![ChatMessage::user("do the thing")],
            model: "mock-model".into(),
            system_prompt: Some("you are a test agent".into()),
            tool_context: ToolContext::with_scope("tools:execute"),
            autonomy_level: None,
        }
    }

    #[tokio::test]
    async fn completes_on_final_message() {
        let tool_loop = harness(vec![MockProvider::final_message("all done")]);
        let result = tool_loop.run(loop_request(), None).await;
        assert_eq!(result.termination_reason, TerminationReason::Completed);
        assert_eq!(result.final_output, "all done");
        assert_eq!(result.iterations, 1);
        assert!(result.tools_used.is_empty());
    }

    #[tokio::test]
    async fn executes_tool_then_completes() {
        let tool_loop = harness(vec![
            MockProvider::tool_call("c1", "echo", "{\"message\":\"ping\"}"),
            MockProvider::final_message("observed ping"),
        ]);
        let result = tool_loop.run(loop_request(), None).await;
        assert_eq!(result.termination_reason, TerminationReason::Completed);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls_made, 1);
        assert_eq!(result.tools_used, vec!["echo"]);
        assert!(result.tool_calls[0].success);
        assert_eq!(result.tool_calls[0].output, "ping");
    }

    #[tokio::test]
    async fn max_iterations_fires_on_the_extra_iteration() {
        let router = Arc::new(ModelRouter::new());
        router.register(
            "mock",
            Arc::new(MockProvider::scripted(vec![MockProvider::tool_call(
                "c1",
                "echo",
                "{\"message\":\"again\"}",
            )])),
        );
        let tools = Arc::new(ToolRegistry::new());
        tools.register(Arc::new(EchoTool));
        let tool_loop = ToolLoop::new(
            router,
            tools,
            Arc::new(ToolGovernance::default()),
            ToolLoopConfig {
                max_iterations: 3,
                ..ToolLoopConfig::default()
            },
        );
        let result = tool_loop.run(loop_request(), None).await;
        assert_eq!(result.termination_reason, TerminationReason::MaxIterations);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.tool_calls_made, 3);
    }

    #[tokio::test]
    async fn invalid_arguments_are_recoverable_until_threshold() {
        // Bad args three times in a row: the default threshold terminates
        // the loop with the generic error reason.
        let tool_loop = harness(vec![
            MockProvider::tool_call("c1", "echo", "not json"),
            MockProvider::tool_call("c2", "echo", "not json"),
            MockProvider::tool_call("c3", "echo", "not json"),
            MockProvider::final_message("never reached"),
        ]);
        let result = tool_loop.run(loop_request(), None).await;
        assert_eq!(result.termination_reason, TerminationReason::Error);
        assert_eq!(result.tool_calls_made, 3);
    }

    #[tokio::test]
    async fn model_can_recover_from_one_bad_call() {
        let tool_loop = harness(vec![
            MockProvider::tool_call("c1", "echo", "{\"wrong_field\": 1}"),
            MockProvider::tool_call("c2", "echo", "{\"message\":\"fixed\"}"),
            MockProvider::final_message("done"),
        ]);
        let result = tool_loop.run(loop_request(), None).await;
        assert_eq!(result.termination_reason, TerminationReason::Completed);
        assert_eq!(result.tool_calls_made, 2);
    }

    #[tokio::test]
    async fn governance_denial_terminates() {
        let tool_loop = harness(vec![
            MockProvider::tool_call("c1", "echo", "{\"message\":\"hi\"}"),
            MockProvider::final_message("unreachable"),
        ]);
        let mut request = loop_request();
        request.tool_context = ToolContext::default(); // no scopes
        let result = tool_loop.run(request, None).await;
        assert_eq!(
            result.termination_reason,
            TerminationReason::ToolGovernanceDenied
        );
    }

    #[tokio::test]
    async fn budget_exhaustion_terminates_with_budget_exceeded() {
        use crate::autonomy::{AutonomyBudget, BudgetState, StopAction, StopCondition};

        let tool_loop = harness(vec![MockProvider::tool_call(
            "c1",
            "echo",
            "{\"message\":\"hi\"}",
        )]);
        let mut budget = AutonomyBudget::new("task", "agent");
        budget.state = BudgetState::Active;
        budget.limits.max_iterations = 2;
        budget.limits.max_duration_minutes = 0;
        budget.limits.max_tool_calls = 0;
        budget.limits.max_files_modified = 0;
        budget.limits.max_lines_changed = 0;
        budget.stop_conditions = vec![StopCondition {
            description: "iteration cap".into(),
            action: StopAction::Stop,
        }];
        let mut enforcer = RuntimeEnforcer::new(budget);
        let result = tool_loop.run(loop_request(), Some(&mut enforcer)).await;
        assert_eq!(result.termination_reason, TerminationReason::BudgetExceeded);
        assert!(enforcer.context().stopped);
    }

    #[tokio::test]
    async fn leakage_marker_terminates() {
        let router = Arc::new(ModelRouter::new());
        router.register(
            "mock",
            Arc::new(MockProvider::scripted(vec![
                MockProvider::tool_call("c1", "echo", "{\"message\":\"ANSWER_KEY=42\"}"),
                MockProvider::final_message("unreachable"),
            ])),
        );
        let tools = Arc::new(ToolRegistry::new());
        tools.register(Arc::new(EchoTool));
        let tool_loop = ToolLoop::new(
            router,
            tools,
            Arc::new(ToolGovernance::default()),
            ToolLoopConfig {
                leakage_marker: Some("ANSWER_KEY".into()),
                ..ToolLoopConfig::default()
            },
        );
        let result = tool_loop.run(loop_request(), None).await;
        assert_eq!(
            result.termination_reason,
            TerminationReason::LeakageDetected
        );
    }

    #[tokio::test]
    async fn long_outputs_are_truncated() {
        let long = "x".repeat(10_000);
        let router = Arc::new(ModelRouter::new());
        router.register(
            "mock",
            Arc::new(MockProvider::scripted(vec![
                MockProvider::tool_call(
                    "c1",
                    "echo",
                    &format!("{{\"message\":\"{long}\"}}"),
                ),
                MockProvider::final_message("done"),
            ])),
        );
        let tools = Arc::new(ToolRegistry::new());
        tools.register(Arc::new(EchoTool));
        let tool_loop = ToolLoop::new(
            router,
            tools,
            Arc::new(ToolGovernance::default()),
            ToolLoopConfig {
                max_tool_output_chars: 100,
                ..ToolLoopConfig::default()
            },
        );
        let result = tool_loop.run(loop_request(), None).await;
        assert!(result.tool_calls[0].output.contains("[truncated]"));
        assert!(result.tool_calls[0].output.len() < 200);
    }
}
