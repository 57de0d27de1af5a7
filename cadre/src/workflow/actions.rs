//! Leaf action adapters for workflow steps.
//!
//! Conditional and parallel-group steps are structural and handled by the
//! runner; everything else dispatches through [`run_leaf_action`]. The
//! `http-request` action carries an SSRF guard that rejects private and
//! loopback targets before any socket is opened.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::tools::{CodeExecutor, ExecutionContract, ExecutionInputs, SandboxSpec};

use super::definition::{StepAction, WorkflowStep};

/// Default per-request HTTP timeout for `http-request` steps.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `wait` polls its condition between checks.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A step-level failure, retryable by the runner.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ActionError(pub String);

/// Capability the `invoke-agent` action dispatches through. The engine
/// implements this with the reasoning loop.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke an agent with the given inputs.
    async fn invoke_agent(
        &self,
        agent: &str,
        inputs: Value,
        tenant_id: &str,
    ) -> Result<Value, String>;
}

/// Shared mutable workflow context: step ID → output value.
pub type SharedContext = Arc<tokio::sync::Mutex<HashMap<String, Value>>>;

/// Collaborators available to leaf actions.
#[derive(Clone, Default)]
pub struct ActionAdapters {
    /// Agent invocation capability.
    pub agent_invoker: Option<Arc<dyn AgentInvoker>>,
    /// Code execution capability.
    pub executor: Option<Arc<dyn CodeExecutor>>,
}

impl std::fmt::Debug for ActionAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionAdapters")
            .field("agent_invoker", &self.agent_invoker.is_some())
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

/// Execute a leaf action and return its output value.
pub async fn run_leaf_action(
    step: &WorkflowStep,
    inputs: &HashMap<String, Value>,
    adapters: &ActionAdapters,
    context: &SharedContext,
    tenant_id: &str,
    dry_run: bool,
) -> Result<Value, ActionError> {
    match step.action {
        StepAction::InvokeAgent => invoke_agent(step, inputs, adapters, tenant_id).await,
        StepAction::RunCommand => run_command(step, adapters, dry_run).await,
        StepAction::ExecuteCode => execute_code(step, inputs, adapters, dry_run).await,
        StepAction::Validate => validate(step, inputs),
        StepAction::Transform => transform(step, inputs),
        StepAction::Wait => wait(step, context).await,
        StepAction::HttpRequest => http_request(step, inputs, dry_run).await,
        StepAction::Conditional | StepAction::ParallelGroup => Err(ActionError(format!(
            "structural action '{:?}' cannot run as a leaf",
            step.action
        ))),
    }
}

async fn invoke_agent(
    step: &WorkflowStep,
    inputs: &HashMap<String, Value>,
    adapters: &ActionAdapters,
    tenant_id: &str,
) -> Result<Value, ActionError> {
    let agent = step
        .agent
        .as_deref()
        .ok_or_else(|| ActionError(format!("step '{}' has no agent binding", step.id)))?;
    let invoker = adapters
        .agent_invoker
        .as_ref()
        .ok_or_else(|| ActionError("no agent invoker configured".to_string()))?;
    invoker
        .invoke_agent(agent, json!(inputs), tenant_id)
        .await
        .map_err(ActionError)
}

async fn run_command(
    step: &WorkflowStep,
    adapters: &ActionAdapters,
    dry_run: bool,
) -> Result<Value, ActionError> {
    let command_line = step
        .command
        .as_deref()
        .ok_or_else(|| ActionError(format!("step '{}' has no command", step.id)))?;
    if dry_run {
        info!(step = %step.id, command = command_line, "dry_run_command");
        return Ok(json!({"dry_run": true, "command": command_line}));
    }

    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| ActionError("empty command".to_string()))?;
    let contract = ExecutionContract {
        tool_id: "run-command".to_string(),
        adapter_id: None,
        inputs: ExecutionInputs {
            command: program.to_string(),
            arguments: parts.map(str::to_string).collect(),
            ..ExecutionInputs::default()
        },
        sandbox: step.timeout_seconds.map(|s| SandboxSpec {
            timeout_ms: s * 1000,
        }),
    };
    dispatch_contract(&contract, adapters).await
}

async fn execute_code(
    step: &WorkflowStep,
    inputs: &HashMap<String, Value>,
    adapters: &ActionAdapters,
    dry_run: bool,
) -> Result<Value, ActionError> {
    let tool_id = step
        .tool_id
        .as_deref()
        .ok_or_else(|| ActionError(format!("step '{}' has no tool_id", step.id)))?;
    if dry_run {
        return Ok(json!({"dry_run": true, "tool_id": tool_id}));
    }

    let command = inputs
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError("execute-code requires a 'command' input".to_string()))?;
    let arguments = inputs
        .get("arguments")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let sandbox = step
        .sandbox
        .as_ref()
        .and_then(|s| s.get("timeout_ms"))
        .and_then(Value::as_u64)
        .map(|timeout_ms| SandboxSpec { timeout_ms });

    let contract = ExecutionContract {
        tool_id: tool_id.to_string(),
        adapter_id: step.adapter_id.clone(),
        inputs: ExecutionInputs {
            command: command.to_string(),
            arguments,
            ..ExecutionInputs::default()
        },
        sandbox,
    };
    dispatch_contract(&contract, adapters).await
}

async fn dispatch_contract(
    contract: &ExecutionContract,
    adapters: &ActionAdapters,
) -> Result<Value, ActionError> {
    let executor = adapters
        .executor
        .as_ref()
        .ok_or_else(|| ActionError("no code executor configured".to_string()))?;
    let result = executor
        .execute(contract)
        .await
        .map_err(|e| ActionError(e.to_string()))?;
    if !result.success {
        return Err(ActionError(format!(
            "command exited with code {:?}: {}",
            result.exit_code,
            result.stderr.trim()
        )));
    }
    Ok(json!({
        "exit_code": result.exit_code,
        "stdout": result.stdout,
        "stderr": result.stderr,
        "duration_ms": result.duration_ms,
        "truncated": result.truncated,
    }))
}

fn validate(step: &WorkflowStep, inputs: &HashMap<String, Value>) -> Result<Value, ActionError> {
    let required: Vec<&str> = step
        .inputs
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let missing: Vec<&str> = required
        .iter()
        .filter(|key| !inputs.contains_key(**key))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ActionError(format!(
            "validation failed, missing inputs: {}",
            missing.join(", ")
        )));
    }
    Ok(json!({"valid": true, "checked": required.len()}))
}

fn transform(step: &WorkflowStep, inputs: &HashMap<String, Value>) -> Result<Value, ActionError> {
    let mapping = step
        .inputs
        .get("mapping")
        .and_then(Value::as_object)
        .ok_or_else(|| ActionError("transform requires a 'mapping' object".to_string()))?;

    let mut output = serde_json::Map::new();
    for (target, source) in mapping {
        let source_key = source
            .as_str()
            .ok_or_else(|| ActionError(format!("mapping for '{target}' is not a string")))?;
        if let Some(value) = inputs.get(source_key) {
            output.insert(target.clone(), value.clone());
        }
    }
    Ok(Value::Object(output))
}

async fn wait(step: &WorkflowStep, context: &SharedContext) -> Result<Value, ActionError> {
    if let Some(seconds) = step.duration_seconds {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        return Ok(json!({"waited_seconds": seconds}));
    }

    let Some(condition_key) = step.wait_condition.as_deref() else {
        return Err(ActionError(
            "wait requires duration_seconds or wait_condition".to_string(),
        ));
    };

    // Poll the shared context until the key is truthy; the per-step
    // timeout above this call bounds the loop.
    loop {
        {
            let ctx = context.lock().await;
            if ctx.get(condition_key).is_some_and(is_truthy) {
                return Ok(json!({"condition": condition_key, "satisfied": true}));
            }
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL).await;
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Evaluate a conditional step's expression against its merged inputs.
///
/// Supported forms: `key` (truthiness), `key == literal`, `key != literal`.
#[must_use]
pub fn eval_condition(condition: &str, inputs: &HashMap<String, Value>) -> bool {
    if let Some((key, expected)) = condition.split_once("==") {
        return compare(inputs.get(key.trim()), expected.trim());
    }
    if let Some((key, expected)) = condition.split_once("!=") {
        return !compare(inputs.get(key.trim()), expected.trim());
    }
    inputs.get(condition.trim()).is_some_and(is_truthy)
}

fn compare(value: Option<&Value>, expected: &str) -> bool {
    let Some(value) = value else { return false };
    let expected = expected.trim_matches(|c| c == '"' || c == '\'');
    match value {
        Value::String(s) => s == expected,
        Value::Bool(b) => expected.parse::<bool>().is_ok_and(|e| e == *b),
        Value::Number(n) => expected.parse::<f64>().is_ok_and(|e| {
            n.as_f64().is_some_and(|v| (v - e).abs() < f64::EPSILON)
        }),
        _ => false,
    }
}

// ── SSRF guard ───────────────────────────────────────────────────────

fn is_private_ip(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Reject URLs that target private, loopback, or link-local addresses.
/// Checked synchronously before any socket is opened.
pub fn check_url_allowed(raw: &str) -> Result<Url, ActionError> {
    let url = Url::parse(raw).map_err(|e| ActionError(format!("invalid url '{raw}': {e}")))?;
    let Some(host) = url.host_str() else {
        return Err(ActionError(format!("url '{raw}' has no host")));
    };

    if host.eq_ignore_ascii_case("localhost") || host.eq_ignore_ascii_case("localhost.") {
        return Err(ActionError(format!(
            "requests to private/reserved addresses are blocked ({raw})"
        )));
    }
    if let Ok(addr) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>()
        && is_private_ip(addr)
    {
        return Err(ActionError(format!(
            "requests to private/reserved addresses are blocked ({raw})"
        )));
    }
    Ok(url)
}

/// Resolve request headers: the step's own `headers` field, falling back to
/// an `inputs["headers"]` object (string values only), mirroring the `url`
/// fallback.
fn collect_headers(
    step: &WorkflowStep,
    inputs: &HashMap<String, Value>,
) -> HashMap<String, String> {
    if let Some(headers) = &step.headers {
        return headers.clone();
    }
    inputs
        .get("headers")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| {
                    value.as_str().map(|v| (key.clone(), v.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn http_request(
    step: &WorkflowStep,
    inputs: &HashMap<String, Value>,
    dry_run: bool,
) -> Result<Value, ActionError> {
    let raw_url = step
        .url
        .as_deref()
        .or_else(|| inputs.get("url").and_then(Value::as_str))
        .ok_or_else(|| ActionError("http-request requires a 'url' field".to_string()))?;

    let url = check_url_allowed(raw_url)?;
    let method = step.method.as_deref().unwrap_or("GET").to_uppercase();
    let headers = collect_headers(step, inputs);

    debug!(step = %step.id, %url, %method, dry_run, "http_request");
    if dry_run {
        return Ok(json!({"dry_run": true, "url": url.as_str(), "method": method}));
    }

    let timeout = step
        .timeout_seconds
        .map_or(DEFAULT_HTTP_TIMEOUT, Duration::from_secs);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ActionError(format!("http client: {e}")))?;

    let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|e| ActionError(format!("invalid method: {e}")))?;
    let mut builder = client.request(method, url);
    for (key, value) in &headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some(body) = inputs.get("body") {
        builder = builder.json(body);
    }

    let response = builder
        .send()
        .await
        .map_err(|e| ActionError(format!("http request failed: {e}")))?;
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| ActionError(format!("http body read failed: {e}")))?;
    let parsed: Option<Value> = serde_json::from_str(&body).ok();

    Ok(json!({
        "status_code": status,
        "body": body,
        "json": parsed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::StaticExecutor;

    fn shared() -> SharedContext {
        Arc::new(tokio::sync::Mutex::new(HashMap::new()))
    }

    #[test]
    fn ssrf_guard_blocks_private_ranges() {
        for url in [
            "http://169.254.169.254/metadata",
            "http://127.0.0.1/x",
            "http://10.1.2.3/",
            "http://192.168.1.1/admin",
            "http://172.16.0.1/",
            "http://localhost/secret",
            "http://[::1]/v6",
        ] {
            assert!(check_url_allowed(url).is_err(), "{url} should be blocked");
        }
    }

    #[test]
    fn ssrf_guard_allows_public_hosts() {
        assert!(check_url_allowed("https://example.com/api").is_ok());
        assert!(check_url_allowed("https://93.184.216.34/").is_ok());
    }

    #[test]
    fn step_headers_win_over_input_headers() {
        let mut step = WorkflowStep::new("notify", StepAction::HttpRequest);
        step.headers = Some(HashMap::from([(
            "authorization".to_string(),
            "Bearer step-token".to_string(),
        )]));
        let mut inputs = HashMap::new();
        inputs.insert(
            "headers".to_string(),
            json!({"authorization": "Bearer input-token", "x-trace": "abc"}),
        );

        let headers = collect_headers(&step, &inputs);
        assert_eq!(headers["authorization"], "Bearer step-token");
        assert_eq!(headers.len(), 1);

        // Without step headers, the inputs object is used; non-string
        // values are dropped.
        step.headers = None;
        inputs.insert("headers".to_string(), json!({"x-trace": "abc", "bad": 42}));
        let headers = collect_headers(&step, &inputs);
        assert_eq!(headers["x-trace"], "abc");
        assert!(!headers.contains_key("bad"));
    }

    #[tokio::test]
    async fn ssrf_failure_is_synchronous_even_without_network() {
        let step = {
            let mut s = WorkflowStep::new("probe", StepAction::HttpRequest);
            s.url = Some("http://169.254.169.254/metadata".into());
            s
        };
        let err = http_request(&step, &HashMap::new(), false).await.unwrap_err();
        assert!(err.0.contains("blocked"));
    }

    #[tokio::test]
    async fn run_command_uses_executor() {
        let adapters = ActionAdapters {
            executor: Some(Arc::new(
                StaticExecutor::new().with_result("make", StaticExecutor::success("built ok")),
            )),
            ..ActionAdapters::default()
        };
        let step = WorkflowStep::new("build", StepAction::RunCommand).with_command("make all");
        let output = run_leaf_action(&step, &HashMap::new(), &adapters, &shared(), "", false)
            .await
            .unwrap();
        assert_eq!(output["stdout"], "built ok");
        assert_eq!(output["exit_code"], 0);
    }

    #[tokio::test]
    async fn failed_command_is_an_error() {
        let adapters = ActionAdapters {
            executor: Some(Arc::new(
                StaticExecutor::new().with_result("make", StaticExecutor::failure(2, "no rule")),
            )),
            ..ActionAdapters::default()
        };
        let step = WorkflowStep::new("build", StepAction::RunCommand).with_command("make");
        let err = run_leaf_action(&step, &HashMap::new(), &adapters, &shared(), "", false)
            .await
            .unwrap_err();
        assert!(err.0.contains("no rule"));
    }

    #[tokio::test]
    async fn validate_reports_missing_keys() {
        let step = WorkflowStep::new("check", StepAction::Validate)
            .with_input("required", json!(["alpha", "beta"]));
        let mut inputs = HashMap::new();
        inputs.insert("alpha".to_string(), json!(1));
        let err = run_leaf_action(&step, &inputs, &ActionAdapters::default(), &shared(), "", false)
            .await
            .unwrap_err();
        assert!(err.0.contains("beta"));

        inputs.insert("beta".to_string(), json!(2));
        let ok = run_leaf_action(&step, &inputs, &ActionAdapters::default(), &shared(), "", false)
            .await
            .unwrap();
        assert_eq!(ok["valid"], true);
    }

    #[tokio::test]
    async fn transform_picks_and_renames() {
        let step = WorkflowStep::new("reshape", StepAction::Transform)
            .with_input("mapping", json!({"out": "raw", "copy": "raw"}));
        let mut inputs = HashMap::new();
        inputs.insert("raw".to_string(), json!("payload"));
        let output =
            run_leaf_action(&step, &inputs, &ActionAdapters::default(), &shared(), "", false)
                .await
                .unwrap();
        assert_eq!(output["out"], "payload");
        assert_eq!(output["copy"], "payload");
    }

    #[tokio::test]
    async fn wait_condition_polls_shared_context() {
        let context = shared();
        let mut step = WorkflowStep::new("hold", StepAction::Wait);
        step.wait_condition = Some("ready".into());

        let writer = Arc::clone(&context);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            writer.lock().await.insert("ready".to_string(), json!(true));
        });

        let output = wait(&step, &context).await.unwrap();
        assert_eq!(output["satisfied"], true);
        handle.await.unwrap();
    }

    #[test]
    fn condition_expressions() {
        let mut inputs = HashMap::new();
        inputs.insert("status".to_string(), json!("green"));
        inputs.insert("count".to_string(), json!(3));
        inputs.insert("flag".to_string(), json!(false));

        assert!(eval_condition("status == green", &inputs));
        assert!(eval_condition("status == \"green\"", &inputs));
        assert!(!eval_condition("status == red", &inputs));
        assert!(eval_condition("status != red", &inputs));
        assert!(eval_condition("count == 3", &inputs));
        assert!(eval_condition("count", &inputs));
        assert!(!eval_condition("flag", &inputs));
        assert!(!eval_condition("missing", &inputs));
    }

    #[tokio::test]
    async fn dry_run_skips_side_effects() {
        let step = WorkflowStep::new("cmd", StepAction::RunCommand).with_command("rm -rf /");
        let output = run_leaf_action(
            &step,
            &HashMap::new(),
            &ActionAdapters::default(),
            &shared(),
            "",
            true,
        )
        .await
        .unwrap();
        assert_eq!(output["dry_run"], true);
    }
}
