//! Hook framework data model: event types, contexts, results, and
//! persistent definitions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::new_id;

/// The eight supported hook event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventType {
    /// Before an agent invocation.
    #[serde(rename = "agent.invoke.pre")]
    AgentInvokePre,
    /// After an agent invocation.
    #[serde(rename = "agent.invoke.post")]
    AgentInvokePost,
    /// Before a tool execution.
    #[serde(rename = "tool.execute.pre")]
    ToolExecutePre,
    /// After a tool execution.
    #[serde(rename = "tool.execute.post")]
    ToolExecutePost,
    /// Before a workflow step.
    #[serde(rename = "workflow.step.pre")]
    WorkflowStepPre,
    /// After a workflow step.
    #[serde(rename = "workflow.step.post")]
    WorkflowStepPost,
    /// Before an inbound request reaches its handler.
    #[serde(rename = "request.pre")]
    RequestPre,
    /// After the handler produced a response.
    #[serde(rename = "request.post")]
    RequestPost,
}

impl HookEventType {
    /// Dotted string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AgentInvokePre => "agent.invoke.pre",
            Self::AgentInvokePost => "agent.invoke.post",
            Self::ToolExecutePre => "tool.execute.pre",
            Self::ToolExecutePost => "tool.execute.post",
            Self::WorkflowStepPre => "workflow.step.pre",
            Self::WorkflowStepPost => "workflow.step.post",
            Self::RequestPre => "request.pre",
            Self::RequestPost => "request.post",
        }
    }

    /// All eight event types.
    #[must_use]
    pub const fn all() -> [Self; 8] {
        [
            Self::AgentInvokePre,
            Self::AgentInvokePost,
            Self::ToolExecutePre,
            Self::ToolExecutePost,
            Self::WorkflowStepPre,
            Self::WorkflowStepPost,
            Self::RequestPre,
            Self::RequestPost,
        ]
    }
}

impl std::fmt::Display for HookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure policy for a hook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Skip the failed hook and continue the chain.
    #[default]
    Open,
    /// Abort the chain when this hook fails.
    Closed,
}

/// Result of a single hook execution within a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    /// Name of the hook that ran.
    pub hook_name: String,
    /// Whether it completed without error.
    pub success: bool,
    /// Error text when it failed.
    pub error: String,
    /// Duration in milliseconds.
    pub duration_ms: f64,
}

impl HookResult {
    /// Successful result.
    #[must_use]
    pub fn ok(hook_name: &str, duration_ms: f64) -> Self {
        Self {
            hook_name: hook_name.to_string(),
            success: true,
            error: String::new(),
            duration_ms: (duration_ms * 100.0).round() / 100.0,
        }
    }

    /// Failed result with an error.
    #[must_use]
    pub fn failed(hook_name: &str, error: &str, duration_ms: f64) -> Self {
        Self {
            hook_name: hook_name.to_string(),
            success: false,
            error: error.to_string(),
            duration_ms: (duration_ms * 100.0).round() / 100.0,
        }
    }
}

/// Context passed through a hook chain.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Event the chain is running for.
    pub event_type: HookEventType,
    /// Tenant the event belongs to ("" = system).
    pub tenant_id: String,
    /// Event payload fields (agent name, tool name, method, path, …).
    pub fields: HashMap<String, Value>,
    /// Scratch space hooks may write into.
    pub metadata: HashMap<String, Value>,
    /// Abort flag; when set, remaining hooks are skipped.
    pub abort: bool,
    /// Why the chain was aborted.
    pub abort_reason: String,
    /// Per-hook results, one entry per attempted hook.
    pub results: Vec<HookResult>,
}

impl HookContext {
    /// Empty context for an event.
    #[must_use]
    pub fn new(event_type: HookEventType, tenant_id: impl Into<String>) -> Self {
        Self {
            event_type,
            tenant_id: tenant_id.into(),
            fields: HashMap::new(),
            metadata: HashMap::new(),
            abort: false,
            abort_reason: String::new(),
            results: Vec::new(),
        }
    }

    /// Attach a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Read a payload field as a string.
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set the abort flag with a reason.
    pub fn abort_with(&mut self, reason: impl Into<String>) {
        self.abort = true;
        self.abort_reason = reason.into();
    }
}

/// Aggregated result of running a full hook chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookChainResult {
    /// Event the chain ran for.
    pub event_type: HookEventType,
    /// Per-hook results.
    pub hook_results: Vec<HookResult>,
    /// Whether the chain aborted.
    pub aborted: bool,
    /// Abort reason, if any.
    pub abort_reason: String,
    /// Sum of per-hook durations.
    pub total_duration_ms: f64,
}

impl HookChainResult {
    /// Build a summary from a completed context.
    #[must_use]
    pub fn from_context(context: &HookContext) -> Self {
        let total: f64 = context.results.iter().map(|r| r.duration_ms).sum();
        Self {
            event_type: context.event_type,
            hook_results: context.results.clone(),
            aborted: context.abort,
            abort_reason: context.abort_reason.clone(),
            total_duration_ms: (total * 100.0).round() / 100.0,
        }
    }

    /// Whether every attempted hook succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.hook_results.iter().all(|r| r.success)
    }

    /// Number of attempted hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hook_results.len()
    }
}

/// Persistent hook configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDefinition {
    /// Opaque stable ID.
    pub hook_id: String,
    /// Hook name (unique per registration).
    pub name: String,
    /// What the hook does.
    #[serde(default)]
    pub description: String,
    /// Event the hook is attached to.
    pub event_type: HookEventType,
    /// Priority 0..=1000; lower runs first.
    pub priority: u32,
    /// Opaque handler reference for the management surface.
    pub handler_ref: String,
    /// Per-hook timeout in milliseconds, 0 < t <= 5000.
    pub timeout_ms: u64,
    /// Whether the hook is active.
    pub enabled: bool,
    /// Tenant scope; "" means system-wide.
    #[serde(default)]
    pub tenant_id: String,
    /// Failure policy.
    #[serde(default)]
    pub fail_mode: FailMode,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
}

impl HookDefinition {
    /// New definition with defaults (priority 100, timeout 200 ms, enabled,
    /// system-wide, fail-open).
    #[must_use]
    pub fn new(name: impl Into<String>, event_type: HookEventType) -> Self {
        Self {
            hook_id: new_id("HK"),
            name: name.into(),
            description: String::new(),
            event_type,
            priority: 100,
            handler_ref: String::new(),
            timeout_ms: 200,
            enabled: true,
            tenant_id: String::new(),
            fail_mode: FailMode::Open,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Check the priority and timeout ranges.
    pub fn validate(&self) -> Result<(), String> {
        if self.priority > 1000 {
            return Err(format!("priority {} outside 0..=1000", self.priority));
        }
        if self.timeout_ms == 0 || self.timeout_ms > 5000 {
            return Err(format!("timeout_ms {} outside 1..=5000", self.timeout_ms));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_round_trip_serde() {
        for event in HookEventType::all() {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
            let back: HookEventType = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn definition_validation_enforces_ranges() {
        let mut def = HookDefinition::new("h", HookEventType::RequestPre);
        assert!(def.validate().is_ok());
        def.priority = 1001;
        assert!(def.validate().is_err());
        def.priority = 0;
        def.timeout_ms = 0;
        assert!(def.validate().is_err());
        def.timeout_ms = 5001;
        assert!(def.validate().is_err());
    }

    #[test]
    fn chain_result_summarises_context() {
        let mut ctx = HookContext::new(HookEventType::ToolExecutePre, "acme");
        ctx.results.push(HookResult::ok("a", 1.5));
        ctx.results.push(HookResult::failed("b", "boom", 2.5));
        let summary = HookChainResult::from_context(&ctx);
        assert_eq!(summary.hook_count(), 2);
        assert!(!summary.all_succeeded());
        assert!((summary.total_duration_ms - 4.0).abs() < 1e-9);
    }
}
