//! Built-in hooks: metrics collection and audit logging.
//!
//! Both are system-level, fail-open, and registered once per event type in
//! the observability priority tier (500+).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::info;

use super::chain::{Hook, HookError, Next};
use super::models::{HookContext, HookDefinition, HookEventType};

/// Records per-event call counts and durations around the downstream chain,
/// exposing them in `context.metadata["hook_metrics"]`.
#[derive(Debug)]
pub struct MetricsHook {
    event: HookEventType,
    call_counts: Mutex<HashMap<String, u64>>,
    total_duration_ms: Mutex<HashMap<String, f64>>,
}

impl MetricsHook {
    /// Metrics hook for one event type.
    #[must_use]
    pub fn new(event: HookEventType) -> Self {
        Self {
            event,
            call_counts: Mutex::new(HashMap::new()),
            total_duration_ms: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of call counts per event.
    #[must_use]
    pub fn call_counts(&self) -> HashMap<String, u64> {
        self.call_counts.lock().expect("metrics lock").clone()
    }
}

#[async_trait]
impl Hook for MetricsHook {
    fn name(&self) -> &str {
        "builtin.metrics"
    }

    fn event_type(&self) -> HookEventType {
        self.event
    }

    fn priority(&self) -> u32 {
        500
    }

    async fn execute(
        &self,
        context: HookContext,
        next: Next<'_>,
    ) -> Result<HookContext, HookError> {
        let started = Instant::now();
        let mut result = next.run(context).await;
        let duration = started.elapsed().as_secs_f64() * 1000.0;

        let event = result.event_type.as_str().to_string();
        let count = {
            let mut counts = self.call_counts.lock().expect("metrics lock");
            let entry = counts.entry(event.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let total = {
            let mut totals = self.total_duration_ms.lock().expect("metrics lock");
            let entry = totals.entry(event.clone()).or_insert(0.0);
            *entry += duration;
            *entry
        };

        let metrics = result
            .metadata
            .entry("hook_metrics".to_string())
            .or_insert_with(|| json!({}));
        if let Some(obj) = metrics.as_object_mut() {
            obj.insert(
                event,
                json!({
                    "call_count": count,
                    "last_duration_ms": (duration * 100.0).round() / 100.0,
                    "total_duration_ms": (total * 100.0).round() / 100.0,
                }),
            );
        }
        Ok(result)
    }
}

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Event type that fired.
    pub event_type: HookEventType,
    /// Tenant of the context.
    pub tenant_id: String,
    /// Context fields relevant to the event (agent, tool, step, request).
    pub fields: HashMap<String, Value>,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

/// Logs every chain invocation with the event type, tenant, and the
/// relevant context fields.
#[derive(Debug)]
pub struct AuditLogHook {
    event: HookEventType,
    entries: Mutex<Vec<AuditEntry>>,
}

const AUDITED_FIELDS: [&str; 6] = ["agent_name", "tool_name", "step_id", "workflow_name", "method", "path"];

impl AuditLogHook {
    /// Audit hook for one event type.
    #[must_use]
    pub fn new(event: HookEventType) -> Self {
        Self {
            event,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the log entries.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit lock").clone()
    }
}

#[async_trait]
impl Hook for AuditLogHook {
    fn name(&self) -> &str {
        "builtin.audit_log"
    }

    fn event_type(&self) -> HookEventType {
        self.event
    }

    fn priority(&self) -> u32 {
        550
    }

    async fn execute(
        &self,
        context: HookContext,
        next: Next<'_>,
    ) -> Result<HookContext, HookError> {
        let mut fields = HashMap::new();
        for key in AUDITED_FIELDS {
            if let Some(value) = context.fields.get(key) {
                fields.insert(key.to_string(), value.clone());
            }
        }
        self.entries.lock().expect("audit lock").push(AuditEntry {
            event_type: context.event_type,
            tenant_id: context.tenant_id.clone(),
            fields,
            timestamp: Utc::now(),
        });
        info!(
            event = %context.event_type,
            tenant = %context.tenant_id,
            "hook_audit"
        );
        Ok(next.run(context).await)
    }
}

/// Build the built-in hook set: one metrics and one audit hook per event
/// type, each paired with its definition.
#[must_use]
pub fn builtin_hooks() -> Vec<(Arc<dyn Hook>, HookDefinition)> {
    let mut hooks: Vec<(Arc<dyn Hook>, HookDefinition)> = Vec::new();

    for event in HookEventType::all() {
        let mut def = HookDefinition::new(format!("builtin.metrics.{event}"), event);
        def.description = "Built-in metrics collection hook".to_string();
        def.priority = 500;
        def.handler_ref = "cadre::hooks::MetricsHook".to_string();
        def.tags = vec!["builtin".to_string(), "observability".to_string()];
        hooks.push((Arc::new(MetricsHook::new(event)), def));
    }

    for event in HookEventType::all() {
        let mut def = HookDefinition::new(format!("builtin.audit_log.{event}"), event);
        def.description = "Built-in audit logging hook".to_string();
        def.priority = 550;
        def.handler_ref = "cadre::hooks::AuditLogHook".to_string();
        def.tags = vec!["builtin".to_string(), "observability".to_string()];
        hooks.push((Arc::new(AuditLogHook::new(event)), def));
    }

    hooks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::chain::{DEFAULT_HOOK_TIMEOUT_MS, HookChainRunner};

    #[tokio::test]
    async fn metrics_hook_records_counts_and_durations() {
        let metrics = Arc::new(MetricsHook::new(HookEventType::ToolExecutePre));
        let runner = HookChainRunner::new(
            vec![Arc::clone(&metrics) as Arc<dyn Hook>],
            DEFAULT_HOOK_TIMEOUT_MS,
        );

        let ctx = HookContext::new(HookEventType::ToolExecutePre, "");
        let result = runner.run(ctx).await;
        let entry = &result.metadata["hook_metrics"]["tool.execute.pre"];
        assert_eq!(entry["call_count"], 1);

        let ctx = HookContext::new(HookEventType::ToolExecutePre, "");
        let result = runner.run(ctx).await;
        let entry = &result.metadata["hook_metrics"]["tool.execute.pre"];
        assert_eq!(entry["call_count"], 2);
        assert!(entry["total_duration_ms"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn audit_hook_captures_relevant_fields() {
        let audit = Arc::new(AuditLogHook::new(HookEventType::ToolExecutePre));
        let runner = HookChainRunner::new(
            vec![Arc::clone(&audit) as Arc<dyn Hook>],
            DEFAULT_HOOK_TIMEOUT_MS,
        );

        let ctx = HookContext::new(HookEventType::ToolExecutePre, "acme")
            .with_field("tool_name", "shell")
            .with_field("irrelevant", "dropped");
        let _ = runner.run(ctx).await;

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tenant_id, "acme");
        assert_eq!(entries[0].fields["tool_name"], "shell");
        assert!(!entries[0].fields.contains_key("irrelevant"));
    }

    #[test]
    fn builtin_set_covers_every_event_twice() {
        let hooks = builtin_hooks();
        assert_eq!(hooks.len(), 16);
        for (hook, def) in &hooks {
            assert_eq!(hook.event_type(), def.event_type);
            assert!(def.validate().is_ok());
        }
    }
}
