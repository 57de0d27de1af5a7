//! Tool governance: permission checks, rate limiting, and audit logging.
//!
//! [`ToolGovernance::pre_execute_check`] evaluates a (subject, tool, args)
//! triple against the caller's scopes, allowlists, and autonomy level, in a
//! fixed order. After execution, [`ToolGovernance::log_execution`] emits a
//! structured audit record.

mod rate_limit;

pub use rate_limit::RateLimiter;

use std::collections::HashMap;
use std::sync::LazyLock;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::agents::AutonomyLevel;
use crate::tools::{ToolContext, ToolResult};

// Command chaining and subshell patterns.
static CHAIN_OPERATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\||&&|[|;&]").expect("valid regex"));
static SUBSHELL_PATTERNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(|`").expect("valid regex"));

/// Tools that perform write/execute operations, blocked in read-only mode.
const WRITE_TOOLS: [&str; 3] = ["shell", "file_ops", "browser"];

/// Subject used for rate limiting when the caller has no scopes.
const ANON_SUBJECT: &str = "__anon__";

/// A governance decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Allow the tool call.
    Allow,
    /// Deny the tool call with a reason.
    Deny(String),
}

impl Decision {
    /// Whether this decision allows the call.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The denial reason, if denied.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny(reason) => Some(reason),
        }
    }
}

/// Structured audit record emitted after every tool execution.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    /// Tool that ran.
    pub tool: String,
    /// Arguments it ran with.
    pub params: Value,
    /// Whether the execution succeeded.
    pub success: bool,
    /// Error message, if any.
    pub error: Option<String>,
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
}

/// Governance configuration.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// Per-subject calls admitted per rolling minute.
    pub rate_limit_per_minute: usize,
    /// Per-subject calls admitted per rolling second.
    pub rate_limit_burst: usize,
    /// Tool name → required scope overrides. Tools not listed require
    /// [`GovernanceConfig::default_scope`].
    pub tool_scope_map: HashMap<String, String>,
    /// Scope required when no override exists.
    pub default_scope: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 60,
            rate_limit_burst: 10,
            tool_scope_map: HashMap::new(),
            default_scope: "tools:execute".to_string(),
        }
    }
}

/// Pre-execution permission checks, autonomy filtering, rate limiting, and
/// post-execution audit logging.
#[derive(Debug)]
pub struct ToolGovernance {
    config: GovernanceConfig,
    rate_limiter: Mutex<RateLimiter>,
    audit_log: Mutex<Vec<AuditRecord>>,
}

impl Default for ToolGovernance {
    fn default() -> Self {
        Self::new(GovernanceConfig::default())
    }
}

impl ToolGovernance {
    /// Create a governance instance with the given configuration.
    #[must_use]
    pub fn new(config: GovernanceConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit_per_minute, config.rate_limit_burst);
        Self {
            config,
            rate_limiter: Mutex::new(limiter),
            audit_log: Mutex::new(Vec::new()),
        }
    }

    /// Decide whether the current context may run the tool.
    ///
    /// Checks, in strict order: rate limit, autonomy filter, scope, shell
    /// command validation, path allowlist, domain allowlist.
    pub fn pre_execute_check(
        &self,
        tool_name: &str,
        params: &Value,
        context: &ToolContext,
        autonomy_level: Option<AutonomyLevel>,
    ) -> Decision {
        // Rate limiting, keyed by the caller's first scope.
        let subject = context
            .user_scopes
            .first()
            .map_or(ANON_SUBJECT, String::as_str);
        if !self
            .rate_limiter
            .lock()
            .expect("rate limiter lock")
            .check(subject)
        {
            warn!(subject, tool = tool_name, "rate_limit_exceeded");
            return Decision::Deny(format!("rate limit exceeded for subject '{subject}'"));
        }

        // Autonomy level enforcement.
        if let Some(level) = autonomy_level {
            if level == AutonomyLevel::ReadOnly && WRITE_TOOLS.contains(&tool_name) {
                warn!(tool = tool_name, "autonomy_denied_read_only");
                return Decision::Deny(format!(
                    "tool '{tool_name}' blocked in read-only mode"
                ));
            }
            if level == AutonomyLevel::Supervised
                && tool_name == "file_ops"
                && params.get("operation").and_then(Value::as_str) == Some("write")
            {
                // Supervised mode flags destructive parameters but allows
                // them; approval gates live above governance.
                info!(tool = tool_name, operation = "write", "supervised_flagged");
            }
        }

        // Scope check.
        let required = self
            .config
            .tool_scope_map
            .get(tool_name)
            .unwrap_or(&self.config.default_scope);
        if !context.user_scopes.iter().any(|s| s == required) {
            warn!(tool = tool_name, scope = %required, "permission_denied");
            return Decision::Deny(format!(
                "missing scope '{required}' for tool '{tool_name}'"
            ));
        }

        // Shell: multi-segment command validation.
        if tool_name == "shell" {
            let command = params.get("command").and_then(Value::as_str).unwrap_or("");
            if let Err(reason) = validate_command(command, &context.command_allowlist) {
                warn!(tool = tool_name, %reason, "command_blocked");
                return Decision::Deny(reason);
            }
        }

        // File ops: path allowlist.
        if tool_name == "file_ops" && !context.path_allowlist.is_empty() {
            let path = params.get("path").and_then(Value::as_str).unwrap_or("");
            if !context
                .path_allowlist
                .iter()
                .any(|allowed| path.starts_with(allowed))
            {
                warn!(path, "path_not_in_allowlist");
                return Decision::Deny(format!("path '{path}' not in allowlist"));
            }
        }

        // Web fetch: domain allowlist.
        if tool_name == "web_fetch" && !context.domain_allowlist.is_empty() {
            let raw = params.get("url").and_then(Value::as_str).unwrap_or("");
            let domain = Url::parse(raw)
                .ok()
                .and_then(|u| u.host_str().map(str::to_lowercase))
                .unwrap_or_default();
            let allowed = context.domain_allowlist.iter().any(|entry| {
                let entry = entry.to_lowercase();
                domain == entry || domain.ends_with(&format!(".{entry}"))
            });
            if !allowed {
                warn!(%domain, "domain_not_in_allowlist");
                return Decision::Deny(format!("domain '{domain}' not in allowlist"));
            }
        }

        Decision::Allow
    }

    /// Write a structured audit record for a completed tool execution.
    pub fn log_execution(&self, tool_name: &str, params: &Value, result: &ToolResult) {
        let record = AuditRecord {
            tool: tool_name.to_string(),
            params: params.clone(),
            success: result.success,
            error: result.error.clone(),
            timestamp: Utc::now(),
        };
        info!(
            tool = tool_name,
            success = record.success,
            error = record.error.as_deref().unwrap_or(""),
            "tool_execution"
        );
        self.audit_log.lock().expect("audit log lock").push(record);
    }

    /// Snapshot of the audit log, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit_log.lock().expect("audit log lock").clone()
    }
}

/// Validate a shell command: reject subshells, then check every segment's
/// executable against the allowlist (when one is configured).
fn validate_command(command: &str, allowlist: &[String]) -> Result<(), String> {
    if command.is_empty() {
        return Ok(());
    }

    if SUBSHELL_PATTERNS.is_match(command) {
        return Err("subshell patterns are not allowed".to_string());
    }

    if allowlist.is_empty() {
        // No allowlist configured; governance is opt-in per agent.
        return Ok(());
    }

    for segment in CHAIN_OPERATORS.split(command) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let executable = segment.split_whitespace().next().unwrap_or("");
        if !executable.is_empty() && !allowlist.iter().any(|a| a == executable) {
            return Err(format!("command '{executable}' not in allowlist"));
        }
    }

    Ok(())
}
