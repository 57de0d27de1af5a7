//! Autonomy budget data model.
//!
//! A budget is a declarative, approvable envelope of scopes, limits, stop
//! conditions, and escalation paths. An [`EnforcementContext`] tracks live
//! consumption against an active budget.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::new_id;

/// Lifecycle states for an autonomy budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetState {
    /// Being drafted.
    Draft,
    /// Awaiting approval.
    PendingApproval,
    /// Approved and enforceable.
    Active,
    /// Temporarily paused.
    Suspended,
    /// Past its expiry. Terminal.
    Expired,
    /// Work finished. Terminal.
    Completed,
    /// Approval denied; may re-enter draft.
    Rejected,
}

impl BudgetState {
    /// Whether the state accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Completed)
    }

    /// States reachable from this one.
    #[must_use]
    pub const fn valid_targets(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::PendingApproval, Self::Active],
            Self::PendingApproval => &[Self::Active, Self::Rejected],
            Self::Active => &[Self::Suspended, Self::Expired, Self::Completed],
            Self::Suspended => &[Self::Active, Self::Expired],
            Self::Rejected => &[Self::Draft],
            Self::Expired | Self::Completed => &[],
        }
    }
}

/// Action to take when a stop condition triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAction {
    /// Mark the context stopped and abort.
    #[default]
    Stop,
    /// Record an escalation and abort.
    Escalate,
    /// Record a warning and continue.
    Warn,
}

/// Urgency for escalation triggers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationUrgency {
    /// Page someone now.
    Immediate,
    /// Normal queue.
    #[default]
    Normal,
    /// Best effort.
    Low,
}

/// Status of a preflight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightStatus {
    /// Check passed.
    Pass,
    /// Advisory issue.
    Warn,
    /// Blocking issue.
    Fail,
}

/// File access scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileScope {
    /// Readable glob patterns.
    #[serde(default)]
    pub read: Vec<String>,
    /// Writable glob patterns.
    #[serde(default)]
    pub write: Vec<String>,
    /// Denied glob patterns, checked before read/write.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl FileScope {
    /// Whether `path` matches any pattern in `patterns`.
    fn matches_any(path: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| {
            glob::Pattern::new(p)
                .map(|pat| pat.matches(path))
                .unwrap_or(false)
        })
    }

    /// Whether `path` may be written under this scope.
    #[must_use]
    pub fn allows_write(&self, path: &str) -> bool {
        !Self::matches_any(path, &self.deny) && Self::matches_any(path, &self.write)
    }

    /// Whether `path` may be read under this scope.
    #[must_use]
    pub fn allows_read(&self, path: &str) -> bool {
        !Self::matches_any(path, &self.deny)
            && (Self::matches_any(path, &self.read) || Self::matches_any(path, &self.write))
    }
}

/// A single command permission entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPermission {
    /// Allowed executable.
    pub command: String,
    /// Optional regex the full argument string must match.
    #[serde(default)]
    pub args_pattern: String,
    /// Per-command call cap; 0 means unlimited.
    #[serde(default)]
    pub max_calls: u32,
}

/// Network access scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkScope {
    /// Whether network access is allowed at all.
    #[serde(default)]
    pub enabled: bool,
    /// Allowed domains.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Denied domains.
    #[serde(default)]
    pub denied_domains: Vec<String>,
    /// Request cap; 0 means unlimited.
    #[serde(default)]
    pub max_requests: u32,
}

/// Resource consumption limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Loop iteration cap.
    pub max_iterations: u32,
    /// Wall-clock cap in minutes.
    pub max_duration_minutes: u32,
    /// Files-modified cap.
    pub max_files_modified: u32,
    /// Lines-changed cap.
    pub max_lines_changed: u32,
    /// Tool-call cap.
    pub max_tool_calls: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_duration_minutes: 60,
            max_files_modified: 50,
            max_lines_changed: 5000,
            max_tool_calls: 200,
        }
    }
}

/// A stop condition with its action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopCondition {
    /// What the condition covers.
    pub description: String,
    /// Action when triggered.
    #[serde(default)]
    pub action: StopAction,
}

/// An escalation trigger with target and urgency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTrigger {
    /// What triggers the escalation.
    pub description: String,
    /// Who gets notified.
    #[serde(default = "default_escalation_target")]
    pub target: String,
    /// How urgent.
    #[serde(default)]
    pub urgency: EscalationUrgency,
}

fn default_escalation_target() -> String {
    "orchestrator".to_string()
}

/// Full autonomy budget for a task or agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyBudget {
    /// Opaque stable budget ID.
    pub budget_id: String,
    /// Task the budget is scoped to.
    pub task_id: String,
    /// Agent the budget is scoped to.
    pub agent_id: String,
    /// Current lifecycle state.
    pub state: BudgetState,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// Who approved the activation.
    pub approved_by: String,
    /// In-scope items.
    pub in_scope: Vec<String>,
    /// Out-of-scope items.
    pub out_of_scope: Vec<String>,
    /// File scope.
    pub files: FileScope,
    /// Allowed commands.
    pub allowed_commands: Vec<CommandPermission>,
    /// Denied commands.
    pub denied_commands: Vec<String>,
    /// Commands that always require approval.
    pub require_approval_commands: Vec<String>,
    /// Network scope.
    pub network: NetworkScope,
    /// Resource limits.
    pub limits: ResourceLimits,
    /// Stop conditions, checked in order.
    pub stop_conditions: Vec<StopCondition>,
    /// Escalation triggers.
    pub escalation_triggers: Vec<EscalationTrigger>,
    /// Fallback escalation target.
    pub default_escalation_target: String,
}

impl AutonomyBudget {
    /// New budget in `Draft` state.
    #[must_use]
    pub fn new(task_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            budget_id: new_id("BDG"),
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            state: BudgetState::Draft,
            created_at: Utc::now(),
            expires_at: None,
            approved_by: String::new(),
            in_scope: Vec::new(),
            out_of_scope: Vec::new(),
            files: FileScope::default(),
            allowed_commands: Vec::new(),
            denied_commands: Vec::new(),
            require_approval_commands: Vec::new(),
            network: NetworkScope::default(),
            limits: ResourceLimits::default(),
            stop_conditions: Vec::new(),
            escalation_triggers: Vec::new(),
            default_escalation_target: default_escalation_target(),
        }
    }

    /// Whether the budget's expiry has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at < Utc::now())
    }
}

/// Live consumption counters for an active budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementContext {
    /// Budget being enforced.
    pub budget_id: String,
    /// When enforcement started.
    pub started_at: DateTime<Utc>,
    /// Loop iterations consumed.
    pub iterations: u32,
    /// Tool calls consumed.
    pub tool_calls: u32,
    /// Files modified so far.
    pub files_modified: u32,
    /// Lines changed so far.
    pub lines_changed: u32,
    /// Network requests made.
    pub network_requests: u32,
    /// Accumulated warnings.
    pub warnings: Vec<String>,
    /// Accumulated violations.
    pub violations: Vec<String>,
    /// Whether execution has been stopped.
    pub stopped: bool,
    /// Why execution was stopped.
    pub stop_reason: String,
}

impl EnforcementContext {
    /// New context for a budget, starting now.
    #[must_use]
    pub fn new(budget_id: impl Into<String>) -> Self {
        Self {
            budget_id: budget_id.into(),
            started_at: Utc::now(),
            iterations: 0,
            tool_calls: 0,
            files_modified: 0,
            lines_changed: 0,
            network_requests: 0,
            warnings: Vec::new(),
            violations: Vec::new(),
            stopped: false,
            stop_reason: String::new(),
        }
    }

    /// Record one loop iteration.
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    /// Record one tool call.
    pub fn record_tool_call(&mut self) {
        self.tool_calls += 1;
    }

    /// Record a file modification touching `lines` lines.
    pub fn record_file_modified(&mut self, lines: u32) {
        self.files_modified += 1;
        self.lines_changed += lines;
    }

    /// Record a network request.
    pub fn record_network_request(&mut self) {
        self.network_requests += 1;
    }

    /// Minutes elapsed since enforcement started.
    #[must_use]
    pub fn elapsed_minutes(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 60_000.0
    }

    /// Mark the context stopped.
    pub fn mark_stopped(&mut self, reason: impl Into<String>) {
        self.stopped = true;
        self.stop_reason = reason.into();
    }
}

/// Record of a triggered escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// Opaque stable ID.
    pub escalation_id: String,
    /// Budget that triggered.
    pub budget_id: String,
    /// Trigger description.
    pub trigger_description: String,
    /// Notified target.
    pub target: String,
    /// Urgency.
    pub urgency: EscalationUrgency,
    /// Created timestamp.
    pub created_at: DateTime<Utc>,
    /// Whether someone has acknowledged it.
    pub acknowledged: bool,
    /// Whether it has been resolved.
    pub resolved: bool,
}

impl EscalationRecord {
    /// New unacknowledged escalation.
    #[must_use]
    pub fn new(
        budget_id: impl Into<String>,
        trigger_description: impl Into<String>,
        target: impl Into<String>,
        urgency: EscalationUrgency,
    ) -> Self {
        Self {
            escalation_id: new_id("ESC"),
            budget_id: budget_id.into(),
            trigger_description: trigger_description.into(),
            target: target.into(),
            urgency,
            created_at: Utc::now(),
            acknowledged: false,
            resolved: false,
        }
    }
}
