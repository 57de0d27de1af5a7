//! Hook pipeline: ordered middleware around agent invocations, tool
//! executions, workflow steps, and inbound requests.
//!
//! Hooks run sequentially (middleware chain with abort propagation) or
//! concurrently (independent post-processing), always with per-hook timeout
//! isolation. Failure policy is per-hook: fail-open hooks are skipped,
//! fail-closed hooks abort the chain.

mod builtins;
mod chain;
mod middleware;
mod models;
mod registry;

pub use builtins::{AuditEntry, AuditLogHook, MetricsHook, builtin_hooks};
pub use chain::{
    ConcurrentHookRunner, DEFAULT_HOOK_TIMEOUT_MS, Hook, HookChainRunner, HookError, Next,
};
pub use middleware::{RequestInfo, RequestOutcome, dispatch_request};
pub use models::{
    FailMode, HookChainResult, HookContext, HookDefinition, HookEventType, HookResult,
};
pub use registry::{HookRegistry, MAX_HOOKS_PER_EVENT};
