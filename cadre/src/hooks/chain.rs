//! Hook chain runners: sequential middleware chain and concurrent fan-out.
//!
//! The sequential runner builds an inside-out middleware chain: each enabled
//! hook wraps its downstream as a [`Next`] delegate and runs under a per-hook
//! deadline. Failures are isolated per the hook's fail-mode: fail-open skips
//! the hook and resumes the chain, fail-closed aborts it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::models::{FailMode, HookContext, HookEventType, HookResult};

/// Default per-hook deadline when a hook declares none.
pub const DEFAULT_HOOK_TIMEOUT_MS: u64 = 500;

/// Errors a hook may return from [`Hook::execute`].
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The hook failed.
    #[error("{0}")]
    Failed(String),
    /// Too many hooks registered for one event type.
    #[error("max hooks ({limit}) reached for event type '{event}'")]
    LimitExceeded {
        /// Event type that is full.
        event: String,
        /// The per-event cap.
        limit: usize,
    },
    /// A definition failed validation.
    #[error("invalid hook definition: {0}")]
    InvalidDefinition(String),
}

/// An ordered middleware around a lifecycle event.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Unique hook name.
    fn name(&self) -> &str;

    /// Event the hook is attached to.
    fn event_type(&self) -> HookEventType;

    /// Priority 0..=1000; lower runs first.
    fn priority(&self) -> u32 {
        100
    }

    /// Whether the hook participates in chains.
    fn enabled(&self) -> bool {
        true
    }

    /// Tenant scope; "" means system-wide.
    fn tenant_id(&self) -> &str {
        ""
    }

    /// Failure policy.
    fn fail_mode(&self) -> FailMode {
        FailMode::Open
    }

    /// Per-hook deadline override in milliseconds.
    fn timeout_ms(&self) -> Option<u64> {
        None
    }

    /// Run the hook. Call `next.run(context)` to delegate downstream;
    /// returning without delegating short-circuits the rest of the chain.
    async fn execute(&self, context: HookContext, next: Next<'_>) -> Result<HookContext, HookError>;
}

type ChainFuture<'a> = Pin<Box<dyn Future<Output = HookContext> + Send + 'a>>;

/// Delegate handed to each hook for invoking its downstream chain.
pub struct Next<'a> {
    runner: Option<(&'a HookChainRunner, usize)>,
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("chained", &self.runner.is_some())
            .finish()
    }
}

impl<'a> Next<'a> {
    const fn chained(runner: &'a HookChainRunner, index: usize) -> Self {
        Self {
            runner: Some((runner, index)),
        }
    }

    /// A delegate that returns the context unchanged. Used by the concurrent
    /// runner, where there is no chaining.
    #[must_use]
    pub const fn noop() -> Next<'static> {
        Next { runner: None }
    }

    /// Invoke the downstream chain.
    pub async fn run(self, context: HookContext) -> HookContext {
        match self.runner {
            Some((runner, index)) => runner.run_from(index, context).await,
            None => context,
        }
    }
}

/// Sequential middleware chain with priority ordering and failure isolation.
pub struct HookChainRunner {
    hooks: Vec<Arc<dyn Hook>>,
    default_timeout_ms: u64,
}

impl std::fmt::Debug for HookChainRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("HookChainRunner")
            .field("hooks", &names)
            .field("default_timeout_ms", &self.default_timeout_ms)
            .finish()
    }
}

impl HookChainRunner {
    /// Build a runner over the given hooks, sorted by ascending priority.
    #[must_use]
    pub fn new(mut hooks: Vec<Arc<dyn Hook>>, default_timeout_ms: u64) -> Self {
        hooks.sort_by_key(|h| h.priority());
        Self {
            hooks,
            default_timeout_ms,
        }
    }

    /// Execute the chain and return the (possibly modified) context.
    pub async fn run(&self, context: HookContext) -> HookContext {
        let started = Instant::now();
        let event = context.event_type;
        let result = self.run_from(0, context).await;
        debug!(
            event = %event,
            hooks = result.results.len(),
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            aborted = result.abort,
            "hook_chain_complete"
        );
        result
    }

    fn run_from(&self, index: usize, context: HookContext) -> ChainFuture<'_> {
        Box::pin(async move {
            let Some((position, hook)) = self
                .hooks
                .iter()
                .enumerate()
                .skip(index)
                .find(|(_, h)| h.enabled())
                .map(|(i, h)| (i, Arc::clone(h)))
            else {
                return context;
            };

            if context.abort {
                return context;
            }

            // Snapshot for the failure path: a timed-out hook may have
            // partially mutated the context it consumed.
            let snapshot = context.clone();
            let deadline = hook.timeout_ms().unwrap_or(self.default_timeout_ms);
            let started = Instant::now();
            let next = Next::chained(self, position + 1);

            let outcome =
                tokio::time::timeout(Duration::from_millis(deadline), hook.execute(context, next))
                    .await;
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(Ok(mut ctx)) => {
                    ctx.results.push(HookResult::ok(hook.name(), duration_ms));
                    ctx
                }
                Ok(Err(err)) => {
                    self.on_failure(snapshot, position, &hook, err.to_string(), duration_ms)
                        .await
                }
                Err(_) => {
                    let message = format!("timed out after {deadline} ms");
                    self.on_failure(snapshot, position, &hook, message, duration_ms)
                        .await
                }
            }
        })
    }

    async fn on_failure(
        &self,
        mut context: HookContext,
        position: usize,
        hook: &Arc<dyn Hook>,
        error: String,
        duration_ms: f64,
    ) -> HookContext {
        warn!(
            hook = hook.name(),
            fail_mode = ?hook.fail_mode(),
            %error,
            "hook_failed"
        );
        context
            .results
            .push(HookResult::failed(hook.name(), &error, duration_ms));

        match hook.fail_mode() {
            FailMode::Open => self.run_from(position + 1, context).await,
            FailMode::Closed => {
                context.abort_with(format!("Hook '{}' failed: {error}", hook.name()));
                context
            }
        }
    }
}

/// Concurrent runner for independent post-processing hooks.
///
/// All enabled hooks run in parallel with the same timeout semantics as the
/// sequential runner. Each hook receives a no-op [`Next`]; aborts from one
/// hook never stop the others.
pub struct ConcurrentHookRunner {
    hooks: Vec<Arc<dyn Hook>>,
    default_timeout_ms: u64,
}

impl std::fmt::Debug for ConcurrentHookRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("ConcurrentHookRunner")
            .field("hooks", &names)
            .finish()
    }
}

impl ConcurrentHookRunner {
    /// Build a runner over the given hooks.
    #[must_use]
    pub fn new(hooks: Vec<Arc<dyn Hook>>, default_timeout_ms: u64) -> Self {
        Self {
            hooks: hooks.into_iter().filter(|h| h.enabled()).collect(),
            default_timeout_ms,
        }
    }

    /// Execute all enabled hooks concurrently, collecting per-hook results
    /// into the context.
    pub async fn run(&self, mut context: HookContext) -> HookContext {
        if self.hooks.is_empty() {
            return context;
        }

        let futures = self.hooks.iter().map(|hook| {
            let ctx = context.clone();
            let deadline = hook.timeout_ms().unwrap_or(self.default_timeout_ms);
            async move {
                let started = Instant::now();
                let outcome = tokio::time::timeout(
                    Duration::from_millis(deadline),
                    hook.execute(ctx, Next::noop()),
                )
                .await;
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                match outcome {
                    Ok(Ok(_)) => HookResult::ok(hook.name(), duration_ms),
                    Ok(Err(err)) => {
                        warn!(hook = hook.name(), error = %err, "concurrent_hook_failed");
                        HookResult::failed(hook.name(), &err.to_string(), duration_ms)
                    }
                    Err(_) => HookResult::failed(
                        hook.name(),
                        &format!("timed out after {deadline} ms"),
                        duration_ms,
                    ),
                }
            }
        });

        let results = futures::future::join_all(futures).await;
        context.results.extend(results);
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test hook that appends its name to a metadata list, optionally
    /// failing, aborting, or sleeping.
    struct ProbeHook {
        name: String,
        priority: u32,
        fail: bool,
        fail_mode: FailMode,
        sleep_ms: u64,
        abort: bool,
        calls: AtomicUsize,
    }

    impl ProbeHook {
        fn new(name: &str, priority: u32) -> Self {
            Self {
                name: name.to_string(),
                priority,
                fail: false,
                fail_mode: FailMode::Open,
                sleep_ms: 0,
                abort: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, mode: FailMode) -> Self {
            self.fail = true;
            self.fail_mode = mode;
            self
        }

        fn sleeping(mut self, ms: u64) -> Self {
            self.sleep_ms = ms;
            self
        }

        fn aborting(mut self) -> Self {
            self.abort = true;
            self
        }
    }

    #[async_trait]
    impl Hook for ProbeHook {
        fn name(&self) -> &str {
            &self.name
        }

        fn event_type(&self) -> HookEventType {
            HookEventType::ToolExecutePre
        }

        fn priority(&self) -> u32 {
            self.priority
        }

        fn fail_mode(&self) -> FailMode {
            self.fail_mode
        }

        async fn execute(
            &self,
            mut context: HookContext,
            next: Next<'_>,
        ) -> Result<HookContext, HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.sleep_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.sleep_ms)).await;
            }
            if self.fail {
                return Err(HookError::Failed(format!("{} failed", self.name)));
            }
            let order = context
                .metadata
                .entry("order".to_string())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let Some(arr) = order.as_array_mut() {
                arr.push(serde_json::Value::String(self.name.clone()));
            }
            if self.abort {
                context.abort_with("blocked_by_probe");
                return Ok(context);
            }
            Ok(next.run(context).await)
        }
    }

    fn ctx() -> HookContext {
        HookContext::new(HookEventType::ToolExecutePre, "")
    }

    #[tokio::test]
    async fn hooks_run_in_priority_order() {
        let runner = HookChainRunner::new(
            vec![
                Arc::new(ProbeHook::new("late", 300)),
                Arc::new(ProbeHook::new("early", 10)),
                Arc::new(ProbeHook::new("mid", 100)),
            ],
            DEFAULT_HOOK_TIMEOUT_MS,
        );
        let result = runner.run(ctx()).await;
        let order: Vec<String> = result.metadata["order"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["early", "mid", "late"]);
        assert_eq!(result.results.len(), 3);
    }

    #[tokio::test]
    async fn fail_open_skips_and_continues() {
        let runner = HookChainRunner::new(
            vec![
                Arc::new(ProbeHook::new("first", 10)),
                Arc::new(ProbeHook::new("broken", 20).failing(FailMode::Open)),
                Arc::new(ProbeHook::new("last", 30)),
            ],
            DEFAULT_HOOK_TIMEOUT_MS,
        );
        let result = runner.run(ctx()).await;
        assert!(!result.abort);
        // One result per attempted hook, including the failed one.
        assert_eq!(result.results.len(), 3);
        let failed: Vec<&HookResult> = result.results.iter().filter(|r| !r.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].hook_name, "broken");
    }

    #[tokio::test]
    async fn fail_closed_aborts_chain() {
        let last = Arc::new(ProbeHook::new("last", 30));
        let runner = HookChainRunner::new(
            vec![
                Arc::new(ProbeHook::new("broken", 10).failing(FailMode::Closed)),
                Arc::clone(&last) as Arc<dyn Hook>,
            ],
            DEFAULT_HOOK_TIMEOUT_MS,
        );
        let result = runner.run(ctx()).await;
        assert!(result.abort);
        assert!(result.abort_reason.contains("broken"));
        assert_eq!(last.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_is_isolated_per_hook() {
        let runner = HookChainRunner::new(
            vec![
                Arc::new(ProbeHook::new("slow", 10).sleeping(200)),
                Arc::new(ProbeHook::new("fast", 20)),
            ],
            50,
        );
        let result = runner.run(ctx()).await;
        assert!(!result.abort);
        assert_eq!(result.results.len(), 2);
        let slow = result
            .results
            .iter()
            .find(|r| r.hook_name == "slow")
            .unwrap();
        assert!(!slow.success);
        assert!(slow.error.contains("timed out"));
    }

    #[tokio::test]
    async fn abort_skips_downstream() {
        let downstream = Arc::new(ProbeHook::new("after", 50));
        let runner = HookChainRunner::new(
            vec![
                Arc::new(ProbeHook::new("gate", 10).aborting()),
                Arc::clone(&downstream) as Arc<dyn Hook>,
            ],
            DEFAULT_HOOK_TIMEOUT_MS,
        );
        let result = runner.run(ctx()).await;
        assert!(result.abort);
        assert_eq!(result.abort_reason, "blocked_by_probe");
        assert_eq!(downstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_runner_never_aborts() {
        let runner = ConcurrentHookRunner::new(
            vec![
                Arc::new(ProbeHook::new("a", 10)),
                Arc::new(ProbeHook::new("b", 20).failing(FailMode::Closed)),
                Arc::new(ProbeHook::new("c", 30)),
            ],
            DEFAULT_HOOK_TIMEOUT_MS,
        );
        let result = runner.run(ctx()).await;
        assert!(!result.abort);
        assert_eq!(result.results.len(), 3);
        assert_eq!(result.results.iter().filter(|r| !r.success).count(), 1);
    }
}
