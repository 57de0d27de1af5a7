//! Hook registry: registration, tenant filtering, and event indexing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use super::builtins::builtin_hooks;
use super::chain::{
    ConcurrentHookRunner, DEFAULT_HOOK_TIMEOUT_MS, Hook, HookChainRunner, HookError,
};
use super::models::{HookDefinition, HookEventType};

/// Maximum number of hooks per event type.
pub const MAX_HOOKS_PER_EVENT: usize = 20;

/// Central registry for hook instances and their definitions.
pub struct HookRegistry {
    hooks: RwLock<HashMap<HookEventType, Vec<Arc<dyn Hook>>>>,
    definitions: RwLock<HashMap<String, HookDefinition>>,
    max_per_event: usize,
    default_timeout_ms: u64,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("total_hooks", &self.count())
            .field("max_per_event", &self.max_per_event)
            .finish()
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new(MAX_HOOKS_PER_EVENT, DEFAULT_HOOK_TIMEOUT_MS)
    }
}

impl HookRegistry {
    /// Create a registry with the given per-event cap and default timeout.
    #[must_use]
    pub fn new(max_per_event: usize, default_timeout_ms: u64) -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
            definitions: RwLock::new(HashMap::new()),
            max_per_event,
            default_timeout_ms,
        }
    }

    /// Register a hook instance, optionally with a persistent definition.
    ///
    /// Fails when the event type already carries the maximum number of
    /// hooks, or when the definition fails validation.
    pub fn register(
        &self,
        hook: Arc<dyn Hook>,
        definition: Option<HookDefinition>,
    ) -> Result<(), HookError> {
        if let Some(def) = &definition {
            def.validate().map_err(HookError::InvalidDefinition)?;
        }

        let event = hook.event_type();
        {
            let mut hooks = self.hooks.write().expect("hook registry lock");
            let entry = hooks.entry(event).or_default();
            if entry.len() >= self.max_per_event {
                return Err(HookError::LimitExceeded {
                    event: event.as_str().to_string(),
                    limit: self.max_per_event,
                });
            }
            info!(
                hook = hook.name(),
                event = %event,
                priority = hook.priority(),
                tenant = if hook.tenant_id().is_empty() { "(system)" } else { hook.tenant_id() },
                "hook_registered"
            );
            entry.push(hook);
        }

        if let Some(def) = definition {
            self.definitions
                .write()
                .expect("hook definitions lock")
                .insert(def.hook_id.clone(), def);
        }
        Ok(())
    }

    /// Remove a hook by name, from one event type or from all. Returns
    /// `true` if anything was removed.
    pub fn deregister(&self, hook_name: &str, event_type: Option<HookEventType>) -> bool {
        let mut removed = false;
        {
            let mut hooks = self.hooks.write().expect("hook registry lock");
            let events: Vec<HookEventType> = match event_type {
                Some(e) => vec![e],
                None => hooks.keys().copied().collect(),
            };
            for event in events {
                if let Some(entry) = hooks.get_mut(&event) {
                    let before = entry.len();
                    entry.retain(|h| h.name() != hook_name);
                    removed |= entry.len() < before;
                }
            }
        }

        let mut definitions = self.definitions.write().expect("hook definitions lock");
        let stale: Vec<String> = definitions
            .iter()
            .filter(|(_, d)| d.name == hook_name)
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            definitions.remove(&id);
        }

        if removed {
            info!(hook = hook_name, "hook_deregistered");
        }
        removed
    }

    /// Hooks for an event, filtered to system hooks plus the given tenant,
    /// sorted by ascending priority.
    #[must_use]
    pub fn get_hooks(&self, event_type: HookEventType, tenant_id: &str) -> Vec<Arc<dyn Hook>> {
        let hooks = self.hooks.read().expect("hook registry lock");
        let mut matched: Vec<Arc<dyn Hook>> = hooks
            .get(&event_type)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|h| h.tenant_id().is_empty() || h.tenant_id() == tenant_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matched.sort_by_key(|h| h.priority());
        matched
    }

    /// Build a sequential chain runner for an event and tenant.
    #[must_use]
    pub fn chain_runner(&self, event_type: HookEventType, tenant_id: &str) -> HookChainRunner {
        HookChainRunner::new(self.get_hooks(event_type, tenant_id), self.default_timeout_ms)
    }

    /// Build a concurrent runner for an event and tenant.
    #[must_use]
    pub fn concurrent_runner(
        &self,
        event_type: HookEventType,
        tenant_id: &str,
    ) -> ConcurrentHookRunner {
        ConcurrentHookRunner::new(self.get_hooks(event_type, tenant_id), self.default_timeout_ms)
    }

    /// Get a definition by ID.
    #[must_use]
    pub fn get_definition(&self, hook_id: &str) -> Option<HookDefinition> {
        self.definitions
            .read()
            .expect("hook definitions lock")
            .get(hook_id)
            .cloned()
    }

    /// List definitions with optional filters.
    #[must_use]
    pub fn list_definitions(
        &self,
        event_type: Option<HookEventType>,
        tenant_id: Option<&str>,
        enabled: Option<bool>,
    ) -> Vec<HookDefinition> {
        let definitions = self.definitions.read().expect("hook definitions lock");
        let mut result: Vec<HookDefinition> = definitions
            .values()
            .filter(|d| event_type.is_none_or(|e| d.event_type == e))
            .filter(|d| tenant_id.is_none_or(|t| d.tenant_id == t))
            .filter(|d| enabled.is_none_or(|e| d.enabled == e))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result
    }

    /// Flip a definition's enabled flag. Returns the updated definition.
    #[must_use]
    pub fn toggle(&self, hook_id: &str, enabled: bool) -> Option<HookDefinition> {
        let mut definitions = self.definitions.write().expect("hook definitions lock");
        let def = definitions.get_mut(hook_id)?;
        def.enabled = enabled;
        Some(def.clone())
    }

    /// Delete a definition and deregister its hook. Returns `true` if the
    /// definition existed.
    pub fn delete_definition(&self, hook_id: &str) -> bool {
        let name = {
            let definitions = self.definitions.read().expect("hook definitions lock");
            match definitions.get(hook_id) {
                Some(d) => d.name.clone(),
                None => return false,
            }
        };
        self.deregister(&name, None);
        true
    }

    /// Register the built-in metrics and audit hooks for every event type.
    /// Returns the number of hooks registered.
    pub fn register_builtins(&self) -> usize {
        let mut count = 0;
        for (hook, definition) in builtin_hooks() {
            match self.register(hook, Some(definition)) {
                Ok(()) => count += 1,
                Err(err) => {
                    tracing::warn!(error = %err, "builtin_hook_registration_failed");
                }
            }
        }
        info!(count, "builtin_hooks_registered");
        count
    }

    /// Total number of registered hook instances.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hooks
            .read()
            .expect("hook registry lock")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Event types that have at least one hook registered.
    #[must_use]
    pub fn event_types(&self) -> Vec<HookEventType> {
        self.hooks
            .read()
            .expect("hook registry lock")
            .iter()
            .filter(|(_, hooks)| !hooks.is_empty())
            .map(|(event, _)| *event)
            .collect()
    }
}
