//! Agent registry.
//!
//! Read-mostly store of validated [`AgentDefinition`]s keyed by name. The
//! registry owns the definitions; callers get clones and never mutate shared
//! state.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::info;

use super::definition::{AgentDefinition, DefinitionError};

/// Central registry for agent definitions.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    definitions: RwLock<HashMap<String, AgentDefinition>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a definition, replacing any previous version
    /// under the same name.
    pub fn register(&self, definition: AgentDefinition) -> Result<(), DefinitionError> {
        let definition = definition.validate()?;
        info!(agent = %definition.name, version = %definition.version, "agent_registered");
        self.definitions
            .write()
            .expect("agent registry lock")
            .insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Remove a definition. Returns `true` if it existed.
    pub fn deregister(&self, name: &str) -> bool {
        self.definitions
            .write()
            .expect("agent registry lock")
            .remove(name)
            .is_some()
    }

    /// Get a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<AgentDefinition> {
        self.definitions
            .read()
            .expect("agent registry lock")
            .get(name)
            .cloned()
    }

    /// List all definitions sorted by name.
    #[must_use]
    pub fn list_all(&self) -> Vec<AgentDefinition> {
        let mut all: Vec<AgentDefinition> = self
            .definitions
            .read()
            .expect("agent registry lock")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.read().expect("agent registry lock").len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
