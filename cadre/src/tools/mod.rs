//! Tool abstractions: the [`Tool`] trait, execution context, results, and
//! the tool registry.
//!
//! Tools are dynamically dispatched by name. Each tool exposes a JSON
//! parameter schema that the reasoning loop validates arguments against
//! before execution.

mod builtin;
mod executor;

pub use builtin::{EchoTool, ReadFileTool};
pub use executor::{
    CodeExecutor, ExecutionContract, ExecutionInputs, ExecutionResult, ExecutorError,
    LocalProcessExecutor, SandboxSpec, StaticExecutor,
};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller context threaded through governance and tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Scopes granted to the caller.
    pub user_scopes: Vec<String>,
    /// Allowed path prefixes for file operations.
    pub path_allowlist: Vec<String>,
    /// Allowed executables for shell commands.
    pub command_allowlist: Vec<String>,
    /// Allowed domains for web fetches.
    pub domain_allowlist: Vec<String>,
    /// Tenant the call executes under.
    pub tenant_id: String,
}

impl ToolContext {
    /// Context with a single granted scope.
    #[must_use]
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            user_scopes: vec![scope.into()],
            ..Self::default()
        }
    }
}

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution succeeded.
    pub success: bool,
    /// Output content.
    pub content: String,
    /// Error message when `success` is false.
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful result with content.
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    /// Failed result with an error message.
    #[must_use]
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Serializable tool descriptor handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema for the arguments object.
    pub parameters: Value,
}

/// A dynamically dispatched tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON schema the arguments are validated against.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool.
    async fn execute(&self, args: Value, context: &ToolContext) -> ToolResult;

    /// Serializable descriptor for this tool.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Central registry of tool implementations.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .tools
            .read()
            .expect("tool registry lock")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name, replacing any previous entry.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools
            .write()
            .expect("tool registry lock")
            .insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .expect("tool registry lock")
            .get(name)
            .cloned()
    }

    /// Whether a tool is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools
            .read()
            .expect("tool registry lock")
            .contains_key(name)
    }

    /// Descriptors for every registered tool, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .read()
            .expect("tool registry lock")
            .values()
            .map(|t| t.definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().expect("tool registry lock").len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_round_trip() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.contains("echo"));
        assert_eq!(registry.len(), 1);

        let tool = registry.get("echo").unwrap();
        let result = tool
            .execute(
                serde_json::json!({"message": "hi"}),
                &ToolContext::default(),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.content, "hi");
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(ReadFileTool::default()));
        registry.register(Arc::new(EchoTool));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "file_read"]);
    }
}
