//! Model routing: chat messages, the provider capability, and prefix-based
//! model-to-provider resolution.
//!
//! A startup phase builds an immutable (prefix, provider) table; runtime
//! lookup picks the longest matching prefix, with deterministic ordering on
//! ambiguity.

mod catalog;
mod mock;

pub use catalog::{PROVIDER_CATALOG, ProviderInfo, auto_register, build_prefix_map, provider_info};
pub use mock::MockProvider;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tools::ToolDefinition;

/// Errors from the router and providers.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No provider matches the requested model.
    #[error("no provider registered for model '{0}'")]
    NoProvider(String),
    /// The provider failed to complete the request.
    #[error("provider error: {0}")]
    Provider(String),
    /// Transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt.
    System,
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Tool observation.
    Tool,
}

/// A tool call proposed by the model. Arguments are a JSON-encoded string,
/// as on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier, echoed back in the tool message.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Tool calls, on assistant messages that propose them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Echo of the call this tool message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, on tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// System message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// User message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            ..Self::system(content)
        }
    }

    /// Assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::system(content)
        }
    }

    /// Tool observation message answering `tool_call_id`.
    #[must_use]
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of message.
    Stop,
    /// The model proposed tool calls.
    ToolCalls,
    /// Token limit reached.
    Length,
}

/// Token accounting for a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub prompt_tokens: u32,
    /// Completion tokens produced.
    pub completion_tokens: u32,
}

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional token ceiling.
    pub max_tokens: Option<u32>,
    /// Tools the model may call.
    pub tools: Vec<ToolDefinition>,
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Assistant text content.
    pub content: String,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Proposed tool calls, when `finish_reason` is `ToolCalls`.
    pub tool_calls: Vec<ToolCallRequest>,
    /// Token accounting.
    pub usage: TokenUsage,
}

/// Capability implemented by every model backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Complete a chat request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RouterError>;

    /// Models this provider can serve.
    async fn list_models(&self) -> Result<Vec<String>, RouterError>;
}

/// Routes model names to providers via a prefix table.
pub struct ModelRouter {
    providers: RwLock<HashMap<String, Arc<dyn ModelProvider>>>,
    prefix_map: RwLock<Vec<(String, String)>>,
    default_provider: RwLock<Option<String>>,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .providers
            .read()
            .expect("router lock")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("ModelRouter")
            .field("providers", &names)
            .finish()
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            prefix_map: RwLock::new(Vec::new()),
            default_provider: RwLock::new(None),
        }
    }

    /// Register a provider under a name. The first registered provider
    /// becomes the default fallback.
    pub fn register(&self, name: &str, provider: Arc<dyn ModelProvider>) {
        let mut providers = self.providers.write().expect("router lock");
        if providers.is_empty() {
            *self.default_provider.write().expect("router lock") = Some(name.to_string());
        }
        providers.insert(name.to_string(), provider);
    }

    /// Add prefix → provider mappings. The table is kept sorted by
    /// descending prefix length then name, so resolution is deterministic
    /// on ambiguous prefixes.
    pub fn add_prefixes(&self, prefixes: &[(String, String)]) {
        let mut map = self.prefix_map.write().expect("router lock");
        for (prefix, provider) in prefixes {
            if !map.iter().any(|(p, n)| p == prefix && n == provider) {
                map.push((prefix.clone(), provider.clone()));
            }
        }
        map.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.1.cmp(&b.1)));
    }

    /// Resolve a model name to a provider name.
    #[must_use]
    pub fn resolve(&self, model: &str) -> Option<String> {
        let map = self.prefix_map.read().expect("router lock");
        for (prefix, provider) in map.iter() {
            if model.starts_with(prefix.as_str()) {
                return Some(provider.clone());
            }
        }
        self.default_provider.read().expect("router lock").clone()
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .expect("router lock")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Complete a request through the provider resolved from the model
    /// name.
    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, RouterError> {
        let provider_name = self
            .resolve(&request.model)
            .ok_or_else(|| RouterError::NoProvider(request.model.clone()))?;
        let provider = self
            .providers
            .read()
            .expect("router lock")
            .get(&provider_name)
            .cloned()
            .ok_or_else(|| RouterError::NoProvider(request.model.clone()))?;
        provider.complete(request).await
    }

    /// All models reported by all providers, sorted and deduplicated.
    pub async fn list_models(&self) -> Result<Vec<String>, RouterError> {
        let providers: Vec<Arc<dyn ModelProvider>> = self
            .providers
            .read()
            .expect("router lock")
            .values()
            .cloned()
            .collect();
        let mut models = Vec::new();
        for provider in providers {
            models.extend(provider.list_models().await?);
        }
        models.sort();
        models.dedup();
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_longest_prefix() {
        let router = ModelRouter::new();
        router.register("generic", Arc::new(MockProvider::completing("hi")));
        router.register("special", Arc::new(MockProvider::completing("hi")));
        router.add_prefixes(&[
            ("gpt-".to_string(), "generic".to_string()),
            ("gpt-4o-".to_string(), "special".to_string()),
        ]);
        assert_eq!(router.resolve("gpt-4o-mini"), Some("special".to_string()));
        assert_eq!(router.resolve("gpt-3.5"), Some("generic".to_string()));
    }

    #[test]
    fn ambiguous_prefixes_resolve_deterministically() {
        let router = ModelRouter::new();
        router.register("beta", Arc::new(MockProvider::completing("hi")));
        router.register("alpha", Arc::new(MockProvider::completing("hi")));
        // Same prefix registered for two providers: name order decides.
        router.add_prefixes(&[
            ("llm-".to_string(), "beta".to_string()),
            ("llm-".to_string(), "alpha".to_string()),
        ]);
        assert_eq!(router.resolve("llm-x"), Some("alpha".to_string()));
    }

    #[test]
    fn unknown_model_falls_back_to_first_registered() {
        let router = ModelRouter::new();
        router.register("first", Arc::new(MockProvider::completing("hi")));
        router.register("second", Arc::new(MockProvider::completing("hi")));
        assert_eq!(router.resolve("mystery-model"), Some("first".to_string()));
    }

    #[tokio::test]
    async fn complete_routes_to_resolved_provider() {
        let router = ModelRouter::new();
        router.register("mock", Arc::new(MockProvider::completing("routed")));
        router.add_prefixes(&[("test-".to_string(), "mock".to_string())]);
        let response = router
            .complete(CompletionRequest {
                messages: vec![ChatMessage::user("hello")],
                model: "test-model".into(),
                temperature: 0.0,
                max_tokens: None,
                tools: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(response.content, "routed");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn empty_router_errors() {
        let router = ModelRouter::new();
        let err = router
            .complete(CompletionRequest {
                messages: Vec::new(),
                model: "anything".into(),
                temperature: 0.0,
                max_tokens: None,
                tools: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoProvider(_)));
    }
}
