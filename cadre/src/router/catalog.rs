//! Known-provider catalog and environment-driven auto-registration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::{ModelProvider, ModelRouter};

/// Metadata about a known model provider.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Stable provider name.
    pub name: &'static str,
    /// Display name.
    pub display_name: &'static str,
    /// API base URL. Empty when deployment-specific.
    pub base_url: &'static str,
    /// Model-name prefixes served by this provider.
    pub model_prefixes: &'static [&'static str],
    /// Environment variable holding the API key. Empty when no key is
    /// required.
    pub env_key_var: &'static str,
}

/// The known-provider catalog. Local servers carry no key variable.
pub const PROVIDER_CATALOG: &[ProviderInfo] = &[
    ProviderInfo {
        name: "openai",
        display_name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        model_prefixes: &["gpt-", "o1", "o3", "chatgpt-"],
        env_key_var: "OPENAI_API_KEY",
    },
    ProviderInfo {
        name: "anthropic",
        display_name: "Anthropic",
        base_url: "https://api.anthropic.com/v1",
        model_prefixes: &["claude-"],
        env_key_var: "ANTHROPIC_API_KEY",
    },
    ProviderInfo {
        name: "groq",
        display_name: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        model_prefixes: &["llama-", "mixtral-", "gemma-"],
        env_key_var: "GROQ_API_KEY",
    },
    ProviderInfo {
        name: "mistral",
        display_name: "Mistral AI",
        base_url: "https://api.mistral.ai/v1",
        model_prefixes: &["mistral-", "open-mistral-", "codestral-"],
        env_key_var: "MISTRAL_API_KEY",
    },
    ProviderInfo {
        name: "deepseek",
        display_name: "DeepSeek",
        base_url: "https://api.deepseek.com/v1",
        model_prefixes: &["deepseek-"],
        env_key_var: "DEEPSEEK_API_KEY",
    },
    ProviderInfo {
        name: "google",
        display_name: "Google AI",
        base_url: "https://generativelanguage.googleapis.com/v1beta/openai",
        model_prefixes: &["gemini-"],
        env_key_var: "GOOGLE_API_KEY",
    },
    ProviderInfo {
        name: "xai",
        display_name: "xAI",
        base_url: "https://api.x.ai/v1",
        model_prefixes: &["grok-"],
        env_key_var: "XAI_API_KEY",
    },
    ProviderInfo {
        name: "openrouter",
        display_name: "OpenRouter",
        base_url: "https://openrouter.ai/api/v1",
        model_prefixes: &["openrouter/"],
        env_key_var: "OPENROUTER_API_KEY",
    },
    ProviderInfo {
        name: "ollama",
        display_name: "Ollama (local)",
        base_url: "http://localhost:11434/v1",
        model_prefixes: &[],
        env_key_var: "",
    },
];

/// Look up catalog metadata by provider name.
#[must_use]
pub fn provider_info(name: &str) -> Option<&'static ProviderInfo> {
    PROVIDER_CATALOG.iter().find(|p| p.name == name)
}

/// Build the (prefix, provider) table for the given providers, or for the
/// whole catalog when `providers` is `None`. Output order follows the
/// catalog, so the table is deterministic.
#[must_use]
pub fn build_prefix_map(providers: Option<&[String]>) -> Vec<(String, String)> {
    PROVIDER_CATALOG
        .iter()
        .filter(|info| providers.is_none_or(|names| names.iter().any(|n| n == info.name)))
        .flat_map(|info| {
            info.model_prefixes
                .iter()
                .map(|prefix| ((*prefix).to_string(), info.name.to_string()))
        })
        .collect()
}

/// Register every catalog provider whose API key variable is present in
/// `env`, using `factory` to construct the backend. Returns the sorted list
/// of registered provider names; re-running with the same environment
/// yields the same list.
pub fn auto_register(
    router: &ModelRouter,
    env: &HashMap<String, String>,
    factory: impl Fn(&ProviderInfo, &str) -> Arc<dyn ModelProvider>,
) -> Vec<String> {
    let mut registered = Vec::new();

    for info in PROVIDER_CATALOG {
        if info.env_key_var.is_empty() || info.base_url.is_empty() {
            continue;
        }
        let Some(api_key) = env.get(info.env_key_var).filter(|k| !k.is_empty()) else {
            continue;
        };
        router.register(info.name, factory(info, api_key));
        registered.push(info.name.to_string());
        info!(provider = info.name, "provider_auto_registered");
    }

    if !registered.is_empty() {
        router.add_prefixes(&build_prefix_map(Some(&registered)));
    }
    registered.sort();
    registered
}
