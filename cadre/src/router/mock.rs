//! Scripted mock provider for tests and dry runs.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    CompletionRequest, CompletionResponse, FinishReason, ModelProvider, RouterError,
    TokenUsage, ToolCallRequest,
};

/// A provider that replays a fixed script of responses, then repeats the
/// last one. Useful for driving the tool loop deterministically in tests.
#[derive(Debug)]
pub struct MockProvider {
    script: Mutex<Vec<CompletionResponse>>,
    /// Requests seen, for assertions.
    calls: Mutex<usize>,
}

impl MockProvider {
    /// Provider that always returns a final assistant message.
    #[must_use]
    pub fn completing(content: &str) -> Self {
        Self::scripted(vec![Self::final_message(content)])
    }

    /// Provider that replays `script` in order, repeating the last entry.
    #[must_use]
    pub fn scripted(script: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(0),
        }
    }

    /// A response carrying a final assistant message.
    #[must_use]
    pub fn final_message(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            finish_reason: FinishReason::Stop,
            tool_calls: Vec::new(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        }
    }

    /// A response proposing a single tool call.
    #[must_use]
    pub fn tool_call(id: &str, name: &str, arguments: &str) -> CompletionResponse {
        CompletionResponse {
            content: String::new(),
            finish_reason: FinishReason::ToolCalls,
            tool_calls: vec![ToolCallRequest {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        }
    }

    /// Number of completion calls served.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().expect("mock lock")
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, RouterError> {
        let mut calls = self.calls.lock().expect("mock lock");
        let index = *calls;
        *calls += 1;
        let script = self.script.lock().expect("mock lock");
        let response = script
            .get(index)
            .or_else(|| script.last())
            .cloned()
            .ok_or_else(|| RouterError::Provider("mock script is empty".to_string()))?;
        Ok(response)
    }

    async fn list_models(&self) -> Result<Vec<String>, RouterError> {
        Ok(vec!["mock-model".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: Vec::new(),
            model: "mock-model".into(),
            temperature: 0.0,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn script_replays_in_order_then_repeats() {
        let provider = MockProvider::scripted(vec![
            MockProvider::tool_call("c1", "echo", "{\"message\":\"x\"}"),
            MockProvider::final_message("done"),
        ]);
        let first = provider.complete(request()).await.unwrap();
        assert_eq!(first.finish_reason, FinishReason::ToolCalls);
        let second = provider.complete(request()).await.unwrap();
        assert_eq!(second.content, "done");
        let third = provider.complete(request()).await.unwrap();
        assert_eq!(third.content, "done");
        assert_eq!(provider.call_count(), 3);
    }
}
