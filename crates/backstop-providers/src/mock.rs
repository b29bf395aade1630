//! Scripted provider for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use backstop_core::traits::{
    AiProvider, CompletionRequest, CompletionResponse, ModelInfo, TokenUsage,
};
use backstop_core::ProviderError;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(ProviderError),
}

/// A provider that replays a fixed script of replies.
///
/// Replies are consumed in order; once the script runs out the fallback
/// reply repeats forever. Useful for exercising retry paths without real
/// API calls.
pub struct ScriptedProvider {
    /// Replies not yet returned.
    script: Mutex<VecDeque<ScriptedReply>>,
    /// Reply once the script is exhausted.
    fallback: ScriptedReply,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Replay `replies`, then keep returning `fallback`.
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>, fallback: ScriptedReply) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            fallback,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a provider that always returns the same text.
    pub fn with_fixed_response(text: &str) -> Self {
        Self::new([], ScriptedReply::Text(text.to_string()))
    }

    /// Create a provider that always fails with `error`.
    pub fn always_failing(error: ProviderError) -> Self {
        Self::new([], ScriptedReply::Fail(error))
    }

    /// Fail with each of `errors` once, then succeed with `text`.
    pub fn failing_then(errors: impl IntoIterator<Item = ProviderError>, text: &str) -> Self {
        Self::new(
            errors.into_iter().map(ScriptedReply::Fail),
            ScriptedReply::Text(text.to_string()),
        )
    }

    /// Get the number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this provider.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<CompletionResponse> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let reply = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            ScriptedReply::Fail(err) => Err(err.into()),
            ScriptedReply::Text(content) => {
                let completion_tokens = (content.len() / 4) as u32; // Rough estimate
                Ok(CompletionResponse {
                    content,
                    model: request.model.clone(),
                    token_usage: TokenUsage::new(
                        (request.prompt.len() / 4) as u32,
                        completion_tokens,
                    ),
                    latency_ms: 1,
                })
            }
        }
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            id: "scripted-model".into(),
            name: "Scripted Model".into(),
            provider: "scripted".into(),
            max_context: 100_000,
        }]
    }
}
