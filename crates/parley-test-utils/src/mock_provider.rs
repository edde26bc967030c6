// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` answers `complete()` (routing) and `stream()` (generation)
//! from two independent FIFO queues and records every request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::Mutex;

use parley_core::{
    AdapterType, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse, ProviderStream, ProviderStreamChunk, TokenUsage,
};

/// Default routing reply: no search.
pub const NO_SEARCH_REPLY: &str = r#"{"search_needed": false, "queries": []}"#;

/// One scripted streaming answer.
#[derive(Debug, Clone)]
pub struct ScriptedAnswer {
    pub chunks: Vec<String>,
    /// Delay before each chunk.
    pub chunk_delay: Duration,
    pub usage: Option<TokenUsage>,
    /// Emits a stream error after the chunks instead of finishing.
    pub fail_with: Option<String>,
}

impl ScriptedAnswer {
    pub fn chunks(chunks: &[&str]) -> Self {
        let completion = chunks.iter().map(|c| c.len() as u32).sum::<u32>();
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            chunk_delay: Duration::ZERO,
            usage: Some(TokenUsage {
                prompt_tokens: 10,
                completion_tokens: completion,
                total_tokens: 10 + completion,
            }),
            fail_with: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }
}

/// A mock LLM provider with scripted replies.
///
/// When a queue is empty, routing answers [`NO_SEARCH_REPLY`] and
/// generation streams a single "mock response" chunk.
pub struct MockProvider {
    route_replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    answers: Arc<Mutex<VecDeque<ScriptedAnswer>>>,
    complete_requests: Arc<Mutex<Vec<ProviderRequest>>>,
    stream_requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            route_replies: Arc::new(Mutex::new(VecDeque::new())),
            answers: Arc::new(Mutex::new(VecDeque::new())),
            complete_requests: Arc::new(Mutex::new(Vec::new())),
            stream_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a raw routing reply.
    pub async fn push_route_reply(&self, reply: &str) {
        self.route_replies.lock().await.push_back(Ok(reply.to_string()));
    }

    /// Queue a routing backend failure.
    pub async fn push_route_error(&self, message: &str) {
        self.route_replies
            .lock()
            .await
            .push_back(Err(message.to_string()));
    }

    /// Queue a streaming answer.
    pub async fn push_answer(&self, answer: ScriptedAnswer) {
        self.answers.lock().await.push_back(answer);
    }

    /// Requests seen by `complete()`.
    pub async fn complete_requests(&self) -> Vec<ProviderRequest> {
        self.complete_requests.lock().await.clone()
    }

    /// Requests seen by `stream()`.
    pub async fn stream_requests(&self) -> Vec<ProviderRequest> {
        self.stream_requests.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ParleyError> {
        let model = request.model.clone();
        self.complete_requests.lock().await.push(request);
        let reply = self
            .route_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(NO_SEARCH_REPLY.to_string()));
        match reply {
            Ok(content) => Ok(ProviderResponse {
                content,
                model,
                usage: None,
                finish_reason: Some("stop".into()),
            }),
            Err(message) => Err(ParleyError::provider(message)),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ParleyError> {
        self.stream_requests.lock().await.push(request);
        let answer = self
            .answers
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| ScriptedAnswer::chunks(&["mock response"]));

        let delay = answer.chunk_delay;
        let mut events: Vec<Result<ProviderStreamChunk, ParleyError>> = answer
            .chunks
            .into_iter()
            .map(|c| Ok(ProviderStreamChunk::delta(c)))
            .collect();
        match answer.fail_with {
            Some(message) => events.push(Ok(ProviderStreamChunk::error(message))),
            None => {
                events.push(Ok(ProviderStreamChunk::stop(Some("stop".into()))));
                if let Some(usage) = answer.usage {
                    events.push(Ok(ProviderStreamChunk::usage(usage)));
                }
            }
        }

        Ok(Box::pin(stream::iter(events).then(move |event| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            event
        })))
    }
}
