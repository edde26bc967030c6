// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible provider adapter.
//!
//! Implements [`ProviderAdapter`] against any `/chat/completions` endpoint
//! (Groq by default), with single-shot completion for routing decisions and
//! SSE streaming for answers.

pub mod client;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parley_config::model::LlmConfig;
use parley_core::{
    AdapterType, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse, ProviderStream, ProviderStreamChunk, TokenUsage,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ApiMessage, ApiUsage, ChatCompletionChunk, ChatCompletionRequest, ResponseFormat};

/// Environment variable consulted when no API key is configured.
const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Chat-completions provider implementing [`ProviderAdapter`].
pub struct OpenAiProvider {
    client: OpenAiClient,
    default_model: String,
}

impl OpenAiProvider {
    /// Creates the provider from the `[llm]` config section.
    ///
    /// The API key comes from `llm.api_key`, then the `GROQ_API_KEY`
    /// environment variable.
    pub fn new(config: &LlmConfig) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(base_url = %config.base_url, model = %config.model, "chat-completions provider initialized");
        Ok(Self::with_client(client, config.model.clone()))
    }

    pub fn with_client(client: OpenAiClient, default_model: String) -> Self {
        Self {
            client,
            default_model,
        }
    }

    fn to_api_request(&self, request: &ProviderRequest) -> ChatCompletionRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };
        ChatCompletionRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: false,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            reasoning_effort: request.reasoning_effort.map(|e| e.to_string()),
            response_format: request.json_response.then(ResponseFormat::json_object),
            stream_options: None,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // No request is made: health checks should not spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("chat-completions provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ParleyError> {
        let api_request = self.to_api_request(&request);
        let response = self.client.complete(&api_request).await?;
        let choice = response.choices.into_iter().next();

        Ok(ProviderResponse {
            content: choice
                .as_ref()
                .and_then(|c| c.message.content.clone())
                .unwrap_or_default(),
            model: if response.model.is_empty() {
                api_request.model
            } else {
                response.model
            },
            usage: response.usage.map(to_token_usage),
            finish_reason: choice.and_then(|c| c.finish_reason),
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ParleyError> {
        let api_request = self.to_api_request(&request);
        let chunks = self.client.stream(&api_request).await?;

        let events = chunks.flat_map(|result| {
            let events = match result {
                Ok(chunk) => chunk_to_events(chunk),
                Err(e) => vec![Err(e)],
            };
            stream::iter(events)
        });
        Ok(Box::pin(events))
    }
}

/// Splits one wire chunk into provider events: deltas, then stop, then usage.
fn chunk_to_events(chunk: ChatCompletionChunk) -> Vec<Result<ProviderStreamChunk, ParleyError>> {
    let usage = chunk.reported_usage();
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content
            && !text.is_empty()
        {
            events.push(Ok(ProviderStreamChunk::delta(text)));
        }
        if choice.finish_reason.is_some() {
            events.push(Ok(ProviderStreamChunk::stop(choice.finish_reason)));
        }
    }
    if let Some(usage) = usage {
        events.push(Ok(ProviderStreamChunk::usage(to_token_usage(usage))));
    }
    events
}

fn to_token_usage(usage: ApiUsage) -> TokenUsage {
    TokenUsage {
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, ParleyError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }
    std::env::var(API_KEY_ENV).map_err(|_| {
        ParleyError::Config(format!(
            "LLM API key not found. Set llm.api_key in config or the {API_KEY_ENV} environment variable."
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::{Message, ReasoningEffort, StreamEventType};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiProvider {
        let client = OpenAiClient::new("k", &server.uri(), Duration::from_secs(5)).unwrap();
        OpenAiProvider::with_client(client, "default-model".into())
    }

    #[test]
    fn api_key_from_config_wins() {
        assert_eq!(resolve_api_key(Some("gsk-1")).unwrap(), "gsk-1");
    }

    #[test]
    fn api_request_carries_options() {
        let client = OpenAiClient::new("k", "http://localhost", Duration::from_secs(1)).unwrap();
        let provider = OpenAiProvider::with_client(client, "default-model".into());
        let mut request = ProviderRequest::new("", vec![Message::system("s"), Message::user("u")]);
        request.json_response = true;
        request.temperature = Some(0.1);
        request.reasoning_effort = Some(ReasoningEffort::Low);

        let api = provider.to_api_request(&request);
        assert_eq!(api.model, "default-model");
        assert_eq!(api.messages[0].role, "system");
        assert_eq!(api.reasoning_effort.as_deref(), Some("low"));
        assert!(api.response_format.is_some());
    }

    #[test]
    fn chunk_events_in_order() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"end"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#,
        )
        .unwrap();
        let kinds: Vec<_> = chunk_to_events(chunk)
            .into_iter()
            .map(|e| e.unwrap().event_type)
            .collect();
        assert_eq!(
            kinds,
            [
                StreamEventType::ContentDelta,
                StreamEventType::Stop,
                StreamEventType::Usage
            ]
        );
    }

    #[tokio::test]
    async fn complete_requests_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "{\"search_needed\": false}"}, "finish_reason": "stop"}]
            })))
            .mount(&server)
            .await;

        let mut request = ProviderRequest::new("router", vec![Message::user("hi")]);
        request.json_response = true;
        let response = provider_for(&server).complete(request).await.unwrap();
        assert_eq!(response.content, "{\"search_needed\": false}");
        assert_eq!(response.model, "router");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn stream_yields_text_and_usage() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"!\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: {\"choices\":[],\"x_groq\":{\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let events: Vec<_> = provider_for(&server)
            .stream(ProviderRequest::new("m", vec![Message::user("hello")]))
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        let text: String = events.iter().filter_map(|e| e.text.clone()).collect();
        assert_eq!(text, "Hi!");
        let usage = events.iter().find_map(|e| e.usage).unwrap();
        assert_eq!(usage.total_tokens, 5);
    }
}
