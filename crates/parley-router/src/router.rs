// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend-driven search routing with a soft-fail default.

use std::sync::Arc;

use chrono::Utc;
use parley_config::ParleyConfig;
use parley_core::{
    History, Message, ProviderAdapter, ProviderRequest, ReasoningEffort, RouteDecision,
};
use tracing::{debug, warn};

use crate::decision::{normalize_decision, parse_decision};
use crate::prompt::{conversation_excerpt, router_instructions};

/// Longest raw reply echoed into logs on a decoding failure.
const MAX_LOGGED_REPLY: usize = 300;

/// Decides per turn whether a web search should run.
pub struct SearchRouter {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    temperature: f32,
    context_messages: usize,
    max_queries: usize,
}

impl SearchRouter {
    pub fn new(provider: Arc<dyn ProviderAdapter>, config: &ParleyConfig) -> Self {
        Self {
            provider,
            model: config.llm.router_model().to_string(),
            temperature: config.llm.router_temperature,
            context_messages: config.llm.router_context_messages,
            max_queries: config.search.max_queries,
        }
    }

    /// Makes exactly one backend call and returns its decision.
    ///
    /// Backend errors and malformed replies are logged and produce
    /// [`RouteDecision::no_search`]; this method never fails.
    pub async fn decide(&self, history: &History) -> RouteDecision {
        let Some(latest) = history.last_user_message() else {
            return RouteDecision::no_search();
        };

        let request = self.build_request(history);
        let reply = match self.provider.complete(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "search routing call failed; answering without search");
                return RouteDecision::no_search();
            }
        };

        match parse_decision(&reply.content) {
            Ok(decision) => {
                let decision = normalize_decision(decision, self.max_queries, &latest.content);
                debug!(
                    search_needed = decision.search_needed,
                    queries = ?decision.queries,
                    "search routing decision"
                );
                decision
            }
            Err(e) => {
                let excerpt: String = reply.content.chars().take(MAX_LOGGED_REPLY).collect();
                warn!(error = %e, reply = %excerpt, "malformed routing reply; answering without search");
                RouteDecision::no_search()
            }
        }
    }

    fn build_request(&self, history: &History) -> ProviderRequest {
        let messages = history.messages();
        let recent = &messages[messages.len().saturating_sub(self.context_messages)..];
        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(router_instructions(Utc::now().date_naive(), self.max_queries)),
                Message::user(conversation_excerpt(recent)),
            ],
        );
        request.temperature = Some(self.temperature);
        request.reasoning_effort = Some(ReasoningEffort::Low);
        request.json_response = true;
        request
    }
}
