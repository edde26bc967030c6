// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-turn response pipeline.
//!
//! quota check -> load history -> route -> search -> generate -> deliver ->
//! trim and save history -> record usage.
//!
//! History is written once, after the answer has been delivered, so an
//! aborted or failed turn leaves the stored conversation untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_config::ParleyConfig;
use parley_core::{
    ChannelAdapter, ConversationKey, History, Message, ParleyError, ProviderAdapter,
    SearchAdapter, SearchContext, StorageAdapter,
};
use parley_quota::{QuotaDecision, QuotaTracker};
use parley_router::SearchRouter;
use parley_search::SearchAggregator;
use tracing::{debug, error, info, warn};

use crate::delivery::DeliveryLoop;
use crate::generator::Generator;

/// How a turn ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered {
        parts_sent: usize,
        searched: bool,
        tokens: u64,
    },
    QuotaDenied {
        reason: String,
    },
}

/// One text message from a user, ready to run through the pipeline.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub key: ConversationKey,
    pub username: Option<String>,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

/// Runs user turns end to end.
pub struct TurnPipeline {
    storage: Arc<dyn StorageAdapter>,
    channel: Arc<dyn ChannelAdapter>,
    router: SearchRouter,
    search: Option<SearchAggregator>,
    generator: Generator,
    delivery: DeliveryLoop,
    quota: QuotaTracker,
    history_cap: usize,
    failure_notice: String,
}

impl TurnPipeline {
    /// Wires the pipeline. `search` of `None` disables routing and search.
    pub fn new(
        config: &ParleyConfig,
        provider: Arc<dyn ProviderAdapter>,
        search: Option<Arc<dyn SearchAdapter>>,
        storage: Arc<dyn StorageAdapter>,
        channel: Arc<dyn ChannelAdapter>,
    ) -> Self {
        let search = search
            .filter(|_| config.search.enabled)
            .map(|adapter| SearchAggregator::new(adapter, &config.search));
        Self {
            router: SearchRouter::new(Arc::clone(&provider), config),
            generator: Generator::new(provider, config),
            delivery: DeliveryLoop::new(Arc::clone(&channel), config.delivery.clone()),
            quota: QuotaTracker::new(Arc::clone(&storage), config.quota.clone()),
            search,
            storage,
            channel,
            history_cap: config.agent.history_cap,
            failure_notice: config.agent.failure_notice.clone(),
        }
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Runs a turn and turns any failure into the generic notice.
    pub async fn handle_turn(&self, request: TurnRequest) {
        let key = request.key;
        match self.run(request).await {
            Ok(TurnOutcome::Answered {
                parts_sent,
                searched,
                tokens,
            }) => {
                info!(key = %key, parts_sent, searched, tokens, "turn complete");
            }
            Ok(TurnOutcome::QuotaDenied { reason }) => {
                info!(key = %key, reason = %reason, "turn refused by quota");
            }
            Err(e) => {
                error!(key = %key, error = %e, "turn failed");
                if let Err(e) = self
                    .channel
                    .send(key.chat_id, key.thread(), &self.failure_notice)
                    .await
                {
                    warn!(key = %key, error = %e, "could not send failure notice");
                }
            }
        }
    }

    /// Runs all stages for one user message.
    ///
    /// Returns an error for anything that leaves the user without a final
    /// answer or would corrupt stored history.
    pub async fn run(&self, request: TurnRequest) -> Result<TurnOutcome, ParleyError> {
        let TurnRequest {
            key,
            username,
            text,
            received_at,
        } = request;

        if let QuotaDecision::Denied { reason, .. } = self
            .quota
            .check(key.user_id, username.as_deref(), received_at)
            .await?
        {
            self.channel.send(key.chat_id, key.thread(), &reason).await?;
            return Ok(TurnOutcome::QuotaDenied { reason });
        }

        let mut history = self.storage.load_history(&key).await?;
        history.push(Message::user(text));

        let context = self.gather_context(&history).await;
        let searched = context.is_some();

        let mut answer = self.generator.stream(&history, context.as_ref()).await?;
        let sources = answer.sources().to_vec();
        let outcome = self.delivery.deliver(&key, &mut answer, &sources).await?;
        let tokens = answer.summary().map(|s| s.total_tokens()).unwrap_or(0);

        history.push(Message::assistant(outcome.text));
        self.persist(&key, history).await?;

        if let Err(e) = self.quota.record(key.user_id, tokens).await {
            warn!(key = %key, error = %e, "failed to record usage");
        }

        Ok(TurnOutcome::Answered {
            parts_sent: outcome.parts_sent,
            searched,
            tokens,
        })
    }

    async fn gather_context(&self, history: &History) -> Option<SearchContext> {
        let search = self.search.as_ref()?;
        let decision = self.router.decide(history).await;
        if !decision.search_needed || decision.queries.is_empty() {
            debug!("answering without search");
            return None;
        }
        Some(search.search(&decision.queries).await)
    }

    async fn persist(&self, key: &ConversationKey, mut history: History) -> Result<(), ParleyError> {
        history.retain_recent(self.history_cap);
        self.storage.save_history(key, &history).await
    }
}
