// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the real turn pipeline and agent loop over mock
//! adapters and a temporary SQLite database.

use std::sync::Arc;

use chrono::Utc;
use parley_agent::{AgentLoop, TurnOutcome, TurnPipeline, TurnRequest};
use parley_config::ParleyConfig;
use parley_config::model::{DeliveryConfig, QuotaConfig, StorageConfig};
use parley_core::{
    ChannelAdapter, Command, ConversationKey, History, InboundContent, InboundMessage,
    ParleyError, ProviderAdapter, SearchAdapter, StorageAdapter,
};
use parley_storage::SqliteStorage;

use crate::mock_channel::MockChannel;
use crate::mock_provider::MockProvider;
use crate::mock_search::MockSearch;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ParleyConfig,
    search_enabled: bool,
    channel: Option<MockChannel>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ParleyConfig::default();
        config.agent.system_prompt = Some("You are a test assistant.".to_string());
        Self {
            config,
            search_enabled: true,
            channel: None,
        }
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.config.agent.history_cap = cap;
        self
    }

    pub fn with_quota(mut self, quota: QuotaConfig) -> Self {
        self.config.quota = quota;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.config.delivery = delivery;
        self
    }

    /// Turns routing and search off entirely.
    pub fn without_search(mut self) -> Self {
        self.search_enabled = false;
        self
    }

    /// Use a preconfigured channel, e.g. one without draft support.
    pub fn with_channel(mut self, channel: MockChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ParleyError::Storage { source: e.into() })?;
        let mut config = self.config;
        config.search.enabled = self.search_enabled;
        config.storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let provider = Arc::new(MockProvider::new());
        let channel = Arc::new(self.channel.unwrap_or_default());
        let search = Arc::new(MockSearch::new());

        let pipeline = Arc::new(TurnPipeline::new(
            &config,
            Arc::clone(&provider) as Arc<dyn ProviderAdapter>,
            Some(Arc::clone(&search) as Arc<dyn SearchAdapter>),
            Arc::clone(&storage),
            Arc::clone(&channel) as Arc<dyn ChannelAdapter>,
        ));
        let agent = AgentLoop::new(
            Arc::clone(&channel) as Arc<dyn ChannelAdapter>,
            Arc::clone(&storage),
            Arc::clone(&pipeline),
            &config,
        );

        Ok(TestHarness {
            provider,
            channel,
            search,
            storage,
            pipeline,
            agent,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub provider: Arc<MockProvider>,
    pub channel: Arc<MockChannel>,
    pub search: Arc<MockSearch>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub pipeline: Arc<TurnPipeline>,
    pub agent: AgentLoop,
    pub config: ParleyConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A private-chat conversation key for `user_id`.
    pub fn key(user_id: i64) -> ConversationKey {
        ConversationKey::new(user_id, user_id, None)
    }

    /// Runs one text turn through the pipeline, bypassing the busy registry.
    pub async fn run_turn(
        &self,
        key: ConversationKey,
        text: &str,
    ) -> Result<TurnOutcome, ParleyError> {
        self.pipeline
            .run(TurnRequest {
                key,
                username: Some(format!("user{}", key.user_id)),
                text: text.to_string(),
                received_at: Utc::now(),
            })
            .await
    }

    /// Runs one text turn the way the agent loop does, including the
    /// generic failure notice.
    pub async fn handle_turn(&self, key: ConversationKey, text: &str) {
        self.pipeline
            .handle_turn(TurnRequest {
                key,
                username: None,
                text: text.to_string(),
                received_at: Utc::now(),
            })
            .await;
    }

    /// Dispatches an inbound text message through the agent loop.
    pub async fn dispatch_text(&self, key: ConversationKey, text: &str) -> Result<(), ParleyError> {
        self.agent
            .dispatch(inbound(key, InboundContent::Text(text.to_string())))
            .await
    }

    /// Dispatches a bot command through the agent loop.
    pub async fn dispatch_command(
        &self,
        key: ConversationKey,
        command: Command,
    ) -> Result<(), ParleyError> {
        self.agent
            .dispatch(inbound(key, InboundContent::Command(command)))
            .await
    }

    pub async fn history(&self, key: &ConversationKey) -> Result<History, ParleyError> {
        self.storage.load_history(key).await
    }
}

fn inbound(key: ConversationKey, content: InboundContent) -> InboundMessage {
    InboundMessage {
        key,
        username: None,
        content,
        received_at: Utc::now(),
    }
}
