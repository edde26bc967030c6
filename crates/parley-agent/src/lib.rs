// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent loop and response pipeline for the Parley chat assistant.
//!
//! The [`AgentLoop`] is the central coordinator that:
//! - Receives messages from a channel adapter
//! - Answers `/start`, `/clear`, and unsupported messages directly
//! - Rejects a message while its conversation already has a turn running
//! - Spawns each text turn as an independent task through [`TurnPipeline`]
//! - Drains running turns on shutdown

pub mod delivery;
pub mod generator;
pub mod pipeline;
pub mod shutdown;
pub mod turns;

use std::sync::Arc;
use std::time::Duration;

use parley_config::ParleyConfig;
use parley_config::model::AgentConfig;
use parley_core::{
    ChannelAdapter, Command, ConversationKey, InboundContent, InboundMessage, ParleyError,
    StorageAdapter,
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub use delivery::{DeliveryLoop, DeliveryOutcome, DeliveryPhase, compose_parts, smart_split};
pub use generator::{GenerationStream, GenerationSummary, Generator};
pub use pipeline::{TurnOutcome, TurnPipeline, TurnRequest};
pub use turns::{TurnGuard, TurnRegistry};

/// How long shutdown waits for running turns.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinates message flow between the channel and the turn pipeline.
pub struct AgentLoop {
    channel: Arc<dyn ChannelAdapter>,
    storage: Arc<dyn StorageAdapter>,
    pipeline: Arc<TurnPipeline>,
    turns: TurnRegistry,
    tracker: TaskTracker,
    notices: AgentConfig,
}

impl AgentLoop {
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        storage: Arc<dyn StorageAdapter>,
        pipeline: Arc<TurnPipeline>,
        config: &ParleyConfig,
    ) -> Self {
        info!(agent_name = config.agent.name.as_str(), "agent loop initialized");
        Self {
            channel,
            storage,
            pipeline,
            turns: TurnRegistry::new(),
            tracker: TaskTracker::new(),
            notices: config.agent.clone(),
        }
    }

    /// Conversations with a running turn.
    pub fn turns(&self) -> &TurnRegistry {
        &self.turns
    }

    /// Runs until the token is cancelled or the channel closes.
    ///
    /// On exit, running turns are drained and storage is closed.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ParleyError> {
        info!("agent loop running");

        loop {
            tokio::select! {
                msg = self.channel.receive() => {
                    match msg {
                        Ok(inbound) => {
                            if let Err(e) = self.dispatch(inbound).await {
                                error!(error = %e, "failed to handle inbound message");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "channel closed, stopping agent loop");
                            break;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping agent loop");
                    break;
                }
            }
        }

        shutdown::drain_turns(&self.tracker, &self.turns, DRAIN_TIMEOUT).await;
        self.storage.close().await?;

        info!("agent loop stopped");
        Ok(())
    }

    /// Handles one inbound message. Text turns are spawned and return
    /// immediately; everything else is answered inline.
    pub async fn dispatch(&self, inbound: InboundMessage) -> Result<(), ParleyError> {
        let key = inbound.key;
        match inbound.content {
            InboundContent::Command(Command::Start) => {
                self.reply(&key, &self.notices.welcome_message).await
            }
            InboundContent::Command(Command::Clear) => self.clear(&key).await,
            InboundContent::Unsupported => {
                self.reply(&key, &self.notices.unsupported_notice).await
            }
            InboundContent::Text(text) => {
                let guard = match self.turns.try_begin(key) {
                    Ok(guard) => guard,
                    Err(e) => {
                        debug!(error = %e, "rejecting message for busy conversation");
                        return self.reply(&key, &self.notices.busy_notice).await;
                    }
                };
                let pipeline = Arc::clone(&self.pipeline);
                let request = TurnRequest {
                    key,
                    username: inbound.username,
                    text,
                    received_at: inbound.received_at,
                };
                self.tracker.spawn(async move {
                    let _guard = guard;
                    pipeline.handle_turn(request).await;
                });
                Ok(())
            }
        }
    }

    async fn clear(&self, key: &ConversationKey) -> Result<(), ParleyError> {
        if self.turns.is_busy(key) {
            return self.reply(key, &self.notices.busy_notice).await;
        }
        self.storage.clear_history(key).await?;
        info!(key = %key, "conversation cleared");
        self.reply(key, &self.notices.cleared_notice).await
    }

    async fn reply(&self, key: &ConversationKey, text: &str) -> Result<(), ParleyError> {
        self.channel.send(key.chat_id, key.thread(), text).await?;
        Ok(())
    }

    /// Waits for spawned turns without closing the loop. Used by tests and
    /// embedders that drive [`AgentLoop::dispatch`] directly.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.turns.active() > 0 || !self.tracker.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }
}
