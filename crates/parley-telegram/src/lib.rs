// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Parley chat assistant.
//!
//! Long-polls the Bot API through teloxide, filters updates by the
//! configured allow-list, and implements drafts as a placeholder message
//! that is edited while the answer streams and deleted afterwards.

pub mod handler;

use std::sync::Arc;

use async_trait::async_trait;
use parley_config::model::TelegramConfig;
use parley_core::{
    AdapterType, ChannelAdapter, ChannelCapabilities, DraftHandle, HealthStatus, InboundMessage,
    MessageId, ParleyError, PluginAdapter,
};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ThreadId};
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Telegram's hard limit on message text.
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Inbound queue depth between the dispatcher and the agent loop.
const INBOUND_BUFFER: usize = 100;

/// Telegram channel adapter implementing [`ChannelAdapter`].
pub struct TelegramChannel {
    bot: Bot,
    config: TelegramConfig,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<InboundMessage>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    polling_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TelegramChannel {
    /// Creates the adapter. Fails when no bot token is configured.
    pub fn new(config: TelegramConfig) -> Result<Self, ParleyError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            ParleyError::Config("telegram.bot_token is required for the Telegram adapter".into())
        })?;

        if token.trim().is_empty() {
            return Err(ParleyError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        let bot = Bot::new(token);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        Ok(Self {
            bot,
            config,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            inbound_tx,
            polling_handle: None,
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn parse_message_id(id: &MessageId) -> Result<teloxide::types::MessageId, ParleyError> {
    id.0.parse::<i32>()
        .map(teloxide::types::MessageId)
        .map_err(|e| ParleyError::channel(format!("invalid message_id {:?}: {e}", id.0)))
}

fn thread(thread_id: Option<i64>) -> Option<ThreadId> {
    thread_id
        .and_then(|t| i32::try_from(t).ok())
        .map(|t| ThreadId(teloxide::types::MessageId(t)))
}

/// Maps a Bot API failure onto the adapter error contract: flood control
/// becomes [`ParleyError::RateLimited`], everything else a channel error.
fn map_request_error(action: &str, e: RequestError) -> ParleyError {
    match e {
        RequestError::RetryAfter(secs) => {
            metrics::counter!("parley_telegram_retry_after_total").increment(1);
            ParleyError::RateLimited {
                retry_after: secs.duration(),
            }
        }
        other => ParleyError::Channel {
            message: format!("failed to {action}: {other}"),
            source: Some(Box::new(other)),
        },
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("Telegram channel shutting down");
        if let Some(handle) = &self.polling_handle {
            handle.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities {
            max_message_length: TELEGRAM_MAX_MESSAGE_LENGTH,
            supports_drafts: true,
            supports_threads: true,
        }
    }

    async fn connect(&mut self) -> Result<(), ParleyError> {
        if self.polling_handle.is_some() {
            return Ok(());
        }

        let bot = self.bot.clone();
        let tx = self.inbound_tx.clone();
        let allowed_users: Arc<Vec<String>> = Arc::new(self.config.allowed_users.clone());

        info!(
            allow_list = allowed_users.len(),
            "starting Telegram long polling"
        );

        let handle = tokio::spawn(async move {
            let handler = Update::filter_message().endpoint(move |msg: Message| {
                let tx = tx.clone();
                let allowed = Arc::clone(&allowed_users);
                async move {
                    if !handler::is_authorized(&msg, &allowed) {
                        debug!(chat_id = msg.chat.id.0, "ignoring unauthorized user");
                        return respond(());
                    }

                    match handler::to_inbound_message(&msg) {
                        Some(inbound) => {
                            if tx.send(inbound).await.is_err() {
                                warn!("inbound channel closed, dropping message");
                            }
                        }
                        None => {
                            debug!(msg_id = msg.id.0, "ignoring message without content");
                        }
                    }

                    respond(())
                }
            });

            Dispatcher::builder(bot, handler)
                .default_handler(|_| async {})
                .build()
                .dispatch()
                .await;
        });

        self.polling_handle = Some(handle);
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, ParleyError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| ParleyError::channel("Telegram inbound channel closed"))
    }

    async fn create_draft(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<DraftHandle, ParleyError> {
        let message_id = self.send(chat_id, thread_id, text).await?;
        Ok(DraftHandle {
            chat_id,
            thread_id,
            message_id,
        })
    }

    async fn edit_draft(&self, draft: &DraftHandle, text: &str) -> Result<(), ParleyError> {
        let msg_id = parse_message_id(&draft.message_id)?;
        match self
            .bot
            .edit_message_text(ChatId(draft.chat_id), msg_id, text)
            .await
        {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(map_request_error("edit draft", e)),
        }
    }

    async fn discard_draft(&self, draft: &DraftHandle) -> Result<(), ParleyError> {
        let msg_id = parse_message_id(&draft.message_id)?;
        self.bot
            .delete_message(ChatId(draft.chat_id), msg_id)
            .await
            .map_err(|e| map_request_error("delete draft", e))?;
        Ok(())
    }

    async fn send(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<MessageId, ParleyError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(thread) = thread(thread_id) {
            request = request.message_thread_id(thread);
        }
        let sent = request
            .await
            .map_err(|e| map_request_error("send message", e))?;
        Ok(MessageId(sent.id.0.to_string()))
    }
}
