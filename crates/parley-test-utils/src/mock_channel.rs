// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` with injectable inbound
//! messages, recorded outbound calls (with timestamps relative to creation),
//! and programmable rate-limit and transport failures.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use parley_core::{
    AdapterType, ChannelAdapter, ChannelCapabilities, DraftHandle, HealthStatus, InboundMessage,
    MessageId, ParleyError, PluginAdapter,
};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    DraftCreated {
        chat_id: i64,
        thread_id: Option<i64>,
        text: String,
    },
    /// Every edit attempt, including rejected ones.
    DraftEdited { text: String, at: Duration },
    DraftDiscarded,
    Sent {
        chat_id: i64,
        thread_id: Option<i64>,
        text: String,
        at: Duration,
    },
}

/// A mock messaging channel for testing.
pub struct MockChannel {
    start: Instant,
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    notify: Arc<Notify>,
    closed: AtomicBool,
    events: Arc<Mutex<Vec<ChannelEvent>>>,
    /// 1-based edit attempt number -> retry hint.
    edit_rate_limits: Arc<Mutex<HashMap<u64, Duration>>>,
    edit_attempts: AtomicU64,
    fail_all_edits: AtomicBool,
    send_failures: Arc<Mutex<VecDeque<ParleyError>>>,
    next_id: AtomicU64,
    capabilities: ChannelCapabilities,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::with_capabilities(ChannelCapabilities {
            max_message_length: 4096,
            supports_drafts: true,
            supports_threads: true,
        })
    }

    pub fn with_capabilities(capabilities: ChannelCapabilities) -> Self {
        Self {
            start: Instant::now(),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
            events: Arc::new(Mutex::new(Vec::new())),
            edit_rate_limits: Arc::new(Mutex::new(HashMap::new())),
            edit_attempts: AtomicU64::new(0),
            fail_all_edits: AtomicBool::new(false),
            send_failures: Arc::new(Mutex::new(VecDeque::new())),
            next_id: AtomicU64::new(1),
            capabilities,
        }
    }

    /// Queue an inbound message for `receive()`.
    pub async fn inject_message(&self, msg: InboundMessage) {
        self.inbound.lock().await.push_back(msg);
        self.notify.notify_one();
    }

    /// Makes `receive()` fail once the inbound queue is empty.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Rejects the `attempt`-th edit (1-based) with a rate limit.
    pub async fn rate_limit_edit(&self, attempt: u64, retry_after: Duration) {
        self.edit_rate_limits
            .lock()
            .await
            .insert(attempt, retry_after);
    }

    /// Makes every edit fail with a transport error.
    pub fn fail_edits(&self) {
        self.fail_all_edits.store(true, Ordering::SeqCst);
    }

    /// Queue an error for the next `send()`.
    pub async fn fail_next_send(&self, error: ParleyError) {
        self.send_failures.lock().await.push_back(error);
    }

    pub async fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().await.clone()
    }

    /// Texts of successful `send()` calls in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Sent { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Edit attempts as (text, offset from channel creation).
    pub async fn edits(&self) -> Vec<(String, Duration)> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::DraftEdited { text, at } => Some((text.clone(), *at)),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_events(&self) {
        self.events.lock().await.clear();
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(format!("mock-msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn capabilities(&self) -> ChannelCapabilities {
        self.capabilities
    }

    async fn connect(&mut self) -> Result<(), ParleyError> {
        Ok(())
    }

    async fn receive(&self) -> Result<InboundMessage, ParleyError> {
        loop {
            let notified = self.notify.notified();
            {
                let mut queue = self.inbound.lock().await;
                if let Some(msg) = queue.pop_front() {
                    return Ok(msg);
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(ParleyError::channel("mock channel closed"));
            }
            notified.await;
        }
    }

    async fn create_draft(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<DraftHandle, ParleyError> {
        self.events.lock().await.push(ChannelEvent::DraftCreated {
            chat_id,
            thread_id,
            text: text.to_string(),
        });
        Ok(DraftHandle {
            chat_id,
            thread_id,
            message_id: self.next_message_id(),
        })
    }

    async fn edit_draft(&self, _draft: &DraftHandle, text: &str) -> Result<(), ParleyError> {
        let attempt = self.edit_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.events.lock().await.push(ChannelEvent::DraftEdited {
            text: text.to_string(),
            at: self.start.elapsed(),
        });
        if let Some(retry_after) = self.edit_rate_limits.lock().await.remove(&attempt) {
            return Err(ParleyError::RateLimited { retry_after });
        }
        if self.fail_all_edits.load(Ordering::SeqCst) {
            return Err(ParleyError::channel("edit failed"));
        }
        Ok(())
    }

    async fn discard_draft(&self, _draft: &DraftHandle) -> Result<(), ParleyError> {
        self.events.lock().await.push(ChannelEvent::DraftDiscarded);
        Ok(())
    }

    async fn send(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<MessageId, ParleyError> {
        if let Some(error) = self.send_failures.lock().await.pop_front() {
            return Err(error);
        }
        self.events.lock().await.push(ChannelEvent::Sent {
            chat_id,
            thread_id,
            text: text.to_string(),
            at: self.start.elapsed(),
        });
        Ok(self.next_message_id())
    }
}
