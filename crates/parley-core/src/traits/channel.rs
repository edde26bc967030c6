// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the messaging transport.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelCapabilities, DraftHandle, InboundMessage, MessageId};

/// Adapter for a bidirectional messaging transport.
///
/// Calls that the transport refuses because of flood control fail with
/// [`ParleyError::RateLimited`]; every other failure is
/// [`ParleyError::Channel`].
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Returns the capabilities supported by this channel.
    fn capabilities(&self) -> ChannelCapabilities;

    /// Establishes a connection to the messaging platform.
    async fn connect(&mut self) -> Result<(), ParleyError>;

    /// Receives the next inbound message from the channel.
    async fn receive(&self) -> Result<InboundMessage, ParleyError>;

    /// Creates an editable draft message showing `text`.
    async fn create_draft(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<DraftHandle, ParleyError>;

    /// Replaces the visible text of a draft.
    async fn edit_draft(&self, draft: &DraftHandle, text: &str) -> Result<(), ParleyError>;

    /// Removes a draft once the final message has been sent.
    async fn discard_draft(&self, draft: &DraftHandle) -> Result<(), ParleyError>;

    /// Sends a regular, non-draft message.
    async fn send(
        &self,
        chat_id: i64,
        thread_id: Option<i64>,
        text: &str,
    ) -> Result<MessageId, ParleyError>;
}
