// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM chat-completion backends.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse, ProviderStreamChunk};

/// Boxed stream of provider events.
pub type ProviderStream =
    Pin<Box<dyn Stream<Item = Result<ProviderStreamChunk, ParleyError>> + Send>>;

/// Adapter for LLM provider integrations.
///
/// Supports both single-shot completion (used for routing decisions) and
/// streaming responses (used for the answer itself).
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ParleyError>;

    /// Sends a completion request and returns a stream of response events.
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, ParleyError>;
}
