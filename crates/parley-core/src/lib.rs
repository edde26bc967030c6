// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley chat assistant.
//!
//! Foundational trait definitions, error types, and common types used
//! throughout the workspace. Every adapter implements traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ParleyError;
pub use types::{
    AdapterType, ChannelCapabilities, Command, ConversationKey, DraftHandle, HealthStatus,
    History, InboundContent, InboundMessage, Message, MessageId, ProviderRequest,
    ProviderResponse, ProviderStreamChunk, ReasoningEffort, Role, RouteDecision, SearchContext,
    SearchHit, SearchResult, SourceLink, StreamEventType, TariffPlan, TokenUsage, UsageRecord,
};

pub use traits::{
    ChannelAdapter, PluginAdapter, ProviderAdapter, ProviderStream, SearchAdapter,
    StorageAdapter,
};
