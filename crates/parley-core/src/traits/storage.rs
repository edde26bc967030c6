// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for conversation history and usage persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationKey, History, TariffPlan, UsageRecord};

/// Adapter for persistent storage backends.
///
/// History is stored as one opaque record per [`ConversationKey`]; the
/// adapter does not validate or trim it.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (create tables, run migrations).
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Closes the storage backend, flushing any pending writes.
    async fn close(&self) -> Result<(), ParleyError>;

    // --- History ---

    /// Loads the stored history, or an empty one when the key is unknown.
    async fn load_history(&self, key: &ConversationKey) -> Result<History, ParleyError>;

    /// Replaces the stored history for `key` (insert or overwrite).
    async fn save_history(&self, key: &ConversationKey, history: &History)
    -> Result<(), ParleyError>;

    /// Deletes the stored history. Clearing an unknown key is not an error.
    async fn clear_history(&self, key: &ConversationKey) -> Result<(), ParleyError>;

    /// Lists every conversation with stored history.
    async fn list_conversations(&self) -> Result<Vec<ConversationKey>, ParleyError>;

    // --- Usage ---

    /// Fetches a user's usage record.
    async fn get_usage(&self, user_id: i64) -> Result<Option<UsageRecord>, ParleyError>;

    /// Creates a free-plan usage record unless one already exists.
    async fn create_usage(
        &self,
        user_id: i64,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ParleyError>;

    /// Adds to the daily and lifetime counters.
    async fn add_usage(&self, user_id: i64, requests: u32, tokens: u64)
    -> Result<(), ParleyError>;

    /// Zeroes the daily counters and stamps the reset time.
    async fn reset_daily_usage(&self, user_id: i64, now: DateTime<Utc>)
    -> Result<(), ParleyError>;

    /// Changes a user's tariff plan and its expiry.
    async fn update_subscription(
        &self,
        user_id: i64,
        plan: TariffPlan,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), ParleyError>;
}
