// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::{
    AdapterType, ConversationKey, HealthStatus, History, ParleyError, PluginAdapter,
    StorageAdapter, TariffPlan, UsageRecord,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened on the first call to
/// [`StorageAdapter::initialize`]; every other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Creates the adapter without touching the filesystem.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        self.db()?
            .connection()
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- History ---

    async fn load_history(&self, key: &ConversationKey) -> Result<History, ParleyError> {
        queries::history::load_history(self.db()?, key).await
    }

    async fn save_history(
        &self,
        key: &ConversationKey,
        history: &History,
    ) -> Result<(), ParleyError> {
        queries::history::save_history(self.db()?, key, history).await
    }

    async fn clear_history(&self, key: &ConversationKey) -> Result<(), ParleyError> {
        queries::history::clear_history(self.db()?, key).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationKey>, ParleyError> {
        queries::history::list_conversations(self.db()?).await
    }

    // --- Usage ---

    async fn get_usage(&self, user_id: i64) -> Result<Option<UsageRecord>, ParleyError> {
        queries::usage::get_usage(self.db()?, user_id).await
    }

    async fn create_usage(
        &self,
        user_id: i64,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ParleyError> {
        queries::usage::create_usage(self.db()?, user_id, username, now).await
    }

    async fn add_usage(&self, user_id: i64, requests: u32, tokens: u64) -> Result<(), ParleyError> {
        queries::usage::add_usage(self.db()?, user_id, requests, tokens).await
    }

    async fn reset_daily_usage(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), ParleyError> {
        queries::usage::reset_daily_usage(self.db()?, user_id, now).await
    }

    async fn update_subscription(
        &self,
        user_id: i64,
        plan: TariffPlan,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), ParleyError> {
        queries::usage::update_subscription(self.db()?, user_id, plan, expires_at).await
    }
}
