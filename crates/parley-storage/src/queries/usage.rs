// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user usage counters and tariff state.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use parley_core::{ParleyError, TariffPlan, UsageRecord};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, from_sql_time, map_tr_err, to_sql_time};

/// Fetches a user's usage record.
pub async fn get_usage(db: &Database, user_id: i64) -> Result<Option<UsageRecord>, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT user_id, username, tariff_plan, requests_today, tokens_today,
                        total_requests, limits_updated_at, subscription_expires_at, created_at
                 FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let plan: String = row.get(2)?;
                    let limits_updated_at: String = row.get(6)?;
                    let expires_at: Option<String> = row.get(7)?;
                    let created_at: String = row.get(8)?;
                    Ok(UsageRecord {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        // Unknown plan names fall back to the free tier.
                        tariff_plan: TariffPlan::from_str(&plan).unwrap_or_default(),
                        requests_today: row.get(3)?,
                        tokens_today: row.get(4)?,
                        total_requests: row.get(5)?,
                        limits_updated_at: from_sql_time(6, &limits_updated_at)?,
                        subscription_expires_at: expires_at
                            .as_deref()
                            .map(|t| from_sql_time(7, t))
                            .transpose()?,
                        created_at: from_sql_time(8, &created_at)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts a free-plan record for `user_id` unless one exists.
pub async fn create_usage(
    db: &Database,
    user_id: i64,
    username: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), ParleyError> {
    let username = username.map(str::to_string);
    let now = to_sql_time(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (user_id, username, tariff_plan, limits_updated_at, created_at)
                 VALUES (?1, ?2, 'free', ?3, ?3)",
                params![user_id, username, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Adds to the daily and lifetime counters in one statement.
pub async fn add_usage(
    db: &Database,
    user_id: i64,
    requests: u32,
    tokens: u64,
) -> Result<(), ParleyError> {
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET
                    requests_today = requests_today + ?2,
                    tokens_today = tokens_today + ?3,
                    total_requests = total_requests + ?2
                 WHERE user_id = ?1",
                params![user_id, requests, tokens],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        tracing::debug!(user_id, "usage update for unknown user ignored");
    }
    Ok(())
}

/// Zeroes the daily counters and records when that happened.
pub async fn reset_daily_usage(
    db: &Database,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<(), ParleyError> {
    let now = to_sql_time(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET requests_today = 0, tokens_today = 0, limits_updated_at = ?2
                 WHERE user_id = ?1",
                params![user_id, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Sets a user's tariff plan and optional expiry.
pub async fn update_subscription(
    db: &Database,
    user_id: i64,
    plan: TariffPlan,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), ParleyError> {
    let plan = plan.to_string();
    let expires_at = expires_at.map(to_sql_time);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE users SET tariff_plan = ?2, subscription_expires_at = ?3
                 WHERE user_id = ?1",
                params![user_id, plan, expires_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_is_insert_if_absent() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        create_usage(&db, 42, Some("alice"), now).await.unwrap();
        add_usage(&db, 42, 1, 100).await.unwrap();
        create_usage(&db, 42, Some("other"), now).await.unwrap();

        let record = get_usage(&db, 42).await.unwrap().unwrap();
        assert_eq!(record.username.as_deref(), Some("alice"));
        assert_eq!(record.tariff_plan, TariffPlan::Free);
        assert_eq!(record.requests_today, 1);
        assert_eq!(record.tokens_today, 100);
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_usage(&db, 1).await.unwrap().is_none());
        add_usage(&db, 1, 1, 1).await.unwrap();
    }

    #[tokio::test]
    async fn reset_clears_daily_but_keeps_total() {
        let (db, _dir) = setup_db().await;
        let start = Utc::now() - Duration::days(2);
        create_usage(&db, 5, None, start).await.unwrap();
        add_usage(&db, 5, 1, 500).await.unwrap();
        add_usage(&db, 5, 1, 700).await.unwrap();

        let now = Utc::now();
        reset_daily_usage(&db, 5, now).await.unwrap();
        let record = get_usage(&db, 5).await.unwrap().unwrap();
        assert_eq!(record.requests_today, 0);
        assert_eq!(record.tokens_today, 0);
        assert_eq!(record.total_requests, 2);
        assert_eq!(record.limits_updated_at, now);
        assert_eq!(record.created_at, start);
    }

    #[tokio::test]
    async fn subscription_update_round_trips() {
        let (db, _dir) = setup_db().await;
        create_usage(&db, 9, None, Utc::now()).await.unwrap();
        let expires = Utc::now() + Duration::days(30);
        update_subscription(&db, 9, TariffPlan::Pro, Some(expires))
            .await
            .unwrap();
        let record = get_usage(&db, 9).await.unwrap().unwrap();
        assert_eq!(record.tariff_plan, TariffPlan::Pro);
        assert_eq!(record.subscription_expires_at, Some(expires));
    }
}
