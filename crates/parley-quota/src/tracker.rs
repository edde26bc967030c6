// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user daily quota enforcement backed by the storage adapter.
//!
//! Counters live in storage so limits survive restarts. A turn calls
//! [`QuotaTracker::check`] before any backend work and
//! [`QuotaTracker::record`] after it succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_config::model::{PlanLimits, QuotaConfig};
use parley_core::{ParleyError, StorageAdapter, TariffPlan, UsageRecord};
use tracing::{debug, info, warn};

use crate::plans::{effective_plan, needs_daily_reset};

/// Outcome of a quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { plan: TariffPlan },
    Denied { plan: TariffPlan, reason: String },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Enforces tariff limits using stored usage records.
pub struct QuotaTracker {
    storage: Arc<dyn StorageAdapter>,
    config: QuotaConfig,
}

impl QuotaTracker {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: QuotaConfig) -> Self {
        Self { storage, config }
    }

    /// Returns the user's record, creating a free-plan one on first contact
    /// and applying the daily reset when due.
    pub async fn ensure_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UsageRecord, ParleyError> {
        self.storage.create_usage(user_id, username, now).await?;
        let mut record = self.load(user_id).await?;

        if needs_daily_reset(record.limits_updated_at, now) {
            self.storage.reset_daily_usage(user_id, now).await?;
            debug!(user_id, "daily usage counters reset");
            record.requests_today = 0;
            record.tokens_today = 0;
            record.limits_updated_at = now;
        }
        Ok(record)
    }

    /// Decides whether the user may start another turn.
    pub async fn check(
        &self,
        user_id: i64,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, ParleyError> {
        let record = self.ensure_user(user_id, username, now).await?;
        let plan = effective_plan(&record, now);
        if !self.config.enabled {
            return Ok(QuotaDecision::Allowed { plan });
        }
        let decision = evaluate(&record, plan, self.config.limits(plan));
        if let QuotaDecision::Denied { reason, .. } = &decision {
            info!(user_id, plan = %plan, reason = %reason, "quota exhausted");
        }
        Ok(decision)
    }

    /// Counts one finished turn and its tokens.
    pub async fn record(&self, user_id: i64, tokens: u64) -> Result<(), ParleyError> {
        self.storage.add_usage(user_id, 1, tokens).await
    }

    /// Changes a user's plan.
    pub async fn update_subscription(
        &self,
        user_id: i64,
        plan: TariffPlan,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), ParleyError> {
        self.storage
            .update_subscription(user_id, plan, expires_at)
            .await?;
        info!(user_id, plan = %plan, expires_at = ?expires_at, "subscription updated");
        Ok(())
    }

    async fn load(&self, user_id: i64) -> Result<UsageRecord, ParleyError> {
        self.storage
            .get_usage(user_id)
            .await?
            .ok_or_else(|| ParleyError::Internal(format!("usage record for {user_id} missing after insert")))
    }
}

/// Compares today's counters against plan limits. Warns at 80% of a limit.
pub fn evaluate(record: &UsageRecord, plan: TariffPlan, limits: PlanLimits) -> QuotaDecision {
    if let Some(max) = limits.requests_per_day {
        if record.requests_today >= max {
            return QuotaDecision::Denied {
                plan,
                reason: format!(
                    "Daily limit of {max} requests on the {plan} plan reached. It resets tomorrow."
                ),
            };
        }
        if u64::from(record.requests_today) * 10 >= u64::from(max) * 8 {
            warn!(user_id = record.user_id, used = record.requests_today, max, "approaching daily request limit (80%+)");
        }
    }
    if let Some(max) = limits.tokens_per_day {
        if record.tokens_today >= max {
            return QuotaDecision::Denied {
                plan,
                reason: format!(
                    "Daily limit of {max} tokens on the {plan} plan reached. It resets tomorrow."
                ),
            };
        }
        if record.tokens_today.saturating_mul(10) >= max.saturating_mul(8) {
            warn!(user_id = record.user_id, used = record.tokens_today, max, "approaching daily token limit (80%+)");
        }
    }
    QuotaDecision::Allowed { plan }
}
