// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plan resolution and daily reset rules.

use chrono::{DateTime, Duration, Utc};
use parley_core::{TariffPlan, UsageRecord};

/// The plan whose limits apply right now.
///
/// A paid plan with a past expiry counts as free.
pub fn effective_plan(record: &UsageRecord, now: DateTime<Utc>) -> TariffPlan {
    match record.subscription_expires_at {
        Some(expires) if expires <= now && record.tariff_plan != TariffPlan::Free => {
            TariffPlan::Free
        }
        _ => record.tariff_plan,
    }
}

/// Daily counters reset after a full day has passed or when the UTC date
/// changed since the last reset.
pub fn needs_daily_reset(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - last_reset > Duration::days(1) || now.date_naive() != last_reset.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(plan: TariffPlan, expires: Option<DateTime<Utc>>) -> UsageRecord {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        UsageRecord {
            user_id: 1,
            username: None,
            tariff_plan: plan,
            requests_today: 0,
            tokens_today: 0,
            total_requests: 0,
            limits_updated_at: t,
            subscription_expires_at: expires,
            created_at: t,
        }
    }

    #[test]
    fn same_day_does_not_reset() {
        let a = Utc.with_ymd_and_hms(2026, 5, 4, 1, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 0).unwrap();
        assert!(!needs_daily_reset(a, b));
    }

    #[test]
    fn new_calendar_day_resets() {
        let a = Utc.with_ymd_and_hms(2026, 5, 4, 23, 50, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 5, 5, 0, 10, 0).unwrap();
        assert!(needs_daily_reset(a, b));
    }

    #[test]
    fn more_than_a_day_resets() {
        let a = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
        assert!(needs_daily_reset(a, a + Duration::hours(25)));
    }

    #[test]
    fn expired_subscription_is_free() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let past = now - Duration::days(1);
        let future = now + Duration::days(1);
        assert_eq!(effective_plan(&record(TariffPlan::Pro, Some(past)), now), TariffPlan::Free);
        assert_eq!(effective_plan(&record(TariffPlan::Pro, Some(future)), now), TariffPlan::Pro);
        assert_eq!(effective_plan(&record(TariffPlan::Ultra, None), now), TariffPlan::Ultra);
    }
}
