// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tariff plans and daily usage quotas.
//!
//! - [`QuotaTracker`]: storage-backed per-user request and token limits
//! - [`plans`]: effective plan resolution and the daily reset rule

pub mod plans;
pub mod tracker;

pub use plans::{effective_plan, needs_daily_reset};
pub use tracker::{QuotaDecision, QuotaTracker, evaluate};
