// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde attributes cannot express and reports all of
//! them at once.

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

/// Hard ceiling the messaging transport puts on one message.
const TRANSPORT_MESSAGE_LIMIT: usize = 4096;

/// Validates a deserialized configuration, collecting every violation.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.agent.history_cap < 2 {
        errors.push(ConfigError::validation(format!(
            "agent.history_cap must be at least 2, got {}",
            config.agent.history_cap
        )));
    }

    let search = &config.search;
    if search.per_domain_cap == 0 {
        errors.push(ConfigError::validation(
            "search.per_domain_cap must be at least 1",
        ));
    }
    if search.total_cap < search.per_domain_cap {
        errors.push(ConfigError::validation(format!(
            "search.total_cap ({}) must not be smaller than search.per_domain_cap ({})",
            search.total_cap, search.per_domain_cap
        )));
    }
    if !(1..=3).contains(&search.max_queries) {
        errors.push(ConfigError::validation(format!(
            "search.max_queries must be between 1 and 3, got {}",
            search.max_queries
        )));
    }
    if search.results_per_query == 0 {
        errors.push(ConfigError::validation(
            "search.results_per_query must be at least 1",
        ));
    }

    let delivery = &config.delivery;
    if delivery.max_part_len == 0 || delivery.max_part_len > TRANSPORT_MESSAGE_LIMIT {
        errors.push(ConfigError::validation(format!(
            "delivery.max_part_len must be between 1 and {TRANSPORT_MESSAGE_LIMIT}, got {}",
            delivery.max_part_len
        )));
    }
    if delivery.max_draft_len == 0 || delivery.max_draft_len >= delivery.max_part_len {
        errors.push(ConfigError::validation(format!(
            "delivery.max_draft_len ({}) must be positive and below delivery.max_part_len ({})",
            delivery.max_draft_len, delivery.max_part_len
        )));
    }
    if delivery.final_send_attempts == 0 {
        errors.push(ConfigError::validation(
            "delivery.final_send_attempts must be at least 1",
        ));
    }

    if !(0.0..=2.0).contains(&config.llm.router_temperature) {
        errors.push(ConfigError::validation(format!(
            "llm.router_temperature must be between 0.0 and 2.0, got {}",
            config.llm.router_temperature
        )));
    }
    if config.llm.base_url.trim().is_empty() {
        errors.push(ConfigError::validation("llm.base_url must not be empty"));
    }
    if config.llm.router_context_messages == 0 {
        errors.push(ConfigError::validation(
            "llm.router_context_messages must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
