// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley chat assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use parley_core::TariffPlan;
use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Every section is optional and falls back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Assistant identity, prompts, and user-facing notices.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Telegram bot integration settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// OpenAI-compatible backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Streaming delivery pacing and message limits.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tariff plans and daily quotas.
    #[serde(default)]
    pub quota: QuotaConfig,
}

/// Assistant identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the assistant.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Maximum number of messages kept per conversation.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Shown when a turn fails for any internal reason.
    #[serde(default = "default_failure_notice")]
    pub failure_notice: String,

    /// Shown when a message arrives while the previous turn is still running.
    #[serde(default = "default_busy_notice")]
    pub busy_notice: String,

    /// Reply to `/start`.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Reply to `/clear`.
    #[serde(default = "default_cleared_notice")]
    pub cleared_notice: String,

    /// Reply to media and other non-text messages.
    #[serde(default = "default_unsupported_notice")]
    pub unsupported_notice: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
            history_cap: default_history_cap(),
            failure_notice: default_failure_notice(),
            busy_notice: default_busy_notice(),
            welcome_message: default_welcome_message(),
            cleared_notice: default_cleared_notice(),
            unsupported_notice: default_unsupported_notice(),
        }
    }
}

impl AgentConfig {
    /// Resolves the system prompt: file contents first, then the inline string,
    /// then the built-in default.
    pub fn resolve_system_prompt(&self) -> String {
        if let Some(path) = &self.system_prompt_file {
            match std::fs::read_to_string(path) {
                Ok(content) if !content.trim().is_empty() => return content,
                Ok(_) => tracing::warn!(path = %path, "system prompt file is empty, ignoring"),
                Err(e) => tracing::warn!(path = %path, error = %e, "cannot read system prompt file"),
            }
        }
        self.system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant in a messenger chat. \
Answer in the language of the user's message. Be accurate and concise; use short paragraphs \
and lists where they help. When web search results are provided, rely on them for current \
facts and refer to them by their [n] number.";

fn default_agent_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_history_cap() -> usize {
    20
}

fn default_failure_notice() -> String {
    "Sorry, something went wrong while answering. Please try again.".to_string()
}

fn default_busy_notice() -> String {
    "Please wait, I'm still answering your previous message.".to_string()
}

fn default_welcome_message() -> String {
    "Hi! Send me a message and I'll answer. Use /clear to start a new conversation.".to_string()
}

fn default_cleared_notice() -> String {
    "Conversation history cleared.".to_string()
}

fn default_unsupported_notice() -> String {
    "I can only read text messages for now.".to_string()
}

/// Telegram bot integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables Telegram integration.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Allowed Telegram user IDs or usernames. Empty allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

/// OpenAI-compatible chat-completions backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// API key. `None` requires the `PARLEY_LLM_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the chat-completions API (without `/chat/completions`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used to generate answers.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for search routing decisions. Defaults to `model`.
    #[serde(default)]
    pub router_model: Option<String>,

    /// Sampling temperature for routing decisions.
    #[serde(default = "default_router_temperature")]
    pub router_temperature: f32,

    /// How many recent messages the router sees.
    #[serde(default = "default_router_context_messages")]
    pub router_context_messages: usize,

    /// Maximum tokens for a generated answer. `None` leaves it to the backend.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            router_model: None,
            router_temperature: default_router_temperature(),
            router_context_messages: default_router_context_messages(),
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// The model used for routing decisions.
    pub fn router_model(&self) -> &str {
        self.router_model.as_deref().unwrap_or(&self.model)
    }
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "openai/gpt-oss-20b".to_string()
}

fn default_router_temperature() -> f32 {
    0.1
}

fn default_router_context_messages() -> usize {
    6
}

fn default_llm_timeout_secs() -> u64 {
    120
}

/// Web search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Enable web search. When disabled every turn answers from history alone.
    #[serde(default = "default_search_enabled")]
    pub enabled: bool,

    /// Hits requested from the provider per query.
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Maximum results kept from a single domain.
    #[serde(default = "default_per_domain_cap")]
    pub per_domain_cap: usize,

    /// Maximum results kept across all queries.
    #[serde(default = "default_total_cap")]
    pub total_cap: usize,

    /// Maximum queries taken from one routing decision.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Per-query request timeout in seconds.
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional region code passed to the provider (e.g. `us-en`).
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: default_search_enabled(),
            results_per_query: default_results_per_query(),
            per_domain_cap: default_per_domain_cap(),
            total_cap: default_total_cap(),
            max_queries: default_max_queries(),
            timeout_secs: default_search_timeout_secs(),
            region: None,
        }
    }
}

fn default_search_enabled() -> bool {
    true
}

fn default_results_per_query() -> usize {
    6
}

fn default_per_domain_cap() -> usize {
    2
}

fn default_total_cap() -> usize {
    10
}

fn default_max_queries() -> usize {
    3
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// Streaming delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Minimum time between two draft edits, in milliseconds.
    #[serde(default = "default_min_flush_interval_ms")]
    pub min_flush_interval_ms: u64,

    /// Pause after each successful draft edit, in milliseconds.
    #[serde(default = "default_post_edit_pause_ms")]
    pub post_edit_pause_ms: u64,

    /// Pause between final message parts, in milliseconds.
    #[serde(default = "default_part_pause_ms")]
    pub part_pause_ms: u64,

    /// Maximum characters per final message part.
    #[serde(default = "default_max_part_len")]
    pub max_part_len: usize,

    /// Maximum characters shown in the draft.
    #[serde(default = "default_max_draft_len")]
    pub max_draft_len: usize,

    /// Text shown in the draft before the first chunk arrives.
    #[serde(default = "default_draft_placeholder")]
    pub draft_placeholder: String,

    /// Attempts per final part when the transport rate-limits the send.
    #[serde(default = "default_final_send_attempts")]
    pub final_send_attempts: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            min_flush_interval_ms: default_min_flush_interval_ms(),
            post_edit_pause_ms: default_post_edit_pause_ms(),
            part_pause_ms: default_part_pause_ms(),
            max_part_len: default_max_part_len(),
            max_draft_len: default_max_draft_len(),
            draft_placeholder: default_draft_placeholder(),
            final_send_attempts: default_final_send_attempts(),
        }
    }
}

fn default_min_flush_interval_ms() -> u64 {
    200
}

fn default_post_edit_pause_ms() -> u64 {
    50
}

fn default_part_pause_ms() -> u64 {
    100
}

fn default_max_part_len() -> usize {
    4096
}

fn default_max_draft_len() -> usize {
    4000
}

fn default_draft_placeholder() -> String {
    "…".to_string()
}

fn default_final_send_attempts() -> u32 {
    3
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Daily limits of one tariff plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlanLimits {
    #[serde(default)]
    pub requests_per_day: Option<u32>,

    #[serde(default)]
    pub tokens_per_day: Option<u64>,
}

/// Tariff plans and quota enforcement.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Enforce daily limits. When disabled usage is still recorded.
    #[serde(default = "default_quota_enabled")]
    pub enabled: bool,

    #[serde(default = "default_free_limits")]
    pub free: PlanLimits,

    #[serde(default = "default_pro_limits")]
    pub pro: PlanLimits,

    #[serde(default)]
    pub ultra: PlanLimits,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: default_quota_enabled(),
            free: default_free_limits(),
            pro: default_pro_limits(),
            ultra: PlanLimits::default(),
        }
    }
}

impl QuotaConfig {
    /// Limits for a plan.
    pub fn limits(&self, plan: TariffPlan) -> PlanLimits {
        match plan {
            TariffPlan::Free => self.free,
            TariffPlan::Pro => self.pro,
            TariffPlan::Ultra => self.ultra,
        }
    }
}

fn default_quota_enabled() -> bool {
    true
}

fn default_free_limits() -> PlanLimits {
    PlanLimits {
        requests_per_day: Some(15),
        tokens_per_day: Some(7_500),
    }
}

fn default_pro_limits() -> PlanLimits {
    PlanLimits {
        requests_per_day: Some(200),
        tokens_per_day: Some(200_000),
    }
}
