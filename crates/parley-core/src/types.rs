// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and pipeline stages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Thread id stored for conversations outside of a forum topic.
pub const NO_THREAD: i64 = 0;

/// Identifies one conversation: a user in a chat, optionally inside a thread.
///
/// An absent thread is normalized to [`NO_THREAD`] so that "no thread" and
/// "thread 0" address the same stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationKey {
    pub user_id: i64,
    pub chat_id: i64,
    pub thread_id: i64,
}

impl ConversationKey {
    pub fn new(user_id: i64, chat_id: i64, thread_id: Option<i64>) -> Self {
        Self {
            user_id,
            chat_id,
            thread_id: thread_id.unwrap_or(NO_THREAD),
        }
    }

    /// The thread id as the transport expects it (`None` outside of threads).
    pub fn thread(&self) -> Option<i64> {
        (self.thread_id != NO_THREAD).then_some(self.thread_id)
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user_id, self.chat_id, self.thread_id)
    }
}

/// Unique identifier for a message on the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Storage,
    Search,
}

// --- Conversation types ---

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered message history of one conversation.
///
/// Serialized as a plain JSON array of messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<Message>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The most recent message authored by the user, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.0.iter().rev().find(|m| m.role == Role::User)
    }

    /// Drops the oldest messages until at most `cap` remain.
    ///
    /// A leading system message is kept in place and counts toward the cap.
    pub fn retain_recent(&mut self, cap: usize) {
        if self.0.len() <= cap {
            return;
        }
        let pinned = usize::from(cap > 0 && self.0.first().is_some_and(|m| m.role == Role::System));
        let excess = self.0.len() - cap;
        self.0.drain(pinned..pinned + excess);
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }
}

impl From<Vec<Message>> for History {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

// --- Routing and search types ---

/// Whether the latest user turn needs fresh web results, and which queries to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub search_needed: bool,
    #[serde(default)]
    pub queries: Vec<String>,
}

impl RouteDecision {
    /// The soft-fail default: answer from history alone.
    pub fn no_search() -> Self {
        Self::default()
    }
}

/// A raw hit returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// A search hit annotated with the domain it was deduplicated under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub domain: String,
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Outcome of the search stage handed to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchContext {
    /// Deduplicated results in discovery order.
    Results(Vec<SearchResult>),
    /// A search ran but nothing usable came back.
    NoResults,
}

impl SearchContext {
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Results(results) => results,
            Self::NoResults => &[],
        }
    }

    /// Numbered source links, one per result, in discovery order.
    pub fn sources(&self) -> Vec<SourceLink> {
        self.results()
            .iter()
            .enumerate()
            .map(|(i, r)| SourceLink {
                index: i + 1,
                title: r.title.clone(),
                url: r.url.clone(),
            })
            .collect()
    }
}

/// A numbered reference to a search result shown under the final answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLink {
    pub index: usize,
    pub title: String,
    pub url: String,
}

// --- Provider types ---

/// Reasoning effort hint for models that support it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// A request to an LLM provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Ask the provider to constrain output to a JSON object.
    pub json_response: bool,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
            json_response: false,
        }
    }
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A response from an LLM provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

/// Kind of event carried by a [`ProviderStreamChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    ContentDelta,
    Usage,
    Stop,
    Error,
}

/// A single event from a streaming LLM provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderStreamChunk {
    pub event_type: StreamEventType,
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub error: Option<String>,
}

impl ProviderStreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::ContentDelta,
            text: Some(text.into()),
            usage: None,
            finish_reason: None,
            error: None,
        }
    }

    pub fn usage(usage: TokenUsage) -> Self {
        Self {
            event_type: StreamEventType::Usage,
            text: None,
            usage: Some(usage),
            finish_reason: None,
            error: None,
        }
    }

    pub fn stop(finish_reason: Option<String>) -> Self {
        Self {
            event_type: StreamEventType::Stop,
            text: None,
            usage: None,
            finish_reason,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Error,
            text: None,
            usage: None,
            finish_reason: None,
            error: Some(message.into()),
        }
    }
}

// --- Channel types ---

/// Bot commands understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    Start,
    Clear,
}

/// What an inbound message carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text(String),
    Command(Command),
    /// Media or anything else the assistant cannot answer.
    Unsupported,
}

/// An inbound message received from a channel adapter.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub key: ConversationKey,
    pub username: Option<String>,
    pub content: InboundContent,
    pub received_at: DateTime<Utc>,
}

/// Capabilities reported by a channel adapter.
#[derive(Debug, Clone, Copy)]
pub struct ChannelCapabilities {
    pub max_message_length: usize,
    pub supports_drafts: bool,
    pub supports_threads: bool,
}

/// Reference to an in-progress draft message that can be edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftHandle {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
    pub message_id: MessageId,
}

// --- Usage and tariff types ---

/// Subscription tier that determines daily limits.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TariffPlan {
    #[default]
    Free,
    Pro,
    Ultra,
}

/// Per-user usage counters and subscription state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: i64,
    pub username: Option<String>,
    pub tariff_plan: TariffPlan,
    pub requests_today: u32,
    pub tokens_today: u64,
    pub total_requests: u64,
    pub limits_updated_at: DateTime<Utc>,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_normalizes_missing_thread() {
        let a = ConversationKey::new(1, 2, None);
        let b = ConversationKey::new(1, 2, Some(0));
        assert_eq!(a, b);
        assert_eq!(a.thread(), None);
        assert_eq!(ConversationKey::new(1, 2, Some(7)).thread(), Some(7));
        assert_eq!(a.to_string(), "1:2:0");
    }

    #[test]
    fn history_serializes_as_plain_array() {
        let mut h = History::new();
        h.push(Message::user("hi"));
        h.push(Message::assistant("hello"));
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#
        );
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn retain_recent_keeps_newest() {
        let mut h: History = (0..25).map(|i| Message::user(i.to_string())).collect::<Vec<_>>().into();
        h.retain_recent(20);
        assert_eq!(h.len(), 20);
        assert_eq!(h.messages()[0].content, "5");
        assert_eq!(h.messages()[19].content, "24");
    }

    #[test]
    fn retain_recent_pins_leading_system_message() {
        let mut msgs = vec![Message::system("be brief")];
        msgs.extend((0..10).map(|i| Message::user(i.to_string())));
        let mut h = History::from(msgs);
        h.retain_recent(4);
        let contents: Vec<_> = h.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["be brief", "7", "8", "9"]);
    }

    #[test]
    fn retain_recent_noop_under_cap() {
        let mut h = History::from(vec![Message::user("a")]);
        h.retain_recent(20);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn last_user_message_skips_assistant() {
        let h = History::from(vec![Message::user("q"), Message::assistant("a")]);
        assert_eq!(h.last_user_message().unwrap().content, "q");
    }

    #[test]
    fn route_decision_requires_flag() {
        assert!(serde_json::from_str::<RouteDecision>(r#"{"queries":["x"]}"#).is_err());
        let d: RouteDecision = serde_json::from_str(r#"{"search_needed":false}"#).unwrap();
        assert_eq!(d, RouteDecision::no_search());
    }

    #[test]
    fn search_context_sources_are_numbered_in_order() {
        let ctx = SearchContext::Results(vec![
            SearchResult {
                domain: "a.com".into(),
                title: "A".into(),
                body: String::new(),
                url: "https://a.com/1".into(),
            },
            SearchResult {
                domain: "b.com".into(),
                title: "B".into(),
                body: String::new(),
                url: "https://b.com/1".into(),
            },
        ]);
        let sources = ctx.sources();
        assert_eq!(sources[0].index, 1);
        assert_eq!(sources[1].url, "https://b.com/1");
        assert!(SearchContext::NoResults.sources().is_empty());
    }

    #[test]
    fn tariff_plan_parses_lowercase() {
        use std::str::FromStr;
        assert_eq!(TariffPlan::from_str("ultra").unwrap(), TariffPlan::Ultra);
        assert_eq!(TariffPlan::Pro.to_string(), "pro");
        assert_eq!(TariffPlan::default(), TariffPlan::Free);
    }

    proptest::proptest! {
        #[test]
        fn retain_recent_never_exceeds_cap(len in 0usize..60, cap in 1usize..30) {
            let mut h: History = (0..len).map(|i| Message::user(i.to_string())).collect::<Vec<_>>().into();
            h.retain_recent(cap);
            proptest::prop_assert!(h.len() <= cap);
            proptest::prop_assert_eq!(h.len(), len.min(cap));
            if len > 0 {
                proptest::prop_assert_eq!(h.messages().last().unwrap().content.clone(), (len - 1).to_string());
            }
        }
    }
}
