// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming delivery of one answer to the messaging surface.
//!
//! The loop mirrors incoming text into an editable draft, coalescing edits
//! to at most one per flush interval and backing off when the transport
//! rate-limits. Once the chunk stream is exhausted the full text is split
//! into parts and sent as regular messages, with the numbered sources
//! appended to the last part.
//!
//! Progress edits are best effort. Only the final send can fail a turn.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use parley_config::model::DeliveryConfig;
use parley_core::{ChannelAdapter, ConversationKey, DraftHandle, ParleyError, SourceLink};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Appended to draft text cut at the draft length limit.
pub const TRUNCATION_MARKER: &str = "\n\n[…]";

/// Phases of a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPhase {
    Idle,
    Streaming,
    RateLimited,
    Finalizing,
    Done,
}

impl std::fmt::Display for DeliveryPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryPhase::Idle => write!(f, "idle"),
            DeliveryPhase::Streaming => write!(f, "streaming"),
            DeliveryPhase::RateLimited => write!(f, "rate_limited"),
            DeliveryPhase::Finalizing => write!(f, "finalizing"),
            DeliveryPhase::Done => write!(f, "done"),
        }
    }
}

/// Mutable state of one delivery. Lives for a single turn.
#[derive(Debug)]
struct DeliveryState {
    phase: DeliveryPhase,
    accumulated: String,
    last_flush: Instant,
    rate_limited: bool,
    rate_limit_until: Option<Instant>,
    /// The draft already shows the truncated view; further edits change nothing.
    draft_saturated: bool,
    edits: u32,
}

impl DeliveryState {
    fn new(now: Instant) -> Self {
        Self {
            phase: DeliveryPhase::Idle,
            accumulated: String::new(),
            last_flush: now,
            rate_limited: false,
            rate_limit_until: None,
            draft_saturated: false,
            edits: 0,
        }
    }

    fn transition(&mut self, next: DeliveryPhase) {
        if self.phase != next {
            debug!(from = %self.phase, to = %next, "delivery phase change");
            self.phase = next;
        }
    }

    fn suppressed(&self, now: Instant) -> bool {
        self.rate_limited && self.rate_limit_until.is_some_and(|until| now < until)
    }

    fn mark_flushed(&mut self, now: Instant) {
        self.last_flush = now;
        self.rate_limited = false;
        self.rate_limit_until = None;
        self.edits += 1;
        self.transition(DeliveryPhase::Streaming);
    }

    fn mark_rate_limited(&mut self, now: Instant, retry_after: Duration) {
        self.rate_limited = true;
        self.rate_limit_until = Some(now + retry_after);
        self.transition(DeliveryPhase::RateLimited);
    }
}

/// What a finished delivery produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Full answer text exactly as streamed.
    pub text: String,
    /// Number of final messages sent.
    pub parts_sent: usize,
    /// Number of successful draft edits.
    pub draft_edits: u32,
}

/// Pushes one streamed answer to a channel.
pub struct DeliveryLoop {
    channel: Arc<dyn ChannelAdapter>,
    config: DeliveryConfig,
}

impl DeliveryLoop {
    pub fn new(channel: Arc<dyn ChannelAdapter>, config: DeliveryConfig) -> Self {
        Self { channel, config }
    }

    fn min_flush_interval(&self) -> Duration {
        Duration::from_millis(self.config.min_flush_interval_ms)
    }

    fn max_part_len(&self) -> usize {
        self.config
            .max_part_len
            .min(self.channel.capabilities().max_message_length)
    }

    /// Consumes `stream` to exhaustion and delivers the final text.
    ///
    /// A stream error aborts the delivery and is returned; so is a failure
    /// to send any final part. The draft is removed in every case.
    pub async fn deliver<S>(
        &self,
        key: &ConversationKey,
        stream: &mut S,
        sources: &[SourceLink],
    ) -> Result<DeliveryOutcome, ParleyError>
    where
        S: Stream<Item = Result<String, ParleyError>> + Unpin,
    {
        let mut state = DeliveryState::new(Instant::now());
        let draft = self.open_draft(key).await;
        state.transition(DeliveryPhase::Streaming);

        let result = match self.stream_into_draft(&mut state, draft.as_ref(), stream).await {
            Ok(()) => self.finalize(&mut state, key, sources).await,
            Err(e) => Err(e),
        };

        if let Some(draft) = &draft
            && let Err(e) = self.channel.discard_draft(draft).await
        {
            debug!(error = %e, "failed to discard draft");
        }
        result
    }

    async fn open_draft(&self, key: &ConversationKey) -> Option<DraftHandle> {
        if !self.channel.capabilities().supports_drafts {
            return None;
        }
        match self
            .channel
            .create_draft(key.chat_id, key.thread(), &self.config.draft_placeholder)
            .await
        {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!(key = %key, error = %e, "could not create draft, streaming without progress");
                None
            }
        }
    }

    async fn stream_into_draft<S>(
        &self,
        state: &mut DeliveryState,
        draft: Option<&DraftHandle>,
        stream: &mut S,
    ) -> Result<(), ParleyError>
    where
        S: Stream<Item = Result<String, ParleyError>> + Unpin,
    {
        while let Some(chunk) = stream.next().await {
            state.accumulated.push_str(&chunk?);

            let Some(draft) = draft else { continue };
            if state.draft_saturated {
                continue;
            }
            let now = Instant::now();
            if state.suppressed(now) {
                continue;
            }
            if now.duration_since(state.last_flush) < self.min_flush_interval() {
                continue;
            }
            self.flush(state, draft).await;
        }
        Ok(())
    }

    /// One progress update. Never fails the delivery.
    async fn flush(&self, state: &mut DeliveryState, draft: &DraftHandle) {
        match self.edit(state, draft).await {
            Ok(()) => {
                state.mark_flushed(Instant::now());
                sleep(Duration::from_millis(self.config.post_edit_pause_ms)).await;
            }
            Err(ParleyError::RateLimited { retry_after }) => {
                metrics::counter!("parley_delivery_rate_limited_total").increment(1);
                state.mark_rate_limited(Instant::now(), retry_after);
                warn!(
                    retry_after_ms = retry_after.as_millis() as u64,
                    buffered_chars = state.accumulated.len(),
                    "draft edit rate limited, waiting"
                );
                sleep(retry_after).await;

                match self.edit(state, draft).await {
                    Ok(()) => {
                        state.mark_flushed(Instant::now());
                        sleep(Duration::from_millis(self.config.post_edit_pause_ms)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "draft edit failed after rate-limit wait");
                        match e.retry_after() {
                            Some(again) => state.mark_rate_limited(Instant::now(), again),
                            None => {
                                state.rate_limited = false;
                                state.rate_limit_until = None;
                                state.transition(DeliveryPhase::Streaming);
                            }
                        }
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "draft edit failed, continuing");
            }
        }
    }

    async fn edit(&self, state: &mut DeliveryState, draft: &DraftHandle) -> Result<(), ParleyError> {
        let (view, truncated) = truncate_for_draft(&state.accumulated, self.config.max_draft_len);
        self.channel.edit_draft(draft, &view).await?;
        metrics::counter!("parley_delivery_edits_total").increment(1);
        if truncated {
            state.draft_saturated = true;
        }
        Ok(())
    }

    async fn finalize(
        &self,
        state: &mut DeliveryState,
        key: &ConversationKey,
        sources: &[SourceLink],
    ) -> Result<DeliveryOutcome, ParleyError> {
        state.transition(DeliveryPhase::Finalizing);
        if state.accumulated.trim().is_empty() {
            return Err(ParleyError::provider("backend returned an empty answer"));
        }

        let parts = compose_parts(&state.accumulated, sources, self.max_part_len());
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                sleep(Duration::from_millis(self.config.part_pause_ms)).await;
            }
            self.send_part(key, part).await?;
        }

        state.transition(DeliveryPhase::Done);
        info!(
            key = %key,
            chars = state.accumulated.chars().count(),
            parts = parts.len(),
            draft_edits = state.edits,
            sources = sources.len(),
            "answer delivered"
        );
        Ok(DeliveryOutcome {
            text: std::mem::take(&mut state.accumulated),
            parts_sent: parts.len(),
            draft_edits: state.edits,
        })
    }

    async fn send_part(&self, key: &ConversationKey, text: &str) -> Result<(), ParleyError> {
        let mut attempt = 1;
        loop {
            match self.channel.send(key.chat_id, key.thread(), text).await {
                Ok(_) => return Ok(()),
                Err(ParleyError::RateLimited { retry_after })
                    if attempt < self.config.final_send_attempts =>
                {
                    metrics::counter!("parley_delivery_rate_limited_total").increment(1);
                    warn!(
                        attempt,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "final send rate limited, waiting"
                    );
                    sleep(retry_after).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Cuts `text` to `max_chars` characters, marker included, when it is longer.
///
/// Returns the text to show and whether it was cut.
pub fn truncate_for_draft(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}

/// Splits `text` into parts of at most `max_chars` characters.
///
/// Each cut prefers the last newline inside the window, then the last
/// space, and only cuts hard when neither exists. The delimiter at a cut is
/// dropped. Whitespace-only parts are skipped.
pub fn smart_split(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some((window_end, _)) = rest.char_indices().nth(max_chars) else {
            if !rest.trim().is_empty() {
                parts.push(rest.to_string());
            }
            break;
        };
        let window = &rest[..window_end];
        let (part, next) = match window.rfind('\n').or_else(|| window.rfind(' ')) {
            Some(cut) => (&window[..cut], &rest[cut + 1..]),
            None => (window, &rest[window_end..]),
        };
        if !part.trim().is_empty() {
            parts.push(part.to_string());
        }
        rest = next;
    }
    parts
}

/// Renders numbered source links in discovery order.
pub fn format_sources(sources: &[SourceLink]) -> String {
    let mut out = String::from("\n\nSources:");
    for source in sources {
        out.push_str(&format!("\n[{}] {}: {}", source.index, source.title, source.url));
    }
    out
}

/// Final message parts: the split answer with sources on the last part.
///
/// When the sources do not fit into the last part they become parts of
/// their own.
pub fn compose_parts(text: &str, sources: &[SourceLink], max_chars: usize) -> Vec<String> {
    let mut parts = smart_split(text, max_chars);
    if sources.is_empty() {
        return parts;
    }
    let footer = format_sources(sources);
    let footer_len = footer.chars().count();
    match parts.last_mut() {
        Some(last) if last.chars().count() + footer_len <= max_chars => last.push_str(&footer),
        _ => parts.extend(smart_split(footer.trim_start(), max_chars)),
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use parley_core::{
        AdapterType, ChannelCapabilities, HealthStatus, InboundMessage, MessageId, PluginAdapter,
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Draft(String),
        Edit(String, Duration),
        Discard,
        Send(String),
    }

    /// Records calls with their offset from creation; rejects chosen edits.
    struct RecordingChannel {
        start: Instant,
        calls: Mutex<Vec<Call>>,
        edit_results: Mutex<Vec<Result<(), Duration>>>,
        send_failures: Mutex<Vec<ParleyError>>,
        drafts: bool,
    }

    impl RecordingChannel {
        fn new() -> Arc<Self> {
            Self::with_edit_results(Vec::new())
        }

        /// Edit outcomes consumed in order; `Err(d)` is a rate limit of `d`.
        fn with_edit_results(results: Vec<Result<(), Duration>>) -> Arc<Self> {
            Arc::new(Self {
                start: Instant::now(),
                calls: Mutex::new(Vec::new()),
                edit_results: Mutex::new(results.into_iter().rev().collect()),
                send_failures: Mutex::new(Vec::new()),
                drafts: true,
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn edits(&self) -> Vec<(String, Duration)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Edit(text, at) => Some((text, at)),
                    _ => None,
                })
                .collect()
        }

        fn sent(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Send(text) => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl PluginAdapter for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Channel
        }
        async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), ParleyError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ChannelAdapter for RecordingChannel {
        fn capabilities(&self) -> ChannelCapabilities {
            ChannelCapabilities {
                max_message_length: 4096,
                supports_drafts: self.drafts,
                supports_threads: true,
            }
        }
        async fn connect(&mut self) -> Result<(), ParleyError> {
            Ok(())
        }
        async fn receive(&self) -> Result<InboundMessage, ParleyError> {
            Err(ParleyError::channel("closed"))
        }
        async fn create_draft(
            &self,
            chat_id: i64,
            thread_id: Option<i64>,
            text: &str,
        ) -> Result<DraftHandle, ParleyError> {
            self.calls.lock().unwrap().push(Call::Draft(text.to_string()));
            Ok(DraftHandle {
                chat_id,
                thread_id,
                message_id: MessageId("draft".into()),
            })
        }
        async fn edit_draft(&self, _draft: &DraftHandle, text: &str) -> Result<(), ParleyError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Edit(text.to_string(), self.start.elapsed()));
            match self.edit_results.lock().unwrap().pop() {
                Some(Err(retry_after)) => Err(ParleyError::RateLimited { retry_after }),
                _ => Ok(()),
            }
        }
        async fn discard_draft(&self, _draft: &DraftHandle) -> Result<(), ParleyError> {
            self.calls.lock().unwrap().push(Call::Discard);
            Ok(())
        }
        async fn send(
            &self,
            _chat_id: i64,
            _thread_id: Option<i64>,
            text: &str,
        ) -> Result<MessageId, ParleyError> {
            if let Some(e) = self.send_failures.lock().unwrap().pop() {
                return Err(e);
            }
            self.calls.lock().unwrap().push(Call::Send(text.to_string()));
            Ok(MessageId("sent".into()))
        }
    }

    /// Chunks released after the given delays, relative to the previous one.
    fn timed(
        chunks: Vec<(u64, &'static str)>,
    ) -> impl Stream<Item = Result<String, ParleyError>> + Unpin {
        Box::pin(stream::iter(chunks).then(|(delay, text)| async move {
            sleep(Duration::from_millis(delay)).await;
            Ok::<_, ParleyError>(text.to_string())
        }))
    }

    fn key() -> ConversationKey {
        ConversationKey::new(1, 10, None)
    }

    fn delivery(channel: Arc<RecordingChannel>) -> DeliveryLoop {
        DeliveryLoop::new(channel, DeliveryConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn hello_scenario_sends_one_part() {
        let channel = RecordingChannel::new();
        let mut chunks = timed(vec![(10, "Hi"), (10, "!")]);
        let outcome = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();

        assert_eq!(outcome.text, "Hi!");
        assert_eq!(outcome.parts_sent, 1);
        assert_eq!(channel.sent(), vec!["Hi!".to_string()]);
        let calls = channel.calls();
        assert_eq!(calls.first(), Some(&Call::Draft("…".into())));
        assert_eq!(calls.last(), Some(&Call::Discard));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_chunks_coalesce_into_few_edits() {
        let channel = RecordingChannel::new();
        let chunks: Vec<(u64, &'static str)> = (0..50).map(|_| (20, "x")).collect();
        let mut chunks = timed(chunks);
        let outcome = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();

        let edits = channel.edits();
        assert!(edits.len() <= 8, "too many edits: {}", edits.len());
        assert!(!edits.is_empty());
        for pair in edits.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(200));
        }
        assert_eq!(outcome.text.len(), 50);
        assert_eq!(channel.sent().concat(), "x".repeat(50));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_before_next_edit() {
        let retry = Duration::from_secs(3);
        let channel = RecordingChannel::with_edit_results(vec![Ok(()), Err(retry), Ok(())]);
        let chunks: Vec<(u64, &'static str)> = (0..40).map(|_| (150, "ab ")).collect();
        let mut chunks = timed(chunks);
        let outcome = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();

        let edits = channel.edits();
        assert!(edits.len() >= 3);
        let rejected_at = edits[1].1;
        let retried_at = edits[2].1;
        assert!(retried_at - rejected_at >= retry);
        // The retry shows everything accumulated before the wait.
        assert!(edits[2].0.len() >= edits[1].0.len());
        assert_eq!(channel.sent().join(""), "ab ".repeat(40));
        assert!(outcome.draft_edits >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_retry_pauses_before_next_edit() {
        let pause = Duration::from_millis(2000);
        let channel = RecordingChannel::with_edit_results(vec![
            Err(Duration::from_secs(1)),
            Ok(()),
            Ok(()),
        ]);
        let config = DeliveryConfig {
            post_edit_pause_ms: 2000,
            ..DeliveryConfig::default()
        };
        let mut chunks = timed(vec![(250, "a"), (0, "b")]);
        DeliveryLoop::new(channel.clone(), config)
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();

        let edits = channel.edits();
        assert_eq!(edits.len(), 3, "edits: {edits:?}");
        assert!(edits[2].1 - edits[1].1 >= pause);
        assert_eq!(edits[2].0, "ab");
        assert_eq!(channel.sent(), vec!["ab".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_retry_keeps_accumulating() {
        let retry = Duration::from_secs(1);
        let channel =
            RecordingChannel::with_edit_results(vec![Err(retry), Err(Duration::from_secs(5))]);
        let chunks: Vec<(u64, &'static str)> = (0..30).map(|_| (250, "z")).collect();
        let mut chunks = timed(chunks);
        let outcome = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();

        let edits = channel.edits();
        assert!(edits[1].1 - edits[0].1 >= retry);
        // Second rejection suppresses edits for its retry window.
        if let Some(third) = edits.get(2) {
            assert!(third.1 - edits[1].1 >= Duration::from_secs(5));
        }
        assert_eq!(outcome.text, "z".repeat(30));
        assert_eq!(channel.sent(), vec!["z".repeat(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_error_aborts_and_discards_draft() {
        let channel = RecordingChannel::new();
        let mut chunks = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(ParleyError::provider("connection reset")),
        ]));
        let err = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert!(channel.sent().is_empty());
        assert_eq!(channel.calls().last(), Some(&Call::Discard));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_answer_is_an_error() {
        let channel = RecordingChannel::new();
        let mut chunks = Box::pin(stream::iter(Vec::<Result<String, ParleyError>>::new()));
        assert!(
            delivery(channel.clone())
                .deliver(&key(), &mut chunks, &[])
                .await
                .is_err()
        );
        assert!(channel.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn final_send_retries_rate_limit() {
        let channel = RecordingChannel::new();
        channel.send_failures.lock().unwrap().push(ParleyError::RateLimited {
            retry_after: Duration::from_secs(2),
        });
        let mut chunks = Box::pin(stream::iter(vec![Ok("done".to_string())]));
        delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();
        assert_eq!(channel.sent(), vec!["done".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn final_send_transport_error_surfaces() {
        let channel = RecordingChannel::new();
        channel
            .send_failures
            .lock()
            .unwrap()
            .push(ParleyError::channel("chat not found"));
        let mut chunks = Box::pin(stream::iter(vec![Ok("done".to_string())]));
        let err = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn sources_go_on_last_part_only() {
        let channel = RecordingChannel::new();
        let long = format!("{}\n{}", "a".repeat(4000), "b".repeat(100));
        let mut chunks = Box::pin(stream::iter(vec![Ok(long)]));
        let sources = vec![SourceLink {
            index: 1,
            title: "Example".into(),
            url: "https://example.com".into(),
        }];
        let outcome = delivery(channel.clone())
            .deliver(&key(), &mut chunks, &sources)
            .await
            .unwrap();

        let sent = channel.sent();
        assert_eq!(outcome.parts_sent, 2);
        assert!(!sent[0].contains("Sources:"));
        assert!(sent[1].ends_with("[1] Example: https://example.com"));
        assert!(!outcome.text.contains("Sources:"));
    }

    #[tokio::test(start_paused = true)]
    async fn without_draft_support_only_final_send() {
        let channel = Arc::new(RecordingChannel {
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
            edit_results: Mutex::new(Vec::new()),
            send_failures: Mutex::new(Vec::new()),
            drafts: false,
        });
        let mut chunks = timed(vec![(300, "one "), (300, "two")]);
        delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();
        assert_eq!(channel.calls(), vec![Call::Send("one two".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_draft_is_truncated_with_marker() {
        let channel = RecordingChannel::new();
        let big = "w".repeat(5000);
        let mut chunks = Box::pin(
            stream::iter(vec![("w".repeat(10), 300u64), (big, 300)]).then(|(t, d)| async move {
                sleep(Duration::from_millis(d)).await;
                Ok::<_, ParleyError>(t)
            }),
        );
        delivery(channel.clone())
            .deliver(&key(), &mut chunks, &[])
            .await
            .unwrap();
        let edits = channel.edits();
        let last = &edits.last().unwrap().0;
        assert_eq!(last.chars().count(), 4000);
        assert!(last.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn split_short_text_is_one_part() {
        assert_eq!(smart_split("Hi!", 4096), vec!["Hi!"]);
    }

    #[test]
    fn split_prefers_newline_then_space() {
        let text = "aaaa bbbb\ncccc dddd";
        assert_eq!(smart_split(text, 12), vec!["aaaa bbbb", "cccc dddd"]);
        assert_eq!(smart_split("aaaa bbbb cccc", 10), vec!["aaaa bbbb", "cccc"]);
    }

    #[test]
    fn split_hard_cuts_without_delimiters() {
        let text = "x".repeat(9000);
        let parts = smart_split(&text, 4096);
        let lens: Vec<_> = parts.iter().map(|p| p.chars().count()).collect();
        assert_eq!(lens, vec![4096, 4096, 808]);
    }

    #[test]
    fn split_counts_characters_not_bytes() {
        let text = "ж".repeat(10);
        let parts = smart_split(&text, 4);
        assert_eq!(parts, vec!["жжжж", "жжжж", "жж"]);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_for_draft("short", 10), ("short".to_string(), false));
        let (cut, truncated) = truncate_for_draft(&"q".repeat(50), 20);
        assert!(truncated);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn sources_overflow_into_own_part() {
        let sources = vec![SourceLink {
            index: 1,
            title: "T".into(),
            url: "https://t.example".into(),
        }];
        let parts = compose_parts(&"y".repeat(20), &sources, 40);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "y".repeat(20));
        assert!(parts[1].starts_with("Sources:"));
    }

    proptest::proptest! {
        #[test]
        fn split_respects_limit_and_loses_only_delimiters(
            text in "[a-c \\n]{0,400}",
            max in 1usize..60,
        ) {
            let parts = smart_split(&text, max);
            for part in &parts {
                proptest::prop_assert!(part.chars().count() <= max);
                proptest::prop_assert!(!part.trim().is_empty());
            }
            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            proptest::prop_assert_eq!(strip(&parts.concat()), strip(&text));
        }
    }
}
