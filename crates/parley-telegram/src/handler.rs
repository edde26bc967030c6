// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization filtering and conversion of Telegram updates.
//!
//! Decides whether an incoming Telegram message should be processed and
//! turns it into a channel-agnostic [`InboundMessage`].

use std::str::FromStr;

use parley_core::{Command, ConversationKey, InboundContent, InboundMessage};
use teloxide::types::Message;
use tracing::debug;

/// Checks whether the message sender is authorized.
///
/// An empty `allowed_users` list admits everyone. Otherwise the sender's
/// numeric ID or username (with or without `@`) must be listed.
/// Messages without a sender (e.g., channel posts) are always rejected.
pub fn is_authorized(msg: &Message, allowed_users: &[String]) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };
    if allowed_users.is_empty() {
        return true;
    }

    let user_id_str = user.id.0.to_string();
    allowed_users.iter().any(|allowed| {
        if *allowed == user_id_str {
            return true;
        }
        let allowed_clean = allowed.strip_prefix('@').unwrap_or(allowed);
        user.username
            .as_deref()
            .is_some_and(|username| username.eq_ignore_ascii_case(allowed_clean))
    })
}

/// Parses `/start` or `/clear`, optionally addressed as `/clear@botname`.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    Command::from_str(&name.to_ascii_lowercase()).ok()
}

fn has_media(msg: &Message) -> bool {
    msg.photo().is_some()
        || msg.document().is_some()
        || msg.voice().is_some()
        || msg.audio().is_some()
        || msg.video().is_some()
        || msg.video_note().is_some()
        || msg.sticker().is_some()
        || msg.animation().is_some()
}

/// Classifies the message body. Service messages yield `None`.
pub fn extract_content(msg: &Message) -> Option<InboundContent> {
    if let Some(text) = msg.text() {
        return Some(match parse_command(text) {
            Some(command) => InboundContent::Command(command),
            None => InboundContent::Text(text.to_string()),
        });
    }
    if has_media(msg) {
        return Some(InboundContent::Unsupported);
    }
    debug!(msg_id = msg.id.0, "ignoring service message");
    None
}

/// Conversation key of a message: sender, chat, and forum thread.
pub fn conversation_key(msg: &Message) -> Option<ConversationKey> {
    let user = msg.from.as_ref()?;
    let user_id = i64::try_from(user.id.0).ok()?;
    let thread_id = msg.thread_id.map(|t| i64::from(t.0.0));
    Some(ConversationKey::new(user_id, msg.chat.id.0, thread_id))
}

/// Converts a Telegram message into an [`InboundMessage`], if it carries
/// anything the assistant reacts to.
pub fn to_inbound_message(msg: &Message) -> Option<InboundMessage> {
    let key = conversation_key(msg)?;
    let content = extract_content(msg)?;
    Some(InboundMessage {
        key,
        username: msg.from.as_ref().and_then(|u| u.username.clone()),
        content,
        received_at: msg.date,
    })
}
