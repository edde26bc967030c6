// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instruction prompt and conversation excerpt for routing requests.

use chrono::NaiveDate;
use parley_core::{Message, Role};

/// Longest excerpt of a single message shown to the router, in characters.
const MAX_EXCERPT_CHARS: usize = 1_000;

/// Builds the router's system instructions for a given date.
pub fn router_instructions(today: NaiveDate, max_queries: usize) -> String {
    format!(
        "You decide whether answering the user's LATEST message requires a web search.\n\
         Today is {today}.\n\
         Search when the answer depends on current events, prices, releases, schedules, \
         weather, recent facts, or specific details you are unlikely to know reliably. \
         Do not search for greetings, small talk, opinions, creative writing, coding, math, \
         translation, or questions about the conversation itself.\n\
         Reply with ONLY a JSON object, no prose and no code fences:\n\
         {{\"search_needed\": true|false, \"queries\": [\"...\"]}}\n\
         When search_needed is true give 1 to {max_queries} short, distinct search queries \
         in the language most likely to find good results. When false, queries is []."
    )
}

/// Renders the tail of the conversation as a plain transcript.
pub fn conversation_excerpt(messages: &[Message]) -> String {
    let mut out = String::from("Conversation (oldest first):\n");
    for message in messages {
        let speaker = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => continue,
        };
        let text: String = message.content.chars().take(MAX_EXCERPT_CHARS).collect();
        out.push_str(speaker);
        out.push_str(": ");
        out.push_str(&text);
        if message.content.chars().count() > MAX_EXCERPT_CHARS {
            out.push('…');
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_mention_date_and_limit() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let text = router_instructions(date, 3);
        assert!(text.contains("2026-03-01"));
        assert!(text.contains("1 to 3"));
        assert!(text.contains("\"search_needed\""));
    }

    #[test]
    fn excerpt_skips_system_and_truncates() {
        let long = "x".repeat(1_500);
        let excerpt = conversation_excerpt(&[
            Message::system("hidden"),
            Message::user("what's new?"),
            Message::assistant(long),
        ]);
        assert!(!excerpt.contains("hidden"));
        assert!(excerpt.contains("user: what's new?"));
        assert!(excerpt.contains('…'));
        assert!(excerpt.len() < 1_200);
    }
}
