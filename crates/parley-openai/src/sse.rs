// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parsing for streaming chat-completions responses.
//!
//! Each SSE `data:` payload is a JSON chunk; the literal `[DONE]` marks the
//! end of the stream.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use parley_core::ParleyError;

use crate::types::ChatCompletionChunk;

/// Sentinel payload that terminates an OpenAI-style stream.
const DONE_MARKER: &str = "[DONE]";

/// Parses a streaming response body into typed chunks.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ParleyError>> + Send>> {
    let events = response.bytes_stream().eventsource();

    let chunks = events
        .take_while(|result| {
            let done = matches!(result, Ok(event) if event.data.trim() == DONE_MARKER);
            async move { !done }
        })
        .filter_map(|result| async move {
            match result {
                Ok(event) => parse_event_data(&event.data),
                Err(e) => Some(Err(ParleyError::Provider {
                    message: format!("SSE stream error: {e}"),
                    source: None,
                })),
            }
        });

    Box::pin(chunks)
}

/// Parses one `data:` payload. Blank payloads and the done marker yield `None`.
pub fn parse_event_data(data: &str) -> Option<Result<ChatCompletionChunk, ParleyError>> {
    let data = data.trim();
    if data.is_empty() || data == DONE_MARKER {
        return None;
    }
    Some(
        serde_json::from_str::<ChatCompletionChunk>(data).map_err(|e| ParleyError::Provider {
            message: format!("failed to parse stream chunk: {e}"),
            source: Some(Box::new(e)),
        }),
    )
}
