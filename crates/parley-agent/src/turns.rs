// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One in-flight turn per conversation.
//!
//! A turn holds a [`TurnGuard`] for its whole lifetime. A second message for
//! the same [`ConversationKey`] is rejected with
//! [`ParleyError::ConversationBusy`] until the guard drops.

use std::sync::Arc;

use dashmap::DashSet;
use parley_core::{ConversationKey, ParleyError};
use tracing::debug;

/// Registry of conversations with a running turn.
#[derive(Debug, Clone, Default)]
pub struct TurnRegistry {
    active: Arc<DashSet<ConversationKey>>,
}

impl TurnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` busy, or fails when a turn for it is already running.
    pub fn try_begin(&self, key: ConversationKey) -> Result<TurnGuard, ParleyError> {
        if !self.active.insert(key) {
            return Err(ParleyError::ConversationBusy {
                key: key.to_string(),
            });
        }
        debug!(key = %key, "turn started");
        Ok(TurnGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_busy(&self, key: &ConversationKey) -> bool {
        self.active.contains(key)
    }

    /// Number of turns currently running.
    pub fn active(&self) -> usize {
        self.active.len()
    }
}

/// Releases the conversation when dropped, including on panic or cancellation.
#[derive(Debug)]
pub struct TurnGuard {
    active: Arc<DashSet<ConversationKey>>,
    key: ConversationKey,
}

impl TurnGuard {
    pub fn key(&self) -> ConversationKey {
        self.key
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.active.remove(&self.key);
        debug!(key = %self.key, "turn finished");
    }
}
