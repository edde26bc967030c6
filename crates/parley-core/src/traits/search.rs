// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search adapter trait for web search providers.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SearchHit;

/// Adapter for a web search provider.
#[async_trait]
pub trait SearchAdapter: PluginAdapter {
    /// Runs one query and returns up to `max_results` hits in provider order.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ParleyError>;
}
