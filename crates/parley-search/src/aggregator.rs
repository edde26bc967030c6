// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-query search with partial-failure tolerance.

use std::sync::Arc;

use futures::future::join_all;
use parley_config::model::SearchConfig;
use parley_core::{SearchAdapter, SearchContext, SearchHit};
use tracing::{debug, info, warn};

use crate::dedup::deduplicate;

/// Runs the router's queries and merges their hits.
pub struct SearchAggregator {
    adapter: Arc<dyn SearchAdapter>,
    results_per_query: usize,
    per_domain_cap: usize,
    total_cap: usize,
    max_queries: usize,
}

impl SearchAggregator {
    pub fn new(adapter: Arc<dyn SearchAdapter>, config: &SearchConfig) -> Self {
        Self {
            adapter,
            results_per_query: config.results_per_query,
            per_domain_cap: config.per_domain_cap,
            total_cap: config.total_cap,
            max_queries: config.max_queries,
        }
    }

    /// Runs every query (concurrently) and returns the deduplicated hits.
    ///
    /// A failing query is logged and skipped. Hits keep query order, then
    /// provider order within a query. When nothing usable remains the
    /// result is [`SearchContext::NoResults`].
    pub async fn search(&self, queries: &[String]) -> SearchContext {
        let queries = &queries[..queries.len().min(self.max_queries)];
        if queries.is_empty() {
            return SearchContext::NoResults;
        }

        let outcomes = join_all(
            queries
                .iter()
                .map(|q| self.adapter.search(q, self.results_per_query)),
        )
        .await;

        let mut hits: Vec<SearchHit> = Vec::new();
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(batch) => {
                    debug!(query = %query, hits = batch.len(), "search query finished");
                    hits.extend(batch);
                }
                Err(e) => {
                    metrics::counter!("parley_search_query_failures_total").increment(1);
                    warn!(query = %query, error = %e, "search query failed; continuing with the rest");
                }
            }
        }

        let results = deduplicate(hits, self.per_domain_cap, self.total_cap);
        info!(queries = queries.len(), results = results.len(), "web search complete");
        if results.is_empty() {
            SearchContext::NoResults
        } else {
            SearchContext::Results(results)
        }
    }
}
