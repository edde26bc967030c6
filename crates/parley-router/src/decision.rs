// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Strict decoding of routing replies.
//!
//! The reply must be a single JSON object with a boolean `search_needed`.
//! No attempt is made to repair prose, code fences, or partial JSON.

use std::collections::HashSet;

use parley_core::RouteDecision;
use serde_json::{Map, Value};

/// Longest query kept, in characters.
const MAX_QUERY_CHARS: usize = 200;

/// Decodes a routing reply. Anything but a JSON object is rejected.
pub fn parse_decision(raw: &str) -> Result<RouteDecision, serde_json::Error> {
    let object: Map<String, Value> = serde_json::from_str(raw.trim())?;
    serde_json::from_value(Value::Object(object))
}

/// Cleans a decoded decision.
///
/// Queries are trimmed, capped in length, deduplicated case-insensitively
/// and limited to `max_queries`. A decision asking for search without any
/// usable query falls back to searching for `fallback_query`.
pub fn normalize_decision(
    decision: RouteDecision,
    max_queries: usize,
    fallback_query: &str,
) -> RouteDecision {
    if !decision.search_needed {
        return RouteDecision::no_search();
    }

    let mut seen = HashSet::new();
    let mut queries: Vec<String> = decision
        .queries
        .into_iter()
        .map(|q| clip(q.trim()))
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .take(max_queries)
        .collect();

    if queries.is_empty() {
        let fallback = clip(fallback_query.trim());
        if fallback.is_empty() {
            return RouteDecision::no_search();
        }
        queries.push(fallback);
    }

    RouteDecision {
        search_needed: true,
        queries,
    }
}

fn clip(s: &str) -> String {
    s.chars().take(MAX_QUERY_CHARS).collect()
}
