// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Web search for the Parley chat assistant.
//!
//! [`SearchAggregator`] fans the router's queries out to a
//! [`SearchAdapter`](parley_core::SearchAdapter), tolerates failing queries,
//! and deduplicates hits by domain. [`DuckDuckGoSearch`] is the bundled
//! adapter.

pub mod aggregator;
pub mod dedup;
pub mod duckduckgo;

pub use aggregator::SearchAggregator;
pub use dedup::{deduplicate, domain_of};
pub use duckduckgo::DuckDuckGoSearch;
