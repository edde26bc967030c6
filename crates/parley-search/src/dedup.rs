// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain-based deduplication of search hits.

use std::collections::{HashMap, HashSet};

use parley_core::{SearchHit, SearchResult};
use tracing::debug;

/// Normalized host of `url`: lowercased, without a leading `www.`.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    (!host.is_empty()).then_some(host)
}

/// Keeps hits in order while enforcing the per-domain and total caps.
///
/// Hits without a parsable URL and repeated URLs are dropped.
pub fn deduplicate(
    hits: impl IntoIterator<Item = SearchHit>,
    per_domain_cap: usize,
    total_cap: usize,
) -> Vec<SearchResult> {
    let mut per_domain: HashMap<String, usize> = HashMap::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut results = Vec::new();

    for hit in hits {
        if results.len() >= total_cap {
            break;
        }
        let Some(domain) = domain_of(&hit.url) else {
            debug!(url = %hit.url, "dropping search hit without a usable URL");
            continue;
        };
        if seen_urls.contains(&hit.url) {
            continue;
        }
        let count = per_domain.entry(domain.clone()).or_default();
        if *count >= per_domain_cap {
            continue;
        }
        *count += 1;
        seen_urls.insert(hit.url.clone());
        results.push(SearchResult {
            domain,
            title: hit.title,
            body: hit.body,
            url: hit.url,
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: format!("title {url}"),
            body: String::new(),
            url: url.to_string(),
        }
    }

    #[test]
    fn domain_strips_www_and_case() {
        assert_eq!(domain_of("https://WWW.Example.com/a").as_deref(), Some("example.com"));
        assert_eq!(domain_of("http://docs.rs/x").as_deref(), Some("docs.rs"));
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn three_from_one_domain_keeps_first_two() {
        let results = deduplicate(
            vec![
                hit("https://a.com/1"),
                hit("https://www.a.com/2"),
                hit("https://a.com/3"),
                hit("https://b.com/1"),
            ],
            2,
            10,
        );
        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["https://a.com/1", "https://www.a.com/2", "https://b.com/1"]);
    }

    #[test]
    fn total_cap_is_enforced() {
        let hits = (0..20).map(|i| hit(&format!("https://site{i}.org/")));
        assert_eq!(deduplicate(hits, 2, 10).len(), 10);
    }

    #[test]
    fn repeated_url_counts_once() {
        let results = deduplicate(
            vec![hit("https://a.com/x"), hit("https://a.com/x"), hit("https://a.com/y")],
            2,
            10,
        );
        assert_eq!(results.len(), 2);
    }

    proptest! {
        #[test]
        fn caps_hold_and_order_is_preserved(
            picks in proptest::collection::vec((0usize..5, 0usize..50), 0..60),
            per_domain in 1usize..4,
            total in 1usize..15,
        ) {
            let hits: Vec<SearchHit> = picks
                .iter()
                .map(|(d, p)| hit(&format!("https://d{d}.net/{p}")))
                .collect();
            let results = deduplicate(hits.clone(), per_domain, total);

            prop_assert!(results.len() <= total);
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for r in &results {
                *counts.entry(r.domain.as_str()).or_default() += 1;
            }
            prop_assert!(counts.values().all(|c| *c <= per_domain));

            // Results appear in the same relative order as the input.
            let mut cursor = 0;
            for r in &results {
                let pos = hits[cursor..].iter().position(|h| h.url == r.url);
                prop_assert!(pos.is_some());
                cursor += pos.unwrap_or(0) + 1;
            }
        }
    }
}
