// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DuckDuckGo HTML search adapter (no API key required).

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::SearchConfig;
use parley_core::{
    AdapterType, HealthStatus, ParleyError, PluginAdapter, SearchAdapter, SearchHit,
};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Web search through DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
    region: Option<String>,
    selectors: ResultSelectors,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, ParleyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ParleyError::Search {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: config.region.clone(),
            selectors: ResultSelectors::new()?,
        })
    }

    /// Points the adapter at another endpoint (used by tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn search_url(&self, query: &str) -> String {
        let mut params = url::form_urlencoded::Serializer::new(String::new());
        params.append_pair("q", query);
        if let Some(region) = &self.region {
            params.append_pair("kl", region);
        }
        format!("{}?{}", self.endpoint, params.finish())
    }
}

#[async_trait]
impl PluginAdapter for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Search
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[async_trait]
impl SearchAdapter for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ParleyError> {
        let response = self
            .client
            .get(self.search_url(query))
            .send()
            .await
            .map_err(|e| ParleyError::Search {
                message: format!("search request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParleyError::Search {
                message: format!("search endpoint returned {status}"),
                source: None,
            });
        }

        let html = response.text().await.map_err(|e| ParleyError::Search {
            message: format!("failed to read search response: {e}"),
            source: Some(Box::new(e)),
        })?;

        let hits = self.selectors.parse(&html, max_results);
        debug!(query, hits = hits.len(), "duckduckgo results parsed");
        Ok(hits)
    }
}

/// Compiled CSS selectors for the result page.
struct ResultSelectors {
    result: Selector,
    title: Selector,
    snippet: Selector,
}

impl ResultSelectors {
    fn new() -> Result<Self, ParleyError> {
        let parse = |css: &str| {
            Selector::parse(css)
                .map_err(|e| ParleyError::Internal(format!("invalid selector `{css}`: {e}")))
        };
        Ok(Self {
            result: parse(".result")?,
            title: parse("a.result__a")?,
            snippet: parse(".result__snippet")?,
        })
    }

    /// Extracts organic results, skipping ads and entries without a link.
    fn parse(&self, html: &str, max_results: usize) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        document
            .select(&self.result)
            .filter(|el| !el.value().classes().any(|c| c == "result--ad"))
            .filter_map(|el| self.parse_result(el))
            .take(max_results)
            .collect()
    }

    fn parse_result(&self, element: ElementRef<'_>) -> Option<SearchHit> {
        let link = element.select(&self.title).next()?;
        let url = resolve_result_url(link.value().attr("href")?)?;
        let title = collapse_whitespace(&link.text().collect::<String>());
        if title.is_empty() {
            return None;
        }
        let body = element
            .select(&self.snippet)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();
        Some(SearchHit { title, body, url })
    }
}

/// Turns a result link into the target URL.
///
/// Result links usually point at a `/l/?uddg=<target>` redirect; the target
/// is taken from the `uddg` parameter.
pub fn resolve_result_url(href: &str) -> Option<String> {
    let base = url::Url::parse("https://duckduckgo.com/").ok()?;
    let parsed = base.join(href).ok()?;
    let is_redirect = parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
        && parsed.path().starts_with("/l/");
    let target = if is_redirect {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?
    } else {
        parsed.to_string()
    };
    target.starts_with("http").then_some(target)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
<html><body>
<div class="result results_links result--ad">
  <a class="result__a" href="https://ads.example/x">Sponsored</a>
</div>
<div class="result results_links">
  <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust
     Programming Language</a></h2>
  <a class="result__snippet">A language empowering   everyone.</a>
</div>
<div class="result results_links">
  <a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a>
</div>
<div class="result results_links">
  <a class="result__a">No link</a>
</div>
</body></html>"#;

    fn adapter() -> DuckDuckGoSearch {
        DuckDuckGoSearch::new(&SearchConfig::default()).unwrap()
    }

    #[test]
    fn redirect_links_are_unwrapped() {
        assert_eq!(
            resolve_result_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fa%3Fb%3D1&rut=x")
                .as_deref(),
            Some("https://example.com/a?b=1")
        );
        assert_eq!(
            resolve_result_url("https://docs.rs/").as_deref(),
            Some("https://docs.rs/")
        );
        assert_eq!(resolve_result_url("/l/?rut=only"), None);
    }

    #[test]
    fn parses_organic_results_only() {
        let hits = adapter().selectors.parse(PAGE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Rust Programming Language");
        assert_eq!(hits[0].url, "https://www.rust-lang.org/");
        assert_eq!(hits[0].body, "A language empowering everyone.");
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
        assert!(hits[1].body.is_empty());
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(adapter().selectors.parse(PAGE, 1).len(), 1);
    }

    #[test]
    fn region_is_sent_when_configured() {
        let config = SearchConfig {
            region: Some("de-de".into()),
            ..Default::default()
        };
        let url = DuckDuckGoSearch::new(&config).unwrap().search_url("wetter berlin");
        assert!(url.contains("q=wetter+berlin"));
        assert!(url.contains("kl=de-de"));
    }

    #[tokio::test]
    async fn search_hits_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let hits = adapter()
            .with_endpoint(format!("{}/html/", server.uri()))
            .search("rust", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn error_status_is_search_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let err = adapter()
            .with_endpoint(server.uri())
            .search("rust", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::Search { .. }));
    }
}
