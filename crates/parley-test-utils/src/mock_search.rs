// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock search adapter with canned per-query results.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use parley_core::{
    AdapterType, HealthStatus, ParleyError, PluginAdapter, SearchAdapter, SearchHit,
};

/// Returns canned hits per query; unknown queries return nothing.
pub struct MockSearch {
    results: Arc<Mutex<HashMap<String, Result<Vec<SearchHit>, String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(HashMap::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Canned hits for `query`, built from `(title, url)` pairs.
    pub async fn add_hits(&self, query: &str, hits: &[(&str, &str)]) {
        let hits = hits
            .iter()
            .map(|(title, url)| SearchHit {
                title: title.to_string(),
                body: format!("About {title}"),
                url: url.to_string(),
            })
            .collect();
        self.results.lock().await.insert(query.to_string(), Ok(hits));
    }

    /// Makes `query` fail.
    pub async fn add_failure(&self, query: &str, message: &str) {
        self.results
            .lock()
            .await
            .insert(query.to_string(), Err(message.to_string()));
    }

    /// Queries received, in call order.
    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSearch {
    fn name(&self) -> &str {
        "mock-search"
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
impl SearchAdapter for MockSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ParleyError> {
        self.queries.lock().await.push(query.to_string());
        match self.results.lock().await.get(query) {
            Some(Ok(hits)) => Ok(hits.iter().take(max_results).cloned().collect()),
            Some(Err(message)) => Err(ParleyError::Search {
                message: message.clone(),
                source: None,
            }),
            None => Ok(Vec::new()),
        }
    }
}
