//! The web-search collaborator (§1: "a web-search client returning a ranked
//! list of {title, url, snippet}"). The engine only defines the seam; the
//! HTTP-backed implementation here is one concrete client behind it.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug)]
pub struct SearchError(pub String);

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SearchError {}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;
}

/// Queries a Brave-Search-compatible JSON endpoint. Offloaded by callers
/// (the search node executor) so a slow search never stalls sibling handlers
/// sharing the scheduler's async runtime.
pub struct HttpSearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSearchClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), api_key }
    }
}

#[derive(Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        let mut request = self.client.get(&self.endpoint).query(&[("q", query), ("count", &max_results.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("X-Subscription-Token", key);
        }

        let response = request.send().await.map_err(|e| SearchError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SearchError(format!("search provider returned {}", response.status())));
        }

        let parsed: BraveResponse = response.json().await.map_err(|e| SearchError(e.to_string()))?;
        let results = parsed
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult { title: r.title, url: r.url, snippet: r.description })
            .collect();
        Ok(results)
    }
}

/// A client with no reachable endpoint configured; every call fails.
/// The search node executor turns that into a human-readable error string
/// rather than a handler failure, per §4.3.
pub struct UnconfiguredSearchClient;

#[async_trait]
impl SearchClient for UnconfiguredSearchClient {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        Err(SearchError("no search provider configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_client_fails_cleanly() {
        let client = UnconfiguredSearchClient;
        let err = client.search("rust async", 3).await.unwrap_err();
        assert!(err.to_string().contains("no search provider"));
    }
}
