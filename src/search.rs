use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::progress;

/// One search engine result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>>;
}

pub(crate) fn host_from_url(url: &str) -> String {
    let u = url.trim();
    let without_scheme = if let Some(pos) = u.find("://") { &u[pos + 3..] } else { u };
    let host = without_scheme.split(|c| c == '/' || c == '?' || c == '#').next().unwrap_or(without_scheme);
    let host = if let Some(at) = host.rfind('@') { &host[at + 1..] } else { host };
    let host = host.split(':').next().unwrap_or(host);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Search provider backed by a SearxNG-style JSON endpoint
/// (`GET {endpoint}?q=<query>&format=json`).
pub struct WebSearchProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl WebSearchProvider {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        WebSearchProvider {
            endpoint,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchProvider for WebSearchProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        progress::log_with(
            progress::Kind::Http,
            format!("HTTP GET {} [search]", host_from_url(&self.endpoint)),
        );

        let mut request = self.client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json")]);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(anyhow::anyhow!("Search endpoint error {}: {}", status, body));
        }

        let parsed: SearxResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .take(count)
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_strips_noise() {
        assert_eq!(host_from_url("https://www.example.edu/path?q=1"), "example.edu");
        assert_eq!(host_from_url("http://user@arxiv.org:8080/abs/1234"), "arxiv.org");
        assert_eq!(host_from_url("example.com/page"), "example.com");
    }

    #[test]
    fn searx_response_parses_with_missing_fields() {
        let json = r#"{"results":[{"url":"https://a.example/x"},{"url":"https://b.example/y","title":"B","content":"snippet"}]}"#;
        let parsed: SearxResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "");
        assert_eq!(parsed.results[1].content, "snippet");
    }
}
