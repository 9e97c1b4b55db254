//! Brave web search

use crate::http::{create_http_client, handle_response_error, request_error};
use crate::search::SearchTool;
use async_trait::async_trait;
use serde::Deserialize;
use sleuth_core::{config_error, SearchHit, SleuthResult};
use tracing::debug;

const COMPONENT: &str = "brave_search";
const DEFAULT_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

#[derive(Debug, Default, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWeb>,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    extra_snippets: Vec<String>,
}

impl From<BraveResult> for SearchHit {
    fn from(result: BraveResult) -> Self {
        let content = if result.extra_snippets.is_empty() {
            result.description.clone()
        } else {
            format!("{}\n{}", result.description, result.extra_snippets.join("\n"))
        };
        SearchHit {
            title: result.title,
            url: result.url,
            snippet: result.description,
            content,
            source_tool: String::new(),
        }
    }
}

/// Web search through the Brave Search API
pub struct BraveSearchTool {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveSearchTool {
    pub fn new(api_key: impl Into<String>, timeout_seconds: u64) -> SleuthResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(config_error!("Brave API key is empty", COMPONENT));
        }
        Ok(Self {
            client: create_http_client(timeout_seconds, COMPONENT)?,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn parse_response(body: &str) -> SleuthResult<Vec<SearchHit>> {
    let response: BraveResponse = serde_json::from_str(body)?;
    Ok(response
        .web
        .unwrap_or_default()
        .results
        .into_iter()
        .map(SearchHit::from)
        .collect())
}

#[async_trait]
impl SearchTool for BraveSearchTool {
    async fn search(&self, query: &str, num_results: usize) -> SleuthResult<Vec<SearchHit>> {
        debug!(query = query, count = num_results, "Brave search");

        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query.to_string()), ("count", num_results.to_string())])
            .send()
            .await
            .map_err(|e| request_error(e, COMPONENT, "search"))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, COMPONENT).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_error(e, COMPONENT, "read_body"))?;
        let mut hits = parse_response(&body)?;
        hits.truncate(num_results);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_web_results() {
        let body = r#"{
            "type": "search",
            "web": {"results": [
                {"title": "Tides", "url": "https://ocean.example/tides", "description": "How tides work",
                 "extra_snippets": ["The moon pulls water."]},
                {"title": "No description", "url": "https://ocean.example/bare"}
            ]}
        }"#;

        let hits = parse_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "How tides work");
        assert_eq!(hits[0].content, "How tides work\nThe moon pulls water.");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn test_missing_web_section_is_empty() {
        assert!(parse_response(r#"{"type": "search"}"#).unwrap().is_empty());
        assert!(parse_response("not json").is_err());
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(BraveSearchTool::new("", 30).is_err());
    }
}
