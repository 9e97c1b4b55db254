//! arXiv paper search over the public Atom API

use crate::http::{create_http_client, handle_response_error, request_error};
use crate::search::SearchTool;
use async_trait::async_trait;
use regex::Regex;
use sleuth_core::{SearchHit, SleuthResult};
use std::sync::OnceLock;
use tracing::debug;

const COMPONENT: &str = "arxiv_search";
const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";

fn entry_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("static pattern"))
}

fn field_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}[^>]*>(.*?)</{tag}>")).expect("static pattern")
}

fn fields() -> &'static [(&'static str, Regex); 4] {
    static FIELDS: OnceLock<[(&'static str, Regex); 4]> = OnceLock::new();
    FIELDS.get_or_init(|| {
        [
            ("title", field_pattern("title")),
            ("id", field_pattern("id")),
            ("summary", field_pattern("summary")),
            ("published", field_pattern("published")),
        ]
    })
}

fn whitespace() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

fn clean(text: &str) -> String {
    let text = text
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    whitespace().replace_all(text.trim(), " ").into_owned()
}

/// Extract papers from an arXiv Atom feed
pub fn parse_atom_feed(feed: &str) -> Vec<SearchHit> {
    entry_pattern()
        .captures_iter(feed)
        .filter_map(|entry| {
            let body = entry.get(1)?.as_str();
            let field = |name: &str| -> String {
                fields()
                    .iter()
                    .find(|(tag, _)| *tag == name)
                    .and_then(|(_, pattern)| pattern.captures(body))
                    .and_then(|c| c.get(1))
                    .map(|m| clean(m.as_str()))
                    .unwrap_or_default()
            };

            let url = field("id");
            if url.is_empty() {
                return None;
            }
            let summary = field("summary");
            let published = field("published");
            let snippet = match published.get(..4) {
                Some(year) => format!("({}) {}", year, summary),
                None => summary.clone(),
            };

            Some(SearchHit {
                title: field("title"),
                url,
                snippet,
                content: summary,
                source_tool: String::new(),
            })
        })
        .collect()
}

/// Academic search against arXiv
pub struct ArxivSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl ArxivSearchTool {
    pub fn new(timeout_seconds: u64) -> SleuthResult<Self> {
        Ok(Self {
            client: create_http_client(timeout_seconds, COMPONENT)?,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchTool for ArxivSearchTool {
    async fn search(&self, query: &str, num_results: usize) -> SleuthResult<Vec<SearchHit>> {
        debug!(query = query, count = num_results, "arXiv search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", format!("all:{}", query)),
                ("start", "0".to_string()),
                ("max_results", num_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| request_error(e, COMPONENT, "search"))?;

        if !response.status().is_success() {
            return Err(handle_response_error(response, COMPONENT).await);
        }

        let feed = response
            .text()
            .await
            .map_err(|e| request_error(e, COMPONENT, "read_body"))?;
        Ok(parse_atom_feed(&feed))
    }
}
