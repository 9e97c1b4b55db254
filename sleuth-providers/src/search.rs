//! Named search tools combined behind `SearchService`

use async_trait::async_trait;
use futures::future::join_all;
use sleuth_core::{SearchHit, SearchService, SleuthResult};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A single search backend
#[async_trait]
pub trait SearchTool: Send + Sync {
    async fn search(&self, query: &str, num_results: usize) -> SleuthResult<Vec<SearchHit>>;
}

/// Runs several registered tools for a query and merges their results.
///
/// A failing tool contributes nothing; the others still count.
#[derive(Default)]
pub struct SearchOrchestrator {
    tools: Vec<(String, Arc<dyn SearchTool>)>,
}

impl SearchOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool` under `name`, replacing any tool already using it
    pub fn register_tool(&mut self, name: impl Into<String>, tool: Arc<dyn SearchTool>) {
        let name = name.into();
        match self.tools.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = tool,
            None => self.tools.push((name, tool)),
        }
    }

    pub fn with_tool(mut self, name: impl Into<String>, tool: Arc<dyn SearchTool>) -> Self {
        self.register_tool(name, tool);
        self
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|(existing, _)| existing == name)
    }

    /// Results per tool, in the order the tools were requested.
    ///
    /// An empty `tool_names` means every registered tool. Unknown names are
    /// skipped.
    pub async fn search(
        &self,
        query: &str,
        tool_names: &[String],
        num_results: usize,
    ) -> Vec<(String, Vec<SearchHit>)> {
        let selected: Vec<&(String, Arc<dyn SearchTool>)> = if tool_names.is_empty() {
            self.tools.iter().collect()
        } else {
            tool_names
                .iter()
                .filter_map(|name| {
                    let found = self.tools.iter().find(|(existing, _)| existing == name);
                    if found.is_none() {
                        warn!(tool = %name, "Search tool not registered");
                    }
                    found
                })
                .collect()
        };

        let searches = selected.into_iter().map(|(name, tool)| async move {
            let hits = match tool.search(query, num_results).await {
                Ok(hits) => hits,
                Err(err) => {
                    warn!(tool = %name, error = %err, "Search tool failed");
                    Vec::new()
                }
            };
            (name.clone(), hits)
        });

        join_all(searches).await
    }
}

/// Merge per-tool results, dropping hits without a URL and repeated URLs.
/// Each kept hit is tagged with the tool that produced it.
pub fn combine_results(per_tool: Vec<(String, Vec<SearchHit>)>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut combined = Vec::new();

    for (tool, hits) in per_tool {
        for mut hit in hits {
            if hit.url.is_empty() || !seen.insert(hit.url.clone()) {
                continue;
            }
            hit.source_tool = tool.clone();
            combined.push(hit);
        }
    }
    combined
}

#[async_trait]
impl SearchService for SearchOrchestrator {
    async fn search_and_combine(
        &self,
        query: &str,
        tool_names: &[String],
        result_count: usize,
    ) -> SleuthResult<Vec<SearchHit>> {
        let per_tool = self.search(query, tool_names, result_count).await;
        let combined = combine_results(per_tool);
        debug!(query = query, hits = combined.len(), "Combined search results");
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> SearchHit {
        SearchHit {
            title: url.to_string(),
            url: url.to_string(),
            snippet: String::new(),
            content: String::new(),
            source_tool: String::new(),
        }
    }

    #[test]
    fn test_combine_dedupes_and_tags() {
        let combined = combine_results(vec![
            ("web".to_string(), vec![hit("https://a"), hit(""), hit("https://b")]),
            ("academic".to_string(), vec![hit("https://b"), hit("https://c")]),
        ]);

        let urls: Vec<&str> = combined.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
        assert_eq!(combined[1].source_tool, "web");
        assert_eq!(combined[2].source_tool, "academic");
    }
}
