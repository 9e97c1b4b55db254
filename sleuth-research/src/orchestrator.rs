//! Parallel search and analysis over a batch of queries

use serde::{Deserialize, Serialize};
use sleuth_core::{
    process_concurrently, Analysis, AnalysisDepth, ResearchSettings, ResultAnalyzer, SearchHit,
    SearchService,
};
use std::sync::Arc;
use tracing::info;

/// Search and analysis result for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub hits_found: usize,
    pub analysis: Analysis,
}

/// Runs search then analysis for several queries on a bounded pool.
///
/// A failed or timed-out search yields no hits; a failed or timed-out
/// analysis yields an empty placeholder with confidence 0. Outcomes come
/// back in query order.
pub struct ParallelResearcher {
    search: Arc<dyn SearchService>,
    analyzer: Arc<dyn ResultAnalyzer>,
    tools: Vec<String>,
    results_per_query: usize,
    max_concurrent: usize,
    task_timeout_ms: u64,
}

impl ParallelResearcher {
    pub fn new(search: Arc<dyn SearchService>, analyzer: Arc<dyn ResultAnalyzer>) -> Self {
        let defaults = ResearchSettings::default();
        Self {
            search,
            analyzer,
            tools: vec!["web".to_string()],
            results_per_query: 5,
            max_concurrent: defaults.max_concurrent_tasks,
            task_timeout_ms: defaults.task_timeout_ms,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>, results_per_query: usize) -> Self {
        self.tools = tools;
        self.results_per_query = results_per_query;
        self
    }

    pub fn with_limits(mut self, max_concurrent: usize, task_timeout_ms: u64) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self.task_timeout_ms = task_timeout_ms;
        self
    }

    pub async fn research(&self, queries: &[String], depth: AnalysisDepth) -> Vec<QueryOutcome> {
        if queries.is_empty() {
            return Vec::new();
        }
        info!(
            queries = queries.len(),
            max_concurrent = self.max_concurrent,
            "Running parallel search and analysis"
        );

        let hits = self.search_all(queries).await;

        let analyzer = Arc::clone(&self.analyzer);
        let analyses = process_concurrently(
            queries.iter().cloned().zip(hits.iter().cloned()).collect(),
            self.max_concurrent,
            self.task_timeout_ms,
            "analyze",
            move |(query, hits): (String, Vec<SearchHit>)| {
                let analyzer = Arc::clone(&analyzer);
                async move { analyzer.analyze(&query, &hits, depth).await }
            },
            |_, _| Analysis::empty(),
        )
        .await;

        queries
            .iter()
            .zip(hits)
            .zip(analyses)
            .map(|((query, hits), analysis)| QueryOutcome {
                query: query.clone(),
                hits_found: hits.len(),
                analysis,
            })
            .collect()
    }

    async fn search_all(&self, queries: &[String]) -> Vec<Vec<SearchHit>> {
        let search = Arc::clone(&self.search);
        let tools = self.tools.clone();
        let count = self.results_per_query;

        process_concurrently(
            queries.to_vec(),
            self.max_concurrent,
            self.task_timeout_ms,
            "search",
            move |query: String| {
                let search = Arc::clone(&search);
                let tools = tools.clone();
                async move { search.search_and_combine(&query, &tools, count).await }
            },
            |_, _| Vec::new(),
        )
        .await
    }
}
