//! Stub collaborators for unit tests

use async_trait::async_trait;
use sleuth_core::{
    generation_error, Analysis, AnalysisDepth, GenerationOptions, ResultAnalyzer, SearchHit,
    SearchService, SleuthResult, TextGenerator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Responder = dyn Fn(&str, &str, &GenerationOptions) -> SleuthResult<String> + Send + Sync;

/// Generator answering through a closure over `(system, user, options)`
pub struct FnGenerator {
    responder: Box<Responder>,
    pub calls: AtomicUsize,
    pub last_system_prompt: Mutex<String>,
}

impl FnGenerator {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &str, &GenerationOptions) -> SleuthResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            last_system_prompt: Mutex::new(String::new()),
        }
    }

    pub fn fixed(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_, _, _| Ok(response.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_, _, _| Err(generation_error!("model unreachable", "test_support")))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FnGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> SleuthResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_system_prompt.lock() {
            *last = system_prompt.to_string();
        }
        (self.responder)(system_prompt, user_prompt, options)
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// Search service returning one hit per query, or an error for queries
/// containing "fail"
pub struct EchoSearch;

#[async_trait]
impl SearchService for EchoSearch {
    async fn search_and_combine(
        &self,
        query: &str,
        _tool_names: &[String],
        _result_count: usize,
    ) -> SleuthResult<Vec<SearchHit>> {
        if query.contains("fail") {
            return Err(sleuth_core::search_error!("search backend down", "test_support"));
        }
        Ok(vec![SearchHit {
            title: format!("About {}", query),
            url: format!("https://example.org/{}", query.replace(' ', "-")),
            snippet: format!("Snippet for {}", query),
            content: String::new(),
            source_tool: "web".to_string(),
        }])
    }
}

/// Analyzer producing one finding per hit at a fixed confidence
pub struct CountingAnalyzer {
    pub confidence: f64,
}

#[async_trait]
impl ResultAnalyzer for CountingAnalyzer {
    async fn analyze(
        &self,
        query: &str,
        hits: &[SearchHit],
        _depth: AnalysisDepth,
    ) -> SleuthResult<Analysis> {
        Ok(Analysis {
            key_findings: hits
                .iter()
                .map(|hit| sleuth_core::KeyFinding {
                    finding: format!("{} says something about {}", hit.title, query),
                    source: hit.url.clone(),
                    confidence: self.confidence,
                })
                .collect(),
            confidence: self.confidence,
            ..Analysis::empty()
        })
    }
}
