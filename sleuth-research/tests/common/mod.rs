//! Stub collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use sleuth_core::{
    generation_error, Analysis, AnalysisDepth, FactValidator, GenerationOptions, KeyFinding,
    ResultAnalyzer, SearchHit, SearchService, SleuthResult, SourceRef, TextGenerator,
    ValidationLevel, ValidationRecord,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers planning prompts with a fixed plan and synthesis prompts with a
/// fixed report; either can be switched to fail.
pub struct StubGenerator {
    pub plan: Option<String>,
    pub report: Option<String>,
    report_calls: AtomicUsize,
}

impl StubGenerator {
    pub fn new(plan: &str, report: &str) -> Self {
        Self::with(Some(plan.to_string()), Some(report.to_string()))
    }

    pub fn with(plan: Option<String>, report: Option<String>) -> Self {
        Self {
            plan,
            report,
            report_calls: AtomicUsize::new(0),
        }
    }

    /// Non-planning prompts answered so far, successful or not
    pub fn report_calls(&self) -> usize {
        self.report_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        _user_prompt: &str,
        _options: &GenerationOptions,
    ) -> SleuthResult<String> {
        let response = if system_prompt.contains("research planning expert") {
            self.plan.clone()
        } else {
            self.report_calls.fetch_add(1, Ordering::SeqCst);
            self.report.clone()
        };
        response.ok_or_else(|| generation_error!("model unreachable", "stub", "stub-model"))
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// One hit per query, or nothing at all
pub struct StubSearch {
    pub empty: bool,
}

#[async_trait]
impl SearchService for StubSearch {
    async fn search_and_combine(
        &self,
        query: &str,
        _tool_names: &[String],
        _result_count: usize,
    ) -> SleuthResult<Vec<SearchHit>> {
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(vec![SearchHit {
            title: format!("About {}", query),
            url: format!("https://example.org/{}", query.replace(' ', "-")),
            snippet: format!("Everything about {}", query),
            content: String::new(),
            source_tool: "web".to_string(),
        }])
    }
}

/// Like `StubSearch`, but queries containing `missing` find nothing. Every
/// query received is logged.
pub struct PatchySearch {
    pub missing: &'static str,
    seen: Mutex<Vec<String>>,
}

impl PatchySearch {
    pub fn new(missing: &'static str) -> Self {
        Self {
            missing,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn times_searched(&self, query: &str) -> usize {
        self.seen
            .lock()
            .map(|seen| seen.iter().filter(|q| q.as_str() == query).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SearchService for PatchySearch {
    async fn search_and_combine(
        &self,
        query: &str,
        tool_names: &[String],
        result_count: usize,
    ) -> SleuthResult<Vec<SearchHit>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(query.to_string());
        }
        StubSearch {
            empty: query.contains(self.missing),
        }
        .search_and_combine(query, tool_names, result_count)
        .await
    }
}

/// One finding per hit, all at the same confidence; no hits yield an empty
/// analysis like the model-backed analyzer
pub struct StubAnalyzer {
    pub confidence: f64,
}

#[async_trait]
impl ResultAnalyzer for StubAnalyzer {
    async fn analyze(
        &self,
        query: &str,
        hits: &[SearchHit],
        _depth: AnalysisDepth,
    ) -> SleuthResult<Analysis> {
        if hits.is_empty() {
            return Ok(Analysis::empty());
        }
        Ok(Analysis {
            key_findings: hits
                .iter()
                .map(|hit| KeyFinding {
                    finding: format!("{} answers {}", hit.title, query),
                    source: hit.url.clone(),
                    confidence: self.confidence,
                })
                .collect(),
            confidence: self.confidence,
            ..Analysis::empty()
        })
    }
}

/// Returns the same level for every finding and counts calls
pub struct StubValidator {
    pub level: ValidationLevel,
    pub calls: AtomicUsize,
}

impl StubValidator {
    pub fn new(level: ValidationLevel) -> Self {
        Self {
            level,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FactValidator for StubValidator {
    async fn validate_finding(&self, finding: &str, _sources: &[SourceRef]) -> ValidationRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ValidationRecord {
            level: self.level,
            confidence: 0.8,
            ..ValidationRecord::inconclusive(finding, "stub")
        }
    }
}

pub fn three_step_plan() -> String {
    r#"[
        {"step": 1, "query": "tides overview", "type": "broad_search", "reasoning": "background"},
        {"step": 2, "query": "tides moon gravity", "type": "specific", "reasoning": "mechanism"},
        {"step": 3, "query": "tides examples", "type": "examples", "reasoning": "cases"}
    ]"#
    .to_string()
}
