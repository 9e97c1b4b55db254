//! Model-backed analysis of search results

use crate::extract::extract_json;
use async_trait::async_trait;
use serde_json::Value;
use sleuth_core::{
    Analysis, AnalysisDepth, ErrorContext, GenerationOptions, KeyFinding, ResultAnalyzer,
    SearchHit, SleuthError, SleuthResult, TextGenerator,
};
use std::sync::Arc;
use tracing::debug;

/// Results shown to the model in a standard analysis
const STANDARD_RESULT_LIMIT: usize = 5;

/// Extracts findings, gaps and contradictions from search hits
pub struct LlmResultAnalyzer {
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
}

impl LlmResultAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            max_tokens: 2000,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Render hits as numbered blocks; deep analysis includes every hit.
pub fn format_results(hits: &[SearchHit], depth: AnalysisDepth) -> String {
    let limit = match depth {
        AnalysisDepth::Standard => STANDARD_RESULT_LIMIT,
        AnalysisDepth::Deep => hits.len(),
    };

    hits.iter()
        .take(limit)
        .enumerate()
        .map(|(i, hit)| {
            let body = if hit.text().is_empty() { "N/A" } else { hit.text() };
            format!(
                "Result {}:\nTitle: {}\nURL: {}\nContent: {}\n",
                i + 1,
                hit.title,
                hit.url,
                body
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build an `Analysis` from loosely shaped model JSON.
///
/// Findings given as bare strings are accepted; missing confidence values
/// default to 0.5 and all confidences are clamped to `[0, 1]`.
pub fn analysis_from_value(value: Value) -> SleuthResult<Analysis> {
    let Value::Object(mut map) = value else {
        return Err(SleuthError::Extraction {
            message: "Analysis output is not a JSON object".to_string(),
            context: ErrorContext::new("analyzer").with_operation("analysis_from_value"),
        });
    };

    let key_findings = match map.remove("key_findings") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(KeyFinding {
                    finding: text,
                    source: "unknown".to_string(),
                    confidence: 0.5,
                }),
                other => serde_json::from_value::<KeyFinding>(other).ok(),
            })
            .filter(|f| !f.finding.trim().is_empty())
            .map(|f| KeyFinding {
                confidence: f.confidence.clamp(0.0, 1.0),
                ..f
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut analysis: Analysis = serde_json::from_value(Value::Object(map)).map_err(|e| {
        SleuthError::Extraction {
            message: format!("Analysis output has unexpected shape: {}", e),
            context: ErrorContext::new("analyzer").with_operation("analysis_from_value"),
        }
    })?;
    analysis.key_findings = key_findings;
    analysis.confidence = analysis.confidence.clamp(0.0, 1.0);
    Ok(analysis)
}

#[async_trait]
impl ResultAnalyzer for LlmResultAnalyzer {
    async fn analyze(
        &self,
        query: &str,
        hits: &[SearchHit],
        depth: AnalysisDepth,
    ) -> SleuthResult<Analysis> {
        if hits.is_empty() {
            debug!(query = query, "No search results to analyze");
            return Ok(Analysis::empty());
        }

        let system_prompt = format!(
            r#"You are an expert research analyst.

Query: "{query}"

Search results ({count} total):
{results}

Extract the key findings relevant to the query, note gaps in what the results
cover, and flag contradictions between results.

Return ONLY valid JSON:
{{
  "key_findings": [{{"finding": "...", "source": "Result #N", "confidence": 0.X}}],
  "confidence": 0.X,
  "gaps": ["..."],
  "contradictions": ["..."],
  "summary": "...",
  "recommended_next_queries": ["..."]
}}"#,
            query = query,
            count = hits.len(),
            results = format_results(hits, depth),
        );

        let response = self
            .generator
            .generate(
                &system_prompt,
                &format!("Analyze results for: {}", query),
                &GenerationOptions::default().with_max_tokens(self.max_tokens),
            )
            .await?;

        let analysis = analysis_from_value(extract_json(&response)?)?;
        debug!(
            query = query,
            findings = analysis.key_findings.len(),
            confidence = analysis.confidence,
            "Analysis complete"
        );
        Ok(analysis)
    }
}
