//! Fact checking of findings against collected sources

use crate::extract::extract_json;
use async_trait::async_trait;
use serde_json::Value;
use sleuth_core::{
    FactValidator, GenerationOptions, SleuthResult, SourceRef, TextGenerator, ValidationLevel,
    ValidationRecord,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You are a fact-checking expert validating research findings.";

/// Validates findings with the text generator, caching by finding text
pub struct LlmFactChecker {
    generator: Arc<dyn TextGenerator>,
    cache: RwLock<HashMap<String, ValidationRecord>>,
}

impl LlmFactChecker {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn check(&self, finding: &str, sources: &[SourceRef]) -> SleuthResult<ValidationRecord> {
        let prompt = format!(
            r#"<task>
Validate this research finding by cross-referencing the provided sources.
</task>

<finding>
{finding}
</finding>

<sources>
{sources}
</sources>

<output_format>
Return ONLY valid JSON:
{{
  "validation_level": "high|medium|low|failed",
  "confidence": 0.X,
  "supporting_sources": ["source 1"],
  "contradicting_sources": ["source X"],
  "explanation": "reasoning"
}}
</output_format>"#,
            finding = finding,
            sources = format_sources(sources),
        );

        let response = self
            .generator
            .generate(
                SYSTEM_PROMPT,
                &prompt,
                &GenerationOptions::default().with_temperature(0.2),
            )
            .await?;

        Ok(record_from_value(finding, extract_json(&response)?))
    }
}

fn format_sources(sources: &[SourceRef]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            format!(
                "Source {}:\nTitle: {}\nContent: {}\nType: {}\n",
                i + 1,
                source.title,
                source.content,
                source.kind
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_level(label: &str) -> ValidationLevel {
    match label.trim().to_ascii_lowercase().as_str() {
        "high" => ValidationLevel::High,
        "medium" => ValidationLevel::Medium,
        "failed" => ValidationLevel::Failed,
        _ => ValidationLevel::Low,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn record_from_value(finding: &str, value: Value) -> ValidationRecord {
    let level = value
        .get("validation_level")
        .and_then(Value::as_str)
        .map(parse_level)
        .unwrap_or(ValidationLevel::Low);

    ValidationRecord {
        claim: finding.to_string(),
        level,
        confidence: value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0),
        supporting_sources: string_list(value.get("supporting_sources")),
        contradicting_sources: string_list(value.get("contradicting_sources")),
        explanation: value
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Overall reliability: level weight times confidence, averaged
pub fn reliability_score(validations: &[ValidationRecord]) -> f64 {
    if validations.is_empty() {
        return 0.0;
    }
    validations
        .iter()
        .map(|v| v.level.weight() * v.confidence)
        .sum::<f64>()
        / validations.len() as f64
}

#[async_trait]
impl FactValidator for LlmFactChecker {
    async fn validate_finding(&self, finding: &str, sources: &[SourceRef]) -> ValidationRecord {
        if let Some(cached) = self.cache.read().await.get(finding) {
            debug!("Validation cache hit");
            return cached.clone();
        }

        match self.check(finding, sources).await {
            Ok(record) => {
                self.cache
                    .write()
                    .await
                    .insert(finding.to_string(), record.clone());
                record
            }
            Err(err) => {
                warn!(error = %err, "Validation degraded to inconclusive");
                ValidationRecord::inconclusive(finding, format!("Validation error: {}", err))
            }
        }
    }
}
