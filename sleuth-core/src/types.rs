//! Core data type definitions shared between the research loop and its collaborators

use serde::{Deserialize, Serialize};

/// Options for a single text-generation call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Overrides the configured sampling temperature
    pub temperature: Option<f32>,
    /// Overrides the configured token limit
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A single ranked result from a search tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub content: String,
    /// Name of the tool that produced this hit
    #[serde(default)]
    pub source_tool: String,
}

impl SearchHit {
    /// Best available body text for the hit
    pub fn text(&self) -> &str {
        if self.content.is_empty() {
            &self.snippet
        } else {
            &self.content
        }
    }
}

/// One finding extracted by the analysis step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFinding {
    pub finding: String,
    #[serde(default = "unknown_source")]
    pub source: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn unknown_source() -> String {
    "unknown".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Structured analysis of a query's search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub key_findings: Vec<KeyFinding>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommended_next_queries: Vec<String>,
}

impl Analysis {
    /// Placeholder used when a search or analysis task fails or times out
    pub fn empty() -> Self {
        Self {
            key_findings: Vec::new(),
            confidence: 0.0,
            gaps: Vec::new(),
            contradictions: Vec::new(),
            summary: String::new(),
            recommended_next_queries: Vec::new(),
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.key_findings.is_empty()
    }
}

/// How much of the search context an analysis should consider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    Standard,
    Deep,
}

impl AnalysisDepth {
    /// Maps an experiment variant configuration label onto a depth
    pub fn from_label(label: &str) -> Self {
        match label {
            "deep" => AnalysisDepth::Deep,
            _ => AnalysisDepth::Standard,
        }
    }
}

/// Outcome classification of a fact check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Multiple reliable sources agree
    High,
    /// Some sources agree
    Medium,
    /// Single source or conflicting information
    Low,
    /// Contradictory or false
    Failed,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::High => "high",
            ValidationLevel::Medium => "medium",
            ValidationLevel::Low => "low",
            ValidationLevel::Failed => "failed",
        }
    }

    /// Weight used when scoring overall reliability
    pub fn weight(&self) -> f64 {
        match self {
            ValidationLevel::High => 1.0,
            ValidationLevel::Medium => 0.7,
            ValidationLevel::Low => 0.4,
            ValidationLevel::Failed => 0.0,
        }
    }
}

impl std::fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of validating one claim against collected sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub claim: String,
    pub level: ValidationLevel,
    pub confidence: f64,
    pub supporting_sources: Vec<String>,
    pub contradicting_sources: Vec<String>,
    pub explanation: String,
}

impl ValidationRecord {
    /// Record used when validation itself could not be carried out
    pub fn inconclusive(claim: &str, explanation: impl Into<String>) -> Self {
        Self {
            claim: claim.to_string(),
            level: ValidationLevel::Low,
            confidence: 0.3,
            supporting_sources: Vec::new(),
            contradicting_sources: Vec::new(),
            explanation: explanation.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.level == ValidationLevel::Failed
    }
}

/// A source a finding can be checked against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub content: String,
    #[serde(default = "web_kind")]
    pub kind: String,
}

fn web_kind() -> String {
    "web".to_string()
}

/// One step of a research plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub step: usize,
    pub query: String,
    #[serde(default, rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub reasoning: String,
}

impl PlanStep {
    pub fn new(step: usize, query: impl Into<String>, step_type: &str) -> Self {
        Self {
            step,
            query: query.into(),
            step_type: step_type.to_string(),
            reasoning: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_defaults_missing_fields() {
        let analysis: Analysis =
            serde_json::from_str(r#"{"key_findings": [{"finding": "Rust is fast"}]}"#).unwrap();

        assert_eq!(analysis.confidence, 0.5);
        assert_eq!(analysis.key_findings[0].source, "unknown");
        assert_eq!(analysis.key_findings[0].confidence, 0.5);
        assert!(analysis.gaps.is_empty());
    }

    #[test]
    fn test_validation_level_serializes_lowercase() {
        let json = serde_json::to_string(&ValidationLevel::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
        let level: ValidationLevel = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(level, ValidationLevel::Medium);
    }

    #[test]
    fn test_plan_step_reads_type_field() {
        let step: PlanStep =
            serde_json::from_str(r#"{"step": 2, "query": "q", "type": "specific"}"#).unwrap();
        assert_eq!(step.step_type, "specific");
        assert_eq!(step.reasoning, "");
    }
}
