//! Collaborator trait definitions
//!
//! The research loop only talks to the outside world through these seams.

use crate::error::SleuthResult;
use crate::types::*;
use async_trait::async_trait;

/// Text completion service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a system prompt plus user prompt
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> SleuthResult<String>;

    /// Identifier of the model behind this generator
    fn model_name(&self) -> &str;
}

/// Ranked-result search service
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Search with every named tool and merge the results, deduplicated by URL
    async fn search_and_combine(
        &self,
        query: &str,
        tool_names: &[String],
        result_count: usize,
    ) -> SleuthResult<Vec<SearchHit>>;
}

/// Turns raw search results into structured findings
#[async_trait]
pub trait ResultAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        query: &str,
        hits: &[SearchHit],
        depth: AnalysisDepth,
    ) -> SleuthResult<Analysis>;
}

/// Cross-checks a finding against sources
#[async_trait]
pub trait FactValidator: Send + Sync {
    /// Never fails; problems degrade into an inconclusive record
    async fn validate_finding(&self, finding: &str, sources: &[SourceRef]) -> ValidationRecord;
}

/// Maps text to a dense vector for similarity search
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> SleuthResult<Vec<f32>>;

    /// Identifier of the embedding model
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;
}
