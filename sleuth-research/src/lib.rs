//! Sleuth Research - the adaptive research loop
//!
//! This crate holds the control logic that decides *when* to search, analyze,
//! validate, refine, or synthesize, and how to interpret the signals coming
//! back from those activities:
//!
//! - **Workflow** ([`workflow`]): the state machine and the per-iteration metrics it consumes
//! - **Experiments** ([`experiment`]): A/B variant selection and winner statistics
//! - **Memory** ([`memory`]): embedding-backed lookup of related findings
//! - **Pipeline** ([`pipeline`]): the driver tying planning, search, analysis,
//!   validation, refinement, synthesis and persistence together
//!
//! All I/O goes through the collaborator traits in `sleuth-core`.

pub mod analyzer;
pub mod experiment;
pub mod extract;
pub mod fact_checker;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod report;
pub mod synthesizer;
pub mod types;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use analyzer::LlmResultAnalyzer;
pub use experiment::{
    seeded_rng, ABTest, ABTestManager, RandomSource, SequenceSource, TestResult, Variant,
    VariantStats, WinnerReport, DEFAULT_MIN_SAMPLES,
};
pub use fact_checker::{reliability_score, LlmFactChecker};
pub use memory::{
    cosine_similarity, HashingEmbedder, MemoryItem, MemoryMetadata, MemoryStats, RelatedFinding,
    SemanticMemory,
};
pub use orchestrator::{ParallelResearcher, QueryOutcome};
pub use pipeline::{AdaptivePipeline, PipelineSnapshot, ResearchOutcome};
pub use planner::{PlanningStrategy, ResearchPlanner};
pub use report::{FileReportStore, PersistedReport, ReportStore, ResearchArtifact, RunMetadata};
pub use synthesizer::ResearchSynthesizer;
pub use types::{RefinementStrategy, ResearchState, ResearchStep};
pub use workflow::{
    MetricsContext, MetricsTracker, StateTransition, TransitionReason, WorkflowState,
    WorkflowStateMachine,
};

/// Research-level error type
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("Core error: {0}")]
    Core(#[from] sleuth_core::SleuthError),

    #[error("Experiment error: {message}")]
    Experiment { message: String },

    #[error("Workflow error: {message}")]
    Workflow { message: String },

    #[error("Planning error: {message}")]
    Planning { message: String },

    /// Unrecoverable condition that ended the run in FAILED
    #[error("Research failed: {message}")]
    Fatal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ResearchResult<T> = Result<T, ResearchError>;

impl ResearchError {
    /// Create an experiment error
    pub fn experiment<S: Into<String>>(message: S) -> Self {
        Self::Experiment {
            message: message.into(),
        }
    }

    /// Create a workflow error
    pub fn workflow<S: Into<String>>(message: S) -> Self {
        Self::Workflow {
            message: message.into(),
        }
    }

    /// Create a planning error
    pub fn planning<S: Into<String>>(message: S) -> Self {
        Self::Planning {
            message: message.into(),
        }
    }

    /// Create a fatal error
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}
