//! Workflow states and the transition records the machine appends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Research activity the loop is currently performing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Planning,
    Searching,
    Analyzing,
    Validating,
    Refining,
    Synthesizing,
    Completed,
    Failed,
}

impl WorkflowState {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Searching => "searching",
            Self::Analyzing => "analyzing",
            Self::Validating => "validating",
            Self::Refining => "refining",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbolic reason code attached to every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    ContradictionsDetected,
    StuckInLoop,
    ObjectivesMet,
    PlanComplete,
    NoResults,
    ResultsFound,
    LowConfidence,
    ContradictionsFound,
    SufficientCoverage,
    CoverageIncomplete,
    ValidationPassed,
    ValidationFailed,
    ForcingSynthesisStuckInLoop,
    SufficientResultsForSynthesis,
    StrategyRefined,
    HighQualitySynthesis,
    SynthesisNeedsImprovement,
    /// Caller-signalled unrecoverable condition
    Fatal(String),
}

impl TransitionReason {
    pub fn code(&self) -> &str {
        match self {
            Self::ContradictionsDetected => "contradictions_detected",
            Self::StuckInLoop => "stuck_in_loop",
            Self::ObjectivesMet => "objectives_met",
            Self::PlanComplete => "plan_complete",
            Self::NoResults => "no_results",
            Self::ResultsFound => "results_found",
            Self::LowConfidence => "low_confidence",
            Self::ContradictionsFound => "contradictions_found",
            Self::SufficientCoverage => "sufficient_coverage",
            Self::CoverageIncomplete => "coverage_incomplete",
            Self::ValidationPassed => "validation_passed",
            Self::ValidationFailed => "validation_failed",
            Self::ForcingSynthesisStuckInLoop => "forcing_synthesis_stuck_in_loop",
            Self::SufficientResultsForSynthesis => "sufficient_results_for_synthesis",
            Self::StrategyRefined => "strategy_refined",
            Self::HighQualitySynthesis => "high_quality_synthesis",
            Self::SynthesisNeedsImprovement => "synthesis_needs_improvement",
            Self::Fatal(code) => code,
        }
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Immutable record of one state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: WorkflowState,
    pub to_state: WorkflowState,
    pub reason: TransitionReason,
    pub timestamp: DateTime<Utc>,
}

impl StateTransition {
    pub(crate) fn new(from: WorkflowState, to: WorkflowState, reason: TransitionReason) -> Self {
        Self {
            from_state: from,
            to_state: to,
            reason,
            timestamp: Utc::now(),
        }
    }
}
