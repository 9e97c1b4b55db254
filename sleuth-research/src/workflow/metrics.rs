//! Per-iteration metrics fed to the workflow state machine

use crate::types::ResearchState;
use serde::{Deserialize, Serialize};

/// Confidence must move by more than this between iterations to count as progress.
pub const PROGRESS_EPSILON: f64 = 0.05;

/// Number of most recent validations inspected for `validation_passed`.
pub const VALIDATION_WINDOW: usize = 3;

/// Scalar snapshot of research progress, rebuilt every iteration.
///
/// Every field is always present. Fields missing from a deserialized context
/// take the defaults below, which keep the loop searching rather than
/// declaring completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsContext {
    /// Mean per-step confidence (0-1)
    pub confidence: f64,
    /// Planned steps completed (0-1)
    pub coverage: f64,
    /// Failed validations so far
    pub contradictions: usize,
    /// Consecutive iterations whose confidence moved by at most `PROGRESS_EPSILON`
    pub iterations_without_progress: usize,
    /// Completed research steps
    pub results_found: usize,
    /// No failed validation among the most recent `VALIDATION_WINDOW`
    pub validation_passed: bool,
    /// Heuristic report quality (0-1)
    pub synthesis_quality: f64,
}

impl Default for MetricsContext {
    fn default() -> Self {
        Self {
            confidence: 0.0,
            coverage: 0.0,
            contradictions: 0,
            iterations_without_progress: 0,
            results_found: 0,
            validation_passed: false,
            synthesis_quality: 0.0,
        }
    }
}

/// Heuristic report quality: mean of a length score and research confidence
pub fn synthesis_quality(report: Option<&str>, confidence: f64) -> f64 {
    match report {
        Some(text) if !text.is_empty() => {
            let length_score = (text.chars().count() as f64 / 1000.0).min(1.0);
            (length_score + confidence) / 2.0
        }
        _ => 0.0,
    }
}

/// Builds a `MetricsContext` from accumulated state and tracks stagnation
/// across iterations.
#[derive(Debug, Clone, Default)]
pub struct MetricsTracker {
    previous_confidence: f64,
    iterations_without_progress: usize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations_without_progress(&self) -> usize {
        self.iterations_without_progress
    }

    /// Refresh the context for the iteration that just finished.
    ///
    /// Must be called exactly once per iteration since it advances the
    /// stagnation counter.
    pub fn build(&mut self, state: &ResearchState) -> MetricsContext {
        if state.steps.is_empty() && state.plan.is_empty() {
            // Nothing planned and nothing found: count it as a stalled
            // iteration and steer away from validation.
            self.iterations_without_progress += 1;
            return MetricsContext {
                iterations_without_progress: self.iterations_without_progress,
                ..MetricsContext::default()
            };
        }

        let confidence = state.mean_confidence();

        if (confidence - self.previous_confidence).abs() > PROGRESS_EPSILON {
            self.iterations_without_progress = 0;
        } else {
            self.iterations_without_progress += 1;
        }
        self.previous_confidence = confidence;

        MetricsContext {
            confidence,
            coverage: state.coverage(),
            contradictions: state.contradictions(),
            iterations_without_progress: self.iterations_without_progress,
            results_found: state.steps.len(),
            validation_passed: state.recent_validations_passed(VALIDATION_WINDOW),
            synthesis_quality: synthesis_quality(state.final_report.as_deref(), confidence),
        }
    }
}
