//! Adaptive workflow state machine
//!
//! Each call to [`WorkflowStateMachine::next_state`] evaluates a priority
//! ordered decision table against a fresh [`MetricsContext`], commits the
//! chosen state, and appends a [`StateTransition`] to the audit trail.
//!
//! ```text
//! 1. contradiction escalation   -> VALIDATING   (not already validating)
//! 2. stagnation escalation      -> REFINING     (not already refining)
//! 3. early completion           -> COMPLETED    (only from SYNTHESIZING)
//! 4. state-local default table
//! ```

use super::metrics::MetricsContext;
use super::state::{StateTransition, TransitionReason, WorkflowState};
use tracing::{debug, warn};

/// Contradiction count above which findings must be validated.
const CONTRADICTION_LIMIT: usize = 2;
/// Stalled iterations tolerated before escalating.
const STAGNATION_LIMIT: usize = 2;

/// Pure transition policy: the state to move to from `current` given `ctx`.
///
/// Returns `None` for terminal states, which have no outgoing transitions.
pub fn decide(
    current: WorkflowState,
    ctx: &MetricsContext,
) -> Option<(WorkflowState, TransitionReason)> {
    use TransitionReason as R;
    use WorkflowState as S;

    if current.is_terminal() {
        return None;
    }

    if current != S::Validating
        && ctx.results_found > 0
        && (ctx.contradictions > CONTRADICTION_LIMIT || ctx.confidence < 0.5)
    {
        return Some((S::Validating, R::ContradictionsDetected));
    }

    if current != S::Refining && ctx.iterations_without_progress > STAGNATION_LIMIT {
        return Some((S::Refining, R::StuckInLoop));
    }

    if current == S::Synthesizing
        && ctx.confidence > 0.8
        && ctx.coverage > 0.75
        && ctx.contradictions == 0
    {
        return Some((S::Completed, R::ObjectivesMet));
    }

    let next = match current {
        S::Planning => (S::Searching, R::PlanComplete),
        S::Searching => {
            if ctx.results_found == 0 {
                (S::Refining, R::NoResults)
            } else {
                (S::Analyzing, R::ResultsFound)
            }
        }
        S::Analyzing => {
            if ctx.confidence < 0.6 {
                (S::Searching, R::LowConfidence)
            } else if ctx.contradictions > CONTRADICTION_LIMIT {
                (S::Validating, R::ContradictionsFound)
            } else if ctx.coverage > 0.7 {
                (S::Synthesizing, R::SufficientCoverage)
            } else {
                (S::Searching, R::CoverageIncomplete)
            }
        }
        S::Validating => {
            if ctx.validation_passed {
                (S::Synthesizing, R::ValidationPassed)
            } else {
                (S::Refining, R::ValidationFailed)
            }
        }
        S::Refining => {
            // Forced exit: guarantees the refine/search cycle terminates.
            if ctx.iterations_without_progress > STAGNATION_LIMIT {
                (S::Synthesizing, R::ForcingSynthesisStuckInLoop)
            } else if ctx.coverage > 0.7 && ctx.results_found > 0 {
                (S::Synthesizing, R::SufficientResultsForSynthesis)
            } else {
                (S::Searching, R::StrategyRefined)
            }
        }
        S::Synthesizing => {
            if ctx.synthesis_quality > 0.8 {
                (S::Completed, R::HighQualitySynthesis)
            } else {
                (S::Analyzing, R::SynthesisNeedsImprovement)
            }
        }
        S::Completed | S::Failed => return None,
    };

    Some(next)
}

/// Holds the current state and its full transition history.
#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    current_state: WorkflowState,
    state_history: Vec<StateTransition>,
}

impl Default for WorkflowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStateMachine {
    /// Every machine starts in PLANNING.
    pub const INITIAL_STATE: WorkflowState = WorkflowState::Planning;

    pub fn new() -> Self {
        Self {
            current_state: Self::INITIAL_STATE,
            state_history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> WorkflowState {
        self.current_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn transition_count(&self) -> usize {
        self.state_history.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.current_state.is_terminal()
    }

    /// Evaluate the transition policy and commit the result.
    ///
    /// On a terminal state this is a no-op: nothing is recorded and the
    /// terminal state is returned unchanged.
    pub fn next_state(&mut self, ctx: &MetricsContext) -> WorkflowState {
        match decide(self.current_state, ctx) {
            Some((next, reason)) => self.transition_to(next, reason),
            None => {
                warn!(
                    state = %self.current_state,
                    "next_state called on terminal state; ignoring"
                );
                self.current_state
            }
        }
    }

    /// Drive the machine into FAILED for an unrecoverable condition.
    pub fn fail(&mut self, reason: impl Into<String>) -> WorkflowState {
        if self.current_state.is_terminal() {
            return self.current_state;
        }
        self.transition_to(WorkflowState::Failed, TransitionReason::Fatal(reason.into()))
    }

    fn transition_to(&mut self, next: WorkflowState, reason: TransitionReason) -> WorkflowState {
        debug!(
            from = %self.current_state,
            to = %next,
            reason = %reason,
            "Workflow transition"
        );
        self.state_history
            .push(StateTransition::new(self.current_state, next, reason));
        self.current_state = next;
        next
    }

    /// Initial state followed by every transition destination, in order.
    pub fn state_path(&self) -> Vec<WorkflowState> {
        std::iter::once(Self::INITIAL_STATE)
            .chain(self.state_history.iter().map(|t| t.to_state))
            .collect()
    }

    /// `state_path` rendered as state names
    pub fn state_path_names(&self) -> Vec<String> {
        self.state_path()
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }

    pub fn can_backtrack(&self) -> bool {
        !self.state_history.is_empty()
    }

    /// Drop the most recent `steps` transitions and restore the state they
    /// left from.
    ///
    /// Asking for zero steps or more steps than recorded leaves the machine
    /// unchanged.
    pub fn backtrack(&mut self, steps: usize) -> WorkflowState {
        if steps == 0 || steps > self.state_history.len() {
            return self.current_state;
        }

        let keep = self.state_history.len() - steps;
        self.state_history.truncate(keep);
        self.current_state = self
            .state_history
            .last()
            .map(|t| t.to_state)
            .unwrap_or(Self::INITIAL_STATE);

        debug!(steps = steps, state = %self.current_state, "Backtracked workflow");
        self.current_state
    }

    #[cfg(test)]
    pub(crate) fn with_state(state: WorkflowState) -> Self {
        Self {
            current_state: state,
            state_history: Vec::new(),
        }
    }
}
