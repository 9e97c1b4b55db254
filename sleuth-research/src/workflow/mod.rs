//! Workflow state machine driving the adaptive research loop

pub mod machine;
pub mod metrics;
pub mod state;

pub use machine::{decide, WorkflowStateMachine};
pub use metrics::{synthesis_quality, MetricsContext, MetricsTracker, PROGRESS_EPSILON, VALIDATION_WINDOW};
pub use state::{StateTransition, TransitionReason, WorkflowState};
