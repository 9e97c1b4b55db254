//! Types for the adaptive research loop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_core::{Analysis, KeyFinding, PlanStep, SourceRef, ValidationRecord};
use std::collections::BTreeSet;

/// One completed search-and-analyze step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchStep {
    /// 1-based position in the research history
    pub step_number: usize,
    pub query: String,
    /// 0-based index of the plan step this answers, if any
    #[serde(default)]
    pub plan_index: Option<usize>,
    pub confidence: f64,
    pub analysis: Analysis,
    pub timestamp: DateTime<Utc>,
}

/// How the loop adjusts course when it enters REFINING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStrategy {
    /// Nothing has been found yet
    BroadenSearchTerms,
    /// A recent validation failed
    SeekReliableSources,
    ExploreDifferentPerspectives,
}

impl RefinementStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementStrategy::BroadenSearchTerms => "broaden_search_terms",
            RefinementStrategy::SeekReliableSources => "seek_reliable_sources",
            RefinementStrategy::ExploreDifferentPerspectives => "explore_different_perspectives",
        }
    }
}

/// Everything the loop has accumulated for one query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchState {
    pub query: String,
    pub plan: Vec<PlanStep>,
    pub steps: Vec<ResearchStep>,
    /// Plan indices answered by a completed step
    #[serde(default)]
    pub completed_plan: BTreeSet<usize>,
    pub validations: Vec<ValidationRecord>,
    pub final_report: Option<String>,
    pub refinements: Vec<RefinementStrategy>,
    /// Plan steps appended from analysis gaps during refinement
    pub gap_steps_added: usize,
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Mean per-step confidence, 0 without steps
    pub fn mean_confidence(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.steps.iter().map(|s| s.confidence).sum::<f64>() / self.steps.len() as f64
    }

    /// Fraction of distinct plan steps answered
    pub fn coverage(&self) -> f64 {
        if self.plan.is_empty() {
            return 0.0;
        }
        (self.completed_plan.len() as f64 / self.plan.len() as f64).min(1.0)
    }

    /// Number of failed validations
    pub fn contradictions(&self) -> usize {
        self.validations.iter().filter(|v| v.is_failed()).count()
    }

    /// True when none of the last `window` validations failed
    pub fn recent_validations_passed(&self, window: usize) -> bool {
        let start = self.validations.len().saturating_sub(window);
        !self.validations[start..].iter().any(|v| v.is_failed())
    }

    /// First `limit` plan queries without a completed step, in plan order.
    /// A query whose analysis produced nothing stays pending.
    pub fn pending_queries(&self, limit: usize) -> Vec<String> {
        self.plan
            .iter()
            .enumerate()
            .filter(|(index, step)| {
                !self.completed_plan.contains(index) && !step.query.trim().is_empty()
            })
            .take(limit)
            .map(|(_, step)| step.query.clone())
            .collect()
    }

    fn open_plan_index(&self, query: &str) -> Option<usize> {
        let query = query.trim();
        self.plan
            .iter()
            .enumerate()
            .find(|(index, step)| !self.completed_plan.contains(index) && step.query.trim() == query)
            .map(|(index, _)| index)
    }

    pub fn findings(&self) -> impl Iterator<Item = &KeyFinding> {
        self.steps.iter().flat_map(|s| s.analysis.key_findings.iter())
    }

    /// Findings rendered as sources for fact checking
    pub fn finding_sources(&self) -> Vec<SourceRef> {
        self.findings()
            .map(|f| SourceRef {
                title: f.source.clone(),
                content: f.finding.clone(),
                kind: "web".to_string(),
            })
            .collect()
    }

    /// Records a completed step and returns its number. The first open plan
    /// step with the same query is marked answered.
    pub fn push_step(&mut self, query: &str, analysis: Analysis) -> usize {
        let step_number = self.steps.len() + 1;
        let plan_index = self.open_plan_index(query);
        if let Some(index) = plan_index {
            self.completed_plan.insert(index);
        }
        self.steps.push(ResearchStep {
            step_number,
            query: query.to_string(),
            plan_index,
            confidence: analysis.confidence,
            analysis,
            timestamp: Utc::now(),
        });
        step_number
    }
}
