//! Research planning: turns a query into an ordered list of search steps

use crate::extract::extract_json;
use crate::{ResearchError, ResearchResult};
use serde_json::Value;
use sleuth_core::{GenerationOptions, PlanStep, TextGenerator};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Planning style under A/B comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningStrategy {
    /// Detailed plan using the full query budget
    Comprehensive,
    /// Short plan of at most three steps
    Focused,
}

impl PlanningStrategy {
    pub fn from_label(label: &str) -> Self {
        match label {
            "focused" => PlanningStrategy::Focused,
            _ => PlanningStrategy::Comprehensive,
        }
    }

    /// Largest plan this strategy may produce
    pub fn max_steps(&self, max_search_queries: usize) -> usize {
        let budget = max_search_queries.max(1);
        match self {
            PlanningStrategy::Comprehensive => budget,
            PlanningStrategy::Focused => budget.min(3),
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            PlanningStrategy::Comprehensive => {
                "Cover the topic thoroughly: background, current state, specifics, \
                 examples, and open debates."
            }
            PlanningStrategy::Focused => {
                "Keep the plan tight: only the searches needed to answer the question directly."
            }
        }
    }
}

/// Plan used when the model returns an empty plan
pub fn default_plan(query: &str) -> Vec<PlanStep> {
    vec![
        PlanStep::new(1, query, "broad_search"),
        PlanStep::new(2, format!("{} details", query), "specific"),
        PlanStep::new(3, format!("{} examples", query), "examples"),
    ]
}

/// Plan used when the model output cannot be parsed at all
pub fn fallback_plan(query: &str) -> Vec<PlanStep> {
    vec![PlanStep {
        reasoning: "Direct search for the main query (fallback mode)".to_string(),
        ..PlanStep::new(1, query, "fallback")
    }]
}

/// Asks the text generator for a research plan
pub struct ResearchPlanner {
    generator: Arc<dyn TextGenerator>,
    max_search_queries: usize,
}

impl ResearchPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>, max_search_queries: usize) -> Self {
        Self {
            generator,
            max_search_queries,
        }
    }

    /// Create a plan for `query`.
    ///
    /// Malformed model output degrades to a one-step plan; only a failed
    /// generation call is returned as an error.
    pub async fn plan(
        &self,
        query: &str,
        strategy: PlanningStrategy,
    ) -> ResearchResult<Vec<PlanStep>> {
        let max_steps = strategy.max_steps(self.max_search_queries);
        info!(query = query, strategy = ?strategy, max_steps = max_steps, "Planning research");

        let system_prompt = self.system_prompt(query, strategy, max_steps);
        let response = self
            .generator
            .generate(
                &system_prompt,
                &format!("Create research plan for: {}", query),
                &GenerationOptions::default(),
            )
            .await
            .map_err(|e| ResearchError::planning(format!("Plan generation failed: {}", e)))?;

        let plan = parse_plan(&response, query, max_steps);
        debug!(steps = plan.len(), "Research plan ready");
        for step in &plan {
            debug!("  {}. {} ({})", step.step, step.query, step.step_type);
        }
        Ok(plan)
    }

    fn system_prompt(&self, query: &str, strategy: PlanningStrategy, max_steps: usize) -> String {
        format!(
            r#"You are a research planning expert.

Break the research question into at most {max_steps} web search steps.
{guidance}

Question: "{query}"

Return ONLY a JSON array:
[
  {{"step": 1, "query": "search terms", "type": "broad_search|specific|examples|comparison", "reasoning": "why this search"}}
]"#,
            max_steps = max_steps,
            guidance = strategy.guidance(),
            query = query,
        )
    }
}

/// Interpret model output as a plan, applying the fallback and default rules.
pub fn parse_plan(response: &str, query: &str, max_steps: usize) -> Vec<PlanStep> {
    let value = match extract_json(response) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Plan output unparseable, using fallback plan");
            return fallback_plan(query);
        }
    };

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("plan").or_else(|| map.remove("steps")) {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("Plan output has no step list, using fallback plan");
                return fallback_plan(query);
            }
        },
        _ => return fallback_plan(query),
    };

    let mut plan: Vec<PlanStep> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<PlanStep>(entry).ok())
        .filter(|step| !step.query.trim().is_empty())
        .take(max_steps.max(1))
        .collect();

    if plan.is_empty() {
        warn!("Planning generated 0 steps, using default plan");
        return default_plan(query);
    }

    for (index, step) in plan.iter_mut().enumerate() {
        step.step = index + 1;
    }
    plan
}
