//! Adaptive research pipeline
//!
//! Each iteration executes the activity bound to the current workflow state,
//! rebuilds the metrics context from the accumulated research state, and asks
//! the state machine for the next state. The run ends on COMPLETED, FAILED,
//! or when the iteration budget is spent; an exhausted budget still ends with
//! a synthesis pass and persisted results.

use crate::analyzer::LlmResultAnalyzer;
use crate::experiment::{seeded_rng, ABTestManager, RandomSource, WinnerReport};
use crate::fact_checker::{reliability_score, LlmFactChecker};
use crate::memory::{MemoryMetadata, SemanticMemory};
use crate::orchestrator::ParallelResearcher;
use crate::planner::{PlanningStrategy, ResearchPlanner};
use crate::report::{FileReportStore, PersistedReport, ReportStore, ResearchArtifact, RunMetadata};
use crate::synthesizer::ResearchSynthesizer;
use crate::types::{RefinementStrategy, ResearchState};
use crate::workflow::{
    synthesis_quality, MetricsContext, MetricsTracker, WorkflowState, WorkflowStateMachine,
    VALIDATION_WINDOW,
};
use crate::{ResearchError, ResearchResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sleuth_core::{
    log_operation_error, log_operation_start, log_operation_success, performance, AnalysisDepth,
    Embedder, FactValidator, MemoryConfig, PlanStep, ResearchSettings, ResultAnalyzer,
    SearchService, SleuthConfig, TextGenerator, ValidationLevel,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Experiment comparing planning styles, scored by plan length over budget
pub const PLANNING_TEST: &str = "planning_strategy";
/// Experiment comparing analysis depth, scored by mean analysis confidence
pub const ANALYSIS_TEST: &str = "analysis_depth";

/// Recent steps inspected for gaps when refining and for related findings
/// when analyzing
const REFINE_LOOKBACK: usize = 3;
/// Findings per recent step looked up in semantic memory
const RELATED_FINDINGS_PER_STEP: usize = 2;

/// Read-only view of the driver for logging and telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub current_state: WorkflowState,
    pub state_path: Vec<String>,
    pub transition_count: usize,
    pub ab_winners: BTreeMap<String, WinnerReport>,
}

/// Result of a research run
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub artifact: ResearchArtifact,
    /// Where the results were written, if a store is configured and succeeded
    pub persisted: Option<PersistedReport>,
    pub final_state: WorkflowState,
    pub snapshot: PipelineSnapshot,
}

/// Drives the adaptive research loop for a query
pub struct AdaptivePipeline {
    settings: ResearchSettings,
    tools: Vec<String>,
    results_per_query: usize,
    min_samples: usize,
    generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchService>,
    analyzer: Arc<dyn ResultAnalyzer>,
    validator: Arc<dyn FactValidator>,
    planner: ResearchPlanner,
    synthesizer: ResearchSynthesizer,
    memory_config: MemoryConfig,
    memory: SemanticMemory,
    store: Option<Arc<dyn ReportStore>>,
    experiments: ABTestManager,
    rng: Box<dyn RandomSource + Send>,
    machine: WorkflowStateMachine,
    metrics: MetricsTracker,
    state: ResearchState,
}

impl AdaptivePipeline {
    /// Build a pipeline with model-backed analysis, fact checking and
    /// synthesis, persisting into `config.output.dir`.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchService>,
        config: &SleuthConfig,
    ) -> Self {
        let settings = config.research.clone();

        let mut synthesizer = ResearchSynthesizer::new(Arc::clone(&generator));
        if let Some(path) = &settings.writer_prompt_path {
            synthesizer = synthesizer.with_writer_prompt_file(path);
        }

        let store: Arc<dyn ReportStore> = Arc::new(
            FileReportStore::new(&config.output.dir)
                .with_intermediate_steps(config.output.save_intermediate),
        );

        let mut pipeline = Self {
            tools: config.search.tools.clone(),
            results_per_query: config.search.results_per_query,
            min_samples: config.experiments.min_samples,
            analyzer: Arc::new(LlmResultAnalyzer::new(Arc::clone(&generator))),
            validator: Arc::new(LlmFactChecker::new(Arc::clone(&generator))),
            planner: ResearchPlanner::new(Arc::clone(&generator), settings.max_search_queries),
            synthesizer,
            memory: SemanticMemory::offline(&config.memory),
            memory_config: config.memory.clone(),
            store: Some(store),
            experiments: ABTestManager::new(),
            rng: Box::new(seeded_rng(config.experiments.seed)),
            machine: WorkflowStateMachine::new(),
            metrics: MetricsTracker::new(),
            state: ResearchState::default(),
            generator,
            search,
            settings,
        };
        pipeline.setup_experiments();
        pipeline
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn ResultAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn FactValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Embed findings with `embedder` instead of the offline hashing embedder
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.memory = SemanticMemory::new(embedder, &self.memory_config);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ReportStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Keep results in memory only
    pub fn without_store(mut self) -> Self {
        self.store = None;
        self
    }

    pub fn with_rng(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_writer_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.synthesizer = self.synthesizer.with_writer_prompt(prompt);
        self
    }

    fn setup_experiments(&mut self) {
        let variants = |a: &str, b: &str| -> BTreeMap<String, Value> {
            [
                ("A".to_string(), Value::from(a)),
                ("B".to_string(), Value::from(b)),
            ]
            .into_iter()
            .collect()
        };
        self.experiments.create_test(
            PLANNING_TEST,
            "plan_quality",
            variants("comprehensive", "focused"),
        );
        self.experiments
            .create_test(ANALYSIS_TEST, "confidence", variants("deep", "standard"));
    }

    pub fn experiments(&self) -> &ABTestManager {
        &self.experiments
    }

    pub fn state_machine(&self) -> &WorkflowStateMachine {
        &self.machine
    }

    pub fn research_state(&self) -> &ResearchState {
        &self.state
    }

    pub fn memory(&self) -> &SemanticMemory {
        &self.memory
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            current_state: self.machine.current_state(),
            state_path: self.machine.state_path_names(),
            transition_count: self.machine.transition_count(),
            ab_winners: self.experiments.winners(self.min_samples),
        }
    }

    /// Research `query` until the workflow terminates or the iteration
    /// budget (default `max_iterations` from settings) is spent.
    ///
    /// Workflow, research state and semantic memory start fresh on every
    /// call; experiment results accumulate across calls on the same pipeline.
    pub async fn run(
        &mut self,
        query: &str,
        max_iterations: Option<usize>,
    ) -> ResearchResult<ResearchOutcome> {
        let budget = max_iterations.unwrap_or(self.settings.max_iterations);
        log_operation_start!(
            "research",
            query = query,
            model = self.generator.model_name(),
            max_iterations = budget
        );

        self.machine = WorkflowStateMachine::new();
        self.metrics = MetricsTracker::new();
        self.state = ResearchState::new(query);
        self.memory.clear();

        let mut iteration = 0;
        let mut last_activity = None;
        while !self.machine.is_terminal() && iteration < budget {
            iteration += 1;
            let current = self.machine.current_state();
            info!(iteration = iteration, state = %current, "Research iteration");

            match current {
                WorkflowState::Planning => {
                    if let Err(err) = self.plan_step().await {
                        return Err(self.fail_run(err));
                    }
                }
                WorkflowState::Searching => self.search_step().await,
                WorkflowState::Analyzing => self.analyze_step().await,
                WorkflowState::Validating => self.validate_step().await,
                WorkflowState::Refining => self.refine_step(),
                WorkflowState::Synthesizing => self.synthesize_step().await,
                WorkflowState::Completed | WorkflowState::Failed => break,
            }
            last_activity = Some(current);

            let context = self.metrics.build(&self.state);
            let next = self.machine.next_state(&context);
            self.log_transition(current, next, &context);
        }

        let final_state = self.machine.current_state();
        let report_is_current = last_activity == Some(WorkflowState::Synthesizing)
            && self.state.final_report.is_some();
        if !report_is_current {
            info!(
                state = %final_state,
                iterations = iteration,
                "Running final synthesis"
            );
            self.synthesize_step().await;
        }

        let artifact = self.build_artifact(iteration);
        let persisted = self.persist(&artifact).await;
        let snapshot = self.snapshot();

        log_operation_success!(
            "research",
            final_state = %final_state,
            transitions = snapshot.transition_count,
            state_path = %snapshot.state_path.join(" -> ")
        );

        Ok(ResearchOutcome {
            artifact,
            persisted,
            final_state,
            snapshot,
        })
    }

    fn fail_run(&mut self, err: ResearchError) -> ResearchError {
        log_operation_error!("research", err, state = %self.machine.current_state());
        self.machine.fail("planning_failed");
        ResearchError::fatal(format!("Planning failed: {}", err))
    }

    fn log_transition(&self, from: WorkflowState, to: WorkflowState, ctx: &MetricsContext) {
        let reason = self
            .machine
            .state_history()
            .last()
            .map(|t| t.reason.code().to_string())
            .unwrap_or_default();
        info!(
            from = %from,
            to = %to,
            reason = %reason,
            confidence = ctx.confidence,
            coverage = ctx.coverage,
            contradictions = ctx.contradictions,
            "Workflow transition"
        );
    }

    /// Draw a variant for an experiment; returns `(variant, configured label)`.
    fn choose_variant(&mut self, test_name: &str) -> Option<(String, String)> {
        let test = self.experiments.get_test(test_name)?;
        match test.get_variant(None, self.rng.as_mut()) {
            Ok(variant) => {
                let label = test
                    .variant_config(&variant)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Some((variant, label))
            }
            Err(err) => {
                warn!(test = test_name, error = %err, "Variant selection failed");
                None
            }
        }
    }

    fn record_variant(&mut self, test_name: &str, variant: &str, value: f64, label: &str) {
        let metadata: HashMap<String, Value> = [
            ("query".to_string(), Value::from(self.state.query.clone())),
            ("config".to_string(), Value::from(label)),
        ]
        .into_iter()
        .collect();

        if let Some(test) = self.experiments.get_test_mut(test_name) {
            if let Err(err) = test.record_result(variant, value, Some(metadata)) {
                warn!(test = test_name, error = %err, "Experiment result not recorded");
            }
        }
    }

    async fn plan_step(&mut self) -> ResearchResult<()> {
        let chosen = self.choose_variant(PLANNING_TEST);
        let strategy = chosen
            .as_ref()
            .map(|(_, label)| PlanningStrategy::from_label(label))
            .unwrap_or(PlanningStrategy::Comprehensive);
        info!(variant = ?chosen.as_ref().map(|(v, _)| v), strategy = ?strategy, "Planning");

        let plan = self.planner.plan(&self.state.query, strategy).await?;
        self.state.plan = plan;

        if let Some((variant, label)) = chosen {
            let quality =
                self.state.plan.len() as f64 / self.settings.max_search_queries.max(1) as f64;
            self.record_variant(PLANNING_TEST, &variant, quality, &label);
        }
        Ok(())
    }

    async fn search_step(&mut self) {
        let queries = self
            .state
            .pending_queries(self.settings.queries_per_iteration);
        if queries.is_empty() {
            info!("No queries to process");
            return;
        }

        let chosen = self.choose_variant(ANALYSIS_TEST);
        let depth = chosen
            .as_ref()
            .map(|(_, label)| AnalysisDepth::from_label(label))
            .unwrap_or(AnalysisDepth::Standard);
        info!(queries = queries.len(), depth = ?depth, "Searching");

        let researcher = ParallelResearcher::new(Arc::clone(&self.search), Arc::clone(&self.analyzer))
            .with_tools(self.tools.clone(), self.results_per_query)
            .with_limits(self.settings.max_concurrent_tasks, self.settings.task_timeout_ms);
        let outcomes =
            performance::measure_async("search_and_analyze", researcher.research(&queries, depth))
                .await;

        // Failed or timed-out searches carry no signal about analysis depth.
        let confidences: Vec<f64> = outcomes
            .iter()
            .filter(|o| o.hits_found > 0)
            .map(|o| o.analysis.confidence)
            .collect();
        for outcome in outcomes {
            if !outcome.analysis.has_findings() {
                debug!(query = %outcome.query, hits = outcome.hits_found, "No findings for query");
                continue;
            }
            for finding in &outcome.analysis.key_findings {
                let metadata = MemoryMetadata {
                    query: outcome.query.clone(),
                    confidence: outcome.analysis.confidence,
                    source: finding.source.clone(),
                    step_number: self.state.steps.len() + 1,
                };
                self.memory.store(&finding.finding, metadata).await;
            }
            let step_number = self.state.push_step(&outcome.query, outcome.analysis);
            if let (Some(store), Some(step)) = (&self.store, self.state.steps.last()) {
                if let Err(err) = store.persist_step(step).await {
                    warn!(step = step_number, error = %err, "Intermediate step not saved");
                }
            }
        }

        if let Some((variant, label)) = chosen {
            if !confidences.is_empty() {
                let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
                self.record_variant(ANALYSIS_TEST, &variant, mean, &label);
            }
        }
    }

    async fn analyze_step(&mut self) {
        let recent = self
            .state
            .steps
            .iter()
            .rev()
            .take(REFINE_LOOKBACK)
            .collect::<Vec<_>>();
        if recent.is_empty() {
            return;
        }

        let findings: usize = recent.iter().map(|s| s.analysis.key_findings.len()).sum();
        let gaps: usize = recent.iter().map(|s| s.analysis.gaps.len()).sum();
        let contradictions: usize = recent.iter().map(|s| s.analysis.contradictions.len()).sum();

        let mut related = 0;
        for step in &recent {
            for finding in step
                .analysis
                .key_findings
                .iter()
                .take(RELATED_FINDINGS_PER_STEP)
            {
                let matches = self
                    .memory
                    .related(
                        &finding.finding,
                        step.step_number,
                        self.memory_config.related_top_k,
                        self.memory_config.related_threshold,
                    )
                    .await;
                if !matches.is_empty() {
                    debug!(
                        step = step.step_number,
                        matches = matches.len(),
                        best = matches[0].similarity,
                        "Related findings in memory"
                    );
                }
                related += matches.len();
            }
        }

        info!(
            steps = recent.len(),
            findings = findings,
            gaps = gaps,
            reported_contradictions = contradictions,
            related_findings = related,
            mean_confidence = self.state.mean_confidence(),
            "Reviewed recent findings"
        );
    }

    async fn validate_step(&mut self) {
        if self.state.steps.is_empty() {
            info!("No findings to validate");
            return;
        }

        let sources = self.state.finding_sources();
        let sample: Vec<String> = self
            .state
            .findings()
            .take(self.settings.validation_sample_size)
            .map(|f| f.finding.clone())
            .collect();
        if sample.is_empty() {
            info!("No findings to validate");
            return;
        }

        for finding in sample {
            let record = self.validator.validate_finding(&finding, &sources).await;
            if record.is_failed() {
                warn!(explanation = %record.explanation, "Validation failed");
            } else {
                debug!(level = %record.level, confidence = record.confidence, "Validated finding");
            }
            self.state.validations.push(record);
        }
    }

    fn refine_step(&mut self) {
        let strategy = if self.state.steps.is_empty() {
            RefinementStrategy::BroadenSearchTerms
        } else if !self.state.recent_validations_passed(VALIDATION_WINDOW) {
            RefinementStrategy::SeekReliableSources
        } else {
            RefinementStrategy::ExploreDifferentPerspectives
        };
        self.state.refinements.push(strategy);

        let remaining = self
            .settings
            .max_search_queries
            .saturating_sub(self.state.gap_steps_added);
        let mut known: HashSet<String> = self
            .state
            .plan
            .iter()
            .map(|s| s.query.trim().to_lowercase())
            .collect();

        let gaps: Vec<String> = self
            .state
            .steps
            .iter()
            .rev()
            .take(REFINE_LOOKBACK)
            .flat_map(|s| s.analysis.gaps.iter())
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty() && known.insert(g.to_lowercase()))
            .take(remaining)
            .collect();

        for gap in &gaps {
            let step = PlanStep {
                reasoning: format!("Gap identified while refining ({})", strategy.as_str()),
                ..PlanStep::new(self.state.plan.len() + 1, gap.clone(), "gap")
            };
            self.state.plan.push(step);
        }
        self.state.gap_steps_added += gaps.len();

        info!(strategy = strategy.as_str(), gap_steps = gaps.len(), "Refined search strategy");
    }

    async fn synthesize_step(&mut self) {
        let report =
            performance::measure_async("synthesis", self.synthesizer.synthesize(&self.state)).await;
        let quality = synthesis_quality(Some(&report), self.state.mean_confidence());
        info!(chars = report.len(), quality = quality, "Synthesis complete");
        self.state.final_report = Some(report);
    }

    fn build_artifact(&self, iterations: usize) -> ResearchArtifact {
        let mut validation_counts: BTreeMap<String, usize> = [
            ValidationLevel::High,
            ValidationLevel::Medium,
            ValidationLevel::Low,
            ValidationLevel::Failed,
        ]
        .iter()
        .map(|level| (level.as_str().to_string(), 0))
        .collect();
        for record in &self.state.validations {
            *validation_counts
                .entry(record.level.as_str().to_string())
                .or_insert(0) += 1;
        }

        let now = Utc::now();
        ResearchArtifact {
            query: self.state.query.clone(),
            model: self.generator.model_name().to_string(),
            timestamp: now.format("%Y%m%d_%H%M%S").to_string(),
            created_at: now,
            research_plan: self.state.plan.clone(),
            research_steps: self.state.steps.clone(),
            final_report: self.state.final_report.clone().unwrap_or_default(),
            metadata: RunMetadata {
                total_steps: self.state.steps.len(),
                avg_confidence: self.state.mean_confidence(),
                iterations,
                final_state: self.machine.current_state(),
                state_path: self.machine.state_path_names(),
                total_transitions: self.machine.transition_count(),
                transitions: self.machine.state_history().to_vec(),
                validation_results: self.state.validations.len(),
                validation_counts,
                reliability_score: reliability_score(&self.state.validations),
                refinements: self.state.refinements.clone(),
                ab_test_results: self.experiments.winners(self.min_samples),
                semantic_memory_stats: self.memory.stats(),
            },
        }
    }

    async fn persist(&self, artifact: &ResearchArtifact) -> Option<PersistedReport> {
        let store = self.store.as_ref()?;
        match store.persist(artifact).await {
            Ok(persisted) => Some(persisted),
            Err(err) => {
                err.log();
                warn!("Research results were not persisted");
                None
            }
        }
    }
}
