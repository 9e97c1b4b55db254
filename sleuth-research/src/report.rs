//! Persistence of finished research runs

use crate::experiment::WinnerReport;
use crate::memory::MemoryStats;
use crate::types::{RefinementStrategy, ResearchStep};
use crate::workflow::{StateTransition, WorkflowState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sleuth_core::{PlanStep, SleuthResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run-level metadata stored alongside the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub total_steps: usize,
    pub avg_confidence: f64,
    pub iterations: usize,
    pub final_state: WorkflowState,
    /// Initial state followed by every transition destination
    pub state_path: Vec<String>,
    pub total_transitions: usize,
    pub transitions: Vec<StateTransition>,
    /// Total validations performed
    pub validation_results: usize,
    /// Validation count per level name
    pub validation_counts: BTreeMap<String, usize>,
    pub reliability_score: f64,
    pub refinements: Vec<RefinementStrategy>,
    pub ab_test_results: BTreeMap<String, WinnerReport>,
    #[serde(default)]
    pub semantic_memory_stats: MemoryStats,
}

/// Everything produced by one research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchArtifact {
    pub query: String,
    pub model: String,
    /// `%Y%m%d_%H%M%S`, also used in file names
    pub timestamp: String,
    pub created_at: DateTime<Utc>,
    pub research_plan: Vec<PlanStep>,
    pub research_steps: Vec<ResearchStep>,
    pub final_report: String,
    pub metadata: RunMetadata,
}

impl ResearchArtifact {
    /// Human-readable markdown rendering of the report
    pub fn to_markdown(&self) -> String {
        format!(
            "# Research Report\n\n**Query:** {}\n\n**Date:** {}\n\n**Model:** {}\n\n---\n\n{}\n",
            self.query,
            self.created_at.format("%Y-%m-%d %H:%M:%S"),
            self.model,
            self.final_report
        )
    }
}

/// Locations written by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReport {
    pub output_file: PathBuf,
    pub report_file: PathBuf,
}

/// Destination for finished research runs
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn persist(&self, artifact: &ResearchArtifact) -> SleuthResult<PersistedReport>;

    /// Store an intermediate step; stores that keep no intermediates ignore it
    async fn persist_step(&self, _step: &ResearchStep) -> SleuthResult<()> {
        Ok(())
    }
}

/// Writes `research_<ts>.json` and `report_<ts>.md` into a directory
#[derive(Debug, Clone)]
pub struct FileReportStore {
    output_dir: PathBuf,
    save_intermediate: bool,
}

impl FileReportStore {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            save_intermediate: false,
        }
    }

    /// Also write `step_<n>.json` for every completed step
    pub fn with_intermediate_steps(mut self, enabled: bool) -> Self {
        self.save_intermediate = enabled;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn ensure_dir(&self) -> SleuthResult<()> {
        if !self.output_dir.exists() {
            tokio::fs::create_dir_all(&self.output_dir).await?;
            info!(
                "Created research output directory: {}",
                self.output_dir.display()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ReportStore for FileReportStore {
    async fn persist(&self, artifact: &ResearchArtifact) -> SleuthResult<PersistedReport> {
        self.ensure_dir().await?;

        let output_file = self
            .output_dir
            .join(format!("research_{}.json", artifact.timestamp));
        let report_file = self
            .output_dir
            .join(format!("report_{}.md", artifact.timestamp));

        tokio::fs::write(&output_file, serde_json::to_string_pretty(artifact)?).await?;
        tokio::fs::write(&report_file, artifact.to_markdown()).await?;

        info!(
            output = %output_file.display(),
            report = %report_file.display(),
            "Saved research results"
        );
        Ok(PersistedReport {
            output_file,
            report_file,
        })
    }

    async fn persist_step(&self, step: &ResearchStep) -> SleuthResult<()> {
        if !self.save_intermediate {
            return Ok(());
        }
        self.ensure_dir().await?;

        let path = self
            .output_dir
            .join(format!("step_{}.json", step.step_number));
        tokio::fs::write(&path, serde_json::to_string_pretty(step)?).await?;
        debug!(path = %path.display(), "Saved intermediate step");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::Analysis;

    fn artifact() -> ResearchArtifact {
        ResearchArtifact {
            query: "q".to_string(),
            model: "stub-model".to_string(),
            timestamp: "20260101_120000".to_string(),
            created_at: Utc::now(),
            research_plan: vec![PlanStep::new(1, "q", "broad_search")],
            research_steps: Vec::new(),
            final_report: "Body text".to_string(),
            metadata: RunMetadata {
                total_steps: 0,
                avg_confidence: 0.0,
                iterations: 2,
                final_state: WorkflowState::Completed,
                state_path: vec!["planning".to_string(), "searching".to_string()],
                total_transitions: 1,
                transitions: Vec::new(),
                validation_results: 0,
                validation_counts: BTreeMap::new(),
                reliability_score: 0.0,
                refinements: Vec::new(),
                ab_test_results: BTreeMap::new(),
                semantic_memory_stats: MemoryStats::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_persist_writes_json_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileReportStore::new(dir.path().join("out"));

        let persisted = store.persist(&artifact()).await.unwrap();
        assert!(persisted.output_file.ends_with("research_20260101_120000.json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&persisted.output_file).unwrap()).unwrap();
        assert_eq!(json["metadata"]["state_path"][1], "searching");
        assert_eq!(json["metadata"]["final_state"], "completed");
        assert_eq!(json["research_plan"][0]["type"], "broad_search");

        let markdown = std::fs::read_to_string(&persisted.report_file).unwrap();
        assert!(markdown.starts_with("# Research Report\n\n**Query:** q"));
        assert!(markdown.contains("Body text"));
    }

    #[tokio::test]
    async fn test_intermediate_steps_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let step = ResearchStep {
            step_number: 3,
            query: "q".to_string(),
            plan_index: Some(2),
            confidence: 0.5,
            analysis: Analysis::empty(),
            timestamp: Utc::now(),
        };

        FileReportStore::new(dir.path()).persist_step(&step).await.unwrap();
        assert!(!dir.path().join("step_3.json").exists());

        FileReportStore::new(dir.path())
            .with_intermediate_steps(true)
            .persist_step(&step)
            .await
            .unwrap();
        assert!(dir.path().join("step_3.json").exists());
    }
}
