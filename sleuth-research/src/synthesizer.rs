//! Research synthesis: compile accumulated findings into a report

use crate::types::ResearchState;
use sleuth_core::{GenerationOptions, TextGenerator};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Writes the final report, optionally in a custom writer's voice
pub struct ResearchSynthesizer {
    generator: Arc<dyn TextGenerator>,
    writer_prompt: Option<String>,
}

impl ResearchSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            writer_prompt: None,
        }
    }

    /// Use `prompt` as the system prompt for synthesis
    pub fn with_writer_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.writer_prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
        self
    }

    /// Load a writer prompt from a markdown file.
    ///
    /// An unreadable file is logged and standard synthesis is kept.
    pub fn with_writer_prompt_file(self, path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(prompt) => {
                info!(
                    path = %path.display(),
                    chars = prompt.len(),
                    "Loaded custom writer prompt"
                );
                self.with_writer_prompt(prompt)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Writer prompt not loaded");
                self
            }
        }
    }

    pub fn has_writer_prompt(&self) -> bool {
        self.writer_prompt.is_some()
    }

    /// Produce a report for `state`. Generation failures fall back to a
    /// plain markdown compilation of the findings.
    pub async fn synthesize(&self, state: &ResearchState) -> String {
        info!(
            query = %state.query,
            steps = state.steps.len(),
            custom_writer = self.writer_prompt.is_some(),
            "Synthesizing findings"
        );

        let result = match &self.writer_prompt {
            Some(writer_prompt) => {
                self.generator
                    .generate(
                        writer_prompt,
                        &writer_user_prompt(state),
                        &GenerationOptions::default().with_temperature(0.7),
                    )
                    .await
            }
            None => {
                self.generator
                    .generate(
                        &standard_system_prompt(state),
                        "Synthesize all research findings into a comprehensive report.",
                        &GenerationOptions::default().with_max_tokens(3000),
                    )
                    .await
            }
        };

        match result {
            Ok(report) if !report.trim().is_empty() => report,
            Ok(_) => {
                warn!("Synthesis returned empty text, compiling findings instead");
                fallback_report(state)
            }
            Err(e) => {
                warn!(error = %e, "Synthesis failed, compiling findings instead");
                fallback_report(state)
            }
        }
    }
}

fn standard_system_prompt(state: &ResearchState) -> String {
    let summary = state
        .steps
        .iter()
        .map(|step| {
            let findings = step
                .analysis
                .key_findings
                .iter()
                .map(|f| format!("- {} ({}, confidence {:.2})", f.finding, f.source, f.confidence))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Step {}:\nQuery: {}\nConfidence: {:.2}\nFindings:\n{}",
                step.step_number, step.query, step.confidence, findings
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are a research synthesis expert.

Original question: "{query}"

Research completed in {steps} steps:

{summary}

Write a well-structured markdown report answering the original question.
Cite the sources given with each finding, note remaining uncertainties, and
do not introduce claims that are not supported by the findings."#,
        query = state.query,
        steps = state.steps.len(),
        summary = summary,
    )
}

fn writer_user_prompt(state: &ResearchState) -> String {
    let findings = state
        .findings()
        .enumerate()
        .map(|(i, f)| format!("Finding {}: {}", i + 1, f.finding))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Research Query: {}\n\nResearch Findings Collected:\n{}\n\n\
         Please synthesize these findings into a comprehensive response to the research query, \
         using your specialized writing style and expertise.",
        state.query, findings
    )
}

/// Plain markdown compilation used when synthesis cannot be generated
pub fn fallback_report(state: &ResearchState) -> String {
    let mut report = format!("# Research Report: {}\n\n", state.query);

    let findings: Vec<_> = state.findings().collect();
    if findings.is_empty() {
        report.push_str("No research findings were collected.\n");
        return report;
    }

    report.push_str("## Findings\n\n");
    for (i, finding) in findings.iter().enumerate() {
        report.push_str(&format!(
            "{}. {} (source: {}, confidence {:.2})\n",
            i + 1,
            finding.finding,
            finding.source,
            finding.confidence
        ));
    }

    report.push_str(&format!(
        "\nResearch completed in {} steps with mean confidence {:.2}.\n",
        state.steps.len(),
        state.mean_confidence()
    ));
    report
}
