//! Configuration management

use crate::error::{ErrorContext, SleuthError, SleuthResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a sleuth installation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SleuthConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchSettings,
    pub experiments: ExperimentSettings,
    pub memory: MemoryConfig,
    pub output: OutputConfig,
}

/// Text-generation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// API key; falls back to `OPENROUTER_API_KEY`
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "x-ai/grok-4-fast:online".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            api_key: None,
            timeout_seconds: 120,
        }
    }
}

/// Search backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Tool names consulted for every query
    pub tools: Vec<String>,
    pub results_per_query: usize,
    /// Brave Search subscription token; falls back to `BRAVE_API_KEY`
    pub brave_api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tools: vec!["web".to_string()],
            results_per_query: 5,
            brave_api_key: None,
            timeout_seconds: 30,
        }
    }
}

/// Adaptive research loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    /// Iteration budget for the adaptive loop
    pub max_iterations: usize,
    /// Upper bound on planned search steps
    pub max_search_queries: usize,
    /// Queries taken from the plan per SEARCHING iteration
    pub queries_per_iteration: usize,
    /// Worker pool size for parallel search and analysis
    pub max_concurrent_tasks: usize,
    /// Per-task timeout in milliseconds
    pub task_timeout_ms: u64,
    /// Findings validated per VALIDATING iteration
    pub validation_sample_size: usize,
    /// Markdown file used as the synthesis system prompt
    pub writer_prompt_path: Option<PathBuf>,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_search_queries: 5,
            queries_per_iteration: 3,
            max_concurrent_tasks: 3,
            task_timeout_ms: 30_000,
            validation_sample_size: 5,
            writer_prompt_path: None,
        }
    }
}

/// A/B testing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSettings {
    /// Minimum recorded results before a winner is declared
    pub min_samples: usize,
    /// Seed for variant sampling; random when absent
    pub seed: Option<u64>,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            min_samples: 30,
            seed: None,
        }
    }
}

/// Semantic memory of research findings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Vector size of the built-in hashing embedder
    pub dimensions: usize,
    pub cache_enabled: bool,
    /// Cached embeddings kept before the oldest is evicted
    pub max_cache_size: usize,
    /// Related findings looked up per finding during ANALYZING
    pub related_top_k: usize,
    /// Minimum cosine similarity for a finding to count as related
    pub related_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            cache_enabled: true,
            max_cache_size: 10_000,
            related_top_k: 3,
            related_threshold: 0.75,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub save_intermediate: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./research_outputs"),
            save_intermediate: false,
        }
    }
}

impl SleuthConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SleuthResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SleuthError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> SleuthResult<Self> {
        toml::from_str(content).map_err(|e| SleuthError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SleuthResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SleuthError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SleuthError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Fill unset secrets and the model from the environment
    pub fn apply_env_overrides(&mut self) {
        if self.llm.api_key.is_none() {
            self.llm.api_key = std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }
        if self.search.brave_api_key.is_none() {
            self.search.brave_api_key = std::env::var("BRAVE_API_KEY")
                .ok()
                .filter(|k| !k.is_empty());
        }
        if let Ok(model) = std::env::var("SLEUTH_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> SleuthResult<()> {
        if self.research.max_iterations == 0 {
            return Err(invalid(
                "research.max_iterations must be greater than 0",
                "Set research.max_iterations to a positive value",
            ));
        }

        if self.research.max_concurrent_tasks == 0 {
            return Err(invalid(
                "research.max_concurrent_tasks must be greater than 0",
                "Set research.max_concurrent_tasks to a positive value",
            ));
        }

        if self.search.results_per_query == 0 {
            return Err(invalid(
                "search.results_per_query must be greater than 0",
                "Set search.results_per_query to a positive value",
            ));
        }

        if self.memory.dimensions == 0 {
            return Err(invalid(
                "memory.dimensions must be greater than 0",
                "Set memory.dimensions to a positive value",
            ));
        }

        if !(-1.0..=1.0).contains(&self.memory.related_threshold) {
            return Err(invalid(
                "memory.related_threshold must be within [-1.0, 1.0]",
                "Use a cosine similarity threshold such as 0.75",
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid(
                "llm.temperature must be within [0.0, 2.0]",
                "Use a sampling temperature between 0.0 and 2.0",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str, suggestion: &str) -> SleuthError {
    SleuthError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion(suggestion),
    }
}
