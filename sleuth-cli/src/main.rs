//! Sleuth CLI - command-line interface for adaptive research
//!
//! Runs the research loop for a question and reports how the workflow
//! travelled through its states.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sleuth_core::{init_logging, LoggingConfig, SleuthConfig, SleuthResult};
use sleuth_providers::{ArxivSearchTool, BraveSearchTool, OpenRouterClient, SearchOrchestrator};
use sleuth_research::{AdaptivePipeline, ResearchOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(about = "Adaptive multi-step web research with an LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question
    Research {
        /// The research question
        query: String,

        /// Iteration budget for the adaptive loop
        #[arg(short = 'i', long)]
        max_iterations: Option<usize>,

        /// Markdown file used as the writer's system prompt for the final report
        #[arg(short, long)]
        writer_prompt: Option<PathBuf>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for experiment variant selection
        #[arg(long)]
        seed: Option<u64>,

        /// Model identifier
        #[arg(short, long)]
        model: Option<String>,

        /// Save every research step as it completes
        #[arg(long)]
        save_intermediate: bool,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging_config = LoggingConfig::for_verbosity(cli.verbose);
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting sleuth v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Research {
            query,
            max_iterations,
            writer_prompt,
            output,
            seed,
            model,
            save_intermediate,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.apply_env_overrides();
            if let Some(dir) = output {
                config.output.dir = dir;
            }
            if let Some(path) = writer_prompt {
                config.research.writer_prompt_path = Some(path);
            }
            if let Some(model) = model {
                config.llm.model = model;
            }
            if seed.is_some() {
                config.experiments.seed = seed;
            }
            if save_intermediate {
                config.output.save_intermediate = true;
            }
            config.validate()?;

            handle_research(&query, max_iterations, config, cli.verbose).await
        }
        Commands::Config {
            show,
            init,
            validate,
        } => handle_config(cli.config.as_deref(), show, init, validate),
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("sleuth").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".sleuth").join("config.toml")),
        Some(PathBuf::from("sleuth.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn load_config(config_path: Option<&Path>) -> SleuthResult<SleuthConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from {:?}", path);
        return SleuthConfig::from_file(path);
    }

    for path in default_config_paths() {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            return SleuthConfig::from_file(&path);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(SleuthConfig::default())
}

/// Register the available search tools and pick the ones to query.
///
/// Web search needs a Brave key; without one the academic tool stands in.
fn build_search(config: &SleuthConfig) -> Result<(SearchOrchestrator, Vec<String>)> {
    let timeout = config.search.timeout_seconds;
    let mut search = SearchOrchestrator::new();

    if let Some(key) = &config.search.brave_api_key {
        search.register_tool("web", Arc::new(BraveSearchTool::new(key.clone(), timeout)?));
    }
    search.register_tool("academic", Arc::new(ArxivSearchTool::new(timeout)?));

    let tools = select_tools(&config.search.tools, &search.tool_names());
    Ok((search, tools))
}

fn select_tools(requested: &[String], available: &[String]) -> Vec<String> {
    let mut tools: Vec<String> = requested
        .iter()
        .filter(|name| {
            let known = available.contains(name);
            if !known {
                warn!(tool = %name, "Search tool unavailable (set BRAVE_API_KEY for web search)");
            }
            known
        })
        .cloned()
        .collect();

    if tools.is_empty() {
        tools = available.to_vec();
    }
    tools
}

async fn handle_research(
    query: &str,
    max_iterations: Option<usize>,
    mut config: SleuthConfig,
    verbose: bool,
) -> Result<()> {
    let generator =
        OpenRouterClient::new(&config.llm).context("Set OPENROUTER_API_KEY or llm.api_key")?;
    let (search, tools) = build_search(&config)?;
    config.search.tools = tools;

    println!("\n{}", "=".repeat(60));
    println!("Query: {}", query);
    println!("Model: {}", config.llm.model);
    println!(
        "Max iterations: {}",
        max_iterations.unwrap_or(config.research.max_iterations)
    );
    println!("Search tools: {}", config.search.tools.join(", "));
    println!("{}\n", "=".repeat(60));

    let mut pipeline = AdaptivePipeline::new(Arc::new(generator), Arc::new(search), &config);
    let outcome = match pipeline.run(query, max_iterations).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Research failed");
            let path = pipeline.state_machine().state_path_names().join(" -> ");
            eprintln!("Research failed: {}", e);
            eprintln!("State path: {}", path);
            return Err(e.into());
        }
    };

    print_summary(&outcome, verbose);
    Ok(())
}

fn print_summary(outcome: &ResearchOutcome, verbose: bool) {
    let metadata = &outcome.artifact.metadata;

    println!("\n{}", "=".repeat(60));
    println!("RESEARCH FINISHED ({})", outcome.final_state);
    println!("{}", "=".repeat(60));

    println!("\nState path: {}", metadata.state_path.join(" -> "));
    println!("Transitions ({}):", metadata.total_transitions);
    for transition in &metadata.transitions {
        println!(
            "  {} -> {} ({})",
            transition.from_state, transition.to_state, transition.reason
        );
    }

    println!("\nSteps: {}", metadata.total_steps);
    println!("Average confidence: {:.2}", metadata.avg_confidence);
    println!(
        "Validations: {} (reliability {:.2})",
        metadata.validation_results, metadata.reliability_score
    );
    for (level, count) in &metadata.validation_counts {
        println!("  {}: {}", level, count);
    }
    if !metadata.refinements.is_empty() {
        let refinements: Vec<&str> = metadata.refinements.iter().map(|r| r.as_str()).collect();
        println!("Refinements: {}", refinements.join(", "));
    }
    let memory = &metadata.semantic_memory_stats;
    println!(
        "Semantic memory: {} findings, {} related matches ({})",
        memory.total_items, memory.related_matches, memory.model
    );

    println!("\nExperiments:");
    for (name, report) in &metadata.ab_test_results {
        match (&report.winner, report.mean, report.confidence) {
            (Some(winner), Some(mean), Some(confidence)) => println!(
                "  {}: variant {} (mean {:.3}, confidence {:.2})",
                name, winner, mean, confidence
            ),
            _ => println!(
                "  {}: {}",
                name,
                report.reason.as_deref().unwrap_or("no winner yet")
            ),
        }
    }

    match &outcome.persisted {
        Some(persisted) => {
            println!("\nResults saved to:");
            println!("  - JSON: {}", persisted.output_file.display());
            println!("  - Report: {}", persisted.report_file.display());
        }
        None => println!("\nResults were not saved"),
    }

    if verbose {
        let report = &outcome.artifact.final_report;
        println!("\nReport preview:\n{}", "-".repeat(60));
        println!("{}", report.chars().take(1000).collect::<String>());
        if report.chars().count() > 1000 {
            println!("\n... (truncated) ...");
        }
        println!("{}", "-".repeat(60));
    }
    println!();
}

fn handle_config(config_path: Option<&Path>, show: bool, init: bool, validate: bool) -> Result<()> {
    if init {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_paths()
                .into_iter()
                .next()
                .context("No configuration directory available")?,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        SleuthConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {}", path.display());
        println!("Edit the file to add your API keys and adjust settings.");
    }

    if show {
        let config = load_config(config_path)?;
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        let mut config = load_config(config_path)?;
        config.apply_env_overrides();
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
        if config.llm.api_key.is_none() {
            println!("Warning: no OpenRouter API key configured");
        }
        if config.search.brave_api_key.is_none() {
            println!("Warning: no Brave API key configured; web search is disabled");
        }
    }

    if !(init || show || validate) {
        println!("Nothing to do; pass --init, --show or --validate");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unavailable_tools_fall_back_to_registered() {
        assert_eq!(
            select_tools(&names(&["web"]), &names(&["academic"])),
            names(&["academic"])
        );
        assert_eq!(
            select_tools(&names(&["web", "academic"]), &names(&["web", "academic"])),
            names(&["web", "academic"])
        );
        assert_eq!(
            select_tools(&names(&["academic", "news"]), &names(&["web", "academic"])),
            names(&["academic"])
        );
    }

    #[test]
    fn test_explicit_config_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sleuth.toml");
        std::fs::write(&path, "[research]\nmax_iterations = 4\n").unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.research.max_iterations, 4);
        assert_eq!(config.research.max_search_queries, 5);

        assert!(load_config(Some(dir.path().join("missing.toml").as_path())).is_err());
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        handle_config(Some(path.as_path()), false, true, false).unwrap();
        let config = SleuthConfig::from_file(&path).unwrap();
        assert_eq!(config.llm.model, SleuthConfig::default().llm.model);
    }

    #[test]
    fn test_cli_parses_research_flags() {
        let cli = Cli::try_parse_from([
            "sleuth",
            "research",
            "how do tides work",
            "--max-iterations",
            "3",
            "--seed",
            "42",
        ])
        .unwrap();

        match cli.command {
            Commands::Research {
                query,
                max_iterations,
                seed,
                ..
            } => {
                assert_eq!(query, "how do tides work");
                assert_eq!(max_iterations, Some(3));
                assert_eq!(seed, Some(42));
            }
            Commands::Config { .. } => panic!("expected research command"),
        }
    }
}
