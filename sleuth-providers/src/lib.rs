//! Sleuth Providers - HTTP adapters behind the collaborator traits
//!
//! - [`OpenRouterClient`]: OpenAI-compatible chat completions as a `TextGenerator`
//! - [`SearchOrchestrator`]: named search tools combined into a `SearchService`
//! - [`BraveSearchTool`] and [`ArxivSearchTool`]: web and academic search

pub mod arxiv;
pub mod brave;
mod http;
pub mod llm_client;
pub mod search;

pub use arxiv::ArxivSearchTool;
pub use brave::BraveSearchTool;
pub use llm_client::OpenRouterClient;
pub use search::{SearchOrchestrator, SearchTool};
