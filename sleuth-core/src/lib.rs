//! Sleuth Core - shared infrastructure for the research pipeline
//!
//! Error handling, logging, configuration, async helpers, and the collaborator
//! traits that the research loop is written against.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
