//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type SleuthResult<T> = Result<T, SleuthError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the sleuth system
#[derive(Error, Debug)]
pub enum SleuthError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Generation failed: {message}")]
    Generation {
        message: String,
        model: Option<String>,
        context: ErrorContext,
    },

    #[error("Search error: {message}")]
    Search {
        message: String,
        tool: Option<String>,
        context: ErrorContext,
    },

    #[error("Extraction error: {message}")]
    Extraction {
        message: String,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl SleuthError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SleuthError::Config { context, .. } => Some(context),
            SleuthError::Generation { context, .. } => Some(context),
            SleuthError::Search { context, .. } => Some(context),
            SleuthError::Extraction { context, .. } => Some(context),
            SleuthError::Storage { context, .. } => Some(context),
            SleuthError::Network { context, .. } => Some(context),
            SleuthError::Timeout { context, .. } => Some(context),
            SleuthError::Validation { context, .. } => Some(context),
            SleuthError::NotFound { context, .. } => Some(context),
            SleuthError::Internal { context, .. } => Some(context),
            SleuthError::Io(_) | SleuthError::Serialization(_) => None,
        }
    }

    /// Check if error is recoverable
    ///
    /// Recoverable errors are degraded into placeholders by the research loop
    /// instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SleuthError::Network { .. }
                | SleuthError::Timeout { .. }
                | SleuthError::Generation { .. }
                | SleuthError::Search { .. }
                | SleuthError::Extraction { .. }
        )
    }

    /// Get retry delay in milliseconds for recoverable errors
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            SleuthError::Network { .. } => Some(1000),
            SleuthError::Timeout { .. } => Some(2000),
            SleuthError::Generation { .. } => Some(1500),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SleuthError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            SleuthError::Config { .. } | SleuthError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            _ if self.is_recoverable() => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Recoverable error"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! generation_error {
    ($msg:expr, $component:expr) => {
        $crate::SleuthError::Generation {
            message: $msg.to_string(),
            model: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $model:expr) => {
        $crate::SleuthError::Generation {
            message: $msg.to_string(),
            model: Some($model.to_string()),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! search_error {
    ($msg:expr, $component:expr) => {
        $crate::SleuthError::Search {
            message: $msg.to_string(),
            tool: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $tool:expr) => {
        $crate::SleuthError::Search {
            message: $msg.to_string(),
            tool: Some($tool.to_string()),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::SleuthError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'sleuth config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::SleuthError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
