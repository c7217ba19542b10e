//! Error handling for procflow
//!
//! `PipelineError` covers graph assembly and execution; this crate-level type
//! wraps it together with configuration, I/O and serialization failures for
//! callers such as the binary.

use crate::algo::AlgoError;
use crate::config::ConfigError;
use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for procflow operations
#[derive(Error, Debug)]
pub enum ProcflowError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Algorithm error: {0}")]
    Algorithm(#[from] AlgoError),

    /// Errors reading a configuration block
    #[error("Config block error: {0}")]
    ConfigBlock(#[from] ConfigError),

    /// Errors related to engine configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcflowError>,
    },
}

impl ProcflowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcflowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for ProcflowError {
    fn from(err: serde_json::Error) -> Self {
        ProcflowError::Serialization(err.to_string())
    }
}

/// Result type alias for procflow operations
pub type Result<T> = std::result::Result<T, ProcflowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ProcflowError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
