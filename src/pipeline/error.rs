//! Pipeline-specific error types.

use crate::pipeline::process::ProcessState;
use crate::pipeline::port::TypeTag;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    // ── Structural (assembly / validation) ──
    #[error("Process name '{0}' is already used in this pipeline")]
    DuplicateName(String),

    #[error("Process '{process}' already declares a port named '{port}'")]
    DuplicatePort { process: String, port: String },

    #[error("Process '{process}' cannot declare more than {limit} ports")]
    TooManyPorts { process: String, limit: usize },

    #[error("Unknown process '{0}'")]
    UnknownProcess(String),

    #[error("Process '{process}' has no {direction} port named '{port}'")]
    UnknownPort {
        process: String,
        port: String,
        direction: &'static str,
    },

    #[error(
        "Type mismatch connecting {src_process}.{src_port} ({src_type}) to {dst_process}.{dst_port} ({dst_type})"
    )]
    TypeMismatch {
        src_process: String,
        src_port: String,
        src_type: TypeTag,
        dst_process: String,
        dst_port: String,
        dst_type: TypeTag,
    },

    #[error("Input port {process}.{port} is already connected")]
    PortAlreadyConnected { process: String, port: String },

    #[error("Required input port {process}.{port} is not connected")]
    MissingRequiredConnection { process: String, port: String },

    #[error("Pipeline has not been validated")]
    NotValidated,

    // ── Configuration ──
    #[error("Configuration error in process '{process}': {message}")]
    Configuration { process: String, message: String },

    // ── Runtime ──
    #[error("Process '{process}' is {state:?}; cannot {operation}")]
    InvalidState {
        process: String,
        state: ProcessState,
        operation: &'static str,
    },

    #[error("Process '{process}' did not declare port '{port}'")]
    UndeclaredPort { process: String, port: String },

    #[error("Port {process}.{port} carried a payload that is not a {expected}")]
    PayloadType {
        process: String,
        port: String,
        expected: &'static str,
    },

    #[error("Edge closed")]
    EdgeClosed,

    #[error("Value pushed after end-of-stream on edge into {0}")]
    PushAfterComplete(String),

    #[error("Algorithm error in process '{process}': {message}")]
    Algorithm { process: String, message: String },

    #[error("Pipeline deadlocked; stalled processes: {}", .stalled.join(", "))]
    Deadlock { stalled: Vec<String> },

    #[error("Step limit of {0} exceeded")]
    StepLimitExceeded(u64),

    #[error("Pipeline run aborted")]
    Aborted,

    #[error("Worker for process '{0}' panicked")]
    WorkerPanicked(String),
}

impl PipelineError {
    /// True for errors raised during assembly or validation, before any step.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PipelineError::DuplicateName(_)
                | PipelineError::DuplicatePort { .. }
                | PipelineError::TooManyPorts { .. }
                | PipelineError::UnknownProcess(_)
                | PipelineError::UnknownPort { .. }
                | PipelineError::TypeMismatch { .. }
                | PipelineError::PortAlreadyConnected { .. }
                | PipelineError::MissingRequiredConnection { .. }
        )
    }

    pub fn configuration(process: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            process: process.into(),
            message: message.into(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
