//! Configuration module for procflow
//!
//! Two layers:
//! - [`ConfigBlock`]: the hierarchical key/value store every process and
//!   algorithm is configured from.
//! - [`EngineConfig`]: engine-wide settings (scheduler, edges, validation,
//!   logging), persisted as TOML.
//!
//! # Config Location
//!
//! The default engine configuration lives in the platform config directory:
//! - **Linux**: `~/.config/dev.hxyulin.procflow/engine.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.procflow/engine.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.procflow\engine.toml`
//!
//! # Example
//!
//! ```ignore
//! use procflow::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default(EngineConfig::default_path().unwrap());
//! let scheduler = procflow::pipeline::Scheduler::from_config(&config);
//! ```

pub mod block;

pub use block::{ConfigBlock, ConfigError, ConfigResult, BLOCK_SEP};

use crate::error::{ProcflowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.procflow";

/// Engine config filename
pub const ENGINE_CONFIG_FILE: &str = "engine.toml";

/// Default bound on every edge
pub const DEFAULT_EDGE_CAPACITY: usize = 16;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,procflow=debug";

/// Platform config directory for procflow
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// How the scheduler drives processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    /// Single thread, plan order, deadlock detection.
    #[default]
    Cooperative,
    /// One worker thread per process.
    Threaded,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub strategy: SchedulerKind,
    /// Abort with `StepLimitExceeded` after this many steps in total.
    pub max_steps: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Capacity of edges created without an explicit one.
    pub capacity: usize,
    /// Ignore `capacity` and create unbounded edges.
    pub unbounded: bool,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EDGE_CAPACITY,
            unbounded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Default for processes that do not set `strict_validation` themselves.
    /// When false, a failed algorithm configuration check is only a warning.
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub edges: EdgeConfig,
    pub validation: ValidationConfig,
    pub log: LogConfig,
}

impl EngineConfig {
    /// `<config dir>/dev.hxyulin.procflow/engine.toml`
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join(ENGINE_CONFIG_FILE))
    }

    /// Capacity for new edges; `None` means unbounded.
    pub fn edge_capacity(&self) -> Option<usize> {
        (!self.edges.unbounded).then_some(self.edges.capacity)
    }

    /// Reject settings the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !self.edges.unbounded && self.edges.capacity == 0 {
            return Err(ProcflowError::Config(
                "edges.capacity must be at least 1 (or set edges.unbounded)".to_string(),
            ));
        }
        if self.scheduler.max_steps == Some(0) {
            return Err(ProcflowError::Config(
                "scheduler.max_steps must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProcflowError::Config(format!("Failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            ProcflowError::Serialization(format!("Failed to serialize engine config: {}", e))
        })
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProcflowError::Config(format!(
                "Failed to read engine config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save as TOML, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProcflowError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .map_err(|e| ProcflowError::Config(format!("Failed to write engine config: {}", e)))
    }
}
