//! # procflow: typed dataflow pipelines
//!
//! A pipeline is a graph of named processes joined by bounded, typed edges.
//! Each process declares its ports up front, is configured once, and is then
//! stepped by a scheduler: it pulls datums from its inputs, optionally hands
//! the work to a pluggable delegate algorithm, and pushes results downstream.
//! End-of-stream markers propagate from sources to sinks until every process
//! is complete.
//!
//! ## Architecture
//!
//! - **Pipeline**: assembly, validation and introspection of the graph
//! - **Scheduler**: cooperative (single thread) or threaded execution
//! - **Algorithms**: delegate capabilities resolved by name from a registry
//! - **Config**: hierarchical `ConfigBlock`s for processes, TOML for the engine
//!
//! ## Configuration
//!
//! Engine settings live in the platform config directory under
//! `dev.hxyulin.procflow`:
//!
//! - **Linux**: `~/.config/dev.hxyulin.procflow/engine.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.procflow/engine.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.procflow\engine.toml`
//!
//! ## Example
//!
//! ```ignore
//! use procflow::config::ConfigBlock;
//! use procflow::pipeline::{
//!     FrameSourceProcess, ImageSegmentorProcess, Pipeline, Scheduler,
//! };
//!
//! let mut pipeline = Pipeline::new();
//! pipeline.add_process(FrameSourceProcess::new("src", ConfigBlock::new())?)?;
//! pipeline.add_process(ImageSegmentorProcess::new(
//!     "seg",
//!     ConfigBlock::new().with("segmentor:type", "threshold"),
//! )?)?;
//! pipeline.connect("src", "image", "seg", "image")?;
//! pipeline.prepare()?;
//!
//! let report = Scheduler::cooperative().run(&mut pipeline)?;
//! println!("{} steps", report.total_steps);
//! ```

pub mod algo;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use algo::{AlgoError, AlgorithmRegistry};
pub use config::{ConfigBlock, EngineConfig, SchedulerKind};
pub use error::{ProcflowError, Result, ResultExt};
pub use pipeline::{Datum, Pipeline, PipelineError, RunReport, Scheduler};
