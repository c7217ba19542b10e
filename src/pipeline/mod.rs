//! Dataflow pipeline engine.
//!
//! Typed processes connected by bounded edges, driven by a scheduler until
//! end-of-stream has propagated from every source to every sink.
//!
//! # Architecture
//!
//! ```text
//! [FrameSource] ──image──► [ImageSegmentor] ──mask──► [DescriptorExtractor] ──► [Collector]
//!        └────────────timestamp──────────────────────────────┘
//! ```
//!
//! # Design
//!
//! - **Enum dispatch on hot path**: `BuiltinProcess` enum for the shipped
//!   processes, `ProcessPlugin` trait objects for everything else.
//! - **Engine-owned lifecycle**: `ProcessSlot` enforces the process state
//!   machine and delivers `Complete` exactly once per edge.
//! - **Shared payloads**: a `Datum` holds an `Arc`, so fan-out never copies.
//! - **Two schedulers**: cooperative (single thread, deadlock detection) and
//!   threaded (one worker per process, blocking edges).

pub mod compiled_plan;
pub mod compiler;
pub mod datum;
pub mod description;
pub mod edge;
pub mod error;
pub mod executor;
pub mod graph;
pub mod id;
pub mod port;
pub mod process;
pub mod processes;
pub(crate) mod slot;

#[cfg(test)]
pub(crate) mod test_support;

pub use compiled_plan::{ExecutionPlan, PlanStats};
pub use datum::{Datum, DatumKind, Payload};
pub use description::{
    BuiltPipeline, ConnectionDescription, PipelineDescription, ProcessDescription, ProcessFactory,
    ProcessKind,
};
pub use edge::{Edge, EdgeStats, PushOutcome};
pub use error::{PipelineError, PipelineResult};
pub use executor::{AbortHandle, ProcessReport, RunReport, Scheduler};
pub use graph::{EdgeInfo, Pipeline};
pub use id::{EdgeId, PortAddr, ProcessId};
pub use port::{ErrorPolicy, PortDescriptor, PortDirection, PortSet, TypeTag};
pub use process::{
    AnyProcess, BuiltinProcess, ConfigureContext, ProcessPlugin, ProcessState, StepContext,
};
pub use processes::{
    CollectorHandle, CollectorProcess, DescriptorExtractorProcess, FrameSourceProcess,
    ImageSegmentorProcess,
};
