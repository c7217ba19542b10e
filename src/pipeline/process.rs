//! Process abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`ProcessPlugin` trait**: for user-defined processes.
//! - **`BuiltinProcess` enum**: the shipped processes, dispatched by `match`.
//!
//! `AnyProcess` wraps either variant so the pipeline can handle both uniformly.
//!
//! Processes never touch edges directly. Each `step` receives a [`StepContext`]
//! that reads from the process's connected input edges and buffers outputs;
//! the scheduler delivers the buffered outputs after the step returns.

use crate::algo::AlgorithmRegistry;
use crate::pipeline::datum::Datum;
use crate::pipeline::edge::Edge;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::port::{PortDirection, PortSet};
use crate::pipeline::processes::{
    CollectorProcess, DescriptorExtractorProcess, FrameSourceProcess, ImageSegmentorProcess,
};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;

/// Lifecycle state, enforced by the pipeline rather than by each process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Constructed,
    Configured,
    Running,
    Complete,
    Failed,
}

impl ProcessState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Complete | ProcessState::Failed)
    }

    /// `step` may only be called in these states.
    #[inline]
    pub fn is_steppable(self) -> bool {
        matches!(self, ProcessState::Configured | ProcessState::Running)
    }
}

/// Context passed to `configure`.
pub struct ConfigureContext<'a> {
    /// Resolves nested algorithm configuration to delegate instances.
    pub registry: &'a AlgorithmRegistry,
    /// Pipeline-wide default; a process may override it with its own
    /// `strict_validation` key.
    pub strict_validation: bool,
}

/// Context passed to `step`.
pub struct StepContext<'a> {
    process: &'a str,
    ports: &'a PortSet,
    /// Indexed by port index; `None` for outputs and unconnected inputs.
    inputs: &'a [Option<Arc<Edge>>],
    /// Indexed by port index; empty for inputs and unconnected outputs.
    outputs: &'a [Vec<Arc<Edge>>],
    /// Datums produced this step, indexed by port index.
    outbox: &'a mut [Vec<Datum>],
    /// Output ports that already carry `Complete`.
    closed_ports: &'a mut [bool],
    finished: bool,
    step: u64,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        process: &'a str,
        ports: &'a PortSet,
        inputs: &'a [Option<Arc<Edge>>],
        outputs: &'a [Vec<Arc<Edge>>],
        outbox: &'a mut [Vec<Datum>],
        closed_ports: &'a mut [bool],
        step: u64,
    ) -> Self {
        Self {
            process,
            ports,
            inputs,
            outputs,
            outbox,
            closed_ports,
            finished: false,
            step,
        }
    }

    pub fn process_name(&self) -> &str {
        self.process
    }

    /// Zero-based count of steps this process has taken before this one.
    pub fn step_index(&self) -> u64 {
        self.step
    }

    fn port(&self, name: &str, direction: PortDirection) -> PipelineResult<usize> {
        self.ports
            .find(name, direction)
            .map(usize::from)
            .ok_or_else(|| PipelineError::UndeclaredPort {
                process: self.process.to_string(),
                port: name.to_string(),
            })
    }

    /// Edge behind an input port, or `None` if the port is optional and
    /// unconnected.
    fn input_edge(&self, name: &str) -> PipelineResult<Option<&Arc<Edge>>> {
        let index = self.port(name, PortDirection::Input)?;
        match &self.inputs[index] {
            Some(edge) => Ok(Some(edge)),
            None if self.ports.get(index as u16).is_some_and(|p| p.required) => {
                Err(PipelineError::MissingRequiredConnection {
                    process: self.process.to_string(),
                    port: name.to_string(),
                })
            }
            None => Ok(None),
        }
    }

    pub fn is_input_connected(&self, name: &str) -> bool {
        self.ports
            .find(name, PortDirection::Input)
            .is_some_and(|i| self.inputs[usize::from(i)].is_some())
    }

    /// Look at the head of an input without consuming it. Unconnected
    /// optional inputs yield `Empty`.
    pub fn peek(&self, port: &str) -> PipelineResult<Datum> {
        match self.input_edge(port)? {
            Some(edge) => edge.peek(),
            None => Ok(Datum::make_empty()),
        }
    }

    /// Consume the head of an input. Unconnected optional inputs yield
    /// `Empty`; a `Complete` head is returned without being consumed.
    pub fn pull(&mut self, port: &str) -> PipelineResult<Datum> {
        match self.input_edge(port)? {
            Some(edge) => edge.pull(),
            None => Ok(Datum::make_empty()),
        }
    }

    /// Pull and downcast. Control datums yield `None`; a value of another
    /// type is a `PayloadType` error.
    pub fn grab<T: Any + Send + Sync>(&mut self, port: &str) -> PipelineResult<Option<Arc<T>>> {
        let datum = self.pull(port)?;
        self.value_of::<T>(port, &datum)
    }

    /// Downcast a datum previously pulled from `port`.
    pub fn value_of<T: Any + Send + Sync>(
        &self,
        port: &str,
        datum: &Datum,
    ) -> PipelineResult<Option<Arc<T>>> {
        if datum.is_control() {
            return Ok(None);
        }
        datum
            .value_arc::<T>()
            .map(Some)
            .ok_or_else(|| PipelineError::PayloadType {
                process: self.process.to_string(),
                port: port.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Queue a datum on an output port. Datums on unconnected outputs are
    /// dropped at delivery.
    pub fn push(&mut self, port: &str, datum: Datum) -> PipelineResult<()> {
        let index = self.port(port, PortDirection::Output)?;
        if self.closed_ports[index] {
            if datum.is_complete() {
                return Ok(());
            }
            return Err(PipelineError::PushAfterComplete(format!(
                "{}.{}",
                self.process, port
            )));
        }
        if datum.is_complete() {
            self.closed_ports[index] = true;
        }
        self.outbox[index].push(datum);
        Ok(())
    }

    pub fn push_value<T: Any + Send + Sync>(&mut self, port: &str, value: T) -> PipelineResult<()> {
        self.push(port, Datum::make_value(value))
    }

    /// Queue `Complete` on every output port that has not received it yet.
    pub fn push_complete_all(&mut self) {
        for (index, _) in self.ports.outputs() {
            let index = usize::from(index);
            if !self.closed_ports[index] {
                self.closed_ports[index] = true;
                self.outbox[index].push(Datum::make_complete());
            }
        }
    }

    /// Number of edges attached to an output port; zero when undeclared.
    pub fn output_edge_count(&self, port: &str) -> usize {
        self.ports
            .find(port, PortDirection::Output)
            .map_or(0, |i| self.outputs[usize::from(i)].len())
    }

    /// Signal that this process will produce nothing more. Pending outputs
    /// from this step are still delivered, followed by `Complete` on every
    /// output port.
    pub fn mark_complete(&mut self) {
        self.finished = true;
    }

    pub fn is_marked_complete(&self) -> bool {
        self.finished
    }
}

/// Trait for user-defined processes.
pub trait ProcessPlugin: Send {
    /// Unique name of this process instance.
    fn name(&self) -> &str;

    /// Ports declared at construction.
    fn ports(&self) -> &PortSet;

    /// Read configuration and instantiate delegates. Called exactly once.
    fn configure(&mut self, _ctx: &ConfigureContext) -> PipelineResult<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()>;
}

/// Enum dispatch for built-in processes.
pub enum BuiltinProcess {
    FrameSource(FrameSourceProcess),
    ImageSegmentor(ImageSegmentorProcess),
    DescriptorExtractor(DescriptorExtractorProcess),
    Collector(CollectorProcess),
}

impl BuiltinProcess {
    pub fn name(&self) -> &str {
        match self {
            BuiltinProcess::FrameSource(p) => p.name(),
            BuiltinProcess::ImageSegmentor(p) => p.name(),
            BuiltinProcess::DescriptorExtractor(p) => p.name(),
            BuiltinProcess::Collector(p) => p.name(),
        }
    }

    pub fn ports(&self) -> &PortSet {
        match self {
            BuiltinProcess::FrameSource(p) => p.ports(),
            BuiltinProcess::ImageSegmentor(p) => p.ports(),
            BuiltinProcess::DescriptorExtractor(p) => p.ports(),
            BuiltinProcess::Collector(p) => p.ports(),
        }
    }

    pub fn configure(&mut self, ctx: &ConfigureContext) -> PipelineResult<()> {
        match self {
            BuiltinProcess::FrameSource(p) => p.configure(ctx),
            BuiltinProcess::ImageSegmentor(p) => p.configure(ctx),
            BuiltinProcess::DescriptorExtractor(p) => p.configure(ctx),
            BuiltinProcess::Collector(p) => p.configure(ctx),
        }
    }

    pub fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        match self {
            BuiltinProcess::FrameSource(p) => p.step(ctx),
            BuiltinProcess::ImageSegmentor(p) => p.step(ctx),
            BuiltinProcess::DescriptorExtractor(p) => p.step(ctx),
            BuiltinProcess::Collector(p) => p.step(ctx),
        }
    }
}

/// Wrapper that holds either a built-in process or a plugin.
pub enum AnyProcess {
    Builtin(BuiltinProcess),
    Plugin(Box<dyn ProcessPlugin>),
}

impl AnyProcess {
    pub fn name(&self) -> &str {
        match self {
            AnyProcess::Builtin(p) => p.name(),
            AnyProcess::Plugin(p) => p.name(),
        }
    }

    pub fn ports(&self) -> &PortSet {
        match self {
            AnyProcess::Builtin(p) => p.ports(),
            AnyProcess::Plugin(p) => p.ports(),
        }
    }

    pub fn configure(&mut self, ctx: &ConfigureContext) -> PipelineResult<()> {
        match self {
            AnyProcess::Builtin(p) => p.configure(ctx),
            AnyProcess::Plugin(p) => p.configure(ctx),
        }
    }

    pub fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        match self {
            AnyProcess::Builtin(p) => p.step(ctx),
            AnyProcess::Plugin(p) => p.step(ctx),
        }
    }
}

impl From<BuiltinProcess> for AnyProcess {
    fn from(process: BuiltinProcess) -> Self {
        AnyProcess::Builtin(process)
    }
}

impl From<Box<dyn ProcessPlugin>> for AnyProcess {
    fn from(process: Box<dyn ProcessPlugin>) -> Self {
        AnyProcess::Plugin(process)
    }
}

macro_rules! impl_from_builtin {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AnyProcess {
                fn from(process: $ty) -> Self {
                    AnyProcess::Builtin(BuiltinProcess::$variant(process))
                }
            }
        )*
    };
}

impl_from_builtin! {
    FrameSource => FrameSourceProcess,
    ImageSegmentor => ImageSegmentorProcess,
    DescriptorExtractor => DescriptorExtractorProcess,
    Collector => CollectorProcess,
}
