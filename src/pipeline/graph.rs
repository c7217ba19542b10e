//! The pipeline graph: process registration, connection and validation.
//!
//! `Pipeline` owns every process (wrapped in a `ProcessSlot`) and every edge.
//! Slots hold `Arc<Edge>` handles for their own ports only. Assembly errors
//! never leave a half-applied change behind.

use crate::algo::AlgorithmRegistry;
use crate::config::EngineConfig;
use crate::pipeline::compiled_plan::ExecutionPlan;
use crate::pipeline::compiler::PipelineCompiler;
use crate::pipeline::edge::{Edge, EdgeStats};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::executor::AbortHandle;
use crate::pipeline::id::{EdgeId, PortAddr, ProcessId};
use crate::pipeline::port::{PortDirection, PortSet, TypeTag};
use crate::pipeline::process::{AnyProcess, ConfigureContext, ProcessState};
use crate::pipeline::slot::ProcessSlot;
use std::collections::HashMap;
use std::sync::Arc;

/// An edge and the two ports it joins.
pub(crate) struct EdgeRecord {
    pub id: EdgeId,
    pub from: PortAddr,
    pub to: PortAddr,
    pub edge: Arc<Edge>,
}

/// Read-only description of an edge, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeInfo {
    pub id: EdgeId,
    pub from_process: String,
    pub from_port: String,
    pub to_process: String,
    pub to_port: String,
    pub capacity: Option<usize>,
    pub stats: EdgeStats,
}

pub struct Pipeline {
    slots: Vec<ProcessSlot>,
    names: HashMap<String, ProcessId>,
    edges: Vec<EdgeRecord>,
    registry: Arc<AlgorithmRegistry>,
    default_capacity: Option<usize>,
    strict_validation: bool,
    validated: bool,
    abort: AbortHandle,
}

impl Pipeline {
    /// Empty pipeline with the built-in algorithms and default engine settings.
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            slots: Vec::new(),
            names: HashMap::new(),
            edges: Vec::new(),
            registry: Arc::new(AlgorithmRegistry::with_builtins()),
            default_capacity: config.edge_capacity(),
            strict_validation: config.validation.strict,
            validated: false,
            abort: AbortHandle::new(),
        }
    }

    /// Replace the algorithm registry used by `configure_all`.
    pub fn with_registry(mut self, registry: Arc<AlgorithmRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    // ── Assembly ──

    /// Add a process. Its name must be unique within the pipeline.
    pub fn add_process(&mut self, process: impl Into<AnyProcess>) -> PipelineResult<ProcessId> {
        let process = process.into();
        let name = process.name().to_string();
        if self.names.contains_key(&name) {
            return Err(PipelineError::DuplicateName(name));
        }
        let id = ProcessId(self.slots.len() as u32);
        tracing::debug!("Added process '{}' as {}", name, id);
        self.names.insert(name, id);
        self.slots.push(ProcessSlot::new(process));
        self.validated = false;
        Ok(id)
    }

    /// Connect an output port to an input port using the default capacity.
    pub fn connect(
        &mut self,
        src_process: &str,
        src_port: &str,
        dst_process: &str,
        dst_port: &str,
    ) -> PipelineResult<EdgeId> {
        self.connect_with_capacity(
            src_process,
            src_port,
            dst_process,
            dst_port,
            self.default_capacity,
        )
    }

    /// Connect with an explicit capacity (`None` for unbounded).
    pub fn connect_with_capacity(
        &mut self,
        src_process: &str,
        src_port: &str,
        dst_process: &str,
        dst_port: &str,
        capacity: Option<usize>,
    ) -> PipelineResult<EdgeId> {
        let src = self.lookup(src_process)?;
        let dst = self.lookup(dst_process)?;
        let (src_index, src_type) = self.resolve_port(src, src_port, PortDirection::Output)?;
        let (dst_index, dst_type) = self.resolve_port(dst, dst_port, PortDirection::Input)?;

        if src_type != dst_type {
            return Err(PipelineError::TypeMismatch {
                src_process: src_process.to_string(),
                src_port: src_port.to_string(),
                src_type,
                dst_process: dst_process.to_string(),
                dst_port: dst_port.to_string(),
                dst_type,
            });
        }
        if self.slots[dst.index()].inputs[usize::from(dst_index)].is_some() {
            return Err(PipelineError::PortAlreadyConnected {
                process: dst_process.to_string(),
                port: dst_port.to_string(),
            });
        }

        // All checks passed; mutate.
        let id = EdgeId(self.edges.len() as u32);
        let label = format!("{}.{} -> {}.{}", src_process, src_port, dst_process, dst_port);
        let edge = Arc::new(Edge::new(id, label, capacity));
        self.slots[src.index()].outputs[usize::from(src_index)].push(Arc::clone(&edge));
        self.slots[dst.index()].inputs[usize::from(dst_index)] = Some(Arc::clone(&edge));
        self.abort.register(Arc::clone(&edge));
        self.edges.push(EdgeRecord {
            id,
            from: PortAddr::new(src, src_index),
            to: PortAddr::new(dst, dst_index),
            edge,
        });
        self.validated = false;

        tracing::debug!(
            "Connected {}.{} -> {}.{} ({:?})",
            src_process,
            src_port,
            dst_process,
            dst_port,
            id
        );
        Ok(id)
    }

    /// Check that every required input is connected.
    pub fn validate(&mut self) -> PipelineResult<()> {
        for slot in &self.slots {
            for (index, port) in slot.ports.inputs() {
                if port.required && slot.inputs[usize::from(index)].is_none() {
                    return Err(PipelineError::MissingRequiredConnection {
                        process: slot.name.clone(),
                        port: port.name.clone(),
                    });
                }
            }
        }
        self.validated = true;
        tracing::info!(
            "Pipeline validated: {} processes, {} edges",
            self.slots.len(),
            self.edges.len()
        );
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Configure every process in insertion order, skipping those already
    /// configured. The first failure aborts.
    pub fn configure_all(&mut self) -> PipelineResult<()> {
        let ctx = ConfigureContext {
            registry: &self.registry,
            strict_validation: self.strict_validation,
        };
        for slot in &mut self.slots {
            if slot.state == ProcessState::Configured {
                continue;
            }
            slot.configure(&ctx)?;
        }
        Ok(())
    }

    /// Configure a single process.
    pub fn configure(&mut self, name: &str) -> PipelineResult<()> {
        let id = self.lookup(name)?;
        let ctx = ConfigureContext {
            registry: &self.registry,
            strict_validation: self.strict_validation,
        };
        self.slots[id.index()].configure(&ctx)
    }

    /// `validate` followed by `configure_all`.
    pub fn prepare(&mut self) -> PipelineResult<()> {
        self.validate()?;
        self.configure_all()
    }

    /// Compile the execution plan for the current graph.
    pub fn compile(&self) -> ExecutionPlan {
        PipelineCompiler::compile(&self.slots, &self.edges)
    }

    /// A handle that cancels a run from any thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    // ── Introspection ──

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Process names in insertion order.
    pub fn process_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.names.get(name).copied()
    }

    pub fn process_name(&self, id: ProcessId) -> Option<&str> {
        self.slots.get(id.index()).map(|s| s.name.as_str())
    }

    pub fn ports(&self, name: &str) -> PipelineResult<&PortSet> {
        let id = self.lookup(name)?;
        Ok(&self.slots[id.index()].ports)
    }

    pub fn state(&self, name: &str) -> PipelineResult<ProcessState> {
        let id = self.lookup(name)?;
        Ok(self.slots[id.index()].state)
    }

    pub fn step_count(&self, name: &str) -> PipelineResult<u64> {
        let id = self.lookup(name)?;
        Ok(self.slots[id.index()].steps)
    }

    /// Number of edges attached to an output port.
    pub fn output_edge_count(&self, process: &str, port: &str) -> PipelineResult<usize> {
        let id = self.lookup(process)?;
        let (index, _) = self.resolve_port(id, port, PortDirection::Output)?;
        Ok(self.slots[id.index()].outputs[usize::from(index)].len())
    }

    /// Every edge, in connection order.
    pub fn edges(&self) -> Vec<EdgeInfo> {
        self.edges.iter().map(|record| self.edge_info(record)).collect()
    }

    /// Shared handle to an edge.
    pub fn edge(&self, id: EdgeId) -> Option<&Arc<Edge>> {
        self.edges.get(id.index()).map(|record| &record.edge)
    }

    fn edge_info(&self, record: &EdgeRecord) -> EdgeInfo {
        let port_name = |addr: PortAddr| {
            self.slots[addr.process().index()]
                .ports
                .get(addr.port_index())
                .map(|p| p.name.clone())
                .unwrap_or_default()
        };
        EdgeInfo {
            id: record.id,
            from_process: self.slots[record.from.process().index()].name.clone(),
            from_port: port_name(record.from),
            to_process: self.slots[record.to.process().index()].name.clone(),
            to_port: port_name(record.to),
            capacity: record.edge.capacity(),
            stats: record.edge.stats(),
        }
    }

    // ── Internals shared with the schedulers ──

    pub(crate) fn slots(&self) -> &[ProcessSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [ProcessSlot] {
        &mut self.slots
    }

    fn lookup(&self, name: &str) -> PipelineResult<ProcessId> {
        self.process_id(name)
            .ok_or_else(|| PipelineError::UnknownProcess(name.to_string()))
    }

    /// Port index and type tag of a declared port.
    fn resolve_port(
        &self,
        id: ProcessId,
        port: &str,
        direction: PortDirection,
    ) -> PipelineResult<(u16, TypeTag)> {
        let slot = &self.slots[id.index()];
        slot.ports
            .find(port, direction)
            .and_then(|index| slot.ports.get(index).map(|p| (index, p.type_tag.clone())))
            .ok_or_else(|| PipelineError::UnknownPort {
                process: slot.name.clone(),
                port: port.to_string(),
                direction: direction.as_str(),
            })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("processes", &self.process_names())
            .field("edges", &self.edges.len())
            .field("validated", &self.validated)
            .finish()
    }
}
