//! CollectorProcess: sink that records everything arriving on `input`.
//!
//! The port type is chosen at construction so one collector works for any
//! payload. Recorded datums are read back through a [`CollectorHandle`], which
//! stays valid after the pipeline takes ownership of the process.

use crate::pipeline::datum::Datum;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::port::{PortSet, TypeTag};
use crate::pipeline::process::{ConfigureContext, StepContext};
use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

pub const INPUT_PORT: &str = "input";

/// Shared view of what a collector has received.
#[derive(Clone, Default)]
pub struct CollectorHandle {
    datums: Arc<Mutex<Vec<Datum>>>,
}

impl CollectorHandle {
    fn record(&self, datum: Datum) {
        self.datums
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(datum);
    }

    /// Every recorded datum, in arrival order (end-of-stream excluded).
    pub fn datums(&self) -> Vec<Datum> {
        self.datums
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads of type `T`, in arrival order.
    pub fn values<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.datums
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Datum::value_arc::<T>)
            .collect()
    }

    /// Messages of recorded `Error` datums.
    pub fn errors(&self) -> Vec<String> {
        self.datums
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|d| d.error_message().map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.datums
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for CollectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorHandle")
            .field("len", &self.len())
            .finish()
    }
}

pub struct CollectorProcess {
    name: String,
    ports: PortSet,
    handle: CollectorHandle,
}

impl CollectorProcess {
    pub fn new(name: &str, type_tag: TypeTag) -> PipelineResult<Self> {
        let mut ports = PortSet::new(name);
        ports.declare_input(INPUT_PORT, type_tag, true)?;
        Ok(Self {
            name: name.to_string(),
            ports,
            handle: CollectorHandle::default(),
        })
    }

    pub fn handle(&self) -> CollectorHandle {
        self.handle.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn configure(&mut self, _ctx: &ConfigureContext) -> PipelineResult<()> {
        Ok(())
    }

    pub fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        let datum = ctx.pull(INPUT_PORT)?;
        if datum.is_complete() {
            tracing::debug!("Collected {} datum(s)", self.handle.len());
            ctx.mark_complete();
            return Ok(());
        }
        self.handle.record(datum);
        Ok(())
    }
}
