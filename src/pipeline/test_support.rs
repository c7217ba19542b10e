//! Small plugin processes for unit tests.

use crate::pipeline::datum::Datum;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::graph::Pipeline;
use crate::pipeline::port::{PortSet, TypeTag};
use crate::pipeline::process::{AnyProcess, ProcessPlugin, StepContext};
use std::sync::{Arc, Mutex};

pub const NUMBER: TypeTag = TypeTag::from_static("number");

/// Emits `0..count` as `u32`, one per step, then completes.
pub struct CountingSource {
    name: String,
    ports: PortSet,
    next: u32,
    count: u32,
}

impl ProcessPlugin for CountingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        if self.next == self.count {
            ctx.mark_complete();
            return Ok(());
        }
        ctx.push_value("out", self.next)?;
        self.next += 1;
        Ok(())
    }
}

/// Forwards every datum from `in` to `out`.
pub struct Relay {
    name: String,
    ports: PortSet,
}

impl ProcessPlugin for Relay {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        if ctx.peek("in")?.is_complete() {
            ctx.mark_complete();
            return Ok(());
        }
        let datum = ctx.pull("in")?;
        ctx.push("out", datum)
    }
}

#[derive(Clone, Default)]
pub struct SinkHandle(Arc<Mutex<Vec<Datum>>>);

impl SinkHandle {
    pub fn values(&self) -> Vec<u32> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|d| d.value_as::<u32>().copied())
            .collect()
    }
}

/// Records every non-control datum from `in`.
pub struct Recorder {
    name: String,
    ports: PortSet,
    seen: SinkHandle,
}

impl ProcessPlugin for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        if ctx.peek("in")?.is_complete() {
            ctx.mark_complete();
            return Ok(());
        }
        let datum = ctx.pull("in")?;
        self.seen.0.lock().unwrap().push(datum);
        Ok(())
    }
}

fn plugin(p: impl ProcessPlugin + 'static) -> AnyProcess {
    AnyProcess::Plugin(Box::new(p))
}

pub fn source_n(name: &str, count: u32) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_output("out", NUMBER, false).unwrap();
    plugin(CountingSource {
        name: name.to_string(),
        ports,
        next: 0,
        count,
    })
}

pub fn source(name: &str) -> AnyProcess {
    source_n(name, 3)
}

pub fn relay(name: &str) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_input("in", NUMBER, true).unwrap();
    ports.declare_output("out", NUMBER, false).unwrap();
    plugin(Relay {
        name: name.to_string(),
        ports,
    })
}

pub fn sink_with_handle(name: &str) -> (AnyProcess, SinkHandle) {
    let mut ports = PortSet::new(name);
    ports.declare_input("in", NUMBER, true).unwrap();
    let seen = SinkHandle::default();
    let recorder = Recorder {
        name: name.to_string(),
        ports,
        seen: seen.clone(),
    };
    (plugin(recorder), seen)
}

pub fn sink(name: &str) -> AnyProcess {
    sink_with_handle(name).0
}

/// Connect `names[i].out -> names[i + 1].in` for each adjacent pair.
pub fn chain(pipeline: &mut Pipeline, names: &[&str]) {
    for pair in names.windows(2) {
        pipeline.connect(pair[0], "out", pair[1], "in").unwrap();
    }
}
