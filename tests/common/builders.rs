//! Test processes and pipeline builders

use procflow::pipeline::{
    AnyProcess, Datum, DatumKind, Pipeline, PipelineResult, PortSet, ProcessPlugin, StepContext,
    TypeTag,
};
use procflow::{EngineConfig, SchedulerKind};
use std::sync::{Arc, Mutex};

pub const NUMBER: TypeTag = TypeTag::from_static("number");
pub const TEXT: TypeTag = TypeTag::from_static("text");

fn plugin(p: impl ProcessPlugin + 'static) -> AnyProcess {
    AnyProcess::Plugin(Box::new(p))
}

/// Emits the given values on `out`, one per step, then completes.
pub struct NumberSource {
    name: String,
    ports: PortSet,
    values: Vec<u32>,
    next: usize,
}

impl ProcessPlugin for NumberSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        match self.values.get(self.next) {
            Some(&value) => {
                ctx.push_value("out", value)?;
                self.next += 1;
            }
            None => ctx.mark_complete(),
        }
        Ok(())
    }
}

/// Forwards `in` to `out`, adding `offset` to every value.
pub struct Adder {
    name: String,
    ports: PortSet,
    offset: u32,
}

impl ProcessPlugin for Adder {
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
        if let Some(value) = ctx.grab::<u32>("in")? {
            ctx.push_value("out", *value + self.offset)?;
        }
        Ok(())
    }
}

/// Adds `a` and `b` pairwise. Never marks itself complete.
pub struct Zip {
    name: String,
    ports: PortSet,
}

impl ProcessPlugin for Zip {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        let a = ctx.pull("a")?;
        let b = ctx.pull("b")?;
        if let (Some(a), Some(b)) = (a.value_as::<u32>(), b.value_as::<u32>()) {
            ctx.push_value("out", a + b)?;
        }
        Ok(())
    }
}

/// What a [`Recorder`] saw.
#[derive(Clone, Default)]
pub struct Recording {
    values: Arc<Mutex<Vec<u32>>>,
    optional: Arc<Mutex<Vec<DatumKind>>>,
}

impl Recording {
    pub fn values(&self) -> Vec<u32> {
        self.values.lock().unwrap().clone()
    }

    /// Kinds pulled from the optional `extra` input, one per step.
    pub fn optional_kinds(&self) -> Vec<DatumKind> {
        self.optional.lock().unwrap().clone()
    }
}

/// Sink with a required `in` and an optional `extra` input.
pub struct Recorder {
    name: String,
    ports: PortSet,
    recording: Recording,
}

impl ProcessPlugin for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        let extra = ctx.pull("extra")?;
        self.recording.optional.lock().unwrap().push(extra.kind());

        let datum = ctx.pull("in")?;
        if datum.is_complete() {
            ctx.mark_complete();
            return Ok(());
        }
        if let Some(value) = datum.value_as::<u32>() {
            self.recording.values.lock().unwrap().push(*value);
        }
        Ok(())
    }
}

/// Pushes a value, then a second `Complete` on the same port.
pub struct DoubleCompleter {
    name: String,
    ports: PortSet,
}

impl ProcessPlugin for DoubleCompleter {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &PortSet {
        &self.ports
    }

    fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        ctx.push_value("out", 7u32)?;
        ctx.push("out", Datum::make_complete())?;
        ctx.push("out", Datum::make_complete())?;
        ctx.mark_complete();
        Ok(())
    }
}

pub fn number_source(name: &str, values: &[u32]) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_output("out", NUMBER, false).unwrap();
    plugin(NumberSource {
        name: name.to_string(),
        ports,
        values: values.to_vec(),
        next: 0,
    })
}

pub fn counting_source(name: &str, count: u32) -> AnyProcess {
    let values: Vec<u32> = (0..count).collect();
    number_source(name, &values)
}

pub fn adder(name: &str, offset: u32) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_input("in", NUMBER, true).unwrap();
    ports.declare_output("out", NUMBER, false).unwrap();
    plugin(Adder {
        name: name.to_string(),
        ports,
        offset,
    })
}

pub fn relay(name: &str) -> AnyProcess {
    adder(name, 0)
}

pub fn recorder(name: &str) -> (AnyProcess, Recording) {
    let mut ports = PortSet::new(name);
    ports.declare_input("in", NUMBER, true).unwrap();
    ports.declare_input("extra", NUMBER, false).unwrap();
    let recording = Recording::default();
    let process = plugin(Recorder {
        name: name.to_string(),
        ports,
        recording: recording.clone(),
    });
    (process, recording)
}

pub fn zip(name: &str) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_input("a", NUMBER, true).unwrap();
    ports.declare_input("b", NUMBER, true).unwrap();
    ports.declare_output("out", NUMBER, false).unwrap();
    plugin(Zip {
        name: name.to_string(),
        ports,
    })
}

pub fn double_completer(name: &str) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_output("out", NUMBER, false).unwrap();
    plugin(DoubleCompleter {
        name: name.to_string(),
        ports,
    })
}

/// Recorder whose `in` port carries `type_tag`.
pub fn typed_sink(name: &str, type_tag: TypeTag) -> AnyProcess {
    let mut ports = PortSet::new(name);
    ports.declare_input("in", type_tag, true).unwrap();
    ports.declare_input("extra", NUMBER, false).unwrap();
    plugin(Recorder {
        name: name.to_string(),
        ports,
        recording: Recording::default(),
    })
}

/// Builder for engine configurations used in tests
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn strategy(mut self, strategy: SchedulerKind) -> Self {
        self.config.scheduler.strategy = strategy;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.edges.capacity = capacity;
        self
    }

    pub fn max_steps(mut self, max_steps: u64) -> Self {
        self.config.scheduler.max_steps = Some(max_steps);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.validation.strict = strict;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// `src -> [+1] -> sink` over `values`, validated and configured.
pub fn linear_pipeline(config: &EngineConfig, values: &[u32]) -> (Pipeline, Recording) {
    let mut pipeline = Pipeline::from_config(config);
    let (sink, recording) = recorder("sink");
    pipeline.add_process(number_source("src", values)).unwrap();
    pipeline.add_process(adder("inc", 1)).unwrap();
    pipeline.add_process(sink).unwrap();
    pipeline.connect("src", "out", "inc", "in").unwrap();
    pipeline.connect("inc", "out", "sink", "in").unwrap();
    pipeline.prepare().unwrap();
    (pipeline, recording)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfigBuilder::new()
            .strategy(SchedulerKind::Threaded)
            .capacity(2)
            .max_steps(10)
            .build();

        assert_eq!(config.scheduler.strategy, SchedulerKind::Threaded);
        assert_eq!(config.edge_capacity(), Some(2));
        assert_eq!(config.scheduler.max_steps, Some(10));
    }
}
