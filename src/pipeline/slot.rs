//! Engine-side wrapper around a process instance.
//!
//! A `ProcessSlot` owns the process, its cached port set, the edge handles
//! bound to each port and the queue of outputs not yet delivered. It is the
//! single place the process state machine is enforced; schedulers only call
//! `step` and `deliver`.

use crate::pipeline::datum::Datum;
use crate::pipeline::edge::{Edge, PushOutcome};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::port::{ErrorPolicy, PortSet};
use crate::pipeline::process::{AnyProcess, ConfigureContext, ProcessState, StepContext};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info_span, trace, warn};

/// How `deliver` pushes onto edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// `try_push`; whatever does not fit stays queued.
    NonBlocking,
    /// `push`; waits for space.
    Blocking,
}

/// What a call to `step` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// The process was terminal; nothing happened.
    Skipped,
    Stepped,
    /// The process went terminal during this step.
    Finished,
}

pub(crate) struct ProcessSlot {
    pub name: String,
    pub process: AnyProcess,
    pub ports: PortSet,
    pub state: ProcessState,
    /// Indexed by port index.
    pub inputs: Vec<Option<Arc<Edge>>>,
    /// Indexed by port index.
    pub outputs: Vec<Vec<Arc<Edge>>>,
    closed_ports: Vec<bool>,
    pending: VecDeque<(Arc<Edge>, Datum)>,
    pub steps: u64,
}

impl ProcessSlot {
    pub fn new(process: AnyProcess) -> Self {
        let name = process.name().to_string();
        let ports = process.ports().clone();
        let count = ports.len();
        Self {
            name,
            process,
            ports,
            state: ProcessState::Constructed,
            inputs: vec![None; count],
            outputs: vec![Vec::new(); count],
            closed_ports: vec![false; count],
            pending: VecDeque::new(),
            steps: 0,
        }
    }

    pub fn configure(&mut self, ctx: &ConfigureContext) -> PipelineResult<()> {
        if self.state != ProcessState::Constructed {
            return Err(PipelineError::InvalidState {
                process: self.name.clone(),
                state: self.state,
                operation: "configure",
            });
        }
        let _span = info_span!("configure", process = %self.name).entered();
        match self.process.configure(ctx) {
            Ok(()) => {
                self.state = ProcessState::Configured;
                debug!("Configured");
                Ok(())
            }
            Err(e) => {
                self.state = ProcessState::Failed;
                error!("Configuration failed: {}", e);
                Err(e)
            }
        }
    }

    /// Connected inputs, in port order.
    pub fn connected_inputs(&self) -> impl Iterator<Item = &Arc<Edge>> {
        self.inputs.iter().flatten()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Cooperative readiness: steppable, nothing left to deliver, and every
    /// connected input has a head datum.
    pub fn is_ready(&self) -> bool {
        self.state.is_steppable()
            && self.pending.is_empty()
            && self.connected_inputs().all(|edge| !edge.is_empty())
    }

    /// Run one step. Outputs are queued, not delivered.
    pub fn step(&mut self) -> PipelineResult<StepOutcome> {
        if self.state.is_terminal() {
            return Ok(StepOutcome::Skipped);
        }
        if !self.state.is_steppable() {
            return Err(PipelineError::InvalidState {
                process: self.name.clone(),
                state: self.state,
                operation: "step",
            });
        }
        self.state = ProcessState::Running;

        let _span = info_span!("step", process = %self.name, step = self.steps).entered();
        let exhausted = self.inputs_exhausted();
        let mut outbox = vec![Vec::new(); self.ports.len()];
        let result;
        let finished;
        {
            let mut ctx = StepContext::new(
                &self.name,
                &self.ports,
                &self.inputs,
                &self.outputs,
                &mut outbox,
                &mut self.closed_ports,
                self.steps,
            );
            result = self.process.step(&mut ctx);
            finished = ctx.is_marked_complete();
        }
        self.steps += 1;

        match result {
            Ok(()) => {}
            Err(PipelineError::Algorithm { process, message }) => {
                self.apply_error_policy(&mut outbox, &process, &message)?;
            }
            Err(e) => return Err(self.fail(e)),
        }

        self.enqueue(outbox);

        if finished || exhausted {
            if !finished {
                debug!("Input complete; finishing on behalf of the process");
            }
            self.finish();
            return Ok(StepOutcome::Finished);
        }
        Ok(StepOutcome::Stepped)
    }

    /// Route a delegate failure according to the output ports' policies.
    fn apply_error_policy(
        &mut self,
        outbox: &mut [Vec<Datum>],
        process: &str,
        message: &str,
    ) -> PipelineResult<()> {
        let fatal = self.ports.outputs().any(|(i, p)| {
            p.error_policy == ErrorPolicy::Fatal && !self.outputs[usize::from(i)].is_empty()
        });
        if fatal {
            return Err(self.fail(PipelineError::Algorithm {
                process: process.to_string(),
                message: message.to_string(),
            }));
        }

        warn!("Algorithm error: {}", message);
        for (index, port) in self.ports.outputs() {
            let index = usize::from(index);
            match port.error_policy {
                ErrorPolicy::Forward if !self.closed_ports[index] => {
                    outbox[index].push(Datum::make_error(message));
                }
                ErrorPolicy::Discard => {
                    debug!("Discarding error on port '{}'", port.name);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The step about to run is the last one: a required input sits at
    /// `Complete`. A process without required inputs ends once every
    /// connected input does.
    fn inputs_exhausted(&self) -> bool {
        let mut required = self
            .ports
            .inputs()
            .filter(|(_, port)| port.required)
            .filter_map(|(index, _)| self.inputs[usize::from(index)].as_ref())
            .peekable();
        if required.peek().is_some() {
            return required.any(at_complete);
        }
        let mut inputs = self.connected_inputs().peekable();
        inputs.peek().is_some() && inputs.all(at_complete)
    }

    /// Block until every connected input has a head datum, so the step that
    /// follows sees the same inputs a cooperative run would.
    pub fn wait_for_inputs(&self) -> PipelineResult<()> {
        for edge in self.connected_inputs() {
            edge.peek()?;
        }
        Ok(())
    }

    /// Queue each output datum onto every edge of its port, port by port.
    fn enqueue(&mut self, outbox: Vec<Vec<Datum>>) {
        for (index, datums) in outbox.into_iter().enumerate() {
            let edges = &self.outputs[index];
            if edges.is_empty() {
                if !datums.is_empty() {
                    trace!("Dropping {} datum(s) on unconnected port", datums.len());
                }
                continue;
            }
            for datum in datums {
                for edge in edges {
                    self.pending.push_back((Arc::clone(edge), datum.clone()));
                }
            }
        }
    }

    /// Transition to `Complete`: every output port gets its end-of-stream
    /// marker and the input edges are retired.
    fn finish(&mut self) {
        for (index, _) in self.ports.outputs() {
            let index = usize::from(index);
            if !self.closed_ports[index] {
                self.closed_ports[index] = true;
                for edge in &self.outputs[index] {
                    self.pending
                        .push_back((Arc::clone(edge), Datum::make_complete()));
                }
            }
        }
        for edge in self.inputs.iter().flatten() {
            edge.retire();
        }
        self.state = ProcessState::Complete;
        debug!(steps = self.steps, "Process complete");
    }

    pub fn fail(&mut self, err: PipelineError) -> PipelineError {
        self.state = ProcessState::Failed;
        self.pending.clear();
        error!(process = %self.name, "Process failed: {}", err);
        err
    }

    /// Push queued outputs. Returns whether anything moved.
    ///
    /// Per-edge order is preserved: once an edge refuses a datum, later datums
    /// for that edge wait behind it.
    pub fn deliver(&mut self, mode: Delivery) -> PipelineResult<bool> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        let mut moved = false;
        let mut waiting: VecDeque<(Arc<Edge>, Datum)> = VecDeque::new();
        while let Some((edge, datum)) = self.pending.pop_front() {
            if waiting.iter().any(|(blocked, _)| Arc::ptr_eq(blocked, &edge)) {
                waiting.push_back((edge, datum));
                continue;
            }
            match mode {
                Delivery::Blocking => {
                    edge.push(datum)?;
                    moved = true;
                }
                Delivery::NonBlocking => match edge.try_push(datum)? {
                    PushOutcome::Pushed => moved = true,
                    PushOutcome::Full(datum) => waiting.push_back((edge, datum)),
                },
            }
        }
        self.pending = waiting;
        Ok(moved)
    }
}

fn at_complete(edge: &Arc<Edge>) -> bool {
    edge.try_peek().is_some_and(|datum| datum.is_complete())
}
