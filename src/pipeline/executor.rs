//! Pipeline executor: drives `step` calls until every process is terminal.
//!
//! Two strategies share the same slot machinery:
//!
//! - **Cooperative**: a single thread walks the execution plan in rounds,
//!   stepping each ready process once per round. Outputs are delivered with
//!   non-blocking pushes; a full edge stalls its producer instead of blocking
//!   the only thread. A round with no progress is a deadlock.
//! - **Threaded**: one scoped worker thread per process, blocking on edges.
//!   Workers report to a coordinator over a channel; the first failure aborts
//!   the run, which closes every edge and releases blocked workers.

use crate::config::{EngineConfig, SchedulerKind};
use crate::pipeline::compiled_plan::ExecutionPlan;
use crate::pipeline::edge::Edge;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::Pipeline;
use crate::pipeline::process::ProcessState;
use crate::pipeline::slot::{Delivery, ProcessSlot, StepOutcome};
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

// ── Abort ──

/// Cancels a run from any thread. Aborting closes every edge of the pipeline,
/// so blocked `push`/`pull` calls fail with `EdgeClosed` instead of hanging.
#[derive(Clone, Default)]
pub struct AbortHandle {
    inner: Arc<AbortInner>,
}

#[derive(Default)]
struct AbortInner {
    aborted: AtomicBool,
    edges: Mutex<Vec<Arc<Edge>>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        if !self.inner.aborted.swap(true, Ordering::SeqCst) {
            tracing::info!("Pipeline abort requested");
        }
        let edges = self
            .inner
            .edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for edge in edges.iter() {
            edge.close();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self, edge: Arc<Edge>) {
        self.inner
            .edges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(edge);
    }
}

impl std::fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortHandle")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

// ── Reports ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub name: String,
    pub steps: u64,
    pub state: ProcessState,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub strategy: SchedulerKind,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub total_steps: u64,
    /// In insertion order.
    pub processes: Vec<ProcessReport>,
}

impl RunReport {
    pub fn process(&self, name: &str) -> Option<&ProcessReport> {
        self.processes.iter().find(|p| p.name == name)
    }

    pub fn steps_of(&self, name: &str) -> Option<u64> {
        self.process(name).map(|p| p.steps)
    }

    pub fn all_complete(&self) -> bool {
        self.processes
            .iter()
            .all(|p| p.state == ProcessState::Complete)
    }
}

/// Messages from worker threads to the coordinator.
#[derive(Debug)]
enum WorkerEvent {
    Completed { process: String, steps: u64 },
    Failed { process: String, error: PipelineError },
}

// ── Scheduler ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    kind: SchedulerKind,
    max_steps: Option<u64>,
}

impl Scheduler {
    pub fn new(kind: SchedulerKind) -> Self {
        Self {
            kind,
            max_steps: None,
        }
    }

    pub fn cooperative() -> Self {
        Self::new(SchedulerKind::Cooperative)
    }

    pub fn threaded() -> Self {
        Self::new(SchedulerKind::Threaded)
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            kind: config.scheduler.strategy,
            max_steps: config.scheduler.max_steps,
        }
    }

    /// Bound the total number of steps across all processes.
    pub fn with_max_steps(mut self, max_steps: Option<u64>) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn kind(&self) -> SchedulerKind {
        self.kind
    }

    /// Run a validated, configured pipeline to completion.
    pub fn run(&self, pipeline: &mut Pipeline) -> PipelineResult<RunReport> {
        if !pipeline.is_validated() {
            return Err(PipelineError::NotValidated);
        }
        if let Some(slot) = pipeline
            .slots()
            .iter()
            .find(|s| matches!(s.state, ProcessState::Constructed | ProcessState::Failed))
        {
            return Err(PipelineError::InvalidState {
                process: slot.name.clone(),
                state: slot.state,
                operation: "run",
            });
        }

        let plan = pipeline.compile();
        tracing::info!(
            "Running {} processes ({:?}, depth {}, cycle: {})",
            plan.stats.total_processes,
            self.kind,
            plan.stats.depth,
            plan.has_cycle()
        );

        let started_at = Utc::now();
        let start = Instant::now();
        match self.kind {
            SchedulerKind::Cooperative => self.run_cooperative(pipeline, &plan)?,
            SchedulerKind::Threaded => self.run_threaded(pipeline)?,
        }
        let duration = start.elapsed();

        let processes: Vec<ProcessReport> = pipeline
            .slots()
            .iter()
            .map(|s| ProcessReport {
                name: s.name.clone(),
                steps: s.steps,
                state: s.state,
            })
            .collect();
        let total_steps = processes.iter().map(|p| p.steps).sum();
        tracing::info!("Run finished: {} steps in {:?}", total_steps, duration);

        Ok(RunReport {
            strategy: self.kind,
            started_at,
            duration,
            total_steps,
            processes,
        })
    }

    fn run_cooperative(&self, pipeline: &mut Pipeline, plan: &ExecutionPlan) -> PipelineResult<()> {
        let abort = pipeline.abort_handle();
        let slots = pipeline.slots_mut();
        let mut total: u64 = 0;

        // Map errors seen after an external abort to `Aborted`.
        let settle = |abort: &AbortHandle, err: PipelineError| {
            if abort.is_aborted() {
                PipelineError::Aborted
            } else {
                abort.abort();
                err
            }
        };

        loop {
            if abort.is_aborted() {
                return Err(PipelineError::Aborted);
            }
            let mut progressed = false;

            for id in &plan.order {
                let slot = &mut slots[id.index()];
                progressed |= slot
                    .deliver(Delivery::NonBlocking)
                    .map_err(|e| settle(&abort, e))?;
                if !slot.is_ready() {
                    continue;
                }
                if let Some(limit) = self.max_steps {
                    if total >= limit {
                        return Err(PipelineError::StepLimitExceeded(limit));
                    }
                }
                match slot.step().map_err(|e| settle(&abort, e))? {
                    StepOutcome::Skipped => {}
                    StepOutcome::Stepped | StepOutcome::Finished => {
                        total += 1;
                        progressed = true;
                    }
                }
                slot.deliver(Delivery::NonBlocking)
                    .map_err(|e| settle(&abort, e))?;
            }

            if slots
                .iter()
                .all(|s| s.state.is_terminal() && !s.has_pending())
            {
                return Ok(());
            }
            if !progressed {
                let stalled = stalled_names(slots);
                tracing::error!("Deadlock: {}", stalled.join(", "));
                return Err(PipelineError::Deadlock { stalled });
            }
        }
    }

    fn run_threaded(&self, pipeline: &mut Pipeline) -> PipelineResult<()> {
        let abort = pipeline.abort_handle();
        let budget = StepBudget::new(self.max_steps);
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerEvent>();
        let slots = pipeline.slots_mut();
        let mut first_error: Option<PipelineError> = None;

        std::thread::scope(|scope| {
            for slot in slots.iter_mut() {
                let tx = tx.clone();
                let abort = abort.clone();
                let budget = &budget;
                scope.spawn(move || worker_main(slot, &abort, budget, &tx));
            }
            drop(tx);

            // Ends when every worker has dropped its sender.
            for event in rx.iter() {
                match event {
                    WorkerEvent::Completed { process, steps } => {
                        tracing::debug!("Worker '{}' finished after {} steps", process, steps);
                    }
                    WorkerEvent::Failed { process, error } => {
                        if first_error.is_none() {
                            tracing::error!("Worker '{}' failed: {}", process, error);
                            first_error = Some(error);
                            abort.abort();
                        }
                    }
                }
            }
        });

        match first_error {
            Some(error) => Err(error),
            None if abort.is_aborted() => Err(PipelineError::Aborted),
            None => Ok(()),
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::cooperative()
    }
}

/// Names of processes that are not terminal or still hold undelivered output.
fn stalled_names(slots: &[ProcessSlot]) -> Vec<String> {
    slots
        .iter()
        .filter(|s| !s.state.is_terminal() || s.has_pending())
        .map(|s| s.name.clone())
        .collect()
}

/// Shared step counter for the threaded strategy.
struct StepBudget {
    used: AtomicU64,
    limit: Option<u64>,
}

impl StepBudget {
    fn new(limit: Option<u64>) -> Self {
        Self {
            used: AtomicU64::new(0),
            limit,
        }
    }

    fn take(&self) -> PipelineResult<()> {
        match self.limit {
            Some(limit) if self.used.fetch_add(1, Ordering::SeqCst) >= limit => {
                Err(PipelineError::StepLimitExceeded(limit))
            }
            _ => Ok(()),
        }
    }
}

fn worker_main(
    slot: &mut ProcessSlot,
    abort: &AbortHandle,
    budget: &StepBudget,
    tx: &Sender<WorkerEvent>,
) {
    let process = slot.name.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_worker(slot, abort, budget)));
    let event = match outcome {
        Ok(Ok(steps)) => WorkerEvent::Completed { process, steps },
        Ok(Err(error)) => WorkerEvent::Failed { process, error },
        Err(_) => WorkerEvent::Failed {
            error: PipelineError::WorkerPanicked(process.clone()),
            process,
        },
    };
    // The coordinator outlives every worker.
    let _ = tx.send(event);
}

fn run_worker(
    slot: &mut ProcessSlot,
    abort: &AbortHandle,
    budget: &StepBudget,
) -> PipelineResult<u64> {
    let _span = tracing::debug_span!("worker", process = %slot.name).entered();
    while !slot.state.is_terminal() {
        if abort.is_aborted() {
            return Ok(slot.steps);
        }
        budget.take()?;
        let result = slot
            .wait_for_inputs()
            .and_then(|_| slot.step())
            .and_then(|_| slot.deliver(Delivery::Blocking));
        match result {
            Ok(_) => {}
            Err(PipelineError::EdgeClosed) if abort.is_aborted() => {
                tracing::debug!("Edge closed by abort; exiting");
                return Ok(slot.steps);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(slot.steps)
}
