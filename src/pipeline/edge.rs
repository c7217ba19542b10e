//! Bounded FIFO transport between one output port and one input port.
//!
//! An `Edge` is shared as `Arc<Edge>` between the pipeline (which owns it), the
//! producing slot and the consuming slot. Blocking `push`/`pull`/`peek` suspend
//! on condition variables; `close` wakes every waiter with `EdgeClosed`.
//!
//! Once a `Complete` datum reaches the head of the queue it is never removed:
//! every later `pull` returns it again, so a consumer can observe end-of-stream
//! any number of times without blocking.

use crate::pipeline::datum::Datum;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::EdgeId;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Result of a non-blocking push.
#[derive(Debug)]
pub enum PushOutcome {
    Pushed,
    /// The edge is at capacity; the datum is handed back.
    Full(Datum),
}

/// Counters observed over the lifetime of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeStats {
    pub pushed: u64,
    pub pulled: u64,
    pub high_water: usize,
}

#[derive(Default)]
struct EdgeState {
    queue: VecDeque<Datum>,
    /// A `Complete` datum has been accepted.
    complete: bool,
    closed: bool,
    /// The consumer is terminal; pushes are accepted and dropped.
    retired: bool,
    stats: EdgeStats,
}

pub struct Edge {
    id: EdgeId,
    label: String,
    /// `None` means unbounded.
    capacity: Option<usize>,
    state: Mutex<EdgeState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Edge {
    pub fn new(id: EdgeId, label: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            id,
            label: label.into(),
            capacity: capacity.map(|c| c.max(1)),
            state: Mutex::new(EdgeState::default()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// `"producer.port -> consumer.port"`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    // Poisoning only happens if a panic escaped while the lock was held; the
    // queue itself is still consistent, so keep going.
    fn lock(&self) -> MutexGuard<'_, EdgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, state: &EdgeState) -> bool {
        self.capacity.is_none_or(|cap| state.queue.len() < cap)
    }

    /// Checks shared by `push` and `try_push`. `Ok(true)` means the datum
    /// should be dropped: a repeated `Complete`, or a retired consumer.
    fn admit(&self, state: &EdgeState, datum: &Datum) -> PipelineResult<bool> {
        if state.closed {
            return Err(PipelineError::EdgeClosed);
        }
        if state.complete {
            if datum.is_complete() {
                return Ok(true);
            }
            return Err(PipelineError::PushAfterComplete(self.label.clone()));
        }
        Ok(state.retired)
    }

    fn enqueue(&self, state: &mut EdgeState, datum: Datum) {
        if datum.is_complete() {
            state.complete = true;
        }
        state.queue.push_back(datum);
        state.stats.pushed += 1;
        state.stats.high_water = state.stats.high_water.max(state.queue.len());
        self.not_empty.notify_all();
    }

    /// Append to the tail, blocking while the edge is at capacity.
    pub fn push(&self, datum: Datum) -> PipelineResult<()> {
        let mut state = self.lock();
        loop {
            if self.admit(&state, &datum)? {
                return Ok(());
            }
            if self.has_room(&state) {
                self.enqueue(&mut state, datum);
                return Ok(());
            }
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Append without blocking; returns the datum if the edge is full.
    pub fn try_push(&self, datum: Datum) -> PipelineResult<PushOutcome> {
        let mut state = self.lock();
        if self.admit(&state, &datum)? {
            return Ok(PushOutcome::Pushed);
        }
        if !self.has_room(&state) {
            return Ok(PushOutcome::Full(datum));
        }
        self.enqueue(&mut state, datum);
        Ok(PushOutcome::Pushed)
    }

    /// Take from `state` if possible. `Complete` at the head is returned but
    /// left in place.
    fn take(&self, state: &mut EdgeState) -> Option<Datum> {
        if state.queue.front().is_some_and(Datum::is_complete) {
            return Some(Datum::make_complete());
        }
        let datum = state.queue.pop_front()?;
        state.stats.pulled += 1;
        self.not_full.notify_all();
        Some(datum)
    }

    /// Remove and return the head, blocking while the edge is empty.
    ///
    /// Already-queued datums are still delivered after `close`; only a call
    /// that would block fails with `EdgeClosed`.
    pub fn pull(&self) -> PipelineResult<Datum> {
        let mut state = self.lock();
        loop {
            if let Some(datum) = self.take(&mut state) {
                return Ok(datum);
            }
            if state.closed {
                return Err(PipelineError::EdgeClosed);
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_pull(&self) -> PipelineResult<Option<Datum>> {
        let mut state = self.lock();
        match self.take(&mut state) {
            Some(datum) => Ok(Some(datum)),
            None if state.closed => Err(PipelineError::EdgeClosed),
            None => Ok(None),
        }
    }

    /// Return a copy of the head without removing it, blocking while empty.
    pub fn peek(&self) -> PipelineResult<Datum> {
        let mut state = self.lock();
        loop {
            if let Some(datum) = state.queue.front() {
                return Ok(datum.clone());
            }
            if state.closed {
                return Err(PipelineError::EdgeClosed);
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn try_peek(&self) -> Option<Datum> {
        self.lock().queue.front().cloned()
    }

    /// Wake every blocked caller; subsequent pushes fail with `EdgeClosed`.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Called when the consumer goes terminal. Queued datums are discarded and
    /// any producer blocked on a full edge is released.
    pub fn retire(&self) {
        let mut state = self.lock();
        state.retired = true;
        state.queue.clear();
        self.not_full.notify_all();
    }

    pub fn is_retired(&self) -> bool {
        self.lock().retired
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Upstream has pushed its end-of-stream marker.
    pub fn is_complete(&self) -> bool {
        self.lock().complete
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        let state = self.lock();
        !self.has_room(&state)
    }

    pub fn stats(&self) -> EdgeStats {
        self.lock().stats
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
