use crate::pipeline::id::ProcessId;

/// Execution plan derived from a validated pipeline graph.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Every process, upstream before downstream. Processes on a cycle follow
    /// the acyclic part in insertion order.
    pub order: Vec<ProcessId>,

    /// Processes with no connected inputs.
    pub sources: Vec<ProcessId>,

    /// Processes with no connected outputs.
    pub sinks: Vec<ProcessId>,

    /// Processes left over by the topological sort (on or behind a cycle).
    pub cyclic: Vec<ProcessId>,

    /// Processes no source can reach; they only run if fed by a cycle.
    pub unreachable: Vec<ProcessId>,

    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub total_processes: usize,

    pub total_edges: usize,

    pub source_processes: usize,

    pub sink_processes: usize,

    /// Longest source-to-process path, counted in edges, over the acyclic part.
    pub depth: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }
}
