//! Pipeline compiler: derives an execution plan from the graph.

use super::compiled_plan::{ExecutionPlan, PlanStats};
use super::graph::EdgeRecord;
use super::id::ProcessId;
use super::slot::ProcessSlot;
use std::collections::VecDeque;

/// Compiles a pipeline graph into an execution plan
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Derive sources, sinks, a dependency order and reachability diagnostics.
    ///
    /// Cycles are tolerated: whatever Kahn's algorithm cannot order is appended
    /// in insertion order and reported in `cyclic`.
    pub(crate) fn compile(slots: &[ProcessSlot], edges: &[EdgeRecord]) -> ExecutionPlan {
        let start_time = std::time::Instant::now();

        let n = slots.len();
        if n == 0 {
            return ExecutionPlan::default();
        }

        let (fwd_adj, bwd_adj) = Self::build_adjacency(n, edges);

        let sources: Vec<usize> = (0..n).filter(|&i| bwd_adj[i].is_empty()).collect();
        let sinks: Vec<usize> = (0..n).filter(|&i| fwd_adj[i].is_empty()).collect();

        let reachable = Self::forward_reachability(&sources, &fwd_adj, n);
        let (order, depth) = Self::topological_sort(&fwd_adj, &bwd_adj);

        let mut placed = vec![false; n];
        for &idx in &order {
            placed[idx] = true;
        }
        let cyclic: Vec<usize> = (0..n).filter(|&i| !placed[i]).collect();
        let unreachable: Vec<usize> = (0..n).filter(|&i| !reachable[i]).collect();

        let full_order: Vec<usize> = order.iter().chain(cyclic.iter()).copied().collect();

        let stats = PlanStats {
            total_processes: n,
            total_edges: edges.len(),
            source_processes: sources.len(),
            sink_processes: sinks.len(),
            depth,
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        if !cyclic.is_empty() {
            tracing::debug!(
                "Pipeline graph has a cycle; {} of {} processes ordered topologically",
                order.len(),
                n
            );
        }
        for &idx in &unreachable {
            tracing::warn!(
                "Process '{}' is not reachable from any source",
                slots[idx].name
            );
        }

        let ids = |v: Vec<usize>| -> Vec<ProcessId> {
            v.into_iter().map(|i| ProcessId(i as u32)).collect()
        };
        ExecutionPlan {
            order: ids(full_order),
            sources: ids(sources),
            sinks: ids(sinks),
            cyclic: ids(cyclic),
            unreachable: ids(unreachable),
            stats,
        }
    }

    /// Build forward and backward adjacency lists. Parallel edges between the
    /// same pair of processes count once.
    fn build_adjacency(n: usize, edges: &[EdgeRecord]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
        let mut fwd_adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut bwd_adj: Vec<Vec<usize>> = vec![Vec::new(); n];

        for edge in edges {
            let from = edge.from.process().index();
            let to = edge.to.process().index();
            if from >= n || to >= n {
                continue;
            }
            if !fwd_adj[from].contains(&to) {
                fwd_adj[from].push(to);
                bwd_adj[to].push(from);
            }
        }

        (fwd_adj, bwd_adj)
    }

    /// Perform forward reachability analysis from sources using DFS
    fn forward_reachability(sources: &[usize], fwd_adj: &[Vec<usize>], n: usize) -> Vec<bool> {
        let mut reachable = vec![false; n];
        let mut stack = Vec::new();

        for &src in sources {
            reachable[src] = true;
            stack.push(src);
        }

        while let Some(node) = stack.pop() {
            for &next in &fwd_adj[node] {
                if !reachable[next] {
                    reachable[next] = true;
                    stack.push(next);
                }
            }
        }

        reachable
    }

    /// Kahn's algorithm. Ties are broken by insertion order so the plan is
    /// deterministic. Also returns the longest path length.
    fn topological_sort(fwd_adj: &[Vec<usize>], bwd_adj: &[Vec<usize>]) -> (Vec<usize>, usize) {
        let n = fwd_adj.len();
        let mut in_degree: Vec<usize> = bwd_adj.iter().map(Vec::len).collect();
        let mut level = vec![0usize; n];

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut depth = 0;

        while let Some(node) = queue.pop_front() {
            order.push(node);
            depth = depth.max(level[node]);
            for &next in &fwd_adj[node] {
                level[next] = level[next].max(level[node] + 1);
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        (order, depth)
    }
}
