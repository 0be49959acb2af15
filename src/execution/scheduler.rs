//! Execution scheduler - determines which stages to start next

use crate::core::StageGraph;

/// Strategy for scheduling stage execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// One stage at a time, in execution order
    #[default]
    Sequential,

    /// Every ready stage at once
    Parallel,

    /// At most N stages running at once
    LimitedParallel(usize),
}

/// Picks the stages to start from the graph's ready set
#[derive(Debug, Clone)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Get the next batch of stages to start
    pub fn next_stages(&self, graph: &StageGraph) -> Vec<String> {
        let limit = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => usize::MAX,
            SchedulingStrategy::LimitedParallel(max) => max.max(1),
        };

        let remaining = limit.saturating_sub(graph.running_stages().len());
        if remaining == 0 {
            return vec![];
        }

        graph
            .ready_stages()
            .into_iter()
            .take(remaining)
            .map(|s| s.id.clone())
            .collect()
    }
}
