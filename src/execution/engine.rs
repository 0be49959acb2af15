//! Main execution engine - drives the stage graph of one run

use crate::{
    core::{ExecutionStatus, FailureKind, RunContext, StageGraph, StageState},
    execution::{ExecutionScheduler, SchedulingStrategy, StageExecutor, StageOutcome},
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_stages: usize,
    },
    StageStarted {
        stage_id: String,
    },
    StageCompleted {
        stage_id: String,
        output: String,
    },
    StageFailed {
        stage_id: String,
        kind: FailureKind,
        error: String,
    },
    StageSkipped {
        stage_id: String,
        reason: String,
    },
    StageCancelled {
        stage_id: String,
        reason: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Stage '{0}' not found")]
    UnknownStage(String),

    #[error("Stage task aborted unexpectedly: {0}")]
    TaskAborted(String),

    #[error("No stage can make progress, pending: {0:?}")]
    Stalled(Vec<String>),
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type StageTask = (String, StageOutcome);

/// Runs a stage graph to completion
pub struct ExecutionEngine {
    scheduler: ExecutionScheduler,
    executor: Arc<dyn StageExecutor>,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<dyn StageExecutor>, strategy: SchedulingStrategy) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute every stage of the graph
    ///
    /// Returns the final run status. Stage failures are reported through the
    /// graph, not as errors.
    pub async fn execute(
        &self,
        graph: &mut StageGraph,
        run: &RunContext,
    ) -> Result<ExecutionStatus, ExecutionError> {
        let run_id = graph.state.run_id;
        info!(
            "Starting run {} of pipeline {} ({:?})",
            run_id,
            graph.name,
            self.scheduler.strategy()
        );

        graph.state.start(graph.stages.len());
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            pipeline_name: graph.name.clone(),
            total_stages: graph.stages.len(),
        });

        let deadline = graph
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut tasks: JoinSet<StageTask> = JoinSet::new();

        loop {
            self.launch_ready(graph, run, &mut tasks)?;

            if tasks.is_empty() {
                if graph.is_complete() {
                    break;
                }
                let pending: Vec<String> = graph
                    .execution_order()
                    .iter()
                    .filter(|id| graph.stage(id).is_some_and(|s| !s.state.is_terminal()))
                    .cloned()
                    .collect();
                error!("Run {} stalled with pending stages {:?}", run_id, pending);
                graph.state.finish(ExecutionStatus::Failed);
                return Err(ExecutionError::Stalled(pending));
            }

            let joined = match deadline {
                Some(deadline) => match timeout_at(deadline, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        self.abort_run(graph, &mut tasks).await;
                        return Ok(graph.state.status);
                    }
                },
                None => tasks.join_next().await,
            };

            match joined {
                Some(Ok((stage_id, outcome))) => self.finish_stage(graph, &stage_id, outcome),
                Some(Err(e)) => {
                    error!("Stage task of run {} aborted: {}", run_id, e);
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    graph.state.finish(ExecutionStatus::Failed);
                    return Err(ExecutionError::TaskAborted(e.to_string()));
                }
                None => {}
            }
        }

        let status = graph.final_status();
        graph.update_counts();
        graph.state.finish(status);

        info!("Run {} finished: {:?}", run_id, status);
        self.emit_event(ExecutionEvent::RunCompleted { run_id, status });

        Ok(status)
    }

    /// Start every stage the scheduler allows, settling the ones that won't run
    fn launch_ready(
        &self,
        graph: &mut StageGraph,
        run: &RunContext,
        tasks: &mut JoinSet<StageTask>,
    ) -> Result<(), ExecutionError> {
        loop {
            self.settle_blocked(graph);

            let stage_ids = self.scheduler.next_stages(graph);
            if stage_ids.is_empty() {
                return Ok(());
            }

            for stage_id in &stage_ids {
                self.start_stage(graph, stage_id, run, tasks)?;
            }
        }
    }

    fn start_stage(
        &self,
        graph: &mut StageGraph,
        stage_id: &str,
        run: &RunContext,
        tasks: &mut JoinSet<StageTask>,
    ) -> Result<(), ExecutionError> {
        let stage = graph
            .stage(stage_id)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownStage(stage_id.to_string()))?;
        let context = graph.context_for_stage(stage_id, run);

        if let Err(reason) = stage.condition.evaluate(&context) {
            info!("Skipping stage {}: {}", stage_id, reason);
            self.set_state(graph, stage_id, StageState::Skipped { reason: reason.clone() });
            self.emit_event(ExecutionEvent::StageSkipped {
                stage_id: stage_id.to_string(),
                reason,
            });
            return Ok(());
        }

        if let Some(missing) = stage.consumes.iter().find(|a| !context.has_artifact(a)) {
            let now = Utc::now();
            let error = format!("required artifact '{}' was not produced", missing);
            warn!("Stage {} cannot start: {}", stage_id, error);
            self.set_state(
                graph,
                stage_id,
                StageState::Failed {
                    error: error.clone(),
                    kind: FailureKind::StageFailure,
                    output: String::new(),
                    started_at: now,
                    failed_at: now,
                },
            );
            self.emit_event(ExecutionEvent::StageFailed {
                stage_id: stage_id.to_string(),
                kind: FailureKind::StageFailure,
                error,
            });
            return Ok(());
        }

        self.set_state(graph, stage_id, StageState::Running { started_at: Utc::now() });
        self.emit_event(ExecutionEvent::StageStarted {
            stage_id: stage_id.to_string(),
        });

        let executor = self.executor.clone();
        tasks.spawn(async move {
            let limit = Duration::from_secs(stage.timeout_secs);
            let outcome = match timeout(limit, executor.execute(&stage, &context)).await {
                Ok(outcome) => outcome,
                Err(_) => StageOutcome::Failed {
                    error: format!("timed out after {} seconds", stage.timeout_secs),
                    kind: FailureKind::Timeout,
                    output: String::new(),
                },
            };
            (stage.id, outcome)
        });

        Ok(())
    }

    fn finish_stage(&self, graph: &mut StageGraph, stage_id: &str, outcome: StageOutcome) {
        let started_at = match graph.stage(stage_id).map(|s| &s.state) {
            Some(StageState::Running { started_at }) => *started_at,
            _ => Utc::now(),
        };

        match outcome {
            StageOutcome::Success { output } => {
                info!("Stage {} completed", stage_id);
                self.set_state(
                    graph,
                    stage_id,
                    StageState::Completed {
                        output: output.clone(),
                        started_at,
                        completed_at: Utc::now(),
                    },
                );
                graph.record_artifacts(stage_id);
                self.emit_event(ExecutionEvent::StageCompleted {
                    stage_id: stage_id.to_string(),
                    output,
                });
            }
            StageOutcome::Failed {
                error,
                kind,
                output,
            } => {
                warn!("Stage {} failed ({}): {}", stage_id, kind.describe(), error);
                self.set_state(
                    graph,
                    stage_id,
                    StageState::Failed {
                        error: error.clone(),
                        kind,
                        output,
                        started_at,
                        failed_at: Utc::now(),
                    },
                );
                self.emit_event(ExecutionEvent::StageFailed {
                    stage_id: stage_id.to_string(),
                    kind,
                    error,
                });
            }
        }

        graph.update_counts();
    }

    /// Cancel or skip pending stages whose dependencies can no longer succeed
    fn settle_blocked(&self, graph: &mut StageGraph) {
        let changes = graph.propagate_blocked();
        if changes.is_empty() {
            return;
        }

        for (stage_id, state) in changes {
            match state {
                StageState::Cancelled { reason } => {
                    debug!("Cancelled stage {}: {}", stage_id, reason);
                    self.emit_event(ExecutionEvent::StageCancelled { stage_id, reason });
                }
                StageState::Skipped { reason } => {
                    debug!("Skipped stage {}: {}", stage_id, reason);
                    self.emit_event(ExecutionEvent::StageSkipped { stage_id, reason });
                }
                _ => {}
            }
        }
        graph.update_counts();
    }

    /// Stop everything once the run budget is spent
    ///
    /// Stages that finished before the abort keep their outcome. The rest of
    /// the running stages fail with `Timeout`; stages that never started are
    /// cancelled. Side effects that already happened stay.
    async fn abort_run(&self, graph: &mut StageGraph, tasks: &mut JoinSet<StageTask>) {
        let budget = graph.timeout_secs.unwrap_or_default();
        error!("Run budget of {}s exceeded, aborting", budget);

        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((stage_id, outcome)) = joined {
                self.finish_stage(graph, &stage_id, outcome);
            }
        }

        let running: Vec<String> = graph.running_stages().iter().map(|s| s.id.clone()).collect();
        for stage_id in running {
            self.finish_stage(
                graph,
                &stage_id,
                StageOutcome::Failed {
                    error: format!("run budget of {} seconds exceeded", budget),
                    kind: FailureKind::Timeout,
                    output: String::new(),
                },
            );
        }

        let reason = "run budget exceeded";
        for stage_id in graph.cancel_pending(reason) {
            self.emit_event(ExecutionEvent::StageCancelled {
                stage_id,
                reason: reason.to_string(),
            });
        }

        graph.update_counts();
        graph.state.finish(ExecutionStatus::Cancelled);
        self.emit_event(ExecutionEvent::RunCompleted {
            run_id: graph.state.run_id,
            status: ExecutionStatus::Cancelled,
        });
    }

    fn set_state(&self, graph: &mut StageGraph, stage_id: &str, state: StageState) {
        if let Some(stage) = graph.stage_mut(stage_id) {
            stage.state = state;
        }
    }
}
