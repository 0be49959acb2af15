//! Stage executor - runs the action of a single stage

use crate::{
    annotate::Annotator,
    core::{FailureKind, Stage, StageAction, StageContext},
    publish::Publisher,
};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Result of executing a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success { output: String },
    /// `output` holds whatever the stage produced before failing
    Failed {
        error: String,
        kind: FailureKind,
        output: String,
    },
}

impl StageOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        StageOutcome::Failed {
            error: error.into(),
            kind: FailureKind::StageFailure,
            output: String::new(),
        }
    }
}

/// Runs one stage to completion
///
/// Timeouts, conditions and artifact checks are the engine's job; an executor
/// only performs the action.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, stage: &Stage, context: &StageContext) -> StageOutcome;
}

/// Executor for the configured stage actions
pub struct ActionExecutor {
    publisher: Publisher,
    annotator: Annotator,
}

impl ActionExecutor {
    pub fn new(publisher: Publisher, annotator: Annotator) -> Self {
        Self {
            publisher,
            annotator,
        }
    }

    async fn run_shell(&self, stage: &Stage, commands: &[String], context: &StageContext) -> StageOutcome {
        let mut output = String::new();

        for command in commands {
            debug!("Stage {}: {}", stage.id, command);

            let result = Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&context.run.workdir)
                .envs(context.environment())
                .kill_on_drop(true)
                .output()
                .await;

            let out = match result {
                Ok(out) => out,
                Err(e) => {
                    error!("Failed to spawn shell for stage {}: {}", stage.id, e);
                    return StageOutcome::failed(format!("failed to run `{}`: {}", command, e));
                }
            };

            output.push_str(&String::from_utf8_lossy(&out.stdout));

            if !out.status.success() {
                let code = out.status.code().unwrap_or(-1);
                let stderr = String::from_utf8_lossy(&out.stderr);
                warn!("Stage {}: `{}` exited with code {}", stage.id, command, code);
                return StageOutcome::Failed {
                    error: format!("`{}` exited with code {}: {}", command, code, stderr.trim()),
                    kind: FailureKind::StageFailure,
                    output,
                };
            }
        }

        StageOutcome::Success { output }
    }

    async fn publish(&self, context: &StageContext) -> StageOutcome {
        match self
            .publisher
            .publish(context.decision(), &context.run.trigger.commit)
            .await
        {
            Ok(record) => StageOutcome::Success {
                output: serde_json::to_string(&record).unwrap_or(record.tag),
            },
            Err(e) => StageOutcome::Failed {
                error: e.to_string(),
                kind: e.failure_kind(),
                output: e
                    .record()
                    .and_then(|record| serde_json::to_string(&record).ok())
                    .unwrap_or_default(),
            },
        }
    }

    async fn annotate(&self, context: &StageContext) -> StageOutcome {
        match self
            .annotator
            .annotate(context.decision(), &context.run.trigger)
            .await
        {
            Ok(annotation) => StageOutcome::Success {
                output: annotation.to_string(),
            },
            Err(e) => StageOutcome::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl StageExecutor for ActionExecutor {
    async fn execute(&self, stage: &Stage, context: &StageContext) -> StageOutcome {
        info!("Executing stage: {} ({})", stage.id, stage.action.describe());

        match &stage.action {
            StageAction::Shell { commands } => self.run_shell(stage, commands, context).await,
            StageAction::PublishRelease => self.publish(context).await,
            StageAction::Annotate => self.annotate(context).await,
        }
    }
}
