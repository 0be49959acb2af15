//! Stage run conditions
//!
//! A condition is a conjunction of optional requirements over the release
//! decision, the trigger and the upstream results. An empty condition always
//! holds.

use crate::core::context::{StageContext, TriggerEvent};
use serde::{Deserialize, Serialize};

/// Required outcome of the direct dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamOutcome {
    /// Every dependency completed
    Succeeded,
    /// At least one dependency failed or was cancelled
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageCondition {
    /// Required value of `should_release`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<bool>,

    /// Required trigger event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<TriggerEvent>,

    /// Required branch (without `refs/heads/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Required upstream outcome (mostly useful on `always_run` stages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamOutcome>,
}

impl StageCondition {
    /// Evaluate against a stage context; `Err` carries the skip reason
    pub fn evaluate(&self, context: &StageContext) -> Result<(), String> {
        if let Some(release) = self.release {
            let should_release = context.decision().should_release;
            if should_release != release {
                return Err(format!("should-release is {}", should_release));
            }
        }

        let trigger = &context.run.trigger;
        if let Some(event) = self.event {
            if trigger.event != event {
                return Err(format!("triggered by {:?}, requires {:?}", trigger.event, event));
            }
        }

        if let Some(branch) = &self.branch {
            if trigger.branch() != branch {
                return Err(format!("ref {} is not branch {}", trigger.git_ref, branch));
            }
        }

        if let Some(upstream) = self.upstream {
            let succeeded = context.upstream_succeeded();
            match (upstream, succeeded) {
                (UpstreamOutcome::Succeeded, false) => {
                    return Err("an upstream stage did not succeed".to_string())
                }
                (UpstreamOutcome::Failed, true) => {
                    return Err("all upstream stages succeeded".to_string())
                }
                _ => {}
            }
        }

        Ok(())
    }
}
