//! release-pipeline - release gate and stage pipeline for versioned packages

pub mod annotate;
pub mod cli;
pub mod core;
pub mod execution;
pub mod publish;
pub mod release;
pub mod vcs;

// Re-export commonly used types
pub use core::{ExecutionStatus, RunContext, StageGraph, Trigger, TriggerEvent};
pub use execution::{ExecutionEngine, ExecutionEvent, SchedulingStrategy, StageExecutor, StageOutcome};
pub use publish::{PublicationRecord, PublicationState, Publisher};
pub use release::{ReleaseDecision, ReleaseGate, ReleasePolicy};
pub use vcs::{InMemoryRemote, RemoteRepository};
