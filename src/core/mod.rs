//! Core domain models for the stage pipeline
//!
//! This module defines the stage graph, stages, their run conditions and
//! the per-run context handed to each stage.

pub mod condition;
pub mod config;
pub mod context;
pub mod pipeline;
pub mod stage;
pub mod state;

pub use condition::*;
pub use context::*;
pub use pipeline::*;
pub use stage::*;
pub use state::*;
