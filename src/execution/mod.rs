//! Stage graph execution

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEngine, ExecutionError, ExecutionEvent};
pub use executor::{ActionExecutor, StageExecutor, StageOutcome};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
