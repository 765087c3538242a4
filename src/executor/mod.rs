//! Test execution engine
//!
//! Compiles a selection into task units and runs them sequentially against a
//! suite engine.

mod compiler;
mod context;
mod process;
mod run;
mod runner;
mod task;

pub use process::ProcessEngine;
pub use run::TestRun;
pub use task::{ExecutionError, TaskOutcome};
