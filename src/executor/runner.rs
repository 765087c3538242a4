//! Sequential task execution
//!
//! Runs compiled units one after another against one shared context. A unit
//! that fails does not stop the units after it.

use tracing::{info, warn};

use super::context::RunContext;
use super::task::{ExecutionError, SuiteEngine, TaskOutcome, TaskUnit};
use crate::models::RunDefinition;
use crate::utils::timer::Timer;

/// Ordered outcomes of a run, one per unit
#[derive(Clone, Debug, Default)]
pub struct TaskResults {
    outcomes: Vec<TaskOutcome>,
}

impl TaskResults {
    pub fn into_outcomes(self) -> Vec<TaskOutcome> {
        self.outcomes
    }

    /// Whether any unit failed to produce a suite
    pub fn has_error(&self) -> bool {
        self.outcomes.iter().any(TaskOutcome::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ExecutionError> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            TaskOutcome::Error(e) => Some(e),
            TaskOutcome::Suite(_) => None,
        })
    }

    /// Run-level error summary, empty when nothing failed
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Executes units strictly in order
pub struct SequentialRunner<'e> {
    engine: &'e dyn SuiteEngine,
}

impl<'e> SequentialRunner<'e> {
    pub fn new(engine: &'e dyn SuiteEngine) -> Self {
        Self { engine }
    }

    /// Run every unit, threading `ctx` through all of them
    pub fn run_all(
        &self,
        ctx: &mut RunContext,
        definition: &RunDefinition,
        units: &[TaskUnit],
    ) -> TaskResults {
        let total = units.len();
        info!("Executing {} task units for run '{}'", total, definition.name);

        let mut outcomes = Vec::with_capacity(total);
        for (index, unit) in units.iter().enumerate() {
            let label = unit.label();
            info!("[{}/{}] {}", index + 1, total, label);

            let timer = Timer::start(label.clone());
            let outcome = unit.run(ctx, definition, self.engine);
            let elapsed = timer.stop();

            match &outcome {
                TaskOutcome::Suite(suite) => {
                    info!("  {} [{}ms]", suite, elapsed.as_millis())
                }
                TaskOutcome::Error(e) => warn!("  {} failed: {}", label, e.message),
            }

            ctx.record_executed(label);
            outcomes.push(outcome);
        }

        let results = TaskResults { outcomes };
        if results.has_error() {
            warn!(
                "{} of {} units failed: {}",
                results.errors().count(),
                total,
                results.error_summary()
            );
        }
        results
    }
}

/// Run `units` in order on `engine`
pub fn sequential(
    ctx: &mut RunContext,
    definition: &RunDefinition,
    units: &[TaskUnit],
    engine: &dyn SuiteEngine,
) -> TaskResults {
    SequentialRunner::new(engine).run_all(ctx, definition, units)
}
