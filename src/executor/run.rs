//! Run orchestration
//!
//! A `TestRun` owns one resolved definition and its compiled units. `exec`
//! drives execution, finalization and emission in that order, once.

use std::io::Write;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::compiler::{compile, Selection, SelectionError};
use super::context::RunContext;
use super::runner::sequential;
use super::task::{SuiteEngine, TaskUnit};
use crate::config::{resolve, ConfigError, IncludeExpander, ResolvedRun, RunParameters};
use crate::models::RunDefinition;
use crate::results::{emit, ReportError, ReportFormat, RunReport};

/// Top-level run failure
#[derive(Error, Debug)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// One or more units failed to produce a result; the report was still written
    #[error("execution error: {0}")]
    Execution(String),
}

/// A compiled, ready-to-execute run
#[derive(Debug)]
pub struct TestRun {
    definition: RunDefinition,
    units: Vec<TaskUnit>,
    ctx: RunContext,
    report: RunReport,
    format: ReportFormat,
}

impl TestRun {
    /// Resolve the run file and compile the selection in `params`
    pub fn new(params: &RunParameters, expander: &dyn IncludeExpander) -> Result<Self, RunError> {
        let resolved = resolve(params, expander)?;
        Self::from_resolved(resolved, params)
    }

    /// Compile against an already resolved run
    pub fn from_resolved(resolved: ResolvedRun, params: &RunParameters) -> Result<Self, RunError> {
        debug!(
            "Compiling run '{}' from {}",
            resolved.definition.name,
            resolved.run_file.display()
        );
        let ctx = RunContext::for_run(&resolved, params);
        let units = compile(&resolved.definition, &Selection::from(params))?;
        let report = RunReport::start(&resolved.definition.name, &resolved.definition.version);

        Ok(Self {
            definition: resolved.definition,
            units,
            ctx,
            report,
            format: ReportFormat::from_flag(params.emit_json),
        })
    }

    /// Execute every unit, finalize the report and write it to `out`
    ///
    /// Returns `RunError::Execution` after the report is written when any unit
    /// failed to produce a result. Counted test failures are not an error.
    pub fn exec(&mut self, engine: &dyn SuiteEngine, out: &mut dyn Write) -> Result<(), RunError> {
        if self.report.is_finalized() {
            return Err(ReportError::AlreadyFinalized.into());
        }

        let results = sequential(&mut self.ctx, &self.definition, &self.units, engine);
        self.report.fold(results.into_outcomes())?;
        self.report.finish()?;
        emit(&self.report, self.format, out)?;
        info!(
            "Report written ({:?}) for {} units",
            self.format,
            self.ctx.executed().len()
        );

        if self.report.has_errors() {
            warn!(
                "Run '{}' reported {} erroring tests",
                self.definition.name,
                self.report.errors()
            );
        }
        if !self.report.execution_errors().is_empty() {
            let summary = self.report.error_summary();
            warn!("Run '{}' had execution errors: {}", self.definition.name, summary);
            return Err(RunError::Execution(summary));
        }
        Ok(())
    }
}

#[cfg(test)]
impl TestRun {
    /// Compile `selection` against an in-memory definition
    pub fn from_definition(
        definition: RunDefinition,
        selection: &Selection,
        ctx: RunContext,
        format: ReportFormat,
    ) -> Result<Self, RunError> {
        let units = compile(&definition, selection)?;
        let report = RunReport::start(&definition.name, &definition.version);
        Ok(Self {
            definition,
            units,
            ctx,
            report,
            format,
        })
    }

    pub fn units(&self) -> &[TaskUnit] {
        &self.units
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }
}
