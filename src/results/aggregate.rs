//! Run-level aggregation
//!
//! Folds unit outcomes into one report. Suite outcomes are appended and
//! counted; execution errors only reach the error summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::ReportError;
use crate::executor::{ExecutionError, TaskOutcome};
use crate::models::{duration_secs, timestamp_millis, TestSuite};

/// Aggregate of every suite a run produced
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,

    #[serde(rename = "tests")]
    total: usize,
    skipped: usize,
    failures: usize,
    errors: usize,

    #[serde(rename = "timestamp", with = "timestamp_millis")]
    started: DateTime<Utc>,

    #[serde(with = "duration_secs")]
    time: Duration,

    #[serde(rename = "testsuite")]
    suites: Vec<TestSuite>,

    #[serde(skip)]
    started_at: Instant,

    #[serde(skip)]
    execution_errors: Vec<ExecutionError>,

    #[serde(skip)]
    finalized: bool,
}

impl RunReport {
    /// Start an empty report stamped with the current time
    pub fn start(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            total: 0,
            skipped: 0,
            failures: 0,
            errors: 0,
            started: Utc::now(),
            time: Duration::ZERO,
            suites: Vec::new(),
            started_at: Instant::now(),
            execution_errors: Vec::new(),
            finalized: false,
        }
    }

    /// Fold outcomes in order
    pub fn fold<I>(&mut self, outcomes: I) -> Result<(), ReportError>
    where
        I: IntoIterator<Item = TaskOutcome>,
    {
        for outcome in outcomes {
            self.add(outcome)?;
        }
        Ok(())
    }

    /// Fold a single outcome
    pub fn add(&mut self, outcome: TaskOutcome) -> Result<(), ReportError> {
        if self.finalized {
            return Err(ReportError::AlreadyFinalized);
        }

        match outcome {
            TaskOutcome::Suite(suite) => match self.checked_totals(&suite) {
                Some((total, skipped, failures, errors)) => {
                    debug!("Folding {}", suite);
                    self.total = total;
                    self.skipped = skipped;
                    self.failures = failures;
                    self.errors = errors;
                    self.suites.push(suite);
                }
                None => {
                    let e = ExecutionError::new(
                        format!("suite {}", suite.name),
                        "reported counts overflow the run totals",
                    );
                    warn!("Execution error: {}", e);
                    self.execution_errors.push(e);
                }
            },
            TaskOutcome::Error(e) => {
                warn!("Execution error: {}", e);
                self.execution_errors.push(e);
            }
        }
        Ok(())
    }

    /// Run totals with `suite` added, or `None` if any count overflows
    fn checked_totals(&self, suite: &TestSuite) -> Option<(usize, usize, usize, usize)> {
        Some((
            self.total.checked_add(suite.total)?,
            self.skipped.checked_add(suite.skipped)?,
            self.failures.checked_add(suite.failures)?,
            self.errors.checked_add(suite.errors)?,
        ))
    }

    /// Stamp the elapsed time; allowed once
    pub fn finish(&mut self) -> Result<(), ReportError> {
        if self.finalized {
            return Err(ReportError::AlreadyFinalized);
        }
        self.time = self.started_at.elapsed();
        self.finalized = true;

        info!(
            "Run '{}' finished in {:.3}s: Total: {} | Pass: {} | Fail: {} | Skip: {} | Error: {}",
            self.name,
            self.time.as_secs_f64(),
            self.total,
            self.passed(),
            self.failures,
            self.skipped,
            self.errors
        );
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// True iff any counted test errored; skips and failures do not count
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn passed(&self) -> usize {
        self.total
            .saturating_sub(self.skipped)
            .saturating_sub(self.failures)
            .saturating_sub(self.errors)
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn suites(&self) -> &[TestSuite] {
        &self.suites
    }

    pub fn execution_errors(&self) -> &[ExecutionError] {
        &self.execution_errors
    }

    /// Execution errors joined into one line, empty when there were none
    pub fn error_summary(&self) -> String {
        self.execution_errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
