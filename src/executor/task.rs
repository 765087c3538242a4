//! Task units
//!
//! A task unit is one executable step of a run. Every unit is compiled from a
//! group, a named suite or a single test, and produces exactly one outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::context::RunContext;
use crate::models::{RunDefinition, TestSpec, TestSuite};

/// A task unit failed to produce a suite
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{unit}: {message}")]
pub struct ExecutionError {
    /// Label of the failing unit
    pub unit: String,
    pub message: String,
}

impl ExecutionError {
    pub fn new(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one task unit
#[derive(Clone, Debug)]
pub enum TaskOutcome {
    Suite(TestSuite),
    Error(ExecutionError),
}

impl TaskOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, TaskOutcome::Error(_))
    }
}

/// Everything an engine needs to run one test or suite
#[derive(Clone, Debug, PartialEq)]
pub struct SuiteInvocation {
    /// Name of the test definition
    pub name: String,
    /// Test location resolved against the run directory
    pub path: PathBuf,
    pub version: Option<String>,
    /// Effective parameters after layering
    pub params: BTreeMap<String, String>,
    /// Test subset of a named suite; empty runs everything
    pub tests: Vec<String>,
    pub labels: Vec<String>,
    pub priority: Option<i64>,
}

impl SuiteInvocation {
    /// Build an invocation for `spec`
    ///
    /// Parameter precedence, lowest first: the test's defaults, then each of
    /// `layers` in order, then the context bindings.
    pub fn new(
        ctx: &RunContext,
        name: &str,
        spec: &TestSpec,
        layers: &[&BTreeMap<String, String>],
    ) -> Self {
        let mut params = spec.params.clone();
        for layer in layers {
            params.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        params.extend(
            ctx.bindings()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Self {
            name: name.to_string(),
            path: ctx.resolve_path(&spec.path),
            version: spec.version.clone(),
            params,
            tests: Vec::new(),
            labels: ctx.labels().to_vec(),
            priority: ctx.priority(),
        }
    }

    pub fn with_tests(mut self, tests: Vec<String>) -> Self {
        self.tests = tests;
        self
    }
}

/// The external engine that performs a test's steps
pub trait SuiteEngine {
    fn run_suite(
        &self,
        ctx: &mut RunContext,
        invocation: &SuiteInvocation,
    ) -> anyhow::Result<TestSuite>;
}

/// Common contract of group, suite and test units
pub trait Task: fmt::Debug {
    /// Human-readable unit label
    fn label(&self) -> String;

    fn run(
        &self,
        ctx: &mut RunContext,
        definition: &RunDefinition,
        engine: &dyn SuiteEngine,
    ) -> TaskOutcome;
}

/// Opaque executable unit
pub type TaskUnit = Box<dyn Task>;

/// Run one invocation, naming the suite after the test when the engine did not
fn invoke(
    ctx: &mut RunContext,
    engine: &dyn SuiteEngine,
    invocation: &SuiteInvocation,
) -> anyhow::Result<TestSuite> {
    let mut suite = engine.run_suite(ctx, invocation)?;
    if suite.name.is_empty() {
        suite.name = invocation.name.clone();
    }
    Ok(suite)
}

fn missing(unit: &str, kind: &str, name: &str) -> TaskOutcome {
    TaskOutcome::Error(ExecutionError::new(
        unit,
        format!("{kind} '{name}' is not defined"),
    ))
}

/// Runs a single ad hoc test
#[derive(Debug, Clone)]
pub struct TestTask {
    name: String,
}

impl TestTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Task for TestTask {
    fn label(&self) -> String {
        format!("test {}", self.name)
    }

    fn run(
        &self,
        ctx: &mut RunContext,
        definition: &RunDefinition,
        engine: &dyn SuiteEngine,
    ) -> TaskOutcome {
        let Some(spec) = definition.test(&self.name) else {
            return missing(&self.label(), "test", &self.name);
        };

        let invocation = SuiteInvocation::new(ctx, &self.name, spec, &[]);
        match invoke(ctx, engine, &invocation) {
            Ok(suite) => TaskOutcome::Suite(suite),
            Err(e) => TaskOutcome::Error(ExecutionError::new(self.label(), format!("{e:#}"))),
        }
    }
}

/// Runs a named suite restricted to a test subset, as one unit
#[derive(Debug, Clone)]
pub struct SuiteTask {
    name: String,
    tests: Vec<String>,
}

impl SuiteTask {
    pub fn new(name: impl Into<String>, tests: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tests,
        }
    }
}

impl Task for SuiteTask {
    fn label(&self) -> String {
        if self.tests.is_empty() {
            format!("suite {}", self.name)
        } else {
            format!("suite {} [{}]", self.name, self.tests.join(", "))
        }
    }

    fn run(
        &self,
        ctx: &mut RunContext,
        definition: &RunDefinition,
        engine: &dyn SuiteEngine,
    ) -> TaskOutcome {
        let Some(spec) = definition.test(&self.name) else {
            return missing(&self.label(), "suite", &self.name);
        };

        let invocation =
            SuiteInvocation::new(ctx, &self.name, spec, &[]).with_tests(self.tests.clone());
        match invoke(ctx, engine, &invocation) {
            Ok(suite) => TaskOutcome::Suite(suite),
            Err(e) => TaskOutcome::Error(ExecutionError::new(self.label(), format!("{e:#}"))),
        }
    }
}

/// Runs every member of a group, depth-first, merged into one suite
#[derive(Debug, Clone)]
pub struct GroupTask {
    name: String,
}

impl GroupTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn run_group<'d>(
        &self,
        ctx: &mut RunContext,
        definition: &'d RunDefinition,
        engine: &dyn SuiteEngine,
        group_name: &str,
        ref_params: Option<&'d BTreeMap<String, String>>,
        layers: &mut Vec<&'d BTreeMap<String, String>>,
        suite: &mut TestSuite,
    ) -> Result<(), ExecutionError> {
        let group = definition.group(group_name).ok_or_else(|| {
            ExecutionError::new(self.label(), format!("group '{group_name}' is not defined"))
        })?;

        let depth = layers.len();
        layers.push(&group.params);
        if let Some(params) = ref_params {
            layers.push(params);
        }

        for test_ref in &group.tests {
            let spec = definition.test(&test_ref.name).ok_or_else(|| {
                ExecutionError::new(
                    self.label(),
                    format!("test '{}' is not defined", test_ref.name),
                )
            })?;

            let mut test_layers = layers.clone();
            test_layers.push(&test_ref.params);
            let invocation = SuiteInvocation::new(ctx, &test_ref.name, spec, &test_layers);
            let result = invoke(ctx, engine, &invocation).map_err(|e| {
                ExecutionError::new(
                    self.label(),
                    format!("test '{}' in group '{}': {e:#}", test_ref.name, group_name),
                )
            })?;
            suite
                .absorb(result)
                .map_err(|e| ExecutionError::new(self.label(), e.to_string()))?;
        }

        for group_ref in &group.groups {
            self.run_group(
                ctx,
                definition,
                engine,
                &group_ref.name,
                Some(&group_ref.params),
                layers,
                suite,
            )?;
        }

        layers.truncate(depth);
        Ok(())
    }
}

impl Task for GroupTask {
    fn label(&self) -> String {
        format!("group {}", self.name)
    }

    fn run(
        &self,
        ctx: &mut RunContext,
        definition: &RunDefinition,
        engine: &dyn SuiteEngine,
    ) -> TaskOutcome {
        let mut suite = TestSuite::new(&self.name);
        let mut layers = Vec::new();
        match self.run_group(
            ctx,
            definition,
            engine,
            &self.name,
            None,
            &mut layers,
            &mut suite,
        ) {
            Ok(()) => TaskOutcome::Suite(suite),
            Err(e) => TaskOutcome::Error(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engine shared by executor tests

    use super::*;
    use crate::models::TestCase;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    /// What the scripted engine does for a test name
    #[derive(Clone, Debug)]
    pub enum Script {
        Pass,
        Fail(&'static str),
        Counts {
            total: usize,
            skipped: usize,
            failures: usize,
            errors: usize,
        },
        Crash(&'static str),
    }

    /// Engine that answers from a script and records every invocation
    #[derive(Default)]
    pub struct ScriptedEngine {
        scripts: HashMap<String, Script>,
        pub calls: RefCell<Vec<SuiteInvocation>>,
    }

    impl ScriptedEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(mut self, name: &str, script: Script) -> Self {
            self.scripts.insert(name.to_string(), script);
            self
        }

        pub fn called(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|c| c.name.clone()).collect()
        }
    }

    impl SuiteEngine for ScriptedEngine {
        fn run_suite(
            &self,
            ctx: &mut RunContext,
            invocation: &SuiteInvocation,
        ) -> anyhow::Result<TestSuite> {
            self.calls.borrow_mut().push(invocation.clone());
            let seen = ctx.executed().len().to_string();
            ctx.bind("LAST_TEST", invocation.name.clone());
            ctx.bind("UNITS_BEFORE", seen);

            let name = invocation.name.as_str();
            match self.scripts.get(name).cloned().unwrap_or(Script::Pass) {
                Script::Pass => Ok(TestSuite::from_cases(
                    name,
                    vec![TestCase::pass(name, Duration::from_millis(1))],
                )),
                Script::Fail(msg) => Ok(TestSuite::from_cases(
                    name,
                    vec![TestCase::fail(name, Duration::from_millis(1), msg)],
                )),
                Script::Counts {
                    total,
                    skipped,
                    failures,
                    errors,
                } => {
                    let mut suite = TestSuite::new(name);
                    suite.total = total;
                    suite.skipped = skipped;
                    suite.failures = failures;
                    suite.errors = errors;
                    Ok(suite)
                }
                Script::Crash(msg) => Err(anyhow::anyhow!(msg)),
            }
        }
    }
}
