//! Process-backed suite engine
//!
//! Runs a test definition's path as a program from the run directory. A
//! program that prints a JSON test suite on stdout reports its own cases;
//! anything else is judged by its exit status.

use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::process::{Command, Output};
use tracing::{debug, warn};

use super::context::RunContext;
use super::task::{SuiteEngine, SuiteInvocation};
use crate::models::{CaseMessage, TestCase, TestSuite};
use crate::utils::timer::Timer;

pub const INCLUDE_VAR: &str = "SUITERUN_INCLUDE";
pub const LABELS_VAR: &str = "SUITERUN_LABELS";
pub const PRIORITY_VAR: &str = "SUITERUN_PRIORITY";
pub const VERSION_VAR: &str = "SUITERUN_VERSION";

/// Runs each invocation as a child process and waits for it
#[derive(Clone, Debug, Default)]
pub struct ProcessEngine {
    interpreter: Option<PathBuf>,
}

impl ProcessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run test paths through `interpreter` instead of executing them directly
    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    fn command(&self, ctx: &RunContext, invocation: &SuiteInvocation) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&invocation.path);
                cmd
            }
            None => Command::new(&invocation.path),
        };

        cmd.current_dir(ctx.base_dir())
            .envs(&invocation.params)
            .args(&invocation.tests);

        if !ctx.include_dirs().is_empty() {
            match env::join_paths(ctx.include_dirs()) {
                Ok(joined) => {
                    cmd.env(INCLUDE_VAR, joined);
                }
                Err(e) => warn!("Not exporting {}: {}", INCLUDE_VAR, e),
            }
        }
        if !invocation.labels.is_empty() {
            cmd.env(LABELS_VAR, invocation.labels.join(","));
        }
        if let Some(priority) = invocation.priority {
            cmd.env(PRIORITY_VAR, priority.to_string());
        }
        if let Some(version) = &invocation.version {
            cmd.env(VERSION_VAR, version);
        }
        cmd
    }
}

impl SuiteEngine for ProcessEngine {
    fn run_suite(
        &self,
        ctx: &mut RunContext,
        invocation: &SuiteInvocation,
    ) -> anyhow::Result<TestSuite> {
        debug!(
            "Running {} in {} with {}",
            invocation.path.display(),
            ctx.base_dir().display(),
            ctx.describe_bindings()
        );

        let timer = Timer::start(&invocation.name);
        let output = self
            .command(ctx, invocation)
            .output()
            .with_context(|| format!("failed to start {}", invocation.path.display()))?;
        let elapsed = timer.stop();

        if let Some(mut suite) = parse_suite(&output) {
            if suite.name.is_empty() {
                suite.name = invocation.name.clone();
            }
            if suite.time.is_zero() {
                suite.time = elapsed;
            }
            return Ok(suite);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let detail = (!stderr.is_empty()).then_some(stderr);
        let mut case = TestCase::pass(&invocation.name, elapsed);
        match output.status.code() {
            Some(0) => {}
            Some(code) => {
                let message = CaseMessage::new(format!("exited with status {code}"));
                case.failure = Some(message.with_detail(detail))
            }
            None => {
                case.error = Some(CaseMessage::new("terminated by signal").with_detail(detail))
            }
        }
        if !stdout.is_empty() {
            case = case.with_output(stdout);
        }

        Ok(TestSuite::from_cases(&invocation.name, vec![case]))
    }
}

/// A JSON test suite printed on stdout, if there is one
fn parse_suite(output: &Output) -> Option<TestSuite> {
    let stdout = std::str::from_utf8(&output.stdout).ok()?.trim();
    if !stdout.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<TestSuite>(stdout) {
        Ok(suite) => Some(suite),
        Err(e) => {
            debug!("stdout is not a test suite: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseStatus, TestSpec};
    use std::collections::BTreeMap;
    use std::fs;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn script(dir: &TempDir, name: &str, body: &str) -> TestSpec {
        fs::write(dir.path().join(name), body).unwrap();
        TestSpec::new(name)
    }

    fn run(spec: &TestSpec, ctx: &mut RunContext) -> anyhow::Result<TestSuite> {
        let invocation = SuiteInvocation::new(ctx, "t", spec, &[]);
        ProcessEngine::new()
            .with_interpreter("sh")
            .run_suite(ctx, &invocation)
    }

    #[test]
    fn test_exit_zero_is_a_pass() {
        let dir = tempdir().unwrap();
        let spec = script(&dir, "ok.sh", "echo hello\nexit 0\n");
        let mut ctx = RunContext::new(dir.path());

        let suite = run(&spec, &mut ctx).unwrap();
        assert_eq!(suite.name, "t");
        assert_eq!(suite.total, 1);
        assert_eq!(suite.passed(), 1);
        assert_eq!(suite.cases[0].system_out.as_deref(), Some("hello"));
    }

    #[test]
    fn test_nonzero_exit_is_a_failure_with_stderr() {
        let dir = tempdir().unwrap();
        let spec = script(&dir, "bad.sh", "echo 'no route' >&2\nexit 3\n");
        let mut ctx = RunContext::new(dir.path());

        let suite = run(&spec, &mut ctx).unwrap();
        assert_eq!(suite.failures, 1);
        let failure = suite.cases[0].failure.as_ref().unwrap();
        assert_eq!(failure.message, "exited with status 3");
        assert_eq!(failure.detail.as_deref(), Some("no route"));
    }

    #[test]
    fn test_signal_is_an_error_case() {
        let dir = tempdir().unwrap();
        let spec = script(&dir, "killed.sh", "kill -9 $$\n");
        let mut ctx = RunContext::new(dir.path());

        let suite = run(&spec, &mut ctx).unwrap();
        assert_eq!(suite.errors, 1);
        assert_eq!(suite.cases[0].status(), CaseStatus::Error);
    }

    #[test]
    fn test_json_stdout_is_the_result() {
        let dir = tempdir().unwrap();
        let spec = script(
            &dir,
            "json.sh",
            r#"echo '{"name":"","tests":3,"skipped":1,"testcase":[{"name":"a"}]}'"#,
        );
        let mut ctx = RunContext::new(dir.path());

        let suite = run(&spec, &mut ctx).unwrap();
        assert_eq!(suite.name, "t");
        assert_eq!(suite.total, 3);
        assert_eq!(suite.skipped, 1);
        assert_eq!(suite.cases.len(), 1);
    }

    #[test]
    fn test_out_of_range_json_falls_back_to_exit_status() {
        let dir = tempdir().unwrap();
        let spec = script(
            &dir,
            "huge.sh",
            r#"echo '{"name":"x","tests":1,"time":1e30}'"#,
        );
        let mut ctx = RunContext::new(dir.path());

        let suite = run(&spec, &mut ctx).unwrap();
        assert_eq!(suite.name, "t");
        assert_eq!(suite.total, 1);
        assert_eq!(suite.passed(), 1);
        assert!(suite.time < Duration::from_secs(60));
        assert!(suite.cases[0]
            .system_out
            .as_deref()
            .unwrap()
            .contains("1e30"));
    }

    #[test]
    fn test_include_dirs_are_exported() {
        let dir = tempdir().unwrap();
        let spec = script(
            &dir,
            "inc.sh",
            "test \"$SUITERUN_INCLUDE\" = /inc/a:/inc/b || exit 1\n",
        );
        let mut ctx = RunContext::new(dir.path())
            .with_include_dirs(vec![PathBuf::from("/inc/a"), PathBuf::from("/inc/b")]);

        let suite = run(&spec, &mut ctx).unwrap();
        assert_eq!(suite.failures, 0, "{:?}", suite.cases);
    }

    #[test]
    fn test_environment_and_arguments() {
        let dir = tempdir().unwrap();
        let spec = script(
            &dir,
            "env.sh",
            "test \"$HOST\" = example || exit 1\n\
             test \"$SUITERUN_LABELS\" = smoke,fast || exit 2\n\
             test \"$SUITERUN_PRIORITY\" = 5 || exit 3\n\
             test \"$SUITERUN_VERSION\" = 2 || exit 4\n\
             test \"$1 $2\" = 't1 t2' || exit 5\n\
             test -f env.sh || exit 6\n",
        )
        .with_version("2");
        let mut ctx = RunContext::new(dir.path())
            .with_labels(vec!["smoke".into(), "fast".into()])
            .with_priority(Some(5));
        ctx.bind("HOST", "example");

        let invocation = SuiteInvocation::new(&ctx, "t", &spec, &[&BTreeMap::new()])
            .with_tests(vec!["t1".into(), "t2".into()]);
        let suite = ProcessEngine::new()
            .with_interpreter("sh")
            .run_suite(&mut ctx, &invocation)
            .unwrap();
        assert_eq!(suite.passed(), 1, "{:?}", suite.cases);
    }

    #[test]
    fn test_spawn_failure_is_an_engine_error() {
        let dir = tempdir().unwrap();
        let mut ctx = RunContext::new(dir.path());
        let spec = TestSpec::new("does-not-exist");
        let invocation = SuiteInvocation::new(&ctx, "t", &spec, &[]);

        let err = ProcessEngine::new()
            .run_suite(&mut ctx, &invocation)
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
