//! CLI argument parsing
//!
//! Defines the command-line interface using clap and turns it into
//! `RunParameters`, falling back to `SUITERUN_*` environment variables.

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::config::{EnvConfig, RunParameters};
use crate::results::ReportFormat;
use crate::utils::logger::LogLevel;

/// Compile and run test groups, suites and tests, then print a JUnit-style report
#[derive(Parser, Debug)]
#[command(name = "suiterun")]
#[command(version)]
#[command(about = "Run a test-run definition and emit a JSON or JUnit XML report")]
#[command(long_about = None)]
pub struct Args {
    /// Run directory; relative test paths resolve against it [env: SUITERUN_DIR]
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Run-definition file [env: SUITERUN_RUN]
    #[arg(short, long)]
    pub run: Option<PathBuf>,

    /// Group to run (repeatable, runs in the order given)
    #[arg(short, long = "group")]
    pub groups: Vec<String>,

    /// Ad hoc test to run (repeatable, ignored when --suite is set)
    #[arg(short, long = "test")]
    pub tests: Vec<String>,

    /// Named suite, optionally restricted to tests: NAME or NAME:t1,t2
    #[arg(short, long)]
    pub suite: Option<String>,

    /// Include search directory (repeatable) [env: SUITERUN_INCLUDE]
    #[arg(short = 'I', long = "include")]
    pub include_dirs: Vec<PathBuf>,

    /// Parameter binding NAME=VALUE (repeatable)
    #[arg(short = 'p', long = "param", value_parser = parse_binding)]
    pub params: Vec<(String, String)>,

    /// Report format: json or xml
    #[arg(long, value_name = "FORMAT", conflicts_with = "json")]
    pub format: Option<ReportFormat>,

    /// Emit JSON instead of XML [env: SUITERUN_JSON]
    #[arg(long)]
    pub json: bool,

    /// Run test paths through this program instead of executing them
    #[arg(long, value_name = "PROG")]
    pub interpreter: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error) [env: SUITERUN_LOG]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Hide parameter values in logs [env: SUITERUN_REDACT]
    #[arg(long)]
    pub redact: bool,

    /// Labels passed to every test (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Priority passed to every test
    #[arg(long)]
    pub priority: Option<i64>,
}

impl Args {
    /// Log level from --log-level, then the environment
    fn log_level(&self, env: &EnvConfig) -> Result<LogLevel> {
        match self.log_level.as_deref().or(env.log_level.as_deref()) {
            Some(level) => match LogLevel::from_str(level) {
                Some(level) => Ok(level),
                None => bail!("Unknown log level: {level}"),
            },
            None => Ok(LogLevel::Info),
        }
    }

    /// Build run parameters; flags win over environment variables
    pub fn into_parameters(self, env: EnvConfig) -> Result<RunParameters> {
        let log_level = self.log_level(&env)?;
        let emit_json = match self.format {
            Some(format) => format == ReportFormat::Json,
            None => self.json || env.json.unwrap_or(false),
        };

        let mut builder = RunParameters::builder()
            .emit_json(emit_json)
            .verbose(self.verbose)
            .log_level(log_level)
            .redact(self.redact || env.redact.unwrap_or(false));

        if let Some(dir) = self.dir.or(env.dir) {
            builder = builder.dir(dir);
        }
        if let Some(run) = self.run.or(env.run_file) {
            builder = builder.filename(run);
        }
        for dir in self.include_dirs.into_iter().chain(env.include_dirs) {
            builder = builder.include_dir(dir);
        }
        for (name, value) in self.params {
            builder = builder.bind(name, value);
        }
        for group in self.groups {
            builder = builder.group(group);
        }
        for test in self.tests {
            builder = builder.test(test);
        }
        if let Some(suite) = &self.suite {
            let (name, tests) = parse_suite(suite);
            builder = builder.suite(name, tests);
        }
        for label in self.labels.into_iter().filter(|l| !l.is_empty()) {
            builder = builder.label(label);
        }
        if let Some(priority) = self.priority {
            builder = builder.priority(priority);
        }

        Ok(builder.build())
    }
}

/// Parse a NAME=VALUE binding
fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

/// Split NAME:t1,t2 into the suite name and its test subset
fn parse_suite(s: &str) -> (&str, Vec<&str>) {
    match s.split_once(':') {
        Some((name, tests)) => (
            name,
            tests.split(',').map(str::trim).filter(|t| !t.is_empty()).collect(),
        ),
        None => (s, Vec::new()),
    }
}
