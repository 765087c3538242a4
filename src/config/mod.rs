//! Configuration module
//!
//! Run parameters supplied by the front-end, environment overrides, and the
//! resolver that turns a run file into a `RunDefinition`.

mod env;
mod include;
mod resolver;

pub use env::EnvConfig;
pub use include::{IncludeError, IncludeExpander, YamlIncludes};
pub use resolver::{resolve, ResolvedRun};

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::utils::logger::LogLevel;

/// Errors raised while building a run from its parameters and run file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("run parameters have no directory")]
    MissingDirectory,

    #[error("run parameters have no run file")]
    MissingFilename,

    #[error("failed to resolve path {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read run file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to process includes: {0}")]
    Include(#[from] IncludeError),

    #[error("run file parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid run definition: {0}")]
    Invalid(String),
}

/// Named suite selection with an optional test subset
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SuiteSelection {
    pub name: String,
    pub tests: Vec<String>,
}

/// Caller-supplied run configuration
#[derive(Clone, Debug)]
pub struct RunParameters {
    /// Run directory; relative test paths resolve against it
    pub dir: Option<PathBuf>,
    /// Run-definition file
    pub filename: Option<PathBuf>,
    /// Include search path, in priority order
    pub include_dirs: Vec<PathBuf>,
    /// Caller bindings, overriding every other parameter source
    pub bindings: BTreeMap<String, String>,
    /// Groups to run, in order
    pub groups: Vec<String>,
    /// Ad hoc tests to run, in order
    pub tests: Vec<String>,
    /// Named suite; suppresses the ad hoc test list
    pub suite: Option<SuiteSelection>,
    /// Emit JSON instead of XML
    pub emit_json: bool,
    pub verbose: bool,
    pub log_level: LogLevel,
    /// Hide binding values in logs
    pub redact: bool,
    pub labels: Vec<String>,
    pub priority: Option<i64>,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            dir: None,
            filename: None,
            include_dirs: Vec::new(),
            bindings: BTreeMap::new(),
            groups: Vec::new(),
            tests: Vec::new(),
            suite: None,
            emit_json: false,
            verbose: false,
            log_level: LogLevel::Info,
            redact: false,
            labels: Vec::new(),
            priority: None,
        }
    }
}

impl RunParameters {
    pub fn builder() -> RunParametersBuilder {
        RunParametersBuilder::default()
    }

    /// Log level to install: `verbose` raises anything quieter than debug
    pub fn effective_log_level(&self) -> LogLevel {
        match self.log_level {
            LogLevel::Trace => LogLevel::Trace,
            _ if self.verbose => LogLevel::Debug,
            level => level,
        }
    }

    /// The named suite, if one was requested with a non-empty name
    pub fn named_suite(&self) -> Option<&SuiteSelection> {
        self.suite.as_ref().filter(|s| !s.name.is_empty())
    }
}

/// Builder for `RunParameters`
#[derive(Debug, Default)]
pub struct RunParametersBuilder {
    params: RunParameters,
}

impl RunParametersBuilder {
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.params.dir = Some(dir.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<PathBuf>) -> Self {
        self.params.filename = Some(filename.into());
        self
    }

    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.params.include_dirs.push(dir.into());
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.bindings.insert(name.into(), value.into());
        self
    }

    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.params.groups.push(name.into());
        self
    }

    pub fn test(mut self, name: impl Into<String>) -> Self {
        self.params.tests.push(name.into());
        self
    }

    pub fn suite<I, S>(mut self, name: impl Into<String>, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.suite = Some(SuiteSelection {
            name: name.into(),
            tests: tests.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn emit_json(mut self, emit_json: bool) -> Self {
        self.params.emit_json = emit_json;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.params.verbose = verbose;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.params.log_level = level;
        self
    }

    pub fn redact(mut self, redact: bool) -> Self {
        self.params.redact = redact;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.params.labels.push(label.into());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.params.priority = Some(priority);
        self
    }

    pub fn build(self) -> RunParameters {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = RunParameters::default();
        assert!(params.dir.is_none());
        assert!(!params.emit_json);
        assert_eq!(params.log_level, LogLevel::Info);
    }

    #[test]
    fn test_builder() {
        let params = RunParameters::builder()
            .dir("/tmp/run")
            .filename("run.yaml")
            .group("smoke")
            .test("ping")
            .bind("HOST", "localhost")
            .suite("api", ["t1", "t2"])
            .emit_json(true)
            .priority(2)
            .build();

        assert_eq!(params.dir, Some(PathBuf::from("/tmp/run")));
        assert_eq!(params.groups, vec!["smoke"]);
        assert_eq!(params.bindings["HOST"], "localhost");
        assert_eq!(params.named_suite().unwrap().tests, vec!["t1", "t2"]);
        assert!(params.emit_json);
        assert_eq!(params.priority, Some(2));
    }

    #[test]
    fn test_effective_log_level() {
        let quiet = RunParameters::builder().log_level(LogLevel::Warn);
        assert_eq!(quiet.build().effective_log_level(), LogLevel::Warn);

        let verbose = RunParameters::builder().log_level(LogLevel::Warn).verbose(true);
        assert_eq!(verbose.build().effective_log_level(), LogLevel::Debug);

        let trace = RunParameters::builder().log_level(LogLevel::Trace).verbose(true);
        assert_eq!(trace.build().effective_log_level(), LogLevel::Trace);
    }

    #[test]
    fn test_empty_suite_name_is_ignored() {
        let params = RunParameters::builder()
            .suite("", Vec::<String>::new())
            .build();
        assert!(params.named_suite().is_none());
    }
}
