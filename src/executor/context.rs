//! Shared run context
//!
//! One `RunContext` is threaded by `&mut` through every task unit of a run, so
//! bindings set by one unit are visible to the units after it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{ResolvedRun, RunParameters};

const REDACTED: &str = "<redacted>";

#[derive(Clone, Debug)]
pub struct RunContext {
    base_dir: PathBuf,
    include_dirs: Vec<PathBuf>,
    bindings: BTreeMap<String, String>,
    redact: bool,
    labels: Vec<String>,
    priority: Option<i64>,
    executed: Vec<String>,
}

impl RunContext {
    /// Create an empty context rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            include_dirs: Vec::new(),
            bindings: BTreeMap::new(),
            redact: false,
            labels: Vec::new(),
            priority: None,
            executed: Vec::new(),
        }
    }

    /// Build the context for a resolved run
    ///
    /// Definition-level params are bound first; caller bindings override them.
    pub fn for_run(resolved: &ResolvedRun, params: &RunParameters) -> Self {
        let mut ctx = Self::new(&resolved.base_dir)
            .with_include_dirs(resolved.include_dirs.clone())
            .with_redact(params.redact)
            .with_labels(params.labels.clone())
            .with_priority(params.priority);

        for (name, binding) in &resolved.definition.params {
            match binding.resolve() {
                Some(value) => ctx.bind(name.clone(), value),
                None => debug!("Param '{}' has no value", name),
            }
        }
        for (name, value) in &params.bindings {
            ctx.bind(name.clone(), value.clone());
        }

        debug!("Bindings: {}", ctx.describe_bindings());
        ctx
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Resolve a definition path against the run directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    pub fn with_include_dirs(mut self, include_dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    pub fn with_redact(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_priority(mut self, priority: Option<i64>) -> Self {
        self.priority = priority;
        self
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn priority(&self) -> Option<i64> {
        self.priority
    }

    /// Bindings rendered for logs, honoring redaction
    pub fn describe_bindings(&self) -> String {
        let pairs: Vec<String> = self
            .bindings
            .iter()
            .map(|(name, value)| {
                if self.redact {
                    format!("{name}={REDACTED}")
                } else {
                    format!("{name}={value}")
                }
            })
            .collect();
        format!("{{{}}}", pairs.join(", "))
    }

    pub fn record_executed(&mut self, label: impl Into<String>) {
        self.executed.push(label.into());
    }

    /// Labels of the units run so far, in order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

#[cfg(test)]
impl RunContext {
    pub fn binding(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    pub fn redact(&self) -> bool {
        self.redact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParamBinding, RunDefinition};

    #[test]
    fn test_resolve_path() {
        let ctx = RunContext::new("/runs/smoke");
        assert_eq!(ctx.resolve_path("t/ping.sh"), PathBuf::from("/runs/smoke/t/ping.sh"));
        assert_eq!(ctx.resolve_path("/abs/ping.sh"), PathBuf::from("/abs/ping.sh"));
    }

    #[test]
    fn test_caller_bindings_override_definition_params() {
        let resolved = ResolvedRun {
            definition: RunDefinition::new("run")
                .with_param("HOST", ParamBinding::value("from-def"))
                .with_param("PORT", ParamBinding::value("80"))
                .with_param("UNSET", ParamBinding::default()),
            base_dir: PathBuf::from("/runs"),
            include_dirs: vec![PathBuf::from("/inc")],
            run_file: PathBuf::from("/runs/run.yaml"),
        };
        let params = RunParameters::builder()
            .bind("HOST", "from-caller")
            .redact(true)
            .priority(1)
            .build();

        let ctx = RunContext::for_run(&resolved, &params);
        assert_eq!(ctx.binding("HOST"), Some("from-caller"));
        assert_eq!(ctx.binding("PORT"), Some("80"));
        assert_eq!(ctx.binding("UNSET"), None);
        assert_eq!(ctx.include_dirs(), &[PathBuf::from("/inc")]);
        assert!(ctx.redact());
        assert_eq!(ctx.priority(), Some(1));
    }

    #[test]
    fn test_describe_bindings_redacts() {
        let mut ctx = RunContext::new("/");
        ctx.bind("TOKEN", "secret");
        assert_eq!(ctx.describe_bindings(), "{TOKEN=secret}");

        let ctx = ctx.with_redact(true);
        assert_eq!(ctx.describe_bindings(), "{TOKEN=<redacted>}");
        assert!(!ctx.describe_bindings().contains("secret"));
    }
}
