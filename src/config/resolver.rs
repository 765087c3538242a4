//! Run-file resolution
//!
//! Turns `RunParameters` into a parsed `RunDefinition` plus the absolute base
//! directory every later path-relative operation resolves against. The process
//! working directory is never changed.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ConfigError, IncludeExpander, RunParameters};
use crate::models::RunDefinition;

/// Output of resolution: the definition and the paths it was resolved with
#[derive(Clone, Debug)]
pub struct ResolvedRun {
    pub definition: RunDefinition,
    /// Absolute run directory
    pub base_dir: PathBuf,
    /// Include search path actually used, in order
    pub include_dirs: Vec<PathBuf>,
    /// Absolute path of the run file
    pub run_file: PathBuf,
}

/// Load, include-expand and parse the run file named by `params`
pub fn resolve(
    params: &RunParameters,
    expander: &dyn IncludeExpander,
) -> Result<ResolvedRun, ConfigError> {
    let dir = params.dir.as_deref().ok_or(ConfigError::MissingDirectory)?;
    let filename = params
        .filename
        .as_deref()
        .ok_or(ConfigError::MissingFilename)?;

    let base_dir = absolute_dir(&expand_path(dir))?;
    let run_file = absolute(&expand_path(filename))?;
    let run_file_dir = run_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| base_dir.clone());

    let raw = fs::read(&run_file).map_err(|source| ConfigError::Read {
        path: run_file.clone(),
        source,
    })?;

    let mut include_dirs = Vec::new();
    for dir in &params.include_dirs {
        push_unique(&mut include_dirs, absolute(&expand_path(dir))?);
    }
    push_unique(&mut include_dirs, base_dir.clone());
    push_unique(&mut include_dirs, run_file_dir);
    debug!("Include path: {:?}", include_dirs);

    let expanded = expander.expand(&raw, &include_dirs)?;
    let definition: RunDefinition = serde_yaml::from_slice(&expanded)?;
    validate(&definition)?;

    info!(
        "Loaded run '{}' (version {}) from {}: {} tests, {} groups",
        definition.name,
        if definition.version.is_empty() {
            "-"
        } else {
            &definition.version
        },
        run_file.display(),
        definition.tests.len(),
        definition.groups.len()
    );

    Ok(ResolvedRun {
        definition,
        base_dir,
        include_dirs,
        run_file,
    })
}

fn validate(definition: &RunDefinition) -> Result<(), ConfigError> {
    if definition.name.trim().is_empty() {
        return Err(ConfigError::Invalid("run name is empty".to_string()));
    }
    for (name, spec) in &definition.tests {
        if spec.path.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("test '{name}' has no path")));
        }
    }
    Ok(())
}

/// Absolute form of `path`, resolved against the current directory
fn absolute(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(path).map_err(|source| ConfigError::Path {
        path: path.to_path_buf(),
        source,
    })
}

/// Canonical form of an existing directory
fn absolute_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let canonical = fs::canonicalize(path).map_err(|source| ConfigError::Path {
        path: path.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(ConfigError::Path {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }
    Ok(canonical)
}

fn push_unique(dirs: &mut Vec<PathBuf>, dir: PathBuf) {
    if !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

/// Expand ~ to home directory
fn expand_path(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
