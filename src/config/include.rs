//! YAML include expansion
//!
//! A mapping with an `include` key is replaced by the parsed content of the
//! named file; the mapping's other keys override keys of an included mapping.
//! A sequence item that is only `{include: file}` and loads a sequence is
//! spliced into the enclosing sequence.

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const INCLUDE_KEY: &str = "include";

/// Maximum include nesting
const MAX_DEPTH: usize = 32;

/// Include expansion errors
#[derive(Error, Debug)]
pub enum IncludeError {
    #[error("included file not found in include path: {0}")]
    NotFound(String),

    #[error("include cycle through {0}")]
    Cycle(PathBuf),

    #[error("includes nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("include directive must name a file")]
    InvalidDirective,

    #[error("cannot merge keys into non-mapping include {0}")]
    Merge(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in {origin}: {source}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Preprocessing contract: raw bytes plus an ordered include path in, expanded bytes out
pub trait IncludeExpander {
    fn expand(&self, raw: &[u8], include_dirs: &[PathBuf]) -> Result<Vec<u8>, IncludeError>;
}

/// Recursive `include:` expansion over YAML documents
#[derive(Clone, Debug)]
pub struct YamlIncludes {
    max_depth: usize,
}

impl YamlIncludes {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }

    fn expand_value(
        &self,
        value: Value,
        dirs: &[PathBuf],
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, IncludeError> {
        match value {
            Value::Mapping(map) => self.expand_mapping(map, dirs, stack),
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let splice = is_bare_include(&item);
                    match self.expand_value(item, dirs, stack)? {
                        Value::Sequence(inner) if splice => out.extend(inner),
                        other => out.push(other),
                    }
                }
                Ok(Value::Sequence(out))
            }
            Value::Tagged(mut tagged) => {
                let inner = std::mem::replace(&mut tagged.value, Value::Null);
                tagged.value = self.expand_value(inner, dirs, stack)?;
                Ok(Value::Tagged(tagged))
            }
            other => Ok(other),
        }
    }

    fn expand_mapping(
        &self,
        map: Mapping,
        dirs: &[PathBuf],
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, IncludeError> {
        let mut target = None;
        let mut rest = Mapping::new();
        for (key, value) in map {
            if key.as_str() == Some(INCLUDE_KEY) {
                target = Some(value);
            } else {
                let value = self.expand_value(value, dirs, stack)?;
                rest.insert(key, value);
            }
        }

        let Some(target) = target else {
            return Ok(Value::Mapping(rest));
        };
        let Value::String(file) = target else {
            return Err(IncludeError::InvalidDirective);
        };

        let included = self.load(&file, dirs, stack)?;
        if rest.is_empty() {
            return Ok(included);
        }
        match included {
            Value::Mapping(mut base) => {
                for (key, value) in rest {
                    base.insert(key, value);
                }
                Ok(Value::Mapping(base))
            }
            _ => Err(IncludeError::Merge(file)),
        }
    }

    fn load(
        &self,
        file: &str,
        dirs: &[PathBuf],
        stack: &mut Vec<PathBuf>,
    ) -> Result<Value, IncludeError> {
        if stack.len() >= self.max_depth {
            return Err(IncludeError::TooDeep(self.max_depth));
        }

        let path = locate(file, dirs)?;
        let canonical = fs::canonicalize(&path).map_err(|source| IncludeError::Read {
            path: path.clone(),
            source,
        })?;
        if stack.contains(&canonical) {
            return Err(IncludeError::Cycle(canonical));
        }

        debug!("Including {}", canonical.display());
        let bytes = fs::read(&canonical).map_err(|source| IncludeError::Read {
            path: canonical.clone(),
            source,
        })?;
        let value: Value = serde_yaml::from_slice(&bytes).map_err(|source| IncludeError::Yaml {
            origin: canonical.display().to_string(),
            source,
        })?;

        stack.push(canonical);
        let expanded = self.expand_value(value, dirs, stack);
        stack.pop();
        expanded
    }
}

impl Default for YamlIncludes {
    fn default() -> Self {
        Self::new()
    }
}

impl IncludeExpander for YamlIncludes {
    fn expand(&self, raw: &[u8], include_dirs: &[PathBuf]) -> Result<Vec<u8>, IncludeError> {
        let value: Value = serde_yaml::from_slice(raw).map_err(|source| IncludeError::Yaml {
            origin: "run file".to_string(),
            source,
        })?;

        let mut stack = Vec::new();
        let expanded = self.expand_value(value, include_dirs, &mut stack)?;

        serde_yaml::to_string(&expanded)
            .map(String::into_bytes)
            .map_err(|source| IncludeError::Yaml {
                origin: "expanded run file".to_string(),
                source,
            })
    }
}

/// Absolute paths are used as-is; relative ones are searched in include order
fn locate(file: &str, dirs: &[PathBuf]) -> Result<PathBuf, IncludeError> {
    let path = Path::new(file);
    if path.is_absolute() {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(IncludeError::NotFound(file.to_string()))
        };
    }

    dirs.iter()
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| IncludeError::NotFound(file.to_string()))
}

fn is_bare_include(value: &Value) -> bool {
    match value {
        Value::Mapping(map) => map.len() == 1 && map.contains_key(INCLUDE_KEY),
        _ => false,
    }
}
