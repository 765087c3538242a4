//! Run-definition models
//!
//! The typed form of a run-definition document after include expansion.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

/// Fully parsed, include-expanded test-run definition
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunDefinition {
    /// Run name
    pub name: String,

    /// Definition version
    #[serde(default)]
    pub version: String,

    /// Test definitions by name
    #[serde(default)]
    pub tests: BTreeMap<String, TestSpec>,

    /// Test groups by name
    #[serde(default)]
    pub groups: BTreeMap<String, GroupSpec>,

    /// Parameter bindings by name
    #[serde(default)]
    pub params: BTreeMap<String, ParamBinding>,
}

impl RunDefinition {
    pub fn test(&self, name: &str) -> Option<&TestSpec> {
        self.tests.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.get(name)
    }
}

/// In-memory construction for tests
#[cfg(test)]
impl RunDefinition {
    /// Create an empty definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a test definition
    pub fn with_test(mut self, name: impl Into<String>, spec: TestSpec) -> Self {
        self.tests.insert(name.into(), spec);
        self
    }

    /// Add a group definition
    pub fn with_group(mut self, name: impl Into<String>, spec: GroupSpec) -> Self {
        self.groups.insert(name.into(), spec);
        self
    }

    /// Add a parameter binding
    pub fn with_param(mut self, name: impl Into<String>, binding: ParamBinding) -> Self {
        self.params.insert(name.into(), binding);
        self
    }
}

/// A single test (or suite) definition
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestSpec {
    /// Location of the test, relative to the run directory unless absolute
    pub path: String,

    /// Engine version the test targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Default parameter values
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[cfg(test)]
impl TestSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// A named group of tests and nested groups
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Parameters applied to every member
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Member tests, in execution order
    #[serde(default)]
    pub tests: Vec<TestRef>,

    /// Nested groups, executed after the member tests
    #[serde(default)]
    pub groups: Vec<GroupRef>,
}

#[cfg(test)]
impl GroupSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test(mut self, test: TestRef) -> Self {
        self.tests.push(test);
        self
    }

    pub fn with_group(mut self, group: GroupRef) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Reference to a test from inside a group
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestRef {
    pub name: String,

    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[cfg(test)]
impl TestRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Reference to a nested group
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupRef {
    pub name: String,

    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[cfg(test)]
impl GroupRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }
}

/// Definition-level parameter binding
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParamBinding {
    /// Literal value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Environment variable to read the value from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
impl ParamBinding {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn env(name: impl Into<String>) -> Self {
        Self {
            env: Some(name.into()),
            ..Self::default()
        }
    }
}

impl ParamBinding {
    /// Environment variable if set, else the literal value
    pub fn resolve(&self) -> Option<String> {
        self.env
            .as_deref()
            .and_then(|name| env::var(name).ok())
            .or_else(|| self.value.clone())
    }
}
