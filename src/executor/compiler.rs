//! Task compilation
//!
//! Turns a selection into the ordered list of task units: selected groups
//! first, then either one named-suite unit or one unit per ad hoc test. A
//! named suite suppresses the ad hoc list entirely.

use thiserror::Error;
use tracing::{debug, info};

use super::task::{GroupTask, SuiteTask, TaskUnit, TestTask};
use crate::config::{RunParameters, SuiteSelection};
use crate::models::RunDefinition;

/// A selection refers to something the definition does not have
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("unknown test: {0}")]
    UnknownTest(String),

    #[error("unknown suite: {0}")]
    UnknownSuite(String),

    #[error("group '{group}' references unknown test '{test}'")]
    UnknownGroupTest { group: String, test: String },

    #[error("group cycle: {}", .0.join(" -> "))]
    GroupCycle(Vec<String>),
}

/// What to run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub groups: Vec<String>,
    pub tests: Vec<String>,
    pub suite: Option<SuiteSelection>,
}

impl From<&RunParameters> for Selection {
    fn from(params: &RunParameters) -> Self {
        Self {
            groups: params.groups.clone(),
            tests: params.tests.clone(),
            suite: params.named_suite().cloned(),
        }
    }
}

/// Compile `selection` against `definition`
///
/// Every reference is checked before the first unit is returned; on error no
/// units are produced.
pub fn compile(
    definition: &RunDefinition,
    selection: &Selection,
) -> Result<Vec<TaskUnit>, SelectionError> {
    let mut units: Vec<TaskUnit> = Vec::new();

    for name in &selection.groups {
        check_group(definition, name, &mut Vec::new())?;
        units.push(Box::new(GroupTask::new(name)));
    }

    match selection.suite.as_ref().filter(|s| !s.name.is_empty()) {
        Some(suite) => {
            if definition.test(&suite.name).is_none() {
                return Err(SelectionError::UnknownSuite(suite.name.clone()));
            }
            if !selection.tests.is_empty() {
                debug!(
                    "Suite '{}' selected; ignoring ad hoc tests {:?}",
                    suite.name, selection.tests
                );
            }
            units.push(Box::new(SuiteTask::new(&suite.name, suite.tests.clone())));
        }
        None => {
            for name in &selection.tests {
                if definition.test(name).is_none() {
                    return Err(SelectionError::UnknownTest(name.clone()));
                }
                units.push(Box::new(TestTask::new(name)));
            }
        }
    }

    info!("Compiled {} task units", units.len());
    Ok(units)
}

/// Check a group and everything it reaches; `path` is the chain of enclosing groups
fn check_group(
    definition: &RunDefinition,
    name: &str,
    path: &mut Vec<String>,
) -> Result<(), SelectionError> {
    if path.iter().any(|g| g == name) {
        let mut cycle = path.clone();
        cycle.push(name.to_string());
        return Err(SelectionError::GroupCycle(cycle));
    }

    let group = definition
        .group(name)
        .ok_or_else(|| SelectionError::UnknownGroup(name.to_string()))?;

    for test_ref in &group.tests {
        if definition.test(&test_ref.name).is_none() {
            return Err(SelectionError::UnknownGroupTest {
                group: name.to_string(),
                test: test_ref.name.clone(),
            });
        }
    }

    path.push(name.to_string());
    for group_ref in &group.groups {
        check_group(definition, &group_ref.name, path)?;
    }
    path.pop();

    Ok(())
}

#[cfg(test)]
impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(name.into());
        self
    }

    pub fn test(mut self, name: impl Into<String>) -> Self {
        self.tests.push(name.into());
        self
    }

    pub fn suite<I, S>(mut self, name: impl Into<String>, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suite = Some(SuiteSelection {
            name: name.into(),
            tests: tests.into_iter().map(Into::into).collect(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupRef, GroupSpec, TestRef, TestSpec};

    fn definition() -> RunDefinition {
        RunDefinition::new("run")
            .with_test("ping", TestSpec::new("ping.sh"))
            .with_test("other", TestSpec::new("other.sh"))
            .with_test("S", TestSpec::new("suites/s"))
            .with_group("a", GroupSpec::new().with_test(TestRef::new("ping")))
            .with_group(
                "b",
                GroupSpec::new()
                    .with_test(TestRef::new("other"))
                    .with_group(GroupRef::new("a")),
            )
    }

    fn labels(units: &[TaskUnit]) -> Vec<String> {
        units.iter().map(|u| u.label()).collect()
    }

    #[test]
    fn test_groups_then_tests_in_order() {
        let selection = Selection::new()
            .group("b")
            .group("a")
            .test("other")
            .test("ping");
        let units = compile(&definition(), &selection).unwrap();
        assert_eq!(
            labels(&units),
            vec!["group b", "group a", "test other", "test ping"]
        );
    }

    #[test]
    fn test_named_suite_suppresses_ad_hoc_tests() {
        let selection = Selection::new().test("other").suite("S", ["t1", "t2"]);
        let units = compile(&definition(), &selection).unwrap();
        assert_eq!(labels(&units), vec!["suite S [t1, t2]"]);
    }

    #[test]
    fn test_groups_then_named_suite() {
        let selection = Selection::new().suite("S", ["t1"]).group("a");
        let units = compile(&definition(), &selection).unwrap();
        assert_eq!(labels(&units), vec!["group a", "suite S [t1]"]);
    }

    #[test]
    fn test_empty_suite_name_falls_back_to_tests() {
        let selection = Selection::new().test("ping").suite("", Vec::<String>::new());
        let units = compile(&definition(), &selection).unwrap();
        assert_eq!(labels(&units), vec!["test ping"]);
    }

    #[test]
    fn test_single_ad_hoc_test() {
        let units = compile(&definition(), &Selection::new().test("ping")).unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn test_unknown_references() {
        let def = definition();
        assert_eq!(
            compile(&def, &Selection::new().group("a").test("nope")).unwrap_err(),
            SelectionError::UnknownTest("nope".to_string())
        );
        assert_eq!(
            compile(&def, &Selection::new().group("zzz")).unwrap_err(),
            SelectionError::UnknownGroup("zzz".to_string())
        );
        assert_eq!(
            compile(&def, &Selection::new().suite("missing", ["t1"])).unwrap_err(),
            SelectionError::UnknownSuite("missing".to_string())
        );
    }

    #[test]
    fn test_group_members_are_checked() {
        let def = definition()
            .with_group("broken", GroupSpec::new().with_test(TestRef::new("ghost")))
            .with_group("wrapper", GroupSpec::new().with_group(GroupRef::new("absent")));

        assert_eq!(
            compile(&def, &Selection::new().group("broken")).unwrap_err(),
            SelectionError::UnknownGroupTest {
                group: "broken".to_string(),
                test: "ghost".to_string()
            }
        );
        assert_eq!(
            compile(&def, &Selection::new().group("wrapper")).unwrap_err(),
            SelectionError::UnknownGroup("absent".to_string())
        );
    }

    #[test]
    fn test_group_cycle() {
        let def = definition()
            .with_group("x", GroupSpec::new().with_group(GroupRef::new("y")))
            .with_group("y", GroupSpec::new().with_group(GroupRef::new("x")));

        let err = compile(&def, &Selection::new().group("x")).unwrap_err();
        assert_eq!(
            err,
            SelectionError::GroupCycle(vec!["x".into(), "y".into(), "x".into()])
        );
        assert_eq!(err.to_string(), "group cycle: x -> y -> x");
    }

    #[test]
    fn test_shared_subgroup_is_not_a_cycle() {
        let def = definition().with_group(
            "diamond",
            GroupSpec::new()
                .with_group(GroupRef::new("a"))
                .with_group(GroupRef::new("b")),
        );
        assert!(compile(&def, &Selection::new().group("diamond")).is_ok());
    }

    #[test]
    fn test_selection_from_parameters() {
        let params = RunParameters::builder()
            .group("a")
            .test("ping")
            .suite("S", ["t1"])
            .build();
        let selection = Selection::from(&params);
        assert_eq!(selection.groups, vec!["a"]);
        assert_eq!(selection.suite.unwrap().name, "S");
    }
}
