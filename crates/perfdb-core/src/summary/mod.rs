//! Derived per-database and per-suite summaries.
//!
//! Every summary records the revision of the entity kind it was built from so
//! the cache can tell when it went stale.

pub mod run_order;

use crate::errors::Result;
use crate::model::TestId;
use crate::storage::{queries, Store};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub use run_order::RunOrderIndex;

/// Tag folded into the always-present synthetic suite.
pub const NIGHTLYTEST_TAG: &str = "nightlytest";
const NIGHTLYTEST_NAME: &str = "Nightlytest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteEntry {
    pub name: String,
    pub path: Vec<String>,
}

/// All suites known to one database, sorted by name.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteListing {
    pub revision: u64,
    pub suites: Vec<SuiteEntry>,
}

impl SuiteListing {
    pub fn from_store(store: &Store, revision: u64) -> Result<Self> {
        let tags = store.read(|c| queries::distinct_run_info_values(c, queries::TAG_KEY))?;
        Ok(Self::build(revision, tags))
    }

    pub fn build(revision: u64, tags: impl IntoIterator<Item = String>) -> Self {
        let mut suites = vec![SuiteEntry {
            name: NIGHTLYTEST_NAME.to_string(),
            path: vec![NIGHTLYTEST_TAG.to_string()],
        }];
        let mut seen = BTreeSet::new();
        for tag in tags {
            if tag == NIGHTLYTEST_TAG || !seen.insert(tag.clone()) {
                continue;
            }
            suites.push(SuiteEntry {
                name: tag.clone(),
                path: vec!["simple".to_string(), tag],
            });
        }
        suites.sort_by(|a, b| a.name.cmp(&b.name));
        Self { revision, suites }
    }
}

/// How a test sub-name participates in pass/fail derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestNameKind {
    Plain,
    StatusMarker,
    SuccessMarker,
}

impl TestNameKind {
    /// Splits a sub-name into its kind and canonical base test name.
    pub fn classify(sub_name: &str) -> (TestNameKind, &str) {
        if let Some(base) = sub_name.strip_suffix(".status") {
            (TestNameKind::StatusMarker, base)
        } else if let Some(base) = sub_name.strip_suffix(".success") {
            (TestNameKind::SuccessMarker, base)
        } else {
            (TestNameKind::Plain, sub_name)
        }
    }
}

/// Marker convention a suite uses to report test outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusConvention {
    /// `<test>.status`: non-zero means failure.
    Status,
    /// `<test>.success`: non-zero means success.
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMarker {
    pub marker_name: String,
    pub convention: StatusConvention,
}

/// Sorted (key, value) metadata pairs of one test.
pub type ParameterSet = Vec<(String, String)>;

/// Test and parameter index of one suite.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    pub revision: u64,
    pub tag: String,
    pub test_names: Vec<String>,
    pub parameter_keys: Vec<String>,
    pub parameter_sets: Vec<ParameterSet>,
    /// Empty when the suite has neither status nor success markers.
    pub status_markers: BTreeMap<String, StatusMarker>,
    pub kinds: BTreeMap<String, TestNameKind>,
    #[serde(skip)]
    pub test_map: BTreeMap<(String, ParameterSet), TestId>,
}

impl SuiteSummary {
    pub fn from_store(store: &Store, tag: &str, revision: u64) -> Result<Self> {
        let prefix = format!("{}.", tag);
        let tests = store.read(|c| queries::tests_with_prefix(c, &prefix))?;
        let summary = Self::build(tag, revision, tests);
        tracing::debug!(
            event = "perfdb.suite_summary.built",
            tag = %tag,
            revision,
            tests = summary.test_map.len(),
            "built suite summary for {}", tag
        );
        Ok(summary)
    }

    pub fn build(
        tag: &str,
        revision: u64,
        tests: impl IntoIterator<Item = queries::TestRecord>,
    ) -> Self {
        let prefix = format!("{}.", tag);
        let mut test_names = BTreeSet::new();
        let mut parameter_sets = BTreeSet::new();
        let mut kinds = BTreeMap::new();
        let mut test_map = BTreeMap::new();
        let mut has_status = false;
        let mut has_success = false;

        for t in tests {
            let Some(sub_name) = t.name.strip_prefix(&prefix) else {
                continue;
            };
            let mut params = t.params;
            params.sort();

            let (kind, base) = TestNameKind::classify(sub_name);
            match kind {
                TestNameKind::StatusMarker => has_status = true,
                TestNameKind::SuccessMarker => has_success = true,
                TestNameKind::Plain => {}
            }
            test_names.insert(base.to_string());
            kinds.insert(sub_name.to_string(), kind);
            parameter_sets.insert(params.clone());
            test_map.insert((sub_name.to_string(), params), t.id);
        }

        let convention = if has_status {
            Some(StatusConvention::Status)
        } else if has_success {
            Some(StatusConvention::Success)
        } else {
            None
        };
        let status_markers = match convention {
            Some(convention) => test_names
                .iter()
                .map(|name| {
                    let suffix = match convention {
                        StatusConvention::Status => "status",
                        StatusConvention::Success => "success",
                    };
                    (
                        name.clone(),
                        StatusMarker {
                            marker_name: format!("{}.{}", name, suffix),
                            convention,
                        },
                    )
                })
                .collect(),
            None => BTreeMap::new(),
        };

        let parameter_keys: BTreeSet<String> = parameter_sets
            .iter()
            .flat_map(|set| set.iter().map(|(k, _)| k.clone()))
            .collect();

        Self {
            revision,
            tag: tag.to_string(),
            test_names: test_names.into_iter().collect(),
            parameter_keys: parameter_keys.into_iter().collect(),
            parameter_sets: parameter_sets.into_iter().collect(),
            status_markers,
            kinds,
            test_map,
        }
    }

    /// Test id of `sub_name` under one parameter set.
    pub fn test_id(&self, sub_name: &str, params: &ParameterSet) -> Option<TestId> {
        self.test_map
            .get(&(sub_name.to_string(), params.clone()))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::queries::TestRecord;

    fn rec(id: TestId, name: &str, params: &[(&str, &str)]) -> TestRecord {
        TestRecord {
            id,
            name: name.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn listing_always_has_nightlytest_and_sorts() {
        let l = SuiteListing::build(
            3,
            vec!["zeta".into(), "nightlytest".into(), "alpha".into(), "zeta".into()],
        );
        let names: Vec<_> = l.suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Nightlytest", "alpha", "zeta"]);
        assert_eq!(l.suites[0].path, vec!["nightlytest"]);
        assert_eq!(l.suites[1].path, vec!["simple", "alpha"]);

        let empty = SuiteListing::build(0, Vec::<String>::new());
        assert_eq!(empty.suites.len(), 1);
    }

    #[test]
    fn classify_markers() {
        assert_eq!(
            TestNameKind::classify("a.b.status"),
            (TestNameKind::StatusMarker, "a.b")
        );
        assert_eq!(
            TestNameKind::classify("a.success"),
            (TestNameKind::SuccessMarker, "a")
        );
        assert_eq!(TestNameKind::classify("a.exec"), (TestNameKind::Plain, "a.exec"));
    }

    #[test]
    fn status_markers_win_over_success() {
        let s = SuiteSummary::build(
            "nt",
            1,
            vec![
                rec(1, "nt.foo.exec", &[("opt", "O3")]),
                rec(2, "nt.foo.status", &[("opt", "O3")]),
                rec(3, "nt.bar.success", &[("arch", "x86"), ("opt", "O0")]),
                rec(4, "other.baz", &[]),
            ],
        );
        assert_eq!(s.test_names, vec!["bar", "foo", "foo.exec"]);
        assert_eq!(s.parameter_keys, vec!["arch", "opt"]);
        assert_eq!(s.parameter_sets.len(), 2);
        assert_eq!(
            s.status_markers["foo"],
            StatusMarker {
                marker_name: "foo.status".into(),
                convention: StatusConvention::Status
            }
        );
        assert_eq!(s.status_markers.len(), 3);
        assert_eq!(s.kinds["foo.status"], TestNameKind::StatusMarker);
        assert_eq!(
            s.test_id("foo.exec", &vec![("opt".into(), "O3".into())]),
            Some(1)
        );
        assert_eq!(s.test_map.len(), 3);
    }

    #[test]
    fn success_markers_and_no_markers() {
        let s = SuiteSummary::build("nt", 1, vec![rec(1, "nt.a.success", &[])]);
        assert_eq!(s.status_markers["a"].marker_name, "a.success");
        assert_eq!(s.status_markers["a"].convention, StatusConvention::Success);

        let plain = SuiteSummary::build("nt", 1, vec![rec(1, "nt.a.compile", &[])]);
        assert!(plain.status_markers.is_empty());
        assert_eq!(plain.parameter_sets, vec![Vec::<(String, String)>::new()]);
    }
}
