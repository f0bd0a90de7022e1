//! Bulk ingestion of upstream data (runs, samples, detected field changes).

use crate::errors::{PerfError, Result};
use crate::model::{FieldChangeId, FieldId, RunId, RunOrder};
use crate::storage::queries::{self, NewFieldChange};
use crate::storage::Store;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportDoc {
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub runs: Vec<RunDecl>,
    #[serde(default)]
    pub samples: Vec<SampleDecl>,
    #[serde(default)]
    pub field_changes: Vec<FieldChangeDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(default)]
    pub bigger_is_better: bool,
}

/// A run, referenced elsewhere in the document by `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDecl {
    pub key: String,
    pub machine: String,
    pub tag: String,
    pub run_order: RunOrder,
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRef {
    pub test: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDecl {
    pub run: String,
    #[serde(flatten)]
    pub test: TestRef,
    pub field: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldChangeDecl {
    #[serde(flatten)]
    pub test: TestRef,
    pub field: String,
    pub start_run: String,
    pub end_run: String,
    #[serde(default)]
    pub old_value: Option<f64>,
    pub new_value: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub runs: BTreeMap<String, RunId>,
    pub samples: usize,
    pub field_changes: Vec<FieldChangeId>,
}

impl ImportDoc {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Writes the whole document in one transaction.
    pub fn apply(&self, store: &Store) -> Result<ImportReport> {
        let report = store.transaction(|tx| self.apply_conn(tx))?;
        tracing::info!(
            event = "perfdb.import.applied",
            runs = report.runs.len(),
            samples = report.samples,
            field_changes = report.field_changes.len(),
            "imported {} run(s)", report.runs.len()
        );
        Ok(report)
    }

    fn apply_conn(&self, conn: &Connection) -> Result<ImportReport> {
        let mut fields: HashMap<&str, FieldId> = HashMap::new();
        for f in &self.fields {
            fields.insert(&f.name, queries::ensure_field(conn, &f.name, f.bigger_is_better)?);
        }
        let field = |name: &str| {
            fields
                .get(name)
                .copied()
                .ok_or_else(|| PerfError::InvalidArgument(format!("undeclared field '{}'", name)))
        };

        let mut report = ImportReport::default();
        let started_at = chrono::Utc::now().to_rfc3339();
        for r in &self.runs {
            if report.runs.contains_key(&r.key) {
                return Err(PerfError::InvalidArgument(format!(
                    "duplicate run key '{}'",
                    r.key
                )));
            }
            let machine = queries::ensure_machine(conn, &r.machine)?;
            let run_id = queries::insert_run(conn, machine, &r.tag, &r.run_order, &started_at)?;
            for (k, v) in &r.info {
                queries::insert_run_info(conn, run_id, k, v)?;
            }
            report.runs.insert(r.key.clone(), run_id);
        }
        let runs = report.runs.clone();
        let run = |key: &str| {
            runs.get(key)
                .copied()
                .ok_or_else(|| PerfError::InvalidArgument(format!("unknown run key '{}'", key)))
        };

        for s in &self.samples {
            let test_id = queries::ensure_test(conn, &s.test.test, &s.test.params)?;
            queries::insert_sample(conn, run(&s.run)?, test_id, field(&s.field)?, s.value)?;
            report.samples += 1;
        }

        for fc in &self.field_changes {
            let test_id = queries::ensure_test(conn, &fc.test.test, &fc.test.params)?;
            let id = queries::insert_field_change(
                conn,
                &NewFieldChange {
                    test_id,
                    field_id: field(&fc.field)?,
                    start_run_id: run(&fc.start_run)?,
                    end_run_id: run(&fc.end_run)?,
                    old_value: fc.old_value,
                    new_value: fc.new_value,
                },
            )?;
            report.field_changes.push(id);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    const DOC: &str = r#"{
        "fields": [{"name": "compile_time"}],
        "runs": [
            {"key": "a", "machine": "m1", "tag": "nightlytest", "run_order": 99},
            {"key": "b", "machine": "m1", "tag": "nightlytest", "run_order": "100"}
        ],
        "samples": [
            {"run": "a", "test": "nightlytest.foo", "field": "compile_time", "value": 10.0},
            {"run": "b", "test": "nightlytest.foo", "field": "compile_time", "value": 15.0}
        ],
        "field_changes": [
            {"test": "nightlytest.foo", "field": "compile_time",
             "start_run": "a", "end_run": "b", "new_value": 15.0}
        ]
    }"#;

    #[test]
    fn applies_document() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        let report = ImportDoc::from_json(DOC).unwrap().apply(&store).unwrap();
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.samples, 2);
        assert_eq!(report.field_changes.len(), 1);
        assert_eq!(store.count_rows(EntityKind::Test).unwrap(), 1);

        let fc = store.get_field_change(report.field_changes[0]).unwrap();
        assert_eq!(fc.old_value, None);
        assert_eq!(fc.test_name, "nightlytest.foo");
    }

    #[test]
    fn unknown_references_roll_back() {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        let doc = ImportDoc::from_json(
            r#"{"runs": [{"key": "a", "machine": "m", "tag": "t", "run_order": 1}],
                "samples": [{"run": "zzz", "test": "t.x", "field": "f", "value": 1}]}"#,
        )
        .unwrap();
        assert!(matches!(doc.apply(&store), Err(PerfError::InvalidArgument(_))));
        assert_eq!(store.count_rows(EntityKind::Run).unwrap(), 0);
    }
}
