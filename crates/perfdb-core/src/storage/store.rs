use super::queries::{self, NewFieldChange};
use crate::cache::key::DatabaseId;
use crate::cache::RevisionSource;
use crate::errors::Result;
use crate::model::{
    EntityKind, FieldChange, FieldChangeId, FieldId, MachineId, Regression, RegressionId, Run,
    RunId, RunOrder, TestId,
};
use rusqlite::{Connection, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
    identity: DatabaseId,
}

pub struct StoreStats {
    pub runs: u64,
    pub tests: u64,
    pub field_changes: u64,
    pub regressions: u64,
    pub untriaged_upper_bound: u64,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            identity: DatabaseId::from_path(path),
        })
    }

    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            identity: DatabaseId::unique_memory(),
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(crate::storage::schema::DDL)?;
        conn.execute_batch(&crate::storage::schema::revision_ddl())?;
        Ok(())
    }

    pub fn identity(&self) -> &DatabaseId {
        &self.identity
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite itself consistent; keep serving.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` against the connection outside of an explicit transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs `f` inside one transaction. Any error rolls every write back.
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // --- ingestion ---

    pub fn ensure_machine(&self, name: &str) -> Result<MachineId> {
        self.read(|c| queries::ensure_machine(c, name))
    }

    pub fn insert_run(
        &self,
        machine_id: MachineId,
        tag: &str,
        run_order: impl Into<RunOrder>,
    ) -> Result<RunId> {
        let order = run_order.into();
        let started_at = chrono::Utc::now().to_rfc3339();
        self.transaction(|tx| queries::insert_run(tx, machine_id, tag, &order, &started_at))
    }

    pub fn ensure_test(&self, name: &str, params: &BTreeMap<String, String>) -> Result<TestId> {
        self.transaction(|tx| queries::ensure_test(tx, name, params))
    }

    pub fn ensure_field(&self, name: &str, bigger_is_better: bool) -> Result<FieldId> {
        self.read(|c| queries::ensure_field(c, name, bigger_is_better))
    }

    pub fn insert_sample(
        &self,
        run_id: RunId,
        test_id: TestId,
        field_id: FieldId,
        value: f64,
    ) -> Result<()> {
        self.read(|c| queries::insert_sample(c, run_id, test_id, field_id, value))
    }

    pub fn insert_field_change(&self, fc: &NewFieldChange) -> Result<FieldChangeId> {
        self.read(|c| queries::insert_field_change(c, fc))
    }

    // --- reads ---

    pub fn get_run(&self, run_id: RunId) -> Result<Run> {
        self.read(|c| queries::get_run(c, run_id))
    }

    pub fn get_field_change(&self, id: FieldChangeId) -> Result<FieldChange> {
        self.read(|c| queries::get_field_change(c, id))
    }

    pub fn get_regression(&self, id: RegressionId) -> Result<Regression> {
        self.read(|c| queries::get_regression(c, id))
    }

    pub fn sample_value(&self, run_id: RunId, test_id: TestId, field_id: FieldId) -> Result<Option<f64>> {
        self.read(|c| queries::sample_value(c, run_id, test_id, field_id))
    }

    pub fn count_rows(&self, kind: EntityKind) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let n: i64 = self.read(|c| Ok(c.query_row(&sql, [], |r| r.get(0))?))?;
        Ok(n as u64)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let field_changes = self.count_rows(EntityKind::FieldChange)?;
        let triaged = self.count_rows(EntityKind::ChangeIgnore)?
            + self.count_rows(EntityKind::RegressionIndicator)?;
        Ok(StoreStats {
            runs: self.count_rows(EntityKind::Run)?,
            tests: self.count_rows(EntityKind::Test)?,
            field_changes,
            regressions: self.count_rows(EntityKind::Regression)?,
            untriaged_upper_bound: field_changes.saturating_sub(triaged),
        })
    }
}

impl RevisionSource for Store {
    fn revision(&self, kind: EntityKind) -> Result<u64> {
        self.read(|c| queries::revision(c, kind))
    }
}
