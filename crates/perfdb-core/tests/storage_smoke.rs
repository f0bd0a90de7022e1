use perfdb_core::cache::RevisionSource;
use perfdb_core::model::{EntityKind, RunOrder};
use perfdb_core::storage::queries::{self, NewFieldChange};
use perfdb_core::storage::Store;
use perfdb_core::PerfError;
use std::collections::BTreeMap;
use tempfile::tempdir;

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("perf.db");

    let store = Store::open(&db_path)?;
    store.init_schema()?;

    let m1 = store.ensure_machine("m1")?;
    assert_eq!(store.ensure_machine("m1")?, m1);

    let r1 = store.insert_run(m1, "nightlytest", 99_i64)?;
    let r2 = store.insert_run(m1, "nightlytest", "r100-rc1")?;
    let t = store.ensure_test("nightlytest.foo", &BTreeMap::new())?;
    let f = store.ensure_field("compile_time", false)?;
    store.insert_sample(r1, t, f, 10.0)?;
    store.insert_sample(r2, t, f, 15.0)?;
    store.insert_sample(r2, t, f, 14.0)?;
    let fc = store.insert_field_change(&NewFieldChange {
        test_id: t,
        field_id: f,
        start_run_id: r1,
        end_run_id: r2,
        old_value: Some(10.0),
        new_value: 15.0,
    })?;
    drop(store);

    // Everything survives a reopen.
    let store = Store::open(&db_path)?;
    let run = store.get_run(r2)?;
    assert_eq!(run.tag, "nightlytest");
    assert_eq!(run.run_order, RunOrder::Text("r100-rc1".into()));
    assert_eq!(store.get_run(r1)?.run_order, RunOrder::Numeric(99));
    assert_eq!(store.sample_value(r2, t, f)?, Some(14.0));

    let change = store.get_field_change(fc)?;
    assert_eq!(change.field_name, "compile_time");
    assert!(!change.bigger_is_better);

    let stats = store.stats()?;
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.field_changes, 1);
    assert_eq!(stats.untriaged_upper_bound, 1);
    Ok(())
}

#[test]
fn test_missing_rows_are_not_found() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    match store.get_run(42) {
        Err(PerfError::NotFound { kind, id }) => {
            assert_eq!(kind, EntityKind::Run);
            assert_eq!(id, 42);
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert!(matches!(
        store.get_regression(7),
        Err(PerfError::NotFound { kind: EntityKind::Regression, .. })
    ));
    Ok(())
}

#[test]
fn test_failed_transaction_keeps_revisions() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let m = store.ensure_machine("m1")?;
    store.insert_run(m, "suite", 1_i64)?;
    let before = store.revision(EntityKind::Run)?;

    let res: perfdb_core::Result<()> = store.transaction(|tx| {
        queries::insert_run(tx, m, "suite", &RunOrder::Numeric(2), "2024-01-01T00:00:00Z")?;
        Err(PerfError::InvalidArgument("abort".into()))
    });
    assert!(res.is_err());
    assert_eq!(store.revision(EntityKind::Run)?, before);
    assert_eq!(store.count_rows(EntityKind::Run)?, 1);
    Ok(())
}
