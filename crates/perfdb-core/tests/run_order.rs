use perfdb_core::model::RunOrder;
use perfdb_core::storage::Store;
use perfdb_core::{PerfError, SummaryCache};

#[test]
fn test_numeric_orders_sort_before_text() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let m = store.ensure_machine("m1")?;
    let r99 = store.insert_run(m, "nightlytest", "99")?;
    let r100 = store.insert_run(m, "nightlytest", "100")?;
    let rc = store.insert_run(m, "nightlytest", "release-candidate")?;

    let cache = SummaryCache::default();
    let index = cache.run_order_index(&store, "nightlytest")?;
    assert_eq!(index.runs_in_order(), &[rc, r100, r99]);
    assert_eq!(
        index.run_orders(),
        &[
            RunOrder::Text("release-candidate".into()),
            RunOrder::Numeric(100),
            RunOrder::Numeric(99),
        ]
    );
    Ok(())
}

#[test]
fn test_machine_neighbours_are_inverse() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let m1 = store.ensure_machine("m1")?;
    let m2 = store.ensure_machine("m2")?;

    let a = store.insert_run(m1, "nightlytest", 1_i64)?;
    let other = store.insert_run(m2, "nightlytest", 2_i64)?;
    let b = store.insert_run(m1, "nightlytest", 3_i64)?;
    store.insert_run(m1, "compile", 4_i64)?;

    let cache = SummaryCache::default();
    let index = cache.run_order_index(&store, "nightlytest")?;
    assert_eq!(index.runs_in_order().len(), 3);

    assert_eq!(index.previous_on_machine(b)?, Some(a));
    assert_eq!(index.next_on_machine(a)?, Some(b));
    assert_eq!(index.previous_on_machine(a)?, None);
    assert_eq!(index.previous_on_machine(other)?, None);
    assert_eq!(index.latest_on_machine(m1), Some(b));
    assert_eq!(index.machine_of(other), Some(m2));

    assert!(matches!(
        index.previous_on_machine(9_999),
        Err(PerfError::NotFound { .. })
    ));
    Ok(())
}

#[test]
fn test_shared_order_keeps_enumeration_order() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let m1 = store.ensure_machine("m1")?;
    let m2 = store.ensure_machine("m2")?;
    let first = store.insert_run(m1, "nightlytest", 7_i64)?;
    let second = store.insert_run(m2, "nightlytest", 7_i64)?;

    let cache = SummaryCache::default();
    let index = cache.run_order_index(&store, "nightlytest")?;
    assert_eq!(index.runs_with_order(&RunOrder::Numeric(7)), &[first, second]);
    assert_eq!(index.position_of(second)?, 1);
    Ok(())
}
