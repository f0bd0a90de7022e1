use perfdb_core::storage::Store;
use perfdb_core::SummaryCache;
use std::collections::BTreeMap;
use std::sync::Arc;

fn store() -> anyhow::Result<Store> {
    let store = Store::memory()?;
    store.init_schema()?;
    Ok(store)
}

#[test]
fn test_suite_listing_tracks_new_tags() -> anyhow::Result<()> {
    let store = store()?;
    let cache = SummaryCache::default();
    let m = store.ensure_machine("m1")?;
    store.insert_run(m, "nightlytest", 1_i64)?;

    let first = cache.list_suites(&store)?;
    assert_eq!(first.suites.len(), 1);
    assert_eq!(first.suites[0].path, vec!["nightlytest".to_string()]);

    // No writes: the cached Arc is handed back.
    let again = cache.list_suites(&store)?;
    assert!(Arc::ptr_eq(&first, &again));

    store.insert_run(m, "compile", 1_i64)?;
    let fresh = cache.list_suites(&store)?;
    assert!(!Arc::ptr_eq(&first, &fresh));
    let names: Vec<&str> = fresh.suites.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"compile"));
    assert!(names.contains(&"Nightlytest"));
    Ok(())
}

#[test]
fn test_summary_ignores_unrelated_writes() -> anyhow::Result<()> {
    let store = store()?;
    let cache = SummaryCache::default();
    store.ensure_test("nightlytest.foo", &BTreeMap::new())?;

    let summary = cache.suite_summary(&store, "nightlytest")?;
    assert_eq!(summary.test_names, vec!["foo".to_string()]);

    // A run does not touch the test table's revision.
    let m = store.ensure_machine("m1")?;
    store.insert_run(m, "nightlytest", 5_i64)?;
    assert!(Arc::ptr_eq(&summary, &cache.suite_summary(&store, "nightlytest")?));

    let mut params = BTreeMap::new();
    params.insert("opt".to_string(), "O3".to_string());
    store.ensure_test("nightlytest.bar", &params)?;
    let fresh = cache.suite_summary(&store, "nightlytest")?;
    assert_eq!(fresh.test_names, vec!["bar".to_string(), "foo".to_string()]);
    assert_eq!(fresh.parameter_keys, vec!["opt".to_string()]);
    Ok(())
}

#[test]
fn test_databases_do_not_share_entries() -> anyhow::Result<()> {
    let a = store()?;
    let b = store()?;
    let cache = SummaryCache::default();

    let m = a.ensure_machine("m1")?;
    a.insert_run(m, "only-in-a", 1_i64)?;

    // Both list the synthetic Nightlytest suite; only `a` has the extra tag.
    assert_eq!(cache.list_suites(&a)?.suites.len(), 2);
    assert_eq!(cache.list_suites(&b)?.suites.len(), 1);
    Ok(())
}

#[test]
fn test_run_order_index_sees_new_runs() -> anyhow::Result<()> {
    let store = store()?;
    let cache = SummaryCache::default();
    let m = store.ensure_machine("m1")?;
    let r1 = store.insert_run(m, "nightlytest", 1_i64)?;

    let index = cache.run_order_index(&store, "nightlytest")?;
    assert_eq!(index.runs_in_order(), &[r1]);

    let r2 = store.insert_run(m, "nightlytest", 2_i64)?;
    let index = cache.run_order_index(&store, "nightlytest")?;
    assert_eq!(index.runs_in_order(), &[r2, r1]);

    cache.clear();
    let rebuilt = cache.run_order_index(&store, "nightlytest")?;
    assert!(!Arc::ptr_eq(&index, &rebuilt));
    assert_eq!(rebuilt.runs_in_order(), &[r2, r1]);
    Ok(())
}
