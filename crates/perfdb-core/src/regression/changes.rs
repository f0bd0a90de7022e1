use crate::cache::SummaryCache;
use crate::compare::{compare, Comparison};
use crate::errors::{PerfError, Result};
use crate::model::{FieldChange, Run, RunId};
use crate::storage::Store;
use serde::Serialize;

/// A field change together with everything a triage view shows for it.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeData {
    pub field_change: FieldChange,
    /// `None` when the change cannot be expressed as a percentage (zero
    /// baseline) or its samples are missing.
    pub comparison: Option<Comparison>,
    /// First run that exhibits the change.
    pub key_run: Run,
    /// The change's baseline against the newest value on the same machine.
    pub current: Option<Comparison>,
    pub current_run_id: Option<RunId>,
}

/// Raw (old, new) values of a field change: the precomputed pair when
/// present, otherwise the samples of its start and end runs.
pub fn change_values(store: &Store, fc: &FieldChange) -> Result<Option<(f64, f64)>> {
    let Some(old) = baseline_value(store, fc)? else {
        return Ok(None);
    };
    let new = match fc.old_value {
        Some(_) => Some(fc.new_value),
        None => store.sample_value(fc.end_run_id, fc.test_id, fc.field_id)?,
    };
    Ok(new.map(|new| (old, new)))
}

pub fn change_comparison(store: &Store, fc: &FieldChange) -> Result<Option<Comparison>> {
    match change_values(store, fc)? {
        Some((old, new)) => compare(old, new, fc.bigger_is_better).map(Some),
        None => Ok(None),
    }
}

/// Compares the change's baseline with the most recent sample of the same
/// test and field on the machine that produced the change.
pub fn current_comparison(
    store: &Store,
    cache: &SummaryCache,
    fc: &FieldChange,
) -> Result<Option<(RunId, Comparison)>> {
    let Some(old) = baseline_value(store, fc)? else {
        return Ok(None);
    };
    let end_run = store.get_run(fc.end_run_id)?;
    let index = cache.run_order_index(store, &end_run.tag)?;

    let mut candidates: Vec<RunId> = index
        .runs_in_order()
        .iter()
        .copied()
        .filter(|r| index.machine_of(*r) == Some(end_run.machine_id))
        .collect();
    if candidates.is_empty() {
        candidates.push(end_run.id);
    }

    for run_id in candidates {
        if let Some(value) = store.sample_value(run_id, fc.test_id, fc.field_id)? {
            return compare(old, value, fc.bigger_is_better).map(|c| Some((run_id, c)));
        }
    }
    Ok(None)
}

fn baseline_value(store: &Store, fc: &FieldChange) -> Result<Option<f64>> {
    match fc.old_value {
        Some(v) => Ok(Some(v)),
        None => store.sample_value(fc.start_run_id, fc.test_id, fc.field_id),
    }
}

/// Downgrades an undefined comparison to `None`, logging it, and lets every
/// other failure through.
pub(crate) fn defined<T>(res: Result<Option<T>>, fc: &FieldChange) -> Result<Option<T>> {
    match res {
        Err(PerfError::ArithmeticUndefined { old, new }) => {
            tracing::warn!(
                event = "perfdb.compare.undefined",
                field_change = fc.id,
                old,
                new,
                "field change {} has a zero baseline", fc.id
            );
            Ok(None)
        }
        other => other,
    }
}

pub fn change_data(store: &Store, cache: &SummaryCache, fc: FieldChange) -> Result<ChangeData> {
    let comparison = defined(change_comparison(store, &fc), &fc)?;
    let current = defined(current_comparison(store, cache, &fc), &fc)?;
    let key_run = store.get_run(fc.end_run_id)?;
    let (current_run_id, current) = match current {
        Some((run_id, c)) => (Some(run_id), Some(c)),
        None => (None, None),
    };
    Ok(ChangeData {
        field_change: fc,
        comparison,
        key_run,
        current,
        current_run_id,
    })
}
