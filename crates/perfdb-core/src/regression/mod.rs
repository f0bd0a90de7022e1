//! Regression lifecycle: turning untriaged field changes into regressions and
//! keeping every field change linked to at most one of them.
//!
//! Each mutating operation runs in a single transaction, so a failure part way
//! through a merge or split leaves nothing behind.

pub mod changes;
pub mod title;

use crate::cache::SummaryCache;
use crate::compare::{aggregate_values, Comparison};
use crate::config::{PerfdbConfig, DEFAULT_TITLE_MAX_LEN, DEFAULT_UNTRIAGED_LIMIT};
use crate::errors::{PerfError, Result};
use crate::model::{FieldChangeId, Regression, RegressionId, RegressionState};
use crate::storage::{queries, Store};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

pub use changes::ChangeData;

/// Partial update applied by [`Triage::edit_regression`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegressionEdit {
    pub title: Option<String>,
    pub bug: Option<String>,
    pub state: Option<RegressionState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionOverview {
    pub regression: Regression,
    pub size: usize,
    /// Net effect of all member changes; `None` when not computable.
    pub impact: Option<Comparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegressionDetail {
    pub regression: Regression,
    pub changes: Vec<ChangeData>,
}

pub struct Triage<'a> {
    store: &'a Store,
    cache: &'a SummaryCache,
    untriaged_limit: u32,
    title_max_len: usize,
}

impl<'a> Triage<'a> {
    pub fn new(store: &'a Store, cache: &'a SummaryCache) -> Self {
        Self {
            store,
            cache,
            untriaged_limit: DEFAULT_UNTRIAGED_LIMIT,
            title_max_len: DEFAULT_TITLE_MAX_LEN,
        }
    }

    pub fn with_config(mut self, cfg: &PerfdbConfig) -> Self {
        self.untriaged_limit = cfg.untriaged_limit;
        self.title_max_len = cfg.title_max_len;
        self
    }

    // --- discovery ---

    /// Field changes with no ignore marker and no regression, newest first.
    ///
    /// The page is capped (default 500) so very long histories stay cheap;
    /// older untriaged changes surface once newer ones are triaged.
    pub fn list_untriaged(&self, limit: Option<u32>) -> Result<Vec<ChangeData>> {
        let limit = limit.unwrap_or(self.untriaged_limit);
        let fcs = self
            .store
            .read(|c| queries::untriaged_field_changes(c, limit))?;
        fcs.into_iter()
            .map(|fc| changes::change_data(self.store, self.cache, fc))
            .collect()
    }

    /// Regressions newest first; `None` lists every state.
    pub fn list_regressions(&self, state: Option<RegressionState>) -> Result<Vec<RegressionOverview>> {
        let regressions = self.store.read(|c| queries::list_regressions(c, state))?;
        let mut out = Vec::with_capacity(regressions.len());
        for regression in regressions {
            let fcs = self.field_changes_of(regression.id)?;
            let mut values = Vec::with_capacity(fcs.len());
            for fc in &fcs {
                if let Some((old, new)) = changes::change_values(self.store, fc)? {
                    values.push((old, new, fc.bigger_is_better));
                }
            }
            let impact = match aggregate_values(&values) {
                Ok(c) => Some(c),
                Err(PerfError::ArithmeticUndefined { .. }) => {
                    tracing::warn!(
                        event = "perfdb.compare.undefined",
                        regression = regression.id,
                        "regression {} has a zero summed baseline", regression.id
                    );
                    None
                }
                Err(e) => return Err(e),
            };
            out.push(RegressionOverview {
                regression,
                size: fcs.len(),
                impact,
            });
        }
        Ok(out)
    }

    pub fn get_regression(&self, id: RegressionId) -> Result<Regression> {
        self.store.get_regression(id)
    }

    pub fn regression_detail(&self, id: RegressionId) -> Result<RegressionDetail> {
        let regression = self.store.get_regression(id)?;
        let changes = self
            .field_changes_of(id)?
            .into_iter()
            .map(|fc| changes::change_data(self.store, self.cache, fc))
            .collect::<Result<Vec<_>>>()?;
        Ok(RegressionDetail { regression, changes })
    }

    /// Field change ids linked to the regression, in link order.
    pub fn indicators_of(&self, id: RegressionId) -> Result<Vec<FieldChangeId>> {
        self.store.read(|c| {
            queries::get_regression(c, id)?;
            Ok(queries::indicators_for(c, id)?
                .into_iter()
                .map(|i| i.field_change_id)
                .collect())
        })
    }

    fn field_changes_of(&self, id: RegressionId) -> Result<Vec<crate::model::FieldChange>> {
        self.store.read(|c| {
            queries::indicators_for(c, id)?
                .into_iter()
                .map(|i| queries::get_field_change(c, i.field_change_id))
                .collect()
        })
    }

    // --- lifecycle ---

    pub fn create_regression(&self, field_changes: &[FieldChangeId]) -> Result<Regression> {
        let ids = dedup_nonempty(field_changes, "field change")?;
        let max_len = self.title_max_len;
        let regression = self.store.transaction(|tx| {
            for id in &ids {
                ensure_untriaged(tx, *id)?;
            }
            new_regression(tx, &ids, RegressionState::default(), max_len)
        })?;
        tracing::info!(
            event = "perfdb.regression.created",
            regression = regression.id,
            changes = ids.len(),
            "created {}", regression.title
        );
        Ok(regression)
    }

    pub fn ignore_changes(&self, field_changes: &[FieldChangeId]) -> Result<()> {
        let ids = dedup_nonempty(field_changes, "field change")?;
        self.store.transaction(|tx| {
            for id in &ids {
                ensure_untriaged(tx, *id)?;
                queries::insert_ignore(tx, *id)?;
            }
            Ok(())
        })?;
        tracing::info!(
            event = "perfdb.changes.ignored",
            changes = ?ids,
            "ignoring {} change(s)", ids.len()
        );
        Ok(())
    }

    /// Replaces the selected regressions with one that owns all of their
    /// field changes and takes the first selected regression's state.
    pub fn merge_regressions(&self, regressions: &[RegressionId]) -> Result<Regression> {
        let ids = dedup_nonempty(regressions, "regression")?;
        if ids.len() < 2 {
            return Err(PerfError::InvalidArgument(
                "merging needs at least two distinct regressions".into(),
            ));
        }
        let max_len = self.title_max_len;
        let merged = self.store.transaction(|tx| {
            let mut sources = Vec::with_capacity(ids.len());
            for id in &ids {
                sources.push(queries::get_regression(tx, *id)?);
            }

            let mut fc_ids = Vec::new();
            for src in &sources {
                fc_ids.extend(
                    queries::indicators_for(tx, src.id)?
                        .into_iter()
                        .map(|i| i.field_change_id),
                );
            }
            if fc_ids.is_empty() {
                return Err(PerfError::InvalidArgument(
                    "selected regressions have no field changes".into(),
                ));
            }

            // Old links go first; a field change may only have one.
            for src in &sources {
                queries::delete_indicators_for(tx, src.id)?;
                queries::delete_regression(tx, src.id)?;
            }
            new_regression(tx, &fc_ids, sources[0].state, max_len)
        })?;
        tracing::info!(
            event = "perfdb.regression.merged",
            regression = merged.id,
            sources = ?ids,
            "merged into {}", merged.title
        );
        Ok(merged)
    }

    /// Moves `field_changes` out of regression `id` into a new regression in
    /// the same state. Moving every change leaves the source empty.
    pub fn split_regression(
        &self,
        id: RegressionId,
        field_changes: &[FieldChangeId],
    ) -> Result<Regression> {
        let ids = dedup_nonempty(field_changes, "field change")?;
        let max_len = self.title_max_len;
        let split = self.store.transaction(|tx| {
            let mut source = queries::get_regression(tx, id)?;
            let indicators = queries::indicators_for(tx, id)?;

            let mut moving = Vec::with_capacity(ids.len());
            for fc in &ids {
                match indicators.iter().find(|i| i.field_change_id == *fc) {
                    Some(ind) => moving.push(ind.id),
                    None => {
                        queries::get_field_change(tx, *fc)?;
                        return Err(PerfError::Inconsistent(format!(
                            "field change {} is not part of regression {}",
                            fc, id
                        )));
                    }
                }
            }

            for ind in moving {
                queries::delete_indicator(tx, ind)?;
            }
            let created = new_regression(tx, &ids, source.state, max_len)?;
            title::rebuild_title(tx, &mut source, max_len)?;
            Ok(created)
        })?;
        tracing::info!(
            event = "perfdb.regression.split",
            source = id,
            regression = split.id,
            changes = ids.len(),
            "split {}", split.title
        );
        Ok(split)
    }

    pub fn edit_regression(&self, id: RegressionId, edit: RegressionEdit) -> Result<Regression> {
        if let Some(t) = &edit.title {
            if t.trim().is_empty() {
                return Err(PerfError::InvalidArgument("title must not be empty".into()));
            }
        }
        let updated = self.store.transaction(|tx| {
            let mut r = queries::get_regression(tx, id)?;
            if let Some(t) = edit.title {
                r.title = t;
            }
            if let Some(b) = edit.bug {
                r.bug = b;
            }
            if let Some(s) = edit.state {
                r.state = s;
            }
            queries::update_regression(tx, &r)?;
            Ok(r)
        })?;
        tracing::info!(
            event = "perfdb.regression.updated",
            regression = updated.id,
            state = %updated.state,
            "updated {}", updated.title
        );
        Ok(updated)
    }

    /// Deletes the regression and its links. Its field changes become
    /// untriaged again unless they were ignored.
    pub fn delete_regression(&self, id: RegressionId) -> Result<()> {
        let (title, unlinked) = self.store.transaction(|tx| {
            let r = queries::get_regression(tx, id)?;
            let n = queries::delete_indicators_for(tx, id)?;
            queries::delete_regression(tx, id)?;
            Ok((r.title, n))
        })?;
        tracing::info!(
            event = "perfdb.regression.deleted",
            regression = id,
            unlinked,
            "deleted {}", title
        );
        Ok(())
    }
}

/// Collapses duplicates, keeping first-seen order.
fn dedup_nonempty(ids: &[i64], what: &str) -> Result<Vec<i64>> {
    let mut seen = HashSet::new();
    let out: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if out.is_empty() {
        return Err(PerfError::InvalidArgument(format!(
            "at least one {} is required",
            what
        )));
    }
    Ok(out)
}

fn ensure_untriaged(conn: &Connection, id: FieldChangeId) -> Result<()> {
    queries::get_field_change(conn, id)?;
    if let Some(ind) = queries::indicator_for_change(conn, id)? {
        return Err(PerfError::Inconsistent(format!(
            "field change {} already belongs to regression {}",
            id, ind.regression_id
        )));
    }
    if queries::ignore_for_change(conn, id)?.is_some() {
        return Err(PerfError::Inconsistent(format!(
            "field change {} is ignored",
            id
        )));
    }
    Ok(())
}

fn new_regression(
    conn: &Connection,
    field_changes: &[FieldChangeId],
    state: RegressionState,
    max_len: usize,
) -> Result<Regression> {
    let mut regression = queries::insert_regression(conn, title::PLACEHOLDER_TITLE, "", state)?;
    for fc in field_changes {
        queries::insert_indicator(conn, regression.id, *fc)?;
    }
    title::rebuild_title(conn, &mut regression, max_len)?;
    Ok(regression)
}
