pub mod key;

use crate::errors::Result;
use crate::model::EntityKind;
use crate::storage::Store;
use crate::summary::{RunOrderIndex, SuiteListing, SuiteSummary};
use key::{cache_key, CacheKey, ALL_SUITES};
use moka::sync::Cache;
use std::sync::Arc;

pub const DEFAULT_CACHE_ENTRIES: u64 = 128;

/// Live generation counter per entity kind.
pub trait RevisionSource {
    fn revision(&self, kind: EntityKind) -> Result<u64>;
}

/// A derived value that is valid exactly as long as one kind's revision
/// counter has not moved.
pub trait RevisionGated: Send + Sync + 'static {
    const DEPENDS_ON: EntityKind;

    fn snapshot_revision(&self) -> u64;
}

impl RevisionGated for SuiteListing {
    const DEPENDS_ON: EntityKind = EntityKind::Run;

    fn snapshot_revision(&self) -> u64 {
        self.revision
    }
}

impl RevisionGated for SuiteSummary {
    const DEPENDS_ON: EntityKind = EntityKind::Test;

    fn snapshot_revision(&self) -> u64 {
        self.revision
    }
}

impl RevisionGated for RunOrderIndex {
    const DEPENDS_ON: EntityKind = EntityKind::RunInfo;

    fn snapshot_revision(&self) -> u64 {
        self.revision()
    }
}

/// Keyed store of revision-gated values.
///
/// Entries are immutable `Arc`s replaced wholesale, so a reader sees either the
/// previous or the new value and never a partial build. Two callers missing on
/// the same key may both rebuild; the last insert wins and both results are
/// fresh.
pub struct RevisionCache<V: RevisionGated> {
    name: &'static str,
    entries: Cache<CacheKey, Arc<V>>,
}

impl<V: RevisionGated> RevisionCache<V> {
    pub fn new(name: &'static str, max_entries: u64) -> Self {
        Self {
            name,
            entries: Cache::new(max_entries),
        }
    }

    /// Returns the cached value for `key` if its snapshot matches the live
    /// revision, otherwise builds a new one with `build(live_revision)`.
    ///
    /// The live revision is read before `build` queries the store: a write
    /// racing with the build leaves the entry stamped older than its content,
    /// which only costs one extra rebuild later.
    pub fn get_or_rebuild<S, F>(&self, source: &S, key: CacheKey, build: F) -> Result<Arc<V>>
    where
        S: RevisionSource + ?Sized,
        F: FnOnce(u64) -> Result<V>,
    {
        let live = source.revision(V::DEPENDS_ON)?;
        if let Some(entry) = self.entries.get(&key) {
            if entry.snapshot_revision() == live {
                tracing::trace!(
                    event = "perfdb.cache.hit",
                    cache = self.name,
                    scope = %key.scope,
                    revision = live
                );
                return Ok(entry);
            }
            tracing::debug!(
                event = "perfdb.cache.stale",
                cache = self.name,
                scope = %key.scope,
                cached = entry.snapshot_revision(),
                live,
                "rebuilding stale {} entry", self.name
            );
        }

        let built = Arc::new(build(live)?);
        self.entries.insert(key, Arc::clone(&built));
        Ok(built)
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}

/// The summaries a presentation layer asks for, keyed by database identity.
///
/// Meant to be created once and shared (e.g. in an `Arc`) by every request
/// handler of a process.
pub struct SummaryCache {
    suites: RevisionCache<SuiteListing>,
    suite_summaries: RevisionCache<SuiteSummary>,
    run_orders: RevisionCache<RunOrderIndex>,
}

impl Default for SummaryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl SummaryCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            suites: RevisionCache::new("suites", max_entries),
            suite_summaries: RevisionCache::new("suite_summary", max_entries),
            run_orders: RevisionCache::new("run_order", max_entries),
        }
    }

    pub fn list_suites(&self, store: &Store) -> Result<Arc<SuiteListing>> {
        let key = cache_key(store.identity(), ALL_SUITES);
        self.suites
            .get_or_rebuild(store, key, |rev| SuiteListing::from_store(store, rev))
    }

    pub fn suite_summary(&self, store: &Store, tag: &str) -> Result<Arc<SuiteSummary>> {
        let key = cache_key(store.identity(), tag);
        self.suite_summaries
            .get_or_rebuild(store, key, |rev| SuiteSummary::from_store(store, tag, rev))
    }

    pub fn run_order_index(&self, store: &Store, tag: &str) -> Result<Arc<RunOrderIndex>> {
        let key = cache_key(store.identity(), tag);
        self.run_orders
            .get_or_rebuild(store, key, |rev| RunOrderIndex::from_store(store, tag, rev))
    }

    pub fn clear(&self) {
        self.suites.invalidate_all();
        self.suite_summaries.invalidate_all();
        self.run_orders.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.suites.entry_count() + self.suite_summaries.entry_count() + self.run_orders.entry_count()
    }
}
