use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static MEMORY_DBS: AtomicU64 = AtomicU64::new(0);

/// Identity of one performance database, stable for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseId {
    label: String,
    fingerprint: String,
}

impl DatabaseId {
    pub fn from_path(path: &Path) -> Self {
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let label = canonical.to_string_lossy().into_owned();
        Self::from_label(label)
    }

    /// A fresh identity for an in-memory database; never equal to another.
    pub fn unique_memory() -> Self {
        let n = MEMORY_DBS.fetch_add(1, Ordering::Relaxed);
        Self::from_label(format!("memory:{}", n))
    }

    fn from_label(label: String) -> Self {
        let mut h = Sha256::new();
        h.update(label.as_bytes());
        let digest = hex::encode(h.finalize());
        Self {
            label,
            fingerprint: digest[..16].to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Key of one cached summary: database fingerprint plus a summary-specific
/// scope (a suite tag, or `*` for database-wide summaries).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub db: String,
    pub scope: String,
}

pub const ALL_SUITES: &str = "*";

pub fn cache_key(db: &DatabaseId, scope: &str) -> CacheKey {
    CacheKey {
        db: db.fingerprint().to_string(),
        scope: scope.to_string(),
    }
}
