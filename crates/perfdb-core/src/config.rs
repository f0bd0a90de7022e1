use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_UNTRIAGED_LIMIT: u32 = 500;
pub const DEFAULT_TITLE_MAX_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfdbConfig {
    #[serde(default = "default_version", rename = "configVersion", alias = "version")]
    pub version: u32,
    #[serde(default = "default_db")]
    pub db: PathBuf,
    /// Upper bound on field changes returned by one untriaged listing.
    #[serde(default = "default_untriaged_limit")]
    pub untriaged_limit: u32,
    #[serde(default = "default_cache_entries")]
    pub cache_entries: u64,
    #[serde(default = "default_title_max_len")]
    pub title_max_len: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

fn default_db() -> PathBuf {
    PathBuf::from(".perfdb/perf.db")
}

fn default_untriaged_limit() -> u32 {
    DEFAULT_UNTRIAGED_LIMIT
}

fn default_cache_entries() -> u64 {
    crate::cache::DEFAULT_CACHE_ENTRIES
}

fn default_title_max_len() -> usize {
    DEFAULT_TITLE_MAX_LEN
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PerfdbConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            db: default_db(),
            untriaged_limit: default_untriaged_limit(),
            cache_entries: default_cache_entries(),
            title_max_len: default_title_max_len(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl PerfdbConfig {
    /// Applies `PERFDB_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PERFDB_DB") {
            self.db = PathBuf::from(v);
        }
        if let Some(v) = lookup("PERFDB_UNTRIAGED_LIMIT") {
            if let Ok(n) = v.parse() {
                self.untriaged_limit = n;
            }
        }
        if let Some(v) = lookup("PERFDB_CACHE_ENTRIES") {
            if let Ok(n) = v.parse() {
                self.cache_entries = n;
            }
        }
        if let Some(v) = lookup("PERFDB_LOG") {
            self.log_level = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.untriaged_limit == 0 {
            return Err(ConfigError("untriaged_limit must be at least 1".into()));
        }
        if self.cache_entries == 0 {
            return Err(ConfigError("cache_entries must be at least 1".into()));
        }
        if self.title_max_len < 16 {
            return Err(ConfigError(format!(
                "title_max_len {} is too small (minimum 16)",
                self.title_max_len
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<PerfdbConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    let mut cfg: PerfdbConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored_keys.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let meaningful_unknowns: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful_unknowns.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?} (file: {})",
                meaningful_unknowns,
                path.display()
            )));
        }
        tracing::warn!(
            event = "perfdb.config.unknown_fields",
            fields = ?meaningful_unknowns,
            file = %path.display(),
            "ignored unknown config fields"
        );
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    if cfg.db.is_relative() {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            cfg.db = dir.join(&cfg.db);
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"configVersion: 1
db: .perfdb/perf.db
untriaged_limit: 500
cache_entries: 128
title_max_len: 120
log_level: info
log_json: false
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn overrides_apply_and_ignore_garbage() {
        let mut cfg = PerfdbConfig::default();
        let env: HashMap<&str, &str> = [
            ("PERFDB_DB", "/tmp/x.db"),
            ("PERFDB_UNTRIAGED_LIMIT", "50"),
            ("PERFDB_CACHE_ENTRIES", "not-a-number"),
            ("PERFDB_LOG", "debug"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.db, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.untriaged_limit, 50);
        assert_eq!(cfg.cache_entries, crate::cache::DEFAULT_CACHE_ENTRIES);
        assert_eq!(cfg.log_level, "debug");
    }
}
