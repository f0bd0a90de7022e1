use super::args::*;
use anyhow::Context;
use perfdb_core::config::{load_config, PerfdbConfig};
use perfdb_core::{Store, SummaryCache, Triage};
use serde::Serialize;
use std::path::Path;

pub mod import;
pub mod suites;
pub mod triage;

pub mod exit_codes {
    use perfdb_core::PerfError;

    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const INVALID_ARGUMENT: i32 = 4;
    pub const INCONSISTENT: i32 = 5;
    /// Reserved. Listings report a zero baseline as a missing comparison, so
    /// no current command fails with it.
    pub const ARITHMETIC_UNDEFINED: i32 = 6;

    /// Exit code for a failed command. Anything that is not a core error
    /// (I/O, config, storage) is reported as a config error.
    pub fn for_error(err: &anyhow::Error) -> i32 {
        match err.downcast_ref::<PerfError>() {
            Some(PerfError::NotFound { .. }) => NOT_FOUND,
            Some(PerfError::InvalidArgument(_)) => INVALID_ARGUMENT,
            Some(PerfError::Inconsistent(_)) => INCONSISTENT,
            Some(PerfError::ArithmeticUndefined { .. }) => ARITHMETIC_UNDEFINED,
            _ => CONFIG_ERROR,
        }
    }
}

/// Everything a command needs: resolved config, an open store and the
/// process-wide summary cache.
pub struct Env {
    pub cfg: PerfdbConfig,
    pub store: Store,
    pub cache: SummaryCache,
}

impl Env {
    pub fn open(cfg: PerfdbConfig) -> anyhow::Result<Self> {
        ensure_parent_dir(&cfg.db)?;
        let store = Store::open(&cfg.db)
            .with_context(|| format!("failed to open database {}", cfg.db.display()))?;
        store.init_schema()?;
        let cache = SummaryCache::new(cfg.cache_entries);
        tracing::debug!(
            event = "perfdb.store.opened",
            db = %cfg.db.display(),
            fingerprint = store.identity().fingerprint(),
        );
        Ok(Self { cfg, store, cache })
    }

    pub fn triage(&self) -> Triage<'_> {
        Triage::new(&self.store, &self.cache).with_config(&self.cfg)
    }
}

/// Defaults, then the config file when present, then `PERFDB_*`, then flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<PerfdbConfig> {
    let mut cfg = if cli.config.exists() {
        load_config(&cli.config, cli.strict)?
    } else {
        PerfdbConfig::default()
    };
    cfg.apply_env();
    if let Some(db) = &cli.db {
        cfg.db = db.clone();
    }
    Ok(cfg)
}

pub fn dispatch(cli: Cli, cfg: PerfdbConfig) -> anyhow::Result<i32> {
    let open = move || Env::open(cfg);
    match cli.cmd {
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
        Command::Init => import::cmd_init(&cli),
        Command::Import(args) => import::cmd_import(&open()?, args),
        Command::Suites => suites::cmd_suites(&open()?),
        Command::Summary(args) => suites::cmd_summary(&open()?, args),
        Command::Runs(args) => suites::cmd_runs(&open()?, args),
        Command::Neighbors(args) => suites::cmd_neighbors(&open()?, args),
        Command::Untriaged(args) => triage::cmd_untriaged(&open()?, args),
        Command::Regressions(args) => triage::cmd_regressions(&open()?, args),
        Command::Show(args) => triage::cmd_show(&open()?, args),
        Command::Create(args) => triage::cmd_create(&open()?, args),
        Command::Ignore(args) => triage::cmd_ignore(&open()?, args),
        Command::Merge(args) => triage::cmd_merge(&open()?, args),
        Command::Split(args) => triage::cmd_split(&open()?, args),
        Command::Edit(args) => triage::cmd_edit(&open()?, args),
        Command::Delete(args) => triage::cmd_delete(&open()?, args),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<i32> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(exit_codes::OK)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
