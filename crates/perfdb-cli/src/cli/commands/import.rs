use super::{exit_codes, print_json, resolve_config, Env};
use crate::cli::args::{Cli, ImportArgs};
use anyhow::Context;
use perfdb_core::config::write_sample_config;
use perfdb_core::import::ImportDoc;
use serde_json::json;
use std::fs;

pub fn cmd_init(cli: &Cli) -> anyhow::Result<i32> {
    if cli.config.exists() {
        eprintln!("note: {} already exists", cli.config.display());
    } else {
        if let Some(parent) = cli.config.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_sample_config(&cli.config)?;
        eprintln!("created {}", cli.config.display());
    }

    // Re-resolve so a freshly written config decides where the database lives.
    let env = Env::open(resolve_config(cli)?)?;
    let stats = env.store.stats()?;
    print_json(&json!({
        "config": cli.config,
        "db": env.cfg.db,
        "runs": stats.runs,
        "field_changes": stats.field_changes,
        "regressions": stats.regressions,
    }))?;
    Ok(exit_codes::OK)
}

pub fn cmd_import(env: &Env, args: ImportArgs) -> anyhow::Result<i32> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read input: {}", args.input.display()))?;
    let doc = ImportDoc::from_json(&text)
        .with_context(|| format!("failed to parse import document {}", args.input.display()))?;
    let report = doc.apply(&env.store)?;
    print_json(&report)
}
