use clap::{Parser, Subcommand};
use perfdb_core::model::RegressionState;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "perfdb",
    version,
    about = "Browse benchmark suites and triage performance regressions"
)]
pub struct Cli {
    /// Config file; built-in defaults apply when it does not exist
    #[arg(long, global = true, default_value = "perfdb.yaml")]
    pub config: PathBuf,

    /// Database path (overrides the config file and PERFDB_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Fail on unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample config and create the database schema
    Init,
    /// Load runs, samples and field changes from a JSON document
    Import(ImportArgs),
    /// List every suite in the database
    Suites,
    /// Test names and parameter sets of one suite
    Summary(TagArgs),
    /// Runs of one suite, most recent first
    Runs(TagArgs),
    /// Previous and next run on the same machine
    Neighbors(NeighborsArgs),
    /// Field changes that are neither ignored nor part of a regression
    Untriaged(UntriagedArgs),
    /// List regressions with their size and net impact (active ones by default)
    Regressions(RegressionsArgs),
    /// One regression with all of its field changes
    Show(IdArgs),
    /// Group field changes into a new regression
    Create(ChangeIdsArgs),
    /// Mark field changes as ignored
    Ignore(ChangeIdsArgs),
    /// Combine regressions into one
    Merge(MergeArgs),
    /// Move field changes out of a regression into a new one
    Split(SplitArgs),
    /// Change the title, bug link or state of a regression
    Edit(EditArgs),
    /// Delete a regression; its field changes become untriaged again
    Delete(IdArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    pub input: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TagArgs {
    #[arg(long)]
    pub tag: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct NeighborsArgs {
    #[arg(long)]
    pub tag: String,

    #[arg(long)]
    pub run: i64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct UntriagedArgs {
    /// Maximum number of changes (defaults to the configured limit)
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RegressionsArgs {
    /// Only regressions in this state (name such as `fixed`, or numeric code);
    /// defaults to `active`
    #[arg(long, conflicts_with = "all")]
    pub state: Option<RegressionState>,

    /// List regressions in every state
    #[arg(long)]
    pub all: bool,
}

impl RegressionsArgs {
    /// `None` means every state.
    pub fn state_filter(&self) -> Option<RegressionState> {
        if self.all {
            None
        } else {
            Some(self.state.unwrap_or_default())
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct IdArgs {
    pub id: i64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChangeIdsArgs {
    #[arg(required = true, num_args = 1..)]
    pub field_changes: Vec<i64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(required = true, num_args = 2..)]
    pub regressions: Vec<i64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SplitArgs {
    pub id: i64,

    #[arg(required = true, num_args = 1..)]
    pub field_changes: Vec<i64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EditArgs {
    pub id: i64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub bug: Option<String>,

    #[arg(long)]
    pub state: Option<RegressionState>,
}
