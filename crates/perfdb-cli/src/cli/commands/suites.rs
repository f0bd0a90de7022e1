use super::{print_json, Env};
use crate::cli::args::{NeighborsArgs, TagArgs};
use perfdb_core::model::{MachineId, RunId, RunOrder};
use serde::Serialize;

#[derive(Serialize)]
struct RunRow<'a> {
    run: RunId,
    run_order: &'a RunOrder,
    machine: Option<MachineId>,
}

#[derive(Serialize)]
struct Neighbors {
    run: RunId,
    previous: Option<RunId>,
    next: Option<RunId>,
}

pub fn cmd_suites(env: &Env) -> anyhow::Result<i32> {
    let listing = env.cache.list_suites(&env.store)?;
    print_json(listing.as_ref())
}

pub fn cmd_summary(env: &Env, args: TagArgs) -> anyhow::Result<i32> {
    let summary = env.cache.suite_summary(&env.store, &args.tag)?;
    print_json(summary.as_ref())
}

pub fn cmd_runs(env: &Env, args: TagArgs) -> anyhow::Result<i32> {
    let index = env.cache.run_order_index(&env.store, &args.tag)?;
    let rows: Vec<RunRow<'_>> = index
        .runs_in_order()
        .iter()
        .filter_map(|&run| {
            index.order_of(run).map(|run_order| RunRow {
                run,
                run_order,
                machine: index.machine_of(run),
            })
        })
        .collect();
    print_json(&rows)
}

pub fn cmd_neighbors(env: &Env, args: NeighborsArgs) -> anyhow::Result<i32> {
    let index = env.cache.run_order_index(&env.store, &args.tag)?;
    print_json(&Neighbors {
        run: args.run,
        previous: index.previous_on_machine(args.run)?,
        next: index.next_on_machine(args.run)?,
    })
}
