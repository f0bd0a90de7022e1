use super::{exit_codes, print_json, Env};
use crate::cli::args::{
    ChangeIdsArgs, EditArgs, IdArgs, MergeArgs, RegressionsArgs, SplitArgs, UntriagedArgs,
};
use perfdb_core::regression::RegressionEdit;
use serde_json::json;

pub fn cmd_untriaged(env: &Env, args: UntriagedArgs) -> anyhow::Result<i32> {
    print_json(&env.triage().list_untriaged(args.limit)?)
}

pub fn cmd_regressions(env: &Env, args: RegressionsArgs) -> anyhow::Result<i32> {
    print_json(&env.triage().list_regressions(args.state_filter())?)
}

pub fn cmd_show(env: &Env, args: IdArgs) -> anyhow::Result<i32> {
    print_json(&env.triage().regression_detail(args.id)?)
}

pub fn cmd_create(env: &Env, args: ChangeIdsArgs) -> anyhow::Result<i32> {
    print_json(&env.triage().create_regression(&args.field_changes)?)
}

pub fn cmd_ignore(env: &Env, args: ChangeIdsArgs) -> anyhow::Result<i32> {
    env.triage().ignore_changes(&args.field_changes)?;
    print_json(&json!({ "ignored": args.field_changes }))
}

pub fn cmd_merge(env: &Env, args: MergeArgs) -> anyhow::Result<i32> {
    print_json(&env.triage().merge_regressions(&args.regressions)?)
}

pub fn cmd_split(env: &Env, args: SplitArgs) -> anyhow::Result<i32> {
    print_json(&env.triage().split_regression(args.id, &args.field_changes)?)
}

pub fn cmd_edit(env: &Env, args: EditArgs) -> anyhow::Result<i32> {
    let edit = RegressionEdit {
        title: args.title,
        bug: args.bug,
        state: args.state,
    };
    if edit == RegressionEdit::default() {
        eprintln!("note: nothing to change (use --title, --bug or --state)");
    }
    print_json(&env.triage().edit_regression(args.id, edit)?)
}

pub fn cmd_delete(env: &Env, args: IdArgs) -> anyhow::Result<i32> {
    env.triage().delete_regression(args.id)?;
    print_json(&json!({ "deleted": args.id }))?;
    Ok(exit_codes::OK)
}
