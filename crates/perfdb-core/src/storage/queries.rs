//! Query shapes the core relies on, written against a plain `&Connection` so
//! they compose inside one transaction (`Transaction` derefs to `Connection`).

use crate::errors::{PerfError, Result};
use crate::model::{
    ChangeIgnore, EntityKind, Field, FieldChange, FieldChangeId, FieldId, Machine, MachineId,
    Regression, RegressionId, RegressionIndicator, RegressionState, Run, RunId, RunOrder, TestId,
};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

pub const TAG_KEY: &str = "tag";
pub const RUN_ORDER_KEY: &str = "run_order";

impl FromSql for RegressionState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = i64::column_result(value)?;
        RegressionState::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}

impl ToSql for RegressionState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for RunOrder {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(RunOrder::Numeric(n)),
            _ => String::column_result(value).map(|s| RunOrder::parse(&s)),
        }
    }
}

/// A test row with its sorted metadata items.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRecord {
    pub id: TestId,
    pub name: String,
    pub params: Vec<(String, String)>,
}

/// Input for a field change produced upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFieldChange {
    pub test_id: TestId,
    pub field_id: FieldId,
    pub start_run_id: RunId,
    pub end_run_id: RunId,
    pub old_value: Option<f64>,
    pub new_value: f64,
}

pub fn revision(conn: &Connection, kind: EntityKind) -> Result<u64> {
    let rev: Option<i64> = conn
        .query_row(
            "SELECT revision FROM revisions WHERE kind = ?1",
            params![kind.as_str()],
            |r| r.get(0),
        )
        .optional()?;
    Ok(rev.unwrap_or(0) as u64)
}

// --- machines / runs ---

pub fn ensure_machine(conn: &Connection, name: &str) -> Result<MachineId> {
    conn.execute(
        "INSERT INTO machines(name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    let id = conn.query_row(
        "SELECT id FROM machines WHERE name = ?1",
        params![name],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn list_machines(conn: &Connection) -> Result<Vec<Machine>> {
    let mut stmt = conn.prepare("SELECT id, name FROM machines ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Machine {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_run(
    conn: &Connection,
    machine_id: MachineId,
    tag: &str,
    run_order: &RunOrder,
    started_at: &str,
) -> Result<RunId> {
    conn.execute(
        "INSERT INTO runs(machine_id, started_at) VALUES (?1, ?2)",
        params![machine_id, started_at],
    )?;
    let run_id = conn.last_insert_rowid();
    insert_run_info(conn, run_id, TAG_KEY, tag)?;
    insert_run_info(conn, run_id, RUN_ORDER_KEY, &run_order.to_string())?;
    Ok(run_id)
}

pub fn insert_run_info(conn: &Connection, run_id: RunId, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO run_info(run_id, key, value) VALUES (?1, ?2, ?3)",
        params![run_id, key, value],
    )?;
    Ok(())
}

pub fn get_run(conn: &Connection, run_id: RunId) -> Result<Run> {
    conn.query_row(
        "SELECT r.id, r.machine_id, r.started_at,
                (SELECT value FROM run_info WHERE run_id = r.id AND key = 'tag' ORDER BY id LIMIT 1),
                (SELECT value FROM run_info WHERE run_id = r.id AND key = 'run_order' ORDER BY id LIMIT 1)
         FROM runs r WHERE r.id = ?1",
        params![run_id],
        |r| {
            Ok(Run {
                id: r.get(0)?,
                machine_id: r.get(1)?,
                started_at: r.get(2)?,
                tag: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
                run_order: r
                    .get::<_, Option<RunOrder>>(4)?
                    .unwrap_or_else(|| RunOrder::Text(String::new())),
            })
        },
    )
    .optional()?
    .ok_or_else(|| PerfError::not_found(EntityKind::Run, run_id))
}

pub fn distinct_run_info_values(conn: &Connection, key: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT value FROM run_info WHERE key = ?1 ORDER BY value")?;
    let values = stmt
        .query_map(params![key], |r| r.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(values)
}

/// (run_order, run_id, machine_id) for every run tagged `tag`, in run id order.
pub fn run_orders_for_tag(
    conn: &Connection,
    tag: &str,
) -> Result<Vec<(RunOrder, RunId, MachineId)>> {
    let mut stmt = conn.prepare(
        "SELECT ro.value, ro.run_id, r.machine_id
         FROM run_info ro
         JOIN runs r ON r.id = ro.run_id
         WHERE ro.key = 'run_order'
           AND ro.run_id IN (SELECT run_id FROM run_info WHERE key = 'tag' AND value = ?1)
         ORDER BY ro.run_id, ro.id",
    )?;
    let rows = stmt
        .query_map(params![tag], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// --- tests / fields / samples ---

/// Returns the test with exactly this name and metadata, creating it if needed.
pub fn ensure_test(
    conn: &Connection,
    name: &str,
    params_map: &BTreeMap<String, String>,
) -> Result<TestId> {
    let wanted: Vec<(String, String)> = params_map
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut stmt = conn.prepare("SELECT id FROM tests WHERE name = ?1 ORDER BY id")?;
    let candidates = stmt
        .query_map(params![name], |r| r.get::<_, TestId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for id in candidates {
        if test_params(conn, id)? == wanted {
            return Ok(id);
        }
    }

    conn.execute("INSERT INTO tests(name) VALUES (?1)", params![name])?;
    let id = conn.last_insert_rowid();
    for (k, v) in &wanted {
        conn.execute(
            "INSERT INTO test_info(test_id, key, value) VALUES (?1, ?2, ?3)",
            params![id, k, v],
        )?;
    }
    Ok(id)
}

fn test_params(conn: &Connection, test_id: TestId) -> Result<Vec<(String, String)>> {
    let mut stmt =
        conn.prepare("SELECT key, value FROM test_info WHERE test_id = ?1 ORDER BY key")?;
    let items = stmt
        .query_map(params![test_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(items)
}

/// Every test whose name starts with `prefix`, with sorted metadata.
pub fn tests_with_prefix(conn: &Connection, prefix: &str) -> Result<Vec<TestRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name FROM tests
         WHERE substr(name, 1, length(?1)) = ?1
         ORDER BY id",
    )?;
    let mut tests: BTreeMap<TestId, TestRecord> = BTreeMap::new();
    for row in stmt.query_map(params![prefix], |r| {
        Ok(TestRecord {
            id: r.get(0)?,
            name: r.get(1)?,
            params: Vec::new(),
        })
    })? {
        let t = row?;
        tests.insert(t.id, t);
    }

    let mut stmt = conn.prepare(
        "SELECT ti.test_id, ti.key, ti.value
         FROM test_info ti
         JOIN tests t ON t.id = ti.test_id
         WHERE substr(t.name, 1, length(?1)) = ?1
         ORDER BY ti.test_id, ti.key",
    )?;
    let items = stmt.query_map(params![prefix], |r| {
        Ok((
            r.get::<_, TestId>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
        ))
    })?;
    for item in items {
        let (test_id, k, v) = item?;
        if let Some(t) = tests.get_mut(&test_id) {
            t.params.push((k, v));
        }
    }
    Ok(tests.into_values().collect())
}

pub fn ensure_field(conn: &Connection, name: &str, bigger_is_better: bool) -> Result<FieldId> {
    conn.execute(
        "INSERT INTO fields(name, bigger_is_better) VALUES (?1, ?2)
         ON CONFLICT(name) DO NOTHING",
        params![name, bigger_is_better],
    )?;
    let id = conn.query_row(
        "SELECT id FROM fields WHERE name = ?1",
        params![name],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn get_field(conn: &Connection, field_id: FieldId) -> Result<Field> {
    conn.query_row(
        "SELECT id, name, bigger_is_better FROM fields WHERE id = ?1",
        params![field_id],
        |r| {
            Ok(Field {
                id: r.get(0)?,
                name: r.get(1)?,
                bigger_is_better: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| PerfError::not_found(EntityKind::Field, field_id))
}

pub fn insert_sample(
    conn: &Connection,
    run_id: RunId,
    test_id: TestId,
    field_id: FieldId,
    value: f64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO samples(run_id, test_id, field_id, value) VALUES (?1, ?2, ?3, ?4)",
        params![run_id, test_id, field_id, value],
    )?;
    Ok(())
}

/// Aggregated (minimum) sample value of one test/field in one run.
pub fn sample_value(
    conn: &Connection,
    run_id: RunId,
    test_id: TestId,
    field_id: FieldId,
) -> Result<Option<f64>> {
    let v: Option<f64> = conn.query_row(
        "SELECT MIN(value) FROM samples WHERE run_id = ?1 AND test_id = ?2 AND field_id = ?3",
        params![run_id, test_id, field_id],
        |r| r.get(0),
    )?;
    Ok(v)
}

// --- field changes ---

const FIELD_CHANGE_SELECT: &str = "SELECT fc.id, fc.test_id, t.name, fc.field_id, f.name,
        f.bigger_is_better, fc.start_run_id, fc.end_run_id, fc.old_value, fc.new_value
     FROM field_changes fc
     JOIN tests t ON t.id = fc.test_id
     JOIN fields f ON f.id = fc.field_id";

fn field_change_from_row(r: &Row<'_>) -> rusqlite::Result<FieldChange> {
    Ok(FieldChange {
        id: r.get(0)?,
        test_id: r.get(1)?,
        test_name: r.get(2)?,
        field_id: r.get(3)?,
        field_name: r.get(4)?,
        bigger_is_better: r.get(5)?,
        start_run_id: r.get(6)?,
        end_run_id: r.get(7)?,
        old_value: r.get(8)?,
        new_value: r.get(9)?,
    })
}

pub fn insert_field_change(conn: &Connection, fc: &NewFieldChange) -> Result<FieldChangeId> {
    conn.execute(
        "INSERT INTO field_changes(test_id, field_id, start_run_id, end_run_id, old_value, new_value)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            fc.test_id,
            fc.field_id,
            fc.start_run_id,
            fc.end_run_id,
            fc.old_value,
            fc.new_value
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_field_change(conn: &Connection, id: FieldChangeId) -> Result<FieldChange> {
    let sql = format!("{} WHERE fc.id = ?1", FIELD_CHANGE_SELECT);
    conn.query_row(&sql, params![id], field_change_from_row)
        .optional()?
        .ok_or_else(|| PerfError::not_found(EntityKind::FieldChange, id))
}

/// Field changes with neither an ignore marker nor a regression link, newest
/// first, capped at `limit`.
pub fn untriaged_field_changes(conn: &Connection, limit: u32) -> Result<Vec<FieldChange>> {
    let sql = format!(
        "{} LEFT JOIN change_ignores ci ON ci.field_change_id = fc.id
            LEFT JOIN regression_indicators ri ON ri.field_change_id = fc.id
         WHERE ci.id IS NULL AND ri.id IS NULL
         ORDER BY fc.id DESC
         LIMIT ?1",
        FIELD_CHANGE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit], field_change_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// --- triage records ---

pub fn ignore_for_change(conn: &Connection, fc: FieldChangeId) -> Result<Option<ChangeIgnore>> {
    let row = conn
        .query_row(
            "SELECT id, field_change_id FROM change_ignores WHERE field_change_id = ?1",
            params![fc],
            |r| {
                Ok(ChangeIgnore {
                    id: r.get(0)?,
                    field_change_id: r.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn insert_ignore(conn: &Connection, fc: FieldChangeId) -> Result<ChangeIgnore> {
    conn.execute(
        "INSERT INTO change_ignores(field_change_id) VALUES (?1)",
        params![fc],
    )?;
    Ok(ChangeIgnore {
        id: conn.last_insert_rowid(),
        field_change_id: fc,
    })
}

fn indicator_from_row(r: &Row<'_>) -> rusqlite::Result<RegressionIndicator> {
    Ok(RegressionIndicator {
        id: r.get(0)?,
        regression_id: r.get(1)?,
        field_change_id: r.get(2)?,
    })
}

pub fn indicator_for_change(
    conn: &Connection,
    fc: FieldChangeId,
) -> Result<Option<RegressionIndicator>> {
    let row = conn
        .query_row(
            "SELECT id, regression_id, field_change_id FROM regression_indicators
             WHERE field_change_id = ?1",
            params![fc],
            indicator_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn indicators_for(
    conn: &Connection,
    regression_id: RegressionId,
) -> Result<Vec<RegressionIndicator>> {
    let mut stmt = conn.prepare(
        "SELECT id, regression_id, field_change_id FROM regression_indicators
         WHERE regression_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![regression_id], indicator_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert_indicator(
    conn: &Connection,
    regression_id: RegressionId,
    fc: FieldChangeId,
) -> Result<RegressionIndicator> {
    conn.execute(
        "INSERT INTO regression_indicators(regression_id, field_change_id) VALUES (?1, ?2)",
        params![regression_id, fc],
    )?;
    Ok(RegressionIndicator {
        id: conn.last_insert_rowid(),
        regression_id,
        field_change_id: fc,
    })
}

pub fn delete_indicator(conn: &Connection, indicator_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM regression_indicators WHERE id = ?1",
        params![indicator_id],
    )?;
    Ok(())
}

pub fn delete_indicators_for(conn: &Connection, regression_id: RegressionId) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM regression_indicators WHERE regression_id = ?1",
        params![regression_id],
    )?;
    Ok(n)
}

fn regression_from_row(r: &Row<'_>) -> rusqlite::Result<Regression> {
    Ok(Regression {
        id: r.get(0)?,
        title: r.get(1)?,
        bug: r.get(2)?,
        state: r.get(3)?,
    })
}

pub fn insert_regression(
    conn: &Connection,
    title: &str,
    bug: &str,
    state: RegressionState,
) -> Result<Regression> {
    conn.execute(
        "INSERT INTO regressions(title, bug, state) VALUES (?1, ?2, ?3)",
        params![title, bug, state],
    )?;
    Ok(Regression {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        bug: bug.to_string(),
        state,
    })
}

pub fn get_regression(conn: &Connection, id: RegressionId) -> Result<Regression> {
    conn.query_row(
        "SELECT id, title, bug, state FROM regressions WHERE id = ?1",
        params![id],
        regression_from_row,
    )
    .optional()?
    .ok_or_else(|| PerfError::not_found(EntityKind::Regression, id))
}

pub fn update_regression(conn: &Connection, r: &Regression) -> Result<()> {
    let n = conn.execute(
        "UPDATE regressions SET title = ?1, bug = ?2, state = ?3 WHERE id = ?4",
        params![r.title, r.bug, r.state, r.id],
    )?;
    if n == 0 {
        return Err(PerfError::not_found(EntityKind::Regression, r.id));
    }
    Ok(())
}

pub fn delete_regression(conn: &Connection, id: RegressionId) -> Result<()> {
    conn.execute("DELETE FROM regressions WHERE id = ?1", params![id])?;
    Ok(())
}

/// Regressions newest first, optionally restricted to one state.
pub fn list_regressions(
    conn: &Connection,
    state: Option<RegressionState>,
) -> Result<Vec<Regression>> {
    let rows = match state {
        Some(st) => {
            let mut stmt = conn.prepare(
                "SELECT id, title, bug, state FROM regressions WHERE state = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map(params![st], regression_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let mut stmt =
                conn.prepare("SELECT id, title, bug, state FROM regressions ORDER BY id DESC")?;
            let rows = stmt
                .query_map([], regression_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };
    Ok(rows)
}
