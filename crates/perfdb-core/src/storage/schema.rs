use crate::model::EntityKind;

pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS revisions (
  kind TEXT PRIMARY KEY,
  revision INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS machines (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  machine_id INTEGER NOT NULL REFERENCES machines(id),
  started_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS run_info (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES runs(id),
  key TEXT NOT NULL,
  value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_run_info_key_value ON run_info(key, value);
CREATE INDEX IF NOT EXISTS idx_run_info_run ON run_info(run_id);

CREATE TABLE IF NOT EXISTS tests (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tests_name ON tests(name);

CREATE TABLE IF NOT EXISTS test_info (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  test_id INTEGER NOT NULL REFERENCES tests(id),
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  UNIQUE (test_id, key)
);

CREATE TABLE IF NOT EXISTS fields (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  bigger_is_better INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS samples (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES runs(id),
  test_id INTEGER NOT NULL REFERENCES tests(id),
  field_id INTEGER NOT NULL REFERENCES fields(id),
  value REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_samples_lookup ON samples(test_id, field_id, run_id);

CREATE TABLE IF NOT EXISTS field_changes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  test_id INTEGER NOT NULL REFERENCES tests(id),
  field_id INTEGER NOT NULL REFERENCES fields(id),
  start_run_id INTEGER NOT NULL REFERENCES runs(id),
  end_run_id INTEGER NOT NULL REFERENCES runs(id),
  old_value REAL,
  new_value REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS change_ignores (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  field_change_id INTEGER NOT NULL UNIQUE REFERENCES field_changes(id)
);

CREATE TABLE IF NOT EXISTS regressions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  bug TEXT NOT NULL DEFAULT '',
  state INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS regression_indicators (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  regression_id INTEGER NOT NULL REFERENCES regressions(id),
  field_change_id INTEGER NOT NULL UNIQUE REFERENCES field_changes(id)
);
CREATE INDEX IF NOT EXISTS idx_indicators_regression ON regression_indicators(regression_id);
"#;

/// Tables whose writes bump a kind's revision in addition to the kind's own
/// table. Test metadata is part of a test's identity.
const EXTRA_TRACKED: &[(&str, EntityKind)] = &[("test_info", EntityKind::Test)];

/// Builds the revision bookkeeping: one seeded counter row per kind and
/// row-level triggers that bump it on every insert, update and delete.
///
/// Triggers run inside the writing transaction, so a rolled-back write never
/// advances a counter.
pub fn revision_ddl() -> String {
    let mut out = String::new();
    for kind in EntityKind::ALL {
        out.push_str(&format!(
            "INSERT OR IGNORE INTO revisions(kind, revision) VALUES ('{}', 0);\n",
            kind.as_str()
        ));
    }

    let tracked = EntityKind::ALL
        .iter()
        .map(|k| (k.table(), *k))
        .chain(EXTRA_TRACKED.iter().copied());

    for (table, kind) in tracked {
        for op in ["INSERT", "UPDATE", "DELETE"] {
            out.push_str(&format!(
                "CREATE TRIGGER IF NOT EXISTS rev_{table}_{op_lc} AFTER {op} ON {table}\n\
                 BEGIN UPDATE revisions SET revision = revision + 1 WHERE kind = '{kind}'; END;\n",
                table = table,
                op = op,
                op_lc = op.to_ascii_lowercase(),
                kind = kind.as_str(),
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_ddl_covers_every_kind() {
        let ddl = revision_ddl();
        for kind in EntityKind::ALL {
            assert!(ddl.contains(&format!("VALUES ('{}', 0)", kind.as_str())));
            assert!(ddl.contains(&format!("rev_{}_insert", kind.table())));
            assert!(ddl.contains(&format!("rev_{}_delete", kind.table())));
        }
        assert!(ddl.contains("rev_test_info_update"));
    }
}
