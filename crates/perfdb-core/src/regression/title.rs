use crate::errors::Result;
use crate::model::Regression;
use crate::storage::queries;
use regex::Regex;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Title given to a regression before its indicators exist.
pub const PLACEHOLDER_TITLE: &str = "Regression of 0 benchmarks";

fn auto_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Regression of \d+ benchmarks").expect("static regex"))
}

/// True for titles this module generated; hand-written titles are left alone.
pub fn is_auto_title(title: &str) -> bool {
    auto_title_re().is_match(title)
}

/// Last path segment of a test name.
pub fn short_name(test_name: &str) -> &str {
    test_name.rsplit('/').next().unwrap_or(test_name)
}

pub fn build_title<'a>(
    change_count: usize,
    test_names: impl IntoIterator<Item = &'a str>,
    max_len: usize,
) -> String {
    let benchmarks: BTreeSet<&str> = test_names.into_iter().map(short_name).collect();
    if benchmarks.is_empty() {
        return format!("Regression of {} benchmarks", change_count);
    }
    let title = format!(
        "Regression of {} benchmarks: {}",
        change_count,
        benchmarks.into_iter().collect::<Vec<_>>().join(", ")
    );
    crop(title, max_len)
}

fn crop(title: String, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        return title;
    }
    let mut out: String = title.chars().take(max_len).collect();
    out.push_str("...");
    out
}

/// Recomputes an auto-generated title from the regression's current
/// indicators and persists it. Returns whether the title changed.
pub fn rebuild_title(conn: &Connection, regression: &mut Regression, max_len: usize) -> Result<bool> {
    if !is_auto_title(&regression.title) {
        return Ok(false);
    }
    let indicators = queries::indicators_for(conn, regression.id)?;
    let mut names = Vec::with_capacity(indicators.len());
    for ind in &indicators {
        names.push(queries::get_field_change(conn, ind.field_change_id)?.test_name);
    }
    let title = build_title(indicators.len(), names.iter().map(String::as_str), max_len);
    if title == regression.title {
        return Ok(false);
    }
    regression.title = title;
    queries::update_regression(conn, regression)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_titles_are_recognized() {
        assert!(is_auto_title(PLACEHOLDER_TITLE));
        assert!(is_auto_title("Regression of 12 benchmarks: a, b"));
        assert!(!is_auto_title("Slow linker on arm"));
        assert!(!is_auto_title("Big Regression of 2 benchmarks"));
    }

    #[test]
    fn title_lists_sorted_unique_short_names() {
        let t = build_title(3, ["nt/SingleSource/foo", "nt/bar", "other/foo"], 120);
        assert_eq!(t, "Regression of 3 benchmarks: bar, foo");
    }

    #[test]
    fn empty_regression_gets_placeholder_title() {
        assert_eq!(build_title(0, std::iter::empty::<&str>(), 120), PLACEHOLDER_TITLE);
    }

    #[test]
    fn long_titles_are_cropped() {
        let names: Vec<String> = (0..50).map(|i| format!("benchmark_{:02}", i)).collect();
        let t = build_title(50, names.iter().map(String::as_str), 120);
        assert_eq!(t.chars().count(), 123);
        assert!(t.ends_with("..."));
    }
}
