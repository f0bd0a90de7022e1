use crate::errors::{PerfError, Result};
use serde::{Deserialize, Serialize};

/// Qualitative classification of a value change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueStatus {
    Regressed,
    Improved,
    Unchanged,
}

/// Outcome axis of the test itself, independent of its measured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// Which way the value moved relative to the field's preferred direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Worse,
    Better,
    Unchanged,
}

/// Normalized before/after comparison of one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
    pub pct_delta: f64,
    pub bigger_is_better: bool,
    pub direction: Direction,
    pub value_status: ValueStatus,
    pub test_status: TestStatus,
}

/// Compares two values of a field.
///
/// Comparisons here always describe an already-detected change, so the value
/// status is `Regressed` and the test status `Passed`; the detector upstream
/// owns significance.
pub fn compare(old: f64, new: f64, bigger_is_better: bool) -> Result<Comparison> {
    if old == 0.0 {
        return Err(PerfError::ArithmeticUndefined { old, new });
    }
    let delta = new - old;
    let direction = if delta == 0.0 {
        Direction::Unchanged
    } else if (delta > 0.0) == bigger_is_better {
        Direction::Better
    } else {
        Direction::Worse
    };
    Ok(Comparison {
        previous: old,
        current: new,
        delta,
        pct_delta: delta / old,
        bigger_is_better,
        direction,
        value_status: ValueStatus::Regressed,
        test_status: TestStatus::Passed,
    })
}

/// The "no measurable impact" comparison.
pub fn identity() -> Comparison {
    Comparison {
        previous: 1.0,
        current: 1.0,
        delta: 0.0,
        pct_delta: 0.0,
        bigger_is_better: true,
        direction: Direction::Unchanged,
        value_status: ValueStatus::Regressed,
        test_status: TestStatus::Passed,
    }
}

/// Combines comparisons into one net-impact figure by summing previous and
/// current values independently.
///
/// Uses the first comparison's direction flag for the whole group. That is
/// only meaningful when every member shares the same direction and comparable
/// units; mixed groups are not normalized.
pub fn aggregate_impact(comparisons: &[Comparison]) -> Result<Comparison> {
    let values: Vec<(f64, f64, bool)> = comparisons
        .iter()
        .map(|c| (c.previous, c.current, c.bigger_is_better))
        .collect();
    aggregate_values(&values)
}

/// Same as [`aggregate_impact`] over raw `(old, new, bigger_is_better)`
/// members. A member with a zero baseline still counts towards the sums;
/// only a zero summed baseline is undefined.
pub fn aggregate_values(values: &[(f64, f64, bool)]) -> Result<Comparison> {
    let Some(&(_, _, bigger_is_better)) = values.first() else {
        return Ok(identity());
    };
    let olds: f64 = values.iter().map(|v| v.0).sum();
    let news: f64 = values.iter().map(|v| v.1).sum();
    compare(olds, news, bigger_is_better)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_smaller_is_better_increase() {
        let c = compare(80.0, 100.0, false).unwrap();
        assert_eq!(c.delta, 20.0);
        assert_eq!(c.pct_delta, 0.25);
        assert_eq!(c.value_status, ValueStatus::Regressed);
        assert_eq!(c.test_status, TestStatus::Passed);
        assert_eq!(c.direction, Direction::Worse);
    }

    #[test]
    fn compare_direction_follows_flag() {
        assert_eq!(compare(80.0, 100.0, true).unwrap().direction, Direction::Better);
        assert_eq!(compare(100.0, 80.0, true).unwrap().direction, Direction::Worse);
        assert_eq!(compare(5.0, 5.0, false).unwrap().direction, Direction::Unchanged);
    }

    #[test]
    fn zero_baseline_is_undefined() {
        let err = compare(0.0, 3.0, false).unwrap_err();
        assert!(matches!(err, PerfError::ArithmeticUndefined { .. }));
    }

    #[test]
    fn aggregate_empty_is_identity() {
        let c = aggregate_impact(&[]).unwrap();
        assert_eq!(c.previous, 1.0);
        assert_eq!(c.current, 1.0);
        assert_eq!(c.delta, 0.0);
        assert!(c.bigger_is_better);
    }

    #[test]
    fn aggregate_sums_and_uses_first_direction() {
        let a = compare(10.0, 15.0, false).unwrap();
        let b = compare(30.0, 35.0, true).unwrap();
        let c = aggregate_impact(&[a, b]).unwrap();
        assert_eq!(c.previous, 40.0);
        assert_eq!(c.current, 50.0);
        assert_eq!(c.pct_delta, 0.25);
        assert!(!c.bigger_is_better);
    }

    #[test]
    fn aggregate_values_keeps_zero_baseline_members() {
        let c = aggregate_values(&[(0.0, 5.0, false), (4.0, 5.0, false)]).unwrap();
        assert_eq!(c.previous, 4.0);
        assert_eq!(c.current, 10.0);
        assert_eq!(c.pct_delta, 1.5);

        let err = aggregate_values(&[(0.0, 5.0, false), (0.0, 1.0, false)]).unwrap_err();
        assert!(matches!(err, PerfError::ArithmeticUndefined { .. }));
    }
}
