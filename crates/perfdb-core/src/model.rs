use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type MachineId = i64;
pub type RunId = i64;
pub type TestId = i64;
pub type FieldId = i64;
pub type FieldChangeId = i64;
pub type RegressionId = i64;

/// Entity kinds that carry their own revision counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Machine,
    Run,
    RunInfo,
    Test,
    Field,
    Sample,
    FieldChange,
    ChangeIgnore,
    Regression,
    RegressionIndicator,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Machine,
        EntityKind::Run,
        EntityKind::RunInfo,
        EntityKind::Test,
        EntityKind::Field,
        EntityKind::Sample,
        EntityKind::FieldChange,
        EntityKind::ChangeIgnore,
        EntityKind::Regression,
        EntityKind::RegressionIndicator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Machine => "Machine",
            EntityKind::Run => "Run",
            EntityKind::RunInfo => "RunInfo",
            EntityKind::Test => "Test",
            EntityKind::Field => "Field",
            EntityKind::Sample => "Sample",
            EntityKind::FieldChange => "FieldChange",
            EntityKind::ChangeIgnore => "ChangeIgnore",
            EntityKind::Regression => "Regression",
            EntityKind::RegressionIndicator => "RegressionIndicator",
        }
    }

    /// Backing table in the SQLite schema.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Machine => "machines",
            EntityKind::Run => "runs",
            EntityKind::RunInfo => "run_info",
            EntityKind::Test => "tests",
            EntityKind::Field => "fields",
            EntityKind::Sample => "samples",
            EntityKind::FieldChange => "field_changes",
            EntityKind::ChangeIgnore => "change_ignores",
            EntityKind::Regression => "regressions",
            EntityKind::RegressionIndicator => "regression_indicators",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally supplied ordering key of a run.
///
/// Integer-looking values compare numerically so that `"99" < "100"`; any
/// other value compares as text and sorts after every numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged, from = "RunOrderRepr")]
pub enum RunOrder {
    Numeric(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RunOrderRepr {
    Numeric(i64),
    Text(String),
}

impl From<RunOrderRepr> for RunOrder {
    fn from(r: RunOrderRepr) -> Self {
        match r {
            RunOrderRepr::Numeric(n) => RunOrder::Numeric(n),
            RunOrderRepr::Text(s) => RunOrder::parse(&s),
        }
    }
}

impl RunOrder {
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<i64>() {
            Ok(n) => RunOrder::Numeric(n),
            Err(_) => RunOrder::Text(s.to_string()),
        }
    }
}

impl fmt::Display for RunOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOrder::Numeric(n) => write!(f, "{}", n),
            RunOrder::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RunOrder {
    fn from(n: i64) -> Self {
        RunOrder::Numeric(n)
    }
}

impl From<&str> for RunOrder {
    fn from(s: &str) -> Self {
        RunOrder::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub machine_id: MachineId,
    pub run_order: RunOrder,
    pub tag: String,
    pub started_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    pub name: String,
    pub bigger_is_better: bool,
}

/// A detected transition of one field between two runs of one test.
///
/// The test and field attributes are denormalized on read so callers can
/// build comparisons and titles without further lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub id: FieldChangeId,
    pub test_id: TestId,
    pub test_name: String,
    pub field_id: FieldId,
    pub field_name: String,
    pub bigger_is_better: bool,
    pub start_run_id: RunId,
    pub end_run_id: RunId,
    pub old_value: Option<f64>,
    pub new_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeIgnore {
    pub id: i64,
    pub field_change_id: FieldChangeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionIndicator {
    pub id: i64,
    pub regression_id: RegressionId,
    pub field_change_id: FieldChangeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regression {
    pub id: RegressionId,
    pub title: String,
    pub bug: String,
    pub state: RegressionState,
}

/// Triage state of a regression. Codes are persisted and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionState {
    Detected,
    Staged,
    #[default]
    Active,
    NotToBeFixed,
    Ignored,
    Fixed,
    DetectedFixed,
}

impl RegressionState {
    pub const ALL: [RegressionState; 7] = [
        RegressionState::Detected,
        RegressionState::Staged,
        RegressionState::Active,
        RegressionState::NotToBeFixed,
        RegressionState::Ignored,
        RegressionState::Fixed,
        RegressionState::DetectedFixed,
    ];

    pub fn code(&self) -> i64 {
        match self {
            RegressionState::Detected => 0,
            RegressionState::Staged => 1,
            RegressionState::Active => 10,
            RegressionState::NotToBeFixed => 20,
            RegressionState::Ignored => 21,
            RegressionState::Fixed => 22,
            RegressionState::DetectedFixed => 23,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Human-facing label.
    pub fn name(&self) -> &'static str {
        match self {
            RegressionState::Detected => "Detected",
            RegressionState::Staged => "Staged",
            RegressionState::Active => "Active",
            RegressionState::NotToBeFixed => "Not to be Fixed",
            RegressionState::Ignored => "Ignored",
            RegressionState::Fixed => "Verify",
            RegressionState::DetectedFixed => "Detected Fixed",
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            RegressionState::Detected => "detected",
            RegressionState::Staged => "staged",
            RegressionState::Active => "active",
            RegressionState::NotToBeFixed => "not_to_be_fixed",
            RegressionState::Ignored => "ignored",
            RegressionState::Fixed => "fixed",
            RegressionState::DetectedFixed => "detected_fixed",
        }
    }
}

impl fmt::Display for RegressionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RegressionState {
    type Err = String;

    /// Accepts the snake_case slug (`not_to_be_fixed`) or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown state code: {}", code));
        }
        let lower = s.to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|st| st.slug() == lower)
            .ok_or_else(|| format!("unknown regression state: {}", s))
    }
}
