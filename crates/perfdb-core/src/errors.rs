use crate::model::EntityKind;
use thiserror::Error;

pub type Result<T, E = PerfError> = std::result::Result<T, E>;

/// Failure kinds surfaced by the core.
///
/// Every variant is distinguishable so a presentation layer can render a
/// specific message (or exit code) per kind.
#[derive(Debug, Error)]
pub enum PerfError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("inconsistent state: {0}")]
    Inconsistent(String),

    #[error("percent delta is undefined against a zero baseline (old={old}, new={new})")]
    ArithmeticUndefined { old: f64, new: f64 },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PerfError {
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        PerfError::NotFound { kind, id }
    }

    /// Stable short code, used by the CLI for machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            PerfError::NotFound { .. } => "E_NOT_FOUND",
            PerfError::InvalidArgument(_) => "E_INVALID_ARGUMENT",
            PerfError::Inconsistent(_) => "E_INCONSISTENT",
            PerfError::ArithmeticUndefined { .. } => "E_ARITHMETIC_UNDEFINED",
            PerfError::Storage(_) => "E_STORAGE",
            PerfError::Serialization(_) => "E_SERIALIZATION",
        }
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ConfigError(pub String);
