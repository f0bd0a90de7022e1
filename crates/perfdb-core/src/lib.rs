pub mod cache;
pub mod compare;
pub mod config;
pub mod errors;
pub mod import;
pub mod model;
pub mod regression;
pub mod storage;
pub mod summary;

pub use cache::SummaryCache;
pub use errors::{PerfError, Result};
pub use regression::Triage;
pub use storage::Store;
