//! Result aggregation and reporting
//!
//! Folds unit outcomes into a `RunReport` and serializes it.

mod aggregate;
mod report;

pub use aggregate::RunReport;
pub use report::{emit, ReportFormat};

use thiserror::Error;

/// Errors from aggregating or emitting a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("report already finalized")]
    AlreadyFinalized,

    #[error("report has not been finalized")]
    NotFinalized,

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to render report markup")]
    Markup(#[from] std::fmt::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
