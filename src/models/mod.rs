//! Data models for test runs
//!
//! Run definitions as loaded from disk and the suite-shaped results units produce.

mod definition;
mod junit;

pub use definition::{RunDefinition, TestSpec};
pub use junit::{
    duration_secs, format_timestamp, timestamp_millis, CaseMessage, TestCase, TestSuite,
};

#[cfg(test)]
pub use definition::{GroupRef, GroupSpec, ParamBinding, TestRef};
#[cfg(test)]
pub use junit::CaseStatus;
