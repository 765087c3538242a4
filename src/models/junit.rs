//! JUnit-style suite and case models
//!
//! The suite-shaped result every task unit produces on success.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a single test case
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl CaseStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseStatus::Pass => "✓",
            CaseStatus::Fail => "✗",
            CaseStatus::Skip => "○",
            CaseStatus::Error => "!",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Pass => write!(f, "PASS"),
            CaseStatus::Fail => write!(f, "FAIL"),
            CaseStatus::Skip => write!(f, "SKIP"),
            CaseStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Message attached to a failed, errored or skipped case
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseMessage {
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CaseMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

/// A single test case
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,

    #[serde(default)]
    pub classname: String,

    #[serde(default, with = "duration_secs")]
    pub time: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CaseMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CaseMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<CaseMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_out: Option<String>,
}

impl TestCase {
    pub fn pass(name: impl Into<String>, time: Duration) -> Self {
        Self {
            name: name.into(),
            time,
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.system_out = Some(output.into());
        self
    }

    /// Error wins over failure, failure over skip
    pub fn status(&self) -> CaseStatus {
        if self.error.is_some() {
            CaseStatus::Error
        } else if self.failure.is_some() {
            CaseStatus::Fail
        } else if self.skipped.is_some() {
            CaseStatus::Skip
        } else {
            CaseStatus::Pass
        }
    }
}

/// In-memory construction for tests
#[cfg(test)]
impl TestCase {
    pub fn fail(name: impl Into<String>, time: Duration, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time,
            failure: Some(CaseMessage::new(message)),
            ..Self::default()
        }
    }

    pub fn error(name: impl Into<String>, time: Duration, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time,
            error: Some(CaseMessage::new(message)),
            ..Self::default()
        }
    }

    pub fn skip(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skipped: Some(CaseMessage::new(reason)),
            ..Self::default()
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status().symbol(),
            self.name,
            self.time.as_millis()
        )
    }
}

/// Merging a suite would overflow a count
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("counts reported by suite '{0}' overflow the totals")]
pub struct CountOverflow(pub String);

/// Suite-shaped result of one task unit
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,

    #[serde(rename = "tests", default)]
    pub total: usize,

    #[serde(default)]
    pub skipped: usize,

    #[serde(default)]
    pub failures: usize,

    #[serde(default)]
    pub errors: usize,

    #[serde(default, with = "duration_secs")]
    pub time: Duration,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp_millis::option"
    )]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(rename = "testcase", default)]
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    /// Create an empty suite
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Build a suite whose counts are derived from its cases
    pub fn from_cases(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        let mut suite = Self::new(name);
        for case in cases {
            suite.push_case(case);
        }
        suite
    }

    /// Append a case and count it
    pub fn push_case(&mut self, case: TestCase) {
        self.total += 1;
        match case.status() {
            CaseStatus::Pass => {}
            CaseStatus::Fail => self.failures += 1,
            CaseStatus::Skip => self.skipped += 1,
            CaseStatus::Error => self.errors += 1,
        }
        self.time += case.time;
        self.cases.push(case);
    }

    /// Merge another suite's counts and cases into this one
    ///
    /// Counts are taken from `other` as reported rather than recounted, since an engine may
    /// report totals without listing every case. On overflow nothing is merged.
    pub fn absorb(&mut self, other: TestSuite) -> Result<(), CountOverflow> {
        let overflow = || CountOverflow(other.name.clone());
        let total = self.total.checked_add(other.total).ok_or_else(overflow)?;
        let skipped = self.skipped.checked_add(other.skipped).ok_or_else(overflow)?;
        let failures = self.failures.checked_add(other.failures).ok_or_else(overflow)?;
        let errors = self.errors.checked_add(other.errors).ok_or_else(overflow)?;
        let time = self.time.checked_add(other.time).ok_or_else(overflow)?;

        self.total = total;
        self.skipped = skipped;
        self.failures = failures;
        self.errors = errors;
        self.time = time;

        let classname = other.name;
        self.cases.extend(other.cases.into_iter().map(|mut case| {
            if case.classname.is_empty() {
                case.classname = classname.clone();
            }
            case
        }));
        Ok(())
    }

    pub fn passed(&self) -> usize {
        self.total
            .saturating_sub(self.skipped)
            .saturating_sub(self.failures)
            .saturating_sub(self.errors)
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Total: {} | Pass: {} | Fail: {} | Skip: {} | Error: {}",
            self.name,
            self.total,
            self.passed(),
            self.failures,
            self.skipped,
            self.errors
        )
    }
}

/// Render a timestamp as RFC 3339 UTC with millisecond precision
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde helper writing timestamps through `format_timestamp`
pub mod timestamp_millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_timestamp(timestamp))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(
            timestamp: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match timestamp {
                Some(ts) => super::serialize(ts, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<DateTime<Utc>>::deserialize(deserializer)
        }
    }
}

/// Serde helper encoding a `Duration` as fractional seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| serde::de::Error::custom(format!("invalid duration {secs}: {e}")))
    }
}
