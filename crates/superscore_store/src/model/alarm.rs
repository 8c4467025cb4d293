//! EPICS alarm status and severity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The alarm status reported alongside a captured PV value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NoAlarm,
    Read,
    Write,
    Hihi,
    High,
    Lolo,
    Low,
    State,
    Cos,
    Comm,
    Timeout,
    Hwlimit,
    Calc,
    Scan,
    Link,
    Soft,
    BadSub,
    /// The record has never been processed.
    #[default]
    Udf,
    Disable,
    Simm,
    ReadAccess,
    WriteAccess,
}

impl Status {
    /// Returns the EPICS name of the status, e.g. `"NO_ALARM"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAlarm => "NO_ALARM",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Hihi => "HIHI",
            Self::High => "HIGH",
            Self::Lolo => "LOLO",
            Self::Low => "LOW",
            Self::State => "STATE",
            Self::Cos => "COS",
            Self::Comm => "COMM",
            Self::Timeout => "TIMEOUT",
            Self::Hwlimit => "HWLIMIT",
            Self::Calc => "CALC",
            Self::Scan => "SCAN",
            Self::Link => "LINK",
            Self::Soft => "SOFT",
            Self::BadSub => "BAD_SUB",
            Self::Udf => "UDF",
            Self::Disable => "DISABLE",
            Self::Simm => "SIMM",
            Self::ReadAccess => "READ_ACCESS",
            Self::WriteAccess => "WRITE_ACCESS",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The alarm severity reported alongside a captured PV value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    NoAlarm,
    Minor,
    Major,
    #[default]
    Invalid,
}

impl Severity {
    /// Returns the EPICS name of the severity, e.g. `"MAJOR"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAlarm => "NO_ALARM",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
