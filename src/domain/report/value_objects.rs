//! Report value objects

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::entities::DependencyRef;
use super::errors::ReportError;

/// Occurrence counts keyed by a dependency string or stack key.
///
/// A `BTreeMap` keeps serialized reports deterministic across runs.
pub type FrequencyMap = BTreeMap<String, u64>;

/// Package ecosystems covered by the analysis platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Maven,
    Pypi,
    Golang,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 4] = [
        Ecosystem::Npm,
        Ecosystem::Maven,
        Ecosystem::Pypi,
        Ecosystem::Golang,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Maven => "maven",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Golang => "golang",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npm" => Ok(Ecosystem::Npm),
            "maven" => Ok(Ecosystem::Maven),
            "pypi" => Ok(Ecosystem::Pypi),
            // the ingestion tables used "go" before the rename settled
            "golang" | "go" => Ok(Ecosystem::Golang),
            other => Err(ReportError::malformed(format!(
                "unknown ecosystem '{}'",
                other
            ))),
        }
    }
}

/// Reporting cadence, also the object-store key segment for stack reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl ReportFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFrequency::Daily => "daily",
            ReportFrequency::Weekly => "weekly",
            ReportFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ReportFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFrequency {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(ReportFrequency::Daily),
            "weekly" => Ok(ReportFrequency::Weekly),
            "monthly" => Ok(ReportFrequency::Monthly),
            other => Err(ReportError::malformed(format!(
                "unknown report frequency '{}'",
                other
            ))),
        }
    }
}

/// Validate a `YYYY-MM-DD` date string.
///
/// Rejects anything `NaiveDate` cannot parse (day overflow included) plus
/// the proleptic year zero, which chrono accepts but no report period can
/// legitimately reference.
pub fn validate_date(value: &str) -> Result<NaiveDate, ReportError> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ReportError::InvalidDate {
            value: value.to_string(),
        }
    })?;
    if date.year() < 1 {
        return Err(ReportError::InvalidDate {
            value: value.to_string(),
        });
    }
    Ok(date)
}

/// A validated report period: `[start, end)` by record timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// Parse and validate both boundary dates before any remote call.
    pub fn parse(start: &str, end: &str) -> Result<Self, ReportError> {
        Ok(Self {
            start: validate_date(start)?,
            end: validate_date(end)?,
        })
    }

    pub fn from_str_date(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn to_str_date(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// Object-store report name for this period: the end date, collapsed to
    /// year-month for monthly reports.
    pub fn report_name(&self, frequency: ReportFrequency) -> String {
        match frequency {
            ReportFrequency::Monthly => self.end.format("%Y-%m").to_string(),
            _ => self.end.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Canonical identity of a declared stack.
///
/// Formed by sorting the `"package version"` pairs, so any two orderings of
/// the same dependency multiset map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackKey(String);

impl StackKey {
    /// Build from an already-normalized (sorted) dependency list.
    pub fn from_normalized(normalized: &[String]) -> Self {
        StackKey(normalized.join(","))
    }

    pub fn from_deps(deps: &[DependencyRef]) -> Self {
        Self::from_normalized(&normalize_deps_list(deps))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Number of dependencies encoded in the key
    pub fn dependency_count(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.split(',').count()
        }
    }
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a dependency list into sorted `"package version"` strings.
pub fn normalize_deps_list(deps: &[DependencyRef]) -> Vec<String> {
    let mut normalized: Vec<String> = deps
        .iter()
        .map(|dep| format!("{} {}", dep.package, dep.version))
        .collect();
    normalized.sort();
    normalized
}
