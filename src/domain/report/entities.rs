//! Stack-analysis report entities
//!
//! The raw worker result rows arrive as loosely structured JSON. Everything
//! downstream works on [`StackRecord`], produced here at the ingestion
//! boundary; any structural problem in a row becomes a single
//! [`ReportError::MalformedRecord`] that the normalizer logs and skips.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use super::errors::ReportError;
use super::value_objects::{Ecosystem, FrequencyMap};

/// One declared `(package, version)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    /// Unknown-dependency entries historically used `name` for the package
    #[serde(alias = "name")]
    pub package: String,
    pub version: String,
}

/// CVSS score, preserved verbatim whether the worker sent it as a number
/// or a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvssScore(String);

impl CvssScore {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CvssScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CvssScore {
    fn from(value: &str) -> Self {
        CvssScore(value.to_string())
    }
}

impl Serialize for CvssScore {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CvssScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrString {
            Number(serde_json::Number),
            String(String),
        }

        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(CvssScore(n.to_string())),
            NumberOrString::String(s) => Ok(CvssScore(s)),
        }
    }
}

/// One detected vulnerability on an analyzed dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveItem {
    #[serde(rename = "CVE")]
    pub id: String,
    #[serde(rename = "CVSS")]
    pub cvss: CvssScore,
}

impl CveItem {
    /// `"CVE:CVSS"` string used for frequency counting
    pub fn frequency_key(&self) -> String {
        format!("{}:{}", self.id, self.cvss)
    }
}

/// One user dependency-analysis request outcome, typed and validated.
///
/// Read-only input to the pipeline; never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StackRecord {
    pub ecosystem: Ecosystem,
    pub dependencies: Vec<DependencyRef>,
    pub unknown_dependencies: Vec<DependencyRef>,
    pub cves: Vec<CveItem>,
    pub unknown_licenses: Vec<String>,
    /// Worker timestamps, format `YYYY-MM-DDTHH:MM:SS.ffffff`
    pub started_at: String,
    pub ended_at: String,
}

// Wire shape of a worker result row. Strict on purpose: a missing key is a
// malformed record, not an empty default.
#[derive(Deserialize)]
struct TaskResult {
    stack_data: Vec<StackData>,
    #[serde(rename = "_audit")]
    audit: AuditInfo,
}

#[derive(Deserialize)]
struct StackData {
    user_stack_info: UserStackInfo,
}

#[derive(Deserialize)]
struct AuditInfo {
    started_at: String,
    ended_at: String,
}

#[derive(Deserialize)]
struct UserStackInfo {
    ecosystem: String,
    dependencies: Vec<DependencyRef>,
    unknown_dependencies: Vec<DependencyRef>,
    license_analysis: LicenseAnalysis,
    analyzed_dependencies: Vec<AnalyzedDependency>,
}

#[derive(Deserialize)]
struct LicenseAnalysis {
    unknown_licenses: UnknownLicenses,
}

#[derive(Deserialize)]
struct UnknownLicenses {
    really_unknown: Vec<UnknownLicense>,
}

#[derive(Deserialize)]
struct UnknownLicense {
    license: String,
}

#[derive(Deserialize)]
struct AnalyzedDependency {
    #[serde(default)]
    security: Vec<CveItem>,
}

impl StackRecord {
    /// Interpret one `task_result` row.
    ///
    /// Only the first stack entry is meaningful; workers have always written
    /// exactly one.
    pub fn from_row_value(value: &serde_json::Value) -> Result<Self, ReportError> {
        let task: TaskResult = serde_json::from_value(value.clone())
            .map_err(|e| ReportError::malformed(e.to_string()))?;

        let stack = task
            .stack_data
            .into_iter()
            .next()
            .ok_or_else(|| ReportError::malformed("empty stack_data"))?;
        let info = stack.user_stack_info;

        let ecosystem: Ecosystem = info.ecosystem.parse()?;
        let cves = info
            .analyzed_dependencies
            .into_iter()
            .flat_map(|dep| dep.security)
            .collect();
        let unknown_licenses = info
            .license_analysis
            .unknown_licenses
            .really_unknown
            .into_iter()
            .map(|lic| lic.license)
            .collect();

        Ok(StackRecord {
            ecosystem,
            dependencies: info.dependencies,
            unknown_dependencies: info.unknown_dependencies,
            cves,
            unknown_licenses,
            started_at: task.audit.started_at,
            ended_at: task.audit.ended_at,
        })
    }
}

/// Report header shared by all persisted report documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportHeader {
    pub from: String,
    pub to: String,
    pub generated_on: String,
}

/// License findings for one stack
#[derive(Debug, Clone, Default, Serialize)]
pub struct LicenseSection {
    pub conflict: bool,
    pub unknown: Vec<String>,
}

/// Security findings for one stack
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecuritySection {
    pub cve_list: Vec<CveItem>,
}

/// Normalized entry for a single analyzed stack
#[derive(Debug, Clone, Serialize)]
pub struct StackDetail {
    pub ecosystem: Ecosystem,
    pub stack: Vec<String>,
    pub unknown_dependencies: Vec<String>,
    pub license: LicenseSection,
    pub security: SecuritySection,
    pub response_time: String,
}

/// Aggregated statistics for one ecosystem
#[derive(Debug, Clone, Default, Serialize)]
pub struct EcosystemSummary {
    pub stack_requests_count: u64,
    pub unique_dependencies_with_frequency: FrequencyMap,
    pub unique_unknown_dependencies_with_frequency: FrequencyMap,
    pub unique_stacks_with_frequency: FrequencyMap,
    /// Dependency count per unique stack key
    pub unique_stacks_with_deps_count: BTreeMap<String, usize>,
    pub top_stacks: FrequencyMap,
    pub top_dependencies: FrequencyMap,
    pub average_response_time: String,
    /// Graph state of dependencies the previous report listed as unknown
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previously_unknown_dependencies: Vec<crate::domain::ingestion::entities::EpvIngestionStatus>,
}

/// Aggregated statistics across the whole report period
#[derive(Debug, Clone, Default, Serialize)]
pub struct StacksSummary {
    pub total_stack_requests_count: u64,
    #[serde(flatten)]
    pub ecosystems: BTreeMap<Ecosystem, EcosystemSummary>,
    pub unique_unknown_licenses_with_frequency: FrequencyMap,
    pub unique_cves: FrequencyMap,
    pub total_average_response_time: String,
}

/// The stacks report document persisted to object storage.
///
/// Invariant: `stacks_summary.total_stack_requests_count` equals
/// `stacks_details.len()` after malformed records are skipped.
#[derive(Debug, Clone, Serialize)]
pub struct ReportTemplate {
    pub report: ReportHeader,
    pub stacks_summary: StacksSummary,
    pub stacks_details: Vec<StackDetail>,
}
