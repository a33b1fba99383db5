//! Ingestion reconciliation entities

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::report::entities::ReportHeader;

/// Delimiter the graph collaborator uses in its result map keys
pub const GRAPH_KEY_DELIMITER: &str = "@DELIM@";

/// Ecosystem-Package-Version triple, the unit of ingestion.
///
/// The ecosystem stays a raw string here: ingestion tables carry whatever
/// name the ingestion flow recorded, and the reconciliation must report it
/// back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Epv {
    pub ecosystem: String,
    #[serde(rename = "name")]
    pub package: String,
    pub version: String,
}

impl Epv {
    pub fn new(
        ecosystem: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            ecosystem: ecosystem.into(),
            package: package.into(),
            version: version.into(),
        }
    }

    /// Full graph key: `ecosystem@DELIM@package@DELIM@version`
    pub fn graph_key(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.ecosystem, GRAPH_KEY_DELIMITER, self.package, GRAPH_KEY_DELIMITER, self.version
        )
    }

    /// Package-level graph key: `ecosystem@DELIM@package`
    pub fn package_key(&self) -> String {
        format!("{}{}{}", self.ecosystem, GRAPH_KEY_DELIMITER, self.package)
    }

    /// Parse a full graph key back into a triple.
    pub fn from_graph_key(key: &str) -> Option<Self> {
        let mut parts = key.split(GRAPH_KEY_DELIMITER);
        let ecosystem = parts.next()?;
        let package = parts.next()?;
        let version = parts.next()?;
        Some(Self::new(ecosystem, package, version))
    }
}

/// Latest-version information for one package, as the graph reports it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersionInfo {
    #[serde(default)]
    pub known_latest_version: String,
    #[serde(default)]
    pub actual_latest_version: String,
}

/// Graph-existence outcome for one observed version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    pub ingested_in_graph: bool,
}

/// Reconciliation state for one package
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageIngestion {
    /// False when the graph has no latest-version record for the package
    pub package_known: bool,
    /// Latest version recorded internally; empty when unknown
    pub known_latest_version: String,
    /// Latest version per the authoritative registry; empty for private packages
    pub actual_latest_version: String,
    /// No publicly resolvable latest version
    pub private_package: bool,
    pub versions: Vec<VersionEntry>,
}

/// ecosystem → package → reconciliation state
pub type IngestionDetails = BTreeMap<String, BTreeMap<String, PackageIngestion>>;

/// Mismatch between internally known and actual latest version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestVersionMismatch {
    pub ecosystem: String,
    pub package: String,
    pub known_latest_version: String,
    pub actual_latest_version: String,
}

/// Per-ecosystem ingestion statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcosystemIngestionStats {
    pub epv_ingestion_count: u64,
    pub epv_successfully_ingested_count: u64,
    pub failed_epv_ingestion_count: u64,
    pub incorrect_latest_version_count: u64,
    pub private_package_count: u64,
}

/// Aggregated ingestion statistics for the period
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionSummary {
    pub total_epv_ingestion_count: u64,
    #[serde(flatten)]
    pub ecosystems: BTreeMap<String, EcosystemIngestionStats>,
    pub incorrect_latest_versions: Vec<LatestVersionMismatch>,
    /// EPVs the graph does not know about
    pub unknown_deps: Vec<Epv>,
}

/// The ingestion report document persisted to object storage
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub report: ReportHeader,
    pub ingestion_summary: IngestionSummary,
    pub ingestion_details: IngestionDetails,
}

/// ecosystem → packages whose actual latest version is missing from the
/// graph; the trigger list for re-ingestion
pub type MissingLatestNodes = BTreeMap<String, Vec<String>>;

/// Current graph state of one previously unknown dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpvIngestionStatus {
    pub package: String,
    pub version: String,
    pub ingested_in_graph: bool,
}
