//! Ingestion reconciliation
//!
//! Cross-references the EPVs observed as ingested in a period against the
//! graph store: per-version existence, latest-version correctness, and the
//! list of packages whose actual latest version is missing from the graph
//! (the re-ingestion trigger list).

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::application::normalizer::report_header;
use crate::domain::ingestion::entities::{
    Epv, IngestionDetails, IngestionReport, IngestionSummary, LatestVersionMismatch,
    MissingLatestNodes, VersionEntry, GRAPH_KEY_DELIMITER,
};
use crate::domain::ingestion::repositories::GraphQueries;
use crate::domain::report::errors::ReportError;
use crate::domain::report::value_objects::ReportPeriod;

/// Result of one reconciliation pass
#[derive(Debug)]
pub struct ReconciliationOutcome {
    pub report: IngestionReport,
    pub missing_latest_nodes: MissingLatestNodes,
}

/// Reconciles ingested EPVs against the graph collaborator
pub struct IngestionReconciler {
    graph: Arc<dyn GraphQueries>,
}

impl IngestionReconciler {
    pub fn new(graph: Arc<dyn GraphQueries>) -> Self {
        Self { graph }
    }

    #[instrument(skip(self, epvs), fields(epvs = epvs.len()))]
    pub async fn reconcile(
        &self,
        epvs: Vec<Epv>,
        period: &ReportPeriod,
    ) -> Result<ReconciliationOutcome, ReportError> {
        let mut details: IngestionDetails = BTreeMap::new();
        let mut summary = IngestionSummary::default();
        let mut missing_latest_nodes = MissingLatestNodes::new();

        if epvs.is_empty() {
            return Ok(ReconciliationOutcome {
                report: IngestionReport {
                    report: report_header(period),
                    ingestion_summary: summary,
                    ingestion_details: details,
                },
                missing_latest_nodes,
            });
        }

        // Pass 1: per-version existence in the graph.
        let existence = self.graph.epvs_exist(&epvs).await?;
        for epv in &epvs {
            summary.total_epv_ingestion_count += 1;
            let stats = summary.ecosystems.entry(epv.ecosystem.clone()).or_default();
            stats.epv_ingestion_count += 1;

            // An EPV the graph response omits is indistinguishable from one
            // it does not know about.
            let ingested = existence
                .get(&epv.graph_key())
                .map(|v| v == "true")
                .unwrap_or(false);
            if !ingested {
                stats.failed_epv_ingestion_count += 1;
                summary.unknown_deps.push(epv.clone());
            }

            details
                .entry(epv.ecosystem.clone())
                .or_default()
                .entry(epv.package.clone())
                .or_default()
                .versions
                .push(VersionEntry {
                    version: epv.version.clone(),
                    ingested_in_graph: ingested,
                });
        }

        // Latest-version correctness, once per distinct package.
        let latest = self.graph.latest_versions(&epvs).await?;
        for (ecosystem, packages) in details.iter_mut() {
            let stats = summary.ecosystems.entry(ecosystem.clone()).or_default();
            for (package, ingestion) in packages.iter_mut() {
                let key = format!("{}{}{}", ecosystem, GRAPH_KEY_DELIMITER, package);
                let Some(info) = latest.get(&key) else {
                    continue;
                };

                ingestion.known_latest_version = info.known_latest_version.clone();
                ingestion.actual_latest_version = info.actual_latest_version.clone();
                ingestion.package_known = !info.known_latest_version.is_empty();

                if info.actual_latest_version.is_empty() {
                    // No publicly resolvable latest version: private package,
                    // excluded from mismatch accounting.
                    ingestion.private_package = true;
                    stats.private_package_count += 1;
                    continue;
                }

                if !info.known_latest_version.is_empty()
                    && info.known_latest_version != info.actual_latest_version
                {
                    stats.incorrect_latest_version_count += 1;
                    summary.incorrect_latest_versions.push(LatestVersionMismatch {
                        ecosystem: ecosystem.clone(),
                        package: package.clone(),
                        known_latest_version: info.known_latest_version.clone(),
                        actual_latest_version: info.actual_latest_version.clone(),
                    });
                }
            }
        }

        for stats in summary.ecosystems.values_mut() {
            stats.epv_successfully_ingested_count =
                stats.epv_ingestion_count - stats.failed_epv_ingestion_count;
        }

        // Pass 2: does each package's *actual latest* version exist in the
        // graph? Only an explicit "false" joins the trigger list; an omitted
        // answer must not kick off spurious re-ingestion.
        let latest_epvs: Vec<Epv> = details
            .iter()
            .flat_map(|(ecosystem, packages)| {
                packages.iter().filter_map(|(package, ingestion)| {
                    if ingestion.actual_latest_version.is_empty() {
                        None
                    } else {
                        Some(Epv::new(
                            ecosystem.clone(),
                            package.clone(),
                            ingestion.actual_latest_version.clone(),
                        ))
                    }
                })
            })
            .collect();

        if !latest_epvs.is_empty() {
            let latest_existence = self.graph.epvs_exist(&latest_epvs).await?;
            for epv in &latest_epvs {
                if latest_existence.get(&epv.graph_key()).map(String::as_str) == Some("false") {
                    missing_latest_nodes
                        .entry(epv.ecosystem.clone())
                        .or_default()
                        .push(epv.package.clone());
                }
            }
        }

        info!(
            total = summary.total_epv_ingestion_count,
            failed = summary.unknown_deps.len(),
            missing_latest = missing_latest_nodes.values().map(Vec::len).sum::<usize>(),
            "ingestion reconciliation complete"
        );

        Ok(ReconciliationOutcome {
            report: IngestionReport {
                report: report_header(period),
                ingestion_summary: summary,
                ingestion_details: details,
            },
            missing_latest_nodes,
        })
    }
}
