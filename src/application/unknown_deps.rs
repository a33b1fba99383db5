//! Ingestion status of previously reported unknown dependencies
//!
//! The previous day's persisted report lists dependencies the platform could
//! not resolve. This service checks which of those have since been ingested
//! into the graph, so the new report can show progress.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use crate::domain::ingestion::entities::{Epv, EpvIngestionStatus};
use crate::domain::ingestion::repositories::GraphQueries;
use crate::domain::report::value_objects::Ecosystem;
use crate::infrastructure::object_store::ObjectStore;

/// ecosystem name → previously unknown dependencies with current state
pub type UnknownDepsStatus = BTreeMap<String, Vec<EpvIngestionStatus>>;

/// Tracks previously unknown dependencies across daily reports
pub struct UnknownDepsTracker {
    store: Arc<ObjectStore>,
    graph: Arc<dyn GraphQueries>,
}

impl UnknownDepsTracker {
    pub fn new(store: Arc<ObjectStore>, graph: Arc<dyn GraphQueries>) -> Self {
        Self { store, graph }
    }

    /// Extract per-ecosystem unknown dependencies from a persisted report
    /// document.
    ///
    /// Keys are `"package version"` strings; entries that do not split into
    /// exactly that shape are logged and dropped.
    pub fn unknown_deps_from_report(report: &serde_json::Value) -> Vec<Epv> {
        let mut epvs = Vec::new();
        for eco in Ecosystem::ALL {
            let pointer = format!(
                "/stacks_summary/{}/unique_unknown_dependencies_with_frequency",
                eco
            );
            let Some(deps) = report.pointer(&pointer).and_then(|v| v.as_object()) else {
                continue;
            };
            for key in deps.keys() {
                let mut parts = key.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(package), Some(version)) => {
                        epvs.push(Epv::new(eco.as_str(), package, version));
                    }
                    _ => {
                        info!(entry = %key, "incorrect name value pair found in unknown list");
                    }
                }
            }
        }
        epvs
    }

    /// Current graph state of the dependencies the previous day's report
    /// listed as unknown. Best-effort: any failure yields an empty result.
    #[instrument(skip(self))]
    pub async fn previous_day_status(&self, today: NaiveDate) -> UnknownDepsStatus {
        let past_date = (today - chrono::Duration::days(1))
            .format("%Y-%m-%d")
            .to_string();
        let key = self.store.report_key("daily", &past_date);

        let report: serde_json::Value = match self
            .store
            .get_json(self.store.report_bucket(), &key)
            .await
        {
            Ok(Some(report)) => report,
            Ok(None) => {
                info!(key = %key, "no previous daily report found");
                return UnknownDepsStatus::new();
            }
            Err(err) => {
                warn!(error = %err, key = %key, "unable to read previous daily report");
                return UnknownDepsStatus::new();
            }
        };

        let epvs = Self::unknown_deps_from_report(&report);
        if epvs.is_empty() {
            return UnknownDepsStatus::new();
        }

        let existence = match self.graph.epvs_exist(&epvs).await {
            Ok(existence) => existence,
            Err(err) => {
                warn!(error = %err, "unable to check ingestion status of unknown dependencies");
                return UnknownDepsStatus::new();
            }
        };

        let mut status = UnknownDepsStatus::new();
        for epv in epvs {
            let ingested = existence
                .get(&epv.graph_key())
                .map(|v| v == "true")
                .unwrap_or(false);
            status
                .entry(epv.ecosystem.clone())
                .or_default()
                .push(EpvIngestionStatus {
                    package: epv.package,
                    version: epv.version,
                    ingested_in_graph: ingested,
                });
        }
        status
    }
}
