//! One report run, end to end
//!
//! Sequences the sub-reports for a period and keeps them isolated: a failure
//! in one sub-report is logged and recorded, never allowed to take the
//! others down. Whether each report actually reached storage is part of the
//! run summary.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::application::collation::CollationService;
use crate::application::error_report::build_error_report;
use crate::application::normalizer::ReportNormalizer;
use crate::application::reconciler::IngestionReconciler;
use crate::application::unknown_deps::UnknownDepsTracker;
use crate::domain::ingestion::entities::MissingLatestNodes;
use crate::domain::report::entities::ReportTemplate;
use crate::domain::report::errors::ReportError;
use crate::domain::report::value_objects::{
    Ecosystem, FrequencyMap, ReportFrequency, ReportPeriod,
};
use crate::infrastructure::database::ReportQueries;
use crate::infrastructure::error_tracking::ErrorTrackingClient;
use crate::infrastructure::ingestion_trigger::IngestionTriggerClient;
use crate::infrastructure::object_store::ObjectStore;

/// Object-store section for ingestion reports
const INGESTION_REPORT_SECTION: &str = "ingestion-data/epv";
/// Object-store section for error reports
const ERROR_REPORT_SECTION: &str = "sentry-error-data";

/// Outcome of one run: what was generated, what actually got persisted,
/// and what re-ingestion was triggered.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// `None` = report not generated this run
    pub stacks_report_persisted: Option<bool>,
    pub ingestion_report_persisted: Option<bool>,
    pub error_report_persisted: Option<bool>,
    pub missing_latest_nodes: MissingLatestNodes,
    /// ecosystem → HTTP status of the re-ingestion trigger
    pub ingestion_trigger_statuses: BTreeMap<String, u16>,
}

/// Orchestrates one report run
pub struct ReportRunner {
    queries: ReportQueries,
    store: Arc<ObjectStore>,
    normalizer: ReportNormalizer,
    reconciler: IngestionReconciler,
    collation: CollationService,
    unknown_deps: UnknownDepsTracker,
    /// Absent when no error-tracking endpoint is configured
    error_tracking: Option<ErrorTrackingClient>,
    ingestion_trigger: IngestionTriggerClient,
    workers: Vec<String>,
}

impl ReportRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queries: ReportQueries,
        store: Arc<ObjectStore>,
        normalizer: ReportNormalizer,
        reconciler: IngestionReconciler,
        collation: CollationService,
        unknown_deps: UnknownDepsTracker,
        error_tracking: Option<ErrorTrackingClient>,
        ingestion_trigger: IngestionTriggerClient,
        workers: Vec<String>,
    ) -> Self {
        Self {
            queries,
            store,
            normalizer,
            reconciler,
            collation,
            unknown_deps,
            error_tracking,
            ingestion_trigger,
            workers,
        }
    }

    /// Run all sub-reports for the period.
    ///
    /// Daily runs carry the full set (error report, ingestion
    /// reconciliation + re-ingestion trigger, stacks report); weekly runs
    /// add the collation/retraining side channel; monthly runs produce the
    /// stacks report alone.
    #[instrument(skip(self), fields(frequency = %frequency))]
    pub async fn run(
        &self,
        period: &ReportPeriod,
        frequency: ReportFrequency,
        today: NaiveDate,
    ) -> Result<RunSummary, ReportError> {
        let mut summary = RunSummary::default();

        if frequency == ReportFrequency::Daily {
            summary.error_report_persisted = self.generate_error_report(period).await;

            let (persisted, missing) = self.generate_ingestion_report(period, frequency).await;
            summary.ingestion_report_persisted = persisted;
            if !missing.is_empty() {
                summary.ingestion_trigger_statuses =
                    self.ingestion_trigger.ingest_epvs(&missing).await;
            }
            summary.missing_latest_nodes = missing;
        }

        summary.stacks_report_persisted =
            self.generate_stacks_report(period, frequency, today).await;

        info!(summary = ?summary, "report run complete");
        Ok(summary)
    }

    /// Persist a report document, reporting success as a flag instead of
    /// failing the run.
    async fn persist(&self, section: &str, report_name: &str, content: &impl Serialize) -> bool {
        let key = self.store.report_key(section, report_name);
        match self
            .store
            .put_json(self.store.report_bucket(), &key, content)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, key = %key, "unable to store the report");
                false
            }
        }
    }

    async fn generate_error_report(&self, period: &ReportPeriod) -> Option<bool> {
        let client = self.error_tracking.as_ref()?;

        let digests = match client.recent_issue_digests().await {
            Ok(digests) => digests,
            Err(err) => {
                error!(error = %err, "unable to retrieve error-tracking issues");
                return None;
            }
        };
        if digests.is_empty() {
            info!("no error events found in the last 24 hours");
            return None;
        }

        let report = build_error_report(digests);
        let report_name = period.report_name(ReportFrequency::Daily);
        Some(self.persist(ERROR_REPORT_SECTION, &report_name, &report).await)
    }

    async fn generate_ingestion_report(
        &self,
        period: &ReportPeriod,
        frequency: ReportFrequency,
    ) -> (Option<bool>, MissingLatestNodes) {
        let epvs = match self.queries.ingested_epvs(period).await {
            Ok(epvs) => epvs,
            Err(err) => {
                error!(error = %err, "unable to fetch ingestion rows");
                return (None, MissingLatestNodes::new());
            }
        };
        if epvs.is_empty() {
            error!(
                from = %period.from_str_date(),
                to = %period.to_str_date(),
                "no ingestion data found to generate report"
            );
            return (None, MissingLatestNodes::new());
        }

        let outcome = match self.reconciler.reconcile(epvs, period).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "ingestion reconciliation failed");
                return (None, MissingLatestNodes::new());
            }
        };

        let report_name = period.report_name(frequency);
        let persisted = self
            .persist(INGESTION_REPORT_SECTION, &report_name, &outcome.report)
            .await;
        (Some(persisted), outcome.missing_latest_nodes)
    }

    async fn generate_stacks_report(
        &self,
        period: &ReportPeriod,
        frequency: ReportFrequency,
        today: NaiveDate,
    ) -> Option<bool> {
        let ids = match self.queries.stack_analysis_ids(period).await {
            Ok(ids) => ids,
            Err(err) => {
                error!(error = %err, "unable to fetch stack analysis ids");
                return None;
            }
        };
        if ids.is_empty() {
            error!(
                from = %period.from_str_date(),
                to = %period.to_str_date(),
                "no stack analyses found to generate an aggregated report"
            );
            return None;
        }

        let mut persisted = None;
        for worker in &self.workers {
            let records = match self.queries.worker_results(&ids, worker).await {
                Ok(records) => records,
                Err(err) => {
                    error!(worker = %worker, error = %err, "unable to fetch worker results");
                    continue;
                }
            };

            let Some(mut template) =
                self.normalizer.normalize_worker_data(worker, records, period)
            else {
                continue;
            };

            if frequency == ReportFrequency::Daily {
                self.attach_unknown_deps_status(&mut template, today).await;
            }

            let report_name = period.report_name(frequency);
            persisted = Some(
                self.persist(frequency.as_str(), &report_name, &template)
                    .await,
            );

            self.run_collation_boundaries(&template, frequency, today)
                .await;
        }
        persisted
    }

    /// Fold the previous day's unknown-dependency ingestion status into the
    /// per-ecosystem summaries.
    async fn attach_unknown_deps_status(&self, template: &mut ReportTemplate, today: NaiveDate) {
        let status = self.unknown_deps.previous_day_status(today).await;
        for (eco_name, entries) in status {
            let Ok(eco) = eco_name.parse::<Ecosystem>() else {
                continue;
            };
            if let Some(summary) = template.stacks_summary.ecosystems.get_mut(&eco) {
                summary.previously_unknown_dependencies = entries;
            }
        }
    }

    /// Collation side channel. Weekly runs collate and retrain; a daily run
    /// on the first of the month rolls the month's collation forward.
    /// Best-effort either way.
    async fn run_collation_boundaries(
        &self,
        template: &ReportTemplate,
        frequency: ReportFrequency,
        today: NaiveDate,
    ) {
        let unique_stacks: BTreeMap<Ecosystem, FrequencyMap> = template
            .stacks_summary
            .ecosystems
            .iter()
            .map(|(eco, summary)| (*eco, summary.unique_stacks_with_frequency.clone()))
            .collect();

        match frequency {
            ReportFrequency::Weekly => {
                self.collation
                    .collate_and_retrain(&unique_stacks, ReportFrequency::Weekly, today, true)
                    .await;
            }
            ReportFrequency::Daily if today.day() == 1 => {
                self.collation
                    .collate_and_retrain(&unique_stacks, ReportFrequency::Monthly, today, false)
                    .await;
            }
            _ => {}
        }
    }
}

/// Is `today` the weekly retraining boundary?
pub fn is_weekly_boundary(today: NaiveDate) -> bool {
    today.weekday() == Weekday::Mon
}

/// Are we in the monthly report window? Three attempts are made every month.
pub fn is_monthly_window(today: NaiveDate) -> bool {
    (1..=3).contains(&today.day())
}
