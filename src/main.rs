//! Venus Report - batch entry point
//!
//! Invoked by the platform cron. One invocation generates the daily report
//! set and, on boundary days, the weekly retraining run and the monthly
//! report.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use clap::Parser;

use venus_report::application::collation::CollationService;
use venus_report::application::normalizer::ReportNormalizer;
use venus_report::application::reconciler::IngestionReconciler;
use venus_report::application::runner::{
    is_monthly_window, is_weekly_boundary, ReportRunner,
};
use venus_report::application::unknown_deps::UnknownDepsTracker;
use venus_report::domain::ingestion::repositories::GraphQueries;
use venus_report::domain::report::value_objects::{ReportFrequency, ReportPeriod};
use venus_report::infrastructure::database::ReportQueries;
use venus_report::infrastructure::emr::EmrClient;
use venus_report::infrastructure::error_tracking::ErrorTrackingClient;
use venus_report::infrastructure::graph::HttpGraphClient;
use venus_report::infrastructure::ingestion_trigger::IngestionTriggerClient;
use venus_report::infrastructure::object_store::ObjectStore;
use venus_report::{init_tracing, Config};

#[derive(Parser)]
#[command(
    name = "venus-report",
    about = "Generate aggregated stack-analysis and ingestion reports"
)]
struct Cli {
    /// Report period start date (YYYY-MM-DD); defaults follow the cadence
    #[arg(long)]
    start_date: Option<String>,

    /// Report period end date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    end_date: Option<String>,

    /// Run one report at this cadence (daily|weekly|monthly) instead of the
    /// scheduled set
    #[arg(long)]
    frequency: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if it's not a "file not found" error
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let config = Config::load().context(
        "Failed to load configuration. Check DATABASE_URL and VENUS__* env vars",
    )?;
    init_tracing(&config.logging)?;

    tracing::info!("Starting venus-report run");

    let runner = build_runner(&config).await?;
    let today = Utc::now().date_naive();

    match (&cli.start_date, &cli.end_date, &cli.frequency) {
        (Some(start), Some(end), frequency) => {
            let period = ReportPeriod::parse(start, end)?;
            let frequency = frequency
                .as_deref()
                .unwrap_or("daily")
                .parse::<ReportFrequency>()?;
            runner.run(&period, frequency, today).await?;
        }
        (None, None, None) => {
            run_scheduled(&runner, today).await?;
        }
        _ => {
            anyhow::bail!("--start-date and --end-date must be given together");
        }
    }

    tracing::info!("venus-report run complete");
    Ok(())
}

/// The cron schedule: daily always, weekly retraining on Mondays, monthly
/// report in the first three days of the month.
async fn run_scheduled(runner: &ReportRunner, today: NaiveDate) -> anyhow::Result<()> {
    let daily_period = ReportPeriod {
        start: today - Duration::days(1),
        end: today,
    };
    tracing::info!(
        from = %daily_period.from_str_date(),
        to = %daily_period.to_str_date(),
        "generating daily report"
    );
    runner.run(&daily_period, ReportFrequency::Daily, today).await?;

    if is_weekly_boundary(today) {
        let weekly_period = ReportPeriod {
            start: today - Duration::days(7),
            end: today,
        };
        tracing::info!("weekly job triggered");
        runner
            .run(&weekly_period, ReportFrequency::Weekly, today)
            .await?;
    }

    if is_monthly_window(today) {
        let period = previous_month_period(today)?;
        tracing::info!(
            from = %period.from_str_date(),
            to = %period.to_str_date(),
            "generating monthly report"
        );
        runner.run(&period, ReportFrequency::Monthly, today).await?;
    }

    Ok(())
}

/// Full previous calendar month, as `[first day, last day]`.
fn previous_month_period(today: NaiveDate) -> anyhow::Result<ReportPeriod> {
    let first_of_this_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .context("invalid current month")?;
    let last_of_prev_month = first_of_this_month - Duration::days(1);
    let first_of_prev_month =
        NaiveDate::from_ymd_opt(last_of_prev_month.year(), last_of_prev_month.month(), 1)
            .context("invalid previous month")?;
    Ok(ReportPeriod {
        start: first_of_prev_month,
        end: last_of_prev_month,
    })
}

async fn build_runner(config: &Config) -> anyhow::Result<ReportRunner> {
    let retry = config.http.to_retry_config();

    let queries = ReportQueries::connect(&config.database)
        .await
        .context("Failed to connect to the analysis database")?;
    let store = Arc::new(ObjectStore::from_config(&config.object_store));
    let graph: Arc<dyn GraphQueries> =
        Arc::new(HttpGraphClient::new(&config.graph, retry.clone())?);

    let normalizer = ReportNormalizer::new(config.report.top_n);
    let reconciler = IngestionReconciler::new(Arc::clone(&graph));
    let emr = Arc::new(EmrClient::new(&config.emr, retry.clone())?);
    let collation = CollationService::new(
        Arc::clone(&store),
        emr,
        config.retraining.clone(),
    );
    let unknown_deps = UnknownDepsTracker::new(Arc::clone(&store), Arc::clone(&graph));

    let error_tracking = if config.error_tracking.issues_url.is_empty() {
        tracing::warn!("error-tracking endpoint not configured; skipping error reports");
        None
    } else {
        Some(ErrorTrackingClient::new(
            &config.error_tracking,
            retry.clone(),
        )?)
    };
    let ingestion_trigger = IngestionTriggerClient::new(&config.ingestion, retry)?;

    Ok(ReportRunner::new(
        queries,
        store,
        normalizer,
        reconciler,
        collation,
        unknown_deps,
        error_tracking,
        ingestion_trigger,
        config.report.workers.clone(),
    ))
}
