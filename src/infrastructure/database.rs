//! Parameterized queries against the analysis database
//!
//! Every query binds its parameters; no value is ever interpolated into the
//! SQL text. The fetch boundary is also where raw worker rows become typed
//! [`StackRecord`]s, so the rest of the pipeline sees exactly one malformed
//! -record signal.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::domain::ingestion::entities::Epv;
use crate::domain::report::entities::StackRecord;
use crate::domain::report::errors::ReportError;
use crate::domain::report::value_objects::ReportPeriod;

/// Read-only query surface for report generation.
///
/// Holds one pool per run; queries reuse it sequentially.
pub struct ReportQueries {
    pool: PgPool,
}

impl ReportQueries {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the connection pool described by configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ReportError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                tracing::error!("Database connection failed: {}", e);
                ReportError::database(e.to_string())
            })?;
        Ok(Self::new(pool))
    }

    /// Ids of stack-analysis requests submitted within the period.
    #[instrument(skip(self))]
    pub async fn stack_analysis_ids(
        &self,
        period: &ReportPeriod,
    ) -> Result<Vec<String>, ReportError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM stack_analyses_request
            WHERE submit_time >= $1 AND submit_time < $2
            "#,
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Database error fetching stack analysis ids: {}", e);
            ReportError::database(e.to_string())
        })?;

        Ok(ids)
    }

    /// Worker result rows for the given request ids, typed at the boundary.
    ///
    /// Each row independently becomes either a [`StackRecord`] or a
    /// malformed-record error; one bad row never hides the others.
    #[instrument(skip(self, ids), fields(ids = ids.len(), worker = worker))]
    pub async fn worker_results(
        &self,
        ids: &[String],
        worker: &str,
    ) -> Result<Vec<Result<StackRecord, ReportError>>, ReportError> {
        let rows = sqlx::query_scalar::<_, serde_json::Value>(
            r#"
            SELECT task_result FROM worker_results
            WHERE external_request_id = ANY($1) AND worker = $2
            "#,
        )
        .bind(ids)
        .bind(worker)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Database error fetching worker results: {}", e);
            ReportError::database(e.to_string())
        })?;

        Ok(rows
            .iter()
            .map(StackRecord::from_row_value)
            .collect())
    }

    /// EPVs whose analysis started within the period.
    #[instrument(skip(self))]
    pub async fn ingested_epvs(&self, period: &ReportPeriod) -> Result<Vec<Epv>, ReportError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT ec.name, pk.name, vr.identifier
            FROM analyses an
            JOIN versions vr ON an.version_id = vr.id
            JOIN packages pk ON vr.package_id = pk.id
            JOIN ecosystems ec ON pk.ecosystem_id = ec.id
            WHERE an.started_at >= $1 AND an.started_at < $2
            "#,
        )
        .bind(period.start)
        .bind(period.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Database error fetching ingested EPVs: {}", e);
            ReportError::database(e.to_string())
        })?;

        Ok(rows
            .into_iter()
            .map(|(ecosystem, package, version)| Epv::new(ecosystem, package, version))
            .collect())
    }
}
