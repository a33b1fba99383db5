//! EMR retraining API client

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::config::EmrConfig;
use crate::domain::report::errors::ReportError;

use super::resilience::{retry_with_fixed_backoff, RetryConfig};

const SERVICE: &str = "emr";

#[derive(Serialize)]
struct RetrainingJob<'a> {
    bucket_name: &'a str,
    github_repo: &'a str,
    ecosystem: &'a str,
    data_version: &'a str,
}

/// Client for the retraining job API
pub struct EmrClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl EmrClient {
    pub fn new(config: &EmrConfig, retry: RetryConfig) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .user_agent("venus-report/0.1.0")
            .build()
            .map_err(|e| ReportError::network(SERVICE, e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Kick off retraining for one ecosystem.
    ///
    /// Best-effort: a failed invocation is logged and swallowed so the
    /// remaining ecosystems still get their jobs.
    pub async fn run_retraining_job(
        &self,
        bucket_name: &str,
        ecosystem: &str,
        data_version: &str,
        github_repo: &str,
    ) {
        let url = format!("{}/api/v1/runjob", self.base_url);
        let outcome = retry_with_fixed_backoff(&self.retry, SERVICE, || async {
            let response = self
                .client
                .post(&url)
                .json(&RetrainingJob {
                    bucket_name,
                    github_repo,
                    ecosystem,
                    data_version,
                })
                .send()
                .await
                .map_err(|e| ReportError::network(SERVICE, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ReportError::Http {
                    service: SERVICE.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(())
        })
        .await;

        match outcome {
            Ok(()) => {
                info!(ecosystem = %ecosystem, "successfully invoked EMR API");
            }
            Err(err) => {
                error!(ecosystem = %ecosystem, error = %err, "failed to invoke EMR API");
            }
        }
    }
}
