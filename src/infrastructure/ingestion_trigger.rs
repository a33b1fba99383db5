//! Re-ingestion trigger client
//!
//! Kicks off the ingestion flow for packages whose latest version is missing
//! from the graph. Authenticated with the shared `auth_token` header.

use std::collections::BTreeMap;

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::IngestionConfig;
use crate::domain::ingestion::entities::MissingLatestNodes;
use crate::domain::report::errors::ReportError;

use super::resilience::{retry_with_fixed_backoff, RetryConfig};

const SERVICE: &str = "ingestion";

#[derive(Serialize)]
struct IngestionRequest<'a> {
    ecosystem: &'a str,
    packages: &'a [String],
}

/// Client for the ingestion-trigger endpoint
pub struct IngestionTriggerClient {
    client: Client,
    url: String,
    auth_token: String,
    retry: RetryConfig,
}

impl IngestionTriggerClient {
    pub fn new(config: &IngestionConfig, retry: RetryConfig) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .user_agent("venus-report/0.1.0")
            .build()
            .map_err(|e| ReportError::network(SERVICE, e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            auth_token: config.auth_token.clone(),
            retry,
        })
    }

    /// Trigger re-ingestion per ecosystem.
    ///
    /// Failures are logged per ecosystem and never abort the remaining
    /// triggers; the result maps each attempted ecosystem to the response
    /// status.
    #[instrument(skip(self, missing), fields(ecosystems = missing.len()))]
    pub async fn ingest_epvs(&self, missing: &MissingLatestNodes) -> BTreeMap<String, u16> {
        let mut result = BTreeMap::new();

        for (ecosystem, packages) in missing {
            if packages.is_empty() {
                continue;
            }
            info!(
                ecosystem = %ecosystem,
                packages = packages.len(),
                "triggering ingestion flow for missing latest nodes"
            );

            let outcome = retry_with_fixed_backoff(&self.retry, SERVICE, || async {
                let response = self
                    .client
                    .post(&self.url)
                    .header("auth_token", &self.auth_token)
                    .json(&IngestionRequest {
                        ecosystem: ecosystem.as_str(),
                        packages: packages.as_slice(),
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
                Ok(status.as_u16())
            })
            .await;

            match outcome {
                Ok(status) => {
                    result.insert(ecosystem.clone(), status);
                }
                Err(err) => {
                    error!(ecosystem = %ecosystem, error = %err, "error while ingesting missing versions");
                }
            }
        }

        result
    }
}
