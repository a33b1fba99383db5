//! Graph/registry query service client

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::error;

use crate::config::GraphConfig;
use crate::domain::ingestion::entities::{Epv, LatestVersionInfo};
use crate::domain::ingestion::repositories::GraphQueries;
use crate::domain::report::errors::ReportError;

use super::resilience::{retry_with_fixed_backoff, RetryConfig};

const SERVICE: &str = "graph";

#[derive(Serialize)]
struct EpvBatchRequest<'a> {
    epvs: &'a [Epv],
}

/// HTTP implementation of the graph collaborator interface.
///
/// Both operations are batch POSTs; the service answers with maps keyed by
/// its `@DELIM@` convention.
pub struct HttpGraphClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpGraphClient {
    pub fn new(config: &GraphConfig, retry: RetryConfig) -> Result<Self, ReportError> {
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

    async fn post_batch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        epvs: &[Epv],
    ) -> Result<T, ReportError> {
        let url = format!("{}{}", self.base_url, path);
        retry_with_fixed_backoff(&self.retry, SERVICE, || async {
            let response = self
                .client
                .post(&url)
                .json(&EpvBatchRequest { epvs })
                .send()
                .await
                .map_err(|e| ReportError::network(SERVICE, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                error!(url = %url, status = status.as_u16(), "graph query failed");
                return Err(ReportError::Http {
                    service: SERVICE.to_string(),
                    status: status.as_u16(),
                });
            }

            response
                .json::<T>()
                .await
                .map_err(|e| ReportError::graph(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl GraphQueries for HttpGraphClient {
    async fn epvs_exist(&self, epvs: &[Epv]) -> Result<BTreeMap<String, String>, ReportError> {
        if epvs.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.post_batch("/api/v1/epvs/exists", epvs).await
    }

    async fn latest_versions(
        &self,
        epvs: &[Epv],
    ) -> Result<BTreeMap<String, LatestVersionInfo>, ReportError> {
        if epvs.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.post_batch("/api/v1/epvs/latest-version", epvs).await
    }
}
