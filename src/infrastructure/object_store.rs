//! JSON document storage on S3-compatible object storage
//!
//! Reports live under `{deployment_prefix}/{section}/{report_name}.json`.
//! Writes overwrite: re-running a report for the same date replaces it.

use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ObjectStoreConfig;
use crate::domain::report::errors::ReportError;

/// Object-store client scoped to one deployment prefix
pub struct ObjectStore {
    client: S3Client,
    report_bucket: String,
    deployment_prefix: String,
}

impl ObjectStore {
    /// Build a client from configuration.
    ///
    /// The endpoint override (with path-style addressing) exists for local
    /// deployments against minio.
    pub fn from_config(config: &ObjectStoreConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "venus-report",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
            report_bucket: config.report_bucket.clone(),
            deployment_prefix: config.deployment_prefix.clone(),
        }
    }

    pub fn report_bucket(&self) -> &str {
        &self.report_bucket
    }

    pub fn deployment_prefix(&self) -> &str {
        &self.deployment_prefix
    }

    /// `{deployment_prefix}/{rest}`
    pub fn prefixed_key(&self, rest: &str) -> String {
        format!("{}/{}", self.deployment_prefix, rest)
    }

    /// `{deployment_prefix}/{section}/{report_name}.json`
    pub fn report_key(&self, section: &str, report_name: &str) -> String {
        format!(
            "{}/{}/{}.json",
            self.deployment_prefix, section, report_name
        )
    }

    /// Store a JSON document, overwriting any existing object at the key.
    pub async fn put_json<T: Serialize>(
        &self,
        bucket: &str,
        key: &str,
        content: &T,
    ) -> Result<(), ReportError> {
        let body = serde_json::to_vec_pretty(content)?;

        info!(bucket = %bucket, key = %key, "storing report object");
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ReportError::storage(e.to_string()))?;

        Ok(())
    }

    /// Read a JSON document; a missing key is `None`, not an error.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<T>, ReportError> {
        let response = match self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    debug!(bucket = %bucket, key = %key, "no such key");
                    return Ok(None);
                }
                return Err(ReportError::storage(service_err.to_string()));
            }
        };

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| ReportError::storage(e.to_string()))?
            .into_bytes();

        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
