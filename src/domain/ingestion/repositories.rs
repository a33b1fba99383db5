//! Graph collaborator interface

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::entities::{Epv, LatestVersionInfo};
use crate::domain::report::errors::ReportError;

/// Batch lookups answered by the external graph/registry service.
///
/// Both calls take the EPV triples of interest and return maps keyed by the
/// graph's `@DELIM@` convention; see
/// [`Epv::graph_key`](super::entities::Epv::graph_key) and
/// [`Epv::package_key`](super::entities::Epv::package_key).
#[async_trait]
pub trait GraphQueries: Send + Sync {
    /// Does each EPV exist in the graph?
    ///
    /// Result keys are full graph keys, values the strings `"true"` or
    /// `"false"` as the service reports them.
    async fn epvs_exist(&self, epvs: &[Epv]) -> Result<BTreeMap<String, String>, ReportError>;

    /// Known and actual latest version for each distinct package.
    ///
    /// Result keys are package-level graph keys.
    async fn latest_versions(
        &self,
        epvs: &[Epv],
    ) -> Result<BTreeMap<String, LatestVersionInfo>, ReportError>;
}
