//! In-memory graph collaborator double

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use venus_report::domain::ingestion::entities::{Epv, LatestVersionInfo};
use venus_report::domain::ingestion::repositories::GraphQueries;
use venus_report::domain::report::errors::ReportError;

/// Graph double answering from fixed maps and recording every existence
/// batch it was asked about.
#[derive(Default)]
pub struct MockGraph {
    pub existence: BTreeMap<String, String>,
    pub latest: BTreeMap<String, LatestVersionInfo>,
    pub exist_calls: Mutex<Vec<Vec<Epv>>>,
}

impl MockGraph {
    pub fn new(
        existence: BTreeMap<String, String>,
        latest: BTreeMap<String, LatestVersionInfo>,
    ) -> Self {
        Self {
            existence,
            latest,
            exist_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GraphQueries for MockGraph {
    async fn epvs_exist(&self, epvs: &[Epv]) -> Result<BTreeMap<String, String>, ReportError> {
        self.exist_calls
            .lock()
            .unwrap()
            .push(epvs.to_vec());
        Ok(epvs
            .iter()
            .filter_map(|epv| {
                let key = epv.graph_key();
                self.existence.get(&key).map(|v| (key, v.clone()))
            })
            .collect())
    }

    async fn latest_versions(
        &self,
        epvs: &[Epv],
    ) -> Result<BTreeMap<String, LatestVersionInfo>, ReportError> {
        Ok(epvs
            .iter()
            .filter_map(|epv| {
                let key = epv.package_key();
                self.latest.get(&key).map(|v| (key, v.clone()))
            })
            .collect())
    }
}

/// Convenience constructor for latest-version fixtures.
pub fn latest_info(known: &str, actual: &str) -> LatestVersionInfo {
    LatestVersionInfo {
        known_latest_version: known.to_string(),
        actual_latest_version: actual.to_string(),
    }
}
