//! Historical collation and model retraining side channel
//!
//! On boundary days the current period's unique-stack frequencies are merged
//! into a persisted collation document (read-modify-write against object
//! storage) and the result is turned into per-ecosystem training manifests
//! that seed model retraining. At-least-once, best-effort: nothing here may
//! fail the main report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::config::RetrainingConfig;
use crate::domain::report::value_objects::{Ecosystem, FrequencyMap, ReportFrequency};
use crate::infrastructure::emr::EmrClient;
use crate::infrastructure::object_store::ObjectStore;

/// Collated stack data for one ecosystem
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EcoCollation {
    #[serde(default)]
    pub user_input_stack: FrequencyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bigquery_data: Option<FrequencyMap>,
}

/// ecosystem name → collated stacks
pub type CollatedData = BTreeMap<String, EcoCollation>;

/// Training manifest for one ecosystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingData {
    pub ecosystem: String,
    pub package_dict: PackageDict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageDict {
    pub user_input_stack: Vec<Vec<String>>,
    pub bigquery_data: Vec<Vec<String>>,
}

/// Merge the current period's unique-stack frequencies into an existing
/// collation, summing counts per stack and keeping every ecosystem present
/// on either side.
pub fn merge_collated(
    mut existing: CollatedData,
    current: &BTreeMap<Ecosystem, FrequencyMap>,
) -> CollatedData {
    for (eco, stacks) in current {
        let entry = existing.entry(eco.to_string()).or_default();
        for (stack, count) in stacks {
            *entry.user_input_stack.entry(stack.clone()).or_insert(0) += count;
        }
    }
    existing
}

/// Reduce one ecosystem's collation to unique package lists for training.
///
/// A stack key is `"pkg1 v1,pkg2 v2"`; training wants bare package-name
/// lists, deduplicated on the concatenated package names across both data
/// sources.
pub fn build_training_data(ecosystem: &str, collation: &EcoCollation) -> TrainingData {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut package_dict = PackageDict::default();

    let mut reduce = |stacks: &FrequencyMap, out: &mut Vec<Vec<String>>| {
        for stack in stacks.keys() {
            let package_list: Vec<String> = stack
                .split(',')
                .filter_map(|dep| dep.trim().split(' ').next())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            let fingerprint = package_list.concat();
            if seen.insert(fingerprint) {
                out.push(package_list);
            }
        }
    };

    reduce(&collation.user_input_stack, &mut package_dict.user_input_stack);
    if let Some(bigquery) = &collation.bigquery_data {
        reduce(bigquery, &mut package_dict.bigquery_data);
    }

    TrainingData {
        ecosystem: ecosystem.to_string(),
        package_dict,
    }
}

/// Collation and retraining service
pub struct CollationService {
    store: Arc<ObjectStore>,
    emr: Arc<EmrClient>,
    config: RetrainingConfig,
}

impl CollationService {
    pub fn new(store: Arc<ObjectStore>, emr: Arc<EmrClient>, config: RetrainingConfig) -> Self {
        Self { store, emr, config }
    }

    /// Read-modify-write the persisted collation for this cadence, then fold
    /// in the separately collated big-query data.
    #[instrument(skip(self, unique_stacks))]
    pub async fn collate_raw_data(
        &self,
        unique_stacks: &BTreeMap<Ecosystem, FrequencyMap>,
        frequency: ReportFrequency,
    ) -> Option<CollatedData> {
        let key = self
            .store
            .prefixed_key(&format!("user-input-data/collated-{}.json", frequency));

        let existing: CollatedData = match self.store.get_json(self.store.report_bucket(), &key).await
        {
            Ok(found) => found.unwrap_or_default(),
            Err(err) => {
                error!(error = %err, key = %key, "unable to read collated user input data");
                return None;
            }
        };

        let mut result = merge_collated(existing, unique_stacks);

        if let Err(err) = self
            .store
            .put_json(self.store.report_bucket(), &key, &result)
            .await
        {
            error!(error = %err, key = %key, "unable to store collated user input data");
        }

        let big_query_key = self.store.prefixed_key("big-query-data/collated.json");
        match self
            .store
            .get_json::<BTreeMap<String, FrequencyMap>>(self.store.report_bucket(), &big_query_key)
            .await
        {
            Ok(Some(big_query)) => {
                for (eco, stacks) in big_query {
                    result.entry(eco).or_default().bigquery_data = Some(stacks);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, key = %big_query_key, "unable to read collated big-query data");
            }
        }

        Some(result)
    }

    /// Store training manifests in their per-ecosystem model buckets and
    /// kick the retraining job for each.
    #[instrument(skip(self, collated))]
    pub async fn store_training_data(&self, collated: &CollatedData, today: NaiveDate) {
        let model_version = today.format("%Y-%m-%d").to_string();

        for (eco, collation) in collated {
            // Ecosystems without a configured training target are skipped.
            let Some(target) = self.config.ecosystems.get(eco) else {
                continue;
            };

            let training_data = build_training_data(eco, collation);
            let obj_key = format!(
                "{}/{}/{}/data/manifest.json",
                eco,
                self.store.deployment_prefix(),
                model_version
            );

            info!(
                ecosystem = %eco,
                bucket = %target.model_bucket,
                key = %obj_key,
                "storing user-input stacks for retraining"
            );
            if let Err(err) = self
                .store
                .put_json(&target.model_bucket, &obj_key, &training_data)
                .await
            {
                error!(error = %err, ecosystem = %eco, "unable to store training data");
                continue;
            }

            self.emr
                .run_retraining_job(
                    &target.model_bucket,
                    eco,
                    &model_version,
                    &target.training_repo,
                )
                .await;
        }
    }

    /// Boundary entry point: collate this period's stacks and, when asked,
    /// retrain. Never fails the caller.
    pub async fn collate_and_retrain(
        &self,
        unique_stacks: &BTreeMap<Ecosystem, FrequencyMap>,
        frequency: ReportFrequency,
        today: NaiveDate,
        retrain: bool,
    ) {
        if !self.config.enabled {
            return;
        }
        let Some(collated) = self.collate_raw_data(unique_stacks, frequency).await else {
            return;
        };
        if retrain {
            self.store_training_data(&collated, today).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacks(entries: &[(&str, u64)]) -> FrequencyMap {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn merge_sums_counts_and_unions_ecosystems() {
        let mut existing = CollatedData::new();
        existing.insert(
            "npm".to_string(),
            EcoCollation {
                user_input_stack: stacks(&[("a 1,b 2", 3)]),
                bigquery_data: None,
            },
        );

        let mut current = BTreeMap::new();
        current.insert(Ecosystem::Npm, stacks(&[("a 1,b 2", 2), ("c 3", 1)]));
        current.insert(Ecosystem::Maven, stacks(&[("x 1", 1)]));

        let merged = merge_collated(existing, &current);
        assert_eq!(merged["npm"].user_input_stack.get("a 1,b 2"), Some(&5));
        assert_eq!(merged["npm"].user_input_stack.get("c 3"), Some(&1));
        assert_eq!(merged["maven"].user_input_stack.get("x 1"), Some(&1));
    }

    #[test]
    fn merge_keeps_previous_ecosystems() {
        let mut existing = CollatedData::new();
        existing.insert(
            "pypi".to_string(),
            EcoCollation {
                user_input_stack: stacks(&[("old 1", 7)]),
                bigquery_data: None,
            },
        );
        let merged = merge_collated(existing, &BTreeMap::new());
        assert_eq!(merged["pypi"].user_input_stack.get("old 1"), Some(&7));
    }

    #[test]
    fn training_data_extracts_package_names() {
        let collation = EcoCollation {
            user_input_stack: stacks(&[("serve-static 1.7.1,lodash 4.17.4", 2)]),
            bigquery_data: None,
        };
        let training = build_training_data("npm", &collation);
        assert_eq!(training.ecosystem, "npm");
        assert_eq!(
            training.package_dict.user_input_stack,
            vec![vec!["serve-static".to_string(), "lodash".to_string()]]
        );
        assert!(training.package_dict.bigquery_data.is_empty());
    }

    #[test]
    fn training_data_dedupes_across_sources() {
        let collation = EcoCollation {
            user_input_stack: stacks(&[("a 1,b 2", 1)]),
            bigquery_data: Some(stacks(&[("a 9,b 8", 1), ("c 1", 1)])),
        };
        let training = build_training_data("maven", &collation);
        // "a 9,b 8" reduces to the same package list as "a 1,b 2"
        assert_eq!(training.package_dict.user_input_stack.len(), 1);
        assert_eq!(
            training.package_dict.bigquery_data,
            vec![vec!["c".to_string()]]
        );
    }
}
