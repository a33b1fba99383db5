//! Report normalization
//!
//! Turns one period's worth of raw worker records into the nested
//! [`ReportTemplate`]. Individual malformed records are logged and skipped;
//! a bad record never aborts the batch.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use tracing::{instrument, warn};

use crate::application::frequency::{count_frequencies, stack_deps_counts};
use crate::application::trending::get_trending;
use crate::domain::report::entities::{
    EcosystemSummary, LicenseSection, ReportHeader, ReportTemplate, SecuritySection, StackDetail,
    StackRecord, StacksSummary,
};
use crate::domain::report::errors::ReportError;
use crate::domain::report::value_objects::{
    normalize_deps_list, Ecosystem, ReportPeriod,
};

/// Worker result type this normalizer understands
pub const STACK_AGGREGATOR_WORKER: &str = "stack_aggregator_v2";

const AUDIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Millisecond difference between two audit timestamps.
///
/// Always non-negative: workers occasionally record non-monotonic clocks and
/// a report must never show a negative duration.
pub fn datediff_in_millisecs(started_at: &str, ended_at: &str) -> Result<f64, ReportError> {
    let start = NaiveDateTime::parse_from_str(started_at, AUDIT_TIMESTAMP_FORMAT)
        .map_err(|e| ReportError::malformed(format!("bad started_at '{}': {}", started_at, e)))?;
    let end = NaiveDateTime::parse_from_str(ended_at, AUDIT_TIMESTAMP_FORMAT)
        .map_err(|e| ReportError::malformed(format!("bad ended_at '{}': {}", ended_at, e)))?;

    let delta = end.signed_duration_since(start);
    let micros = delta
        .num_microseconds()
        .unwrap_or_else(|| delta.num_milliseconds().saturating_mul(1000));
    Ok((micros as f64 / 1000.0).abs())
}

/// Builds [`ReportTemplate`] documents from raw worker records
#[derive(Debug, Clone)]
pub struct ReportNormalizer {
    top_n: usize,
}

impl ReportNormalizer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Normalize one worker's records for the period.
    ///
    /// Returns `None` for worker types the normalizer does not recognize:
    /// an unknown worker is a no-op, not an error.
    #[instrument(skip(self, records), fields(worker = worker, records = records.len()))]
    pub fn normalize_worker_data(
        &self,
        worker: &str,
        records: Vec<Result<StackRecord, ReportError>>,
        period: &ReportPeriod,
    ) -> Option<ReportTemplate> {
        if worker != STACK_AGGREGATOR_WORKER {
            return None;
        }
        Some(self.build_report(records, period))
    }

    fn build_report(
        &self,
        records: Vec<Result<StackRecord, ReportError>>,
        period: &ReportPeriod,
    ) -> ReportTemplate {
        // Partial-failure tolerance: structural errors were turned into
        // MalformedRecord at the fetch boundary; drop them here with a log.
        let mut valid: Vec<StackRecord> = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Ok(record) if record.dependencies.is_empty() => continue,
                Ok(record) => valid.push(record),
                Err(err) => warn!(error = %err, "skipping malformed analysis record"),
            }
        }

        let mut details: Vec<StackDetail> = Vec::with_capacity(valid.len());
        let mut request_counts: BTreeMap<Ecosystem, u64> = BTreeMap::new();
        let mut response_totals: BTreeMap<Ecosystem, f64> = BTreeMap::new();
        let mut total_response_time = 0.0f64;
        let mut all_cves: Vec<String> = Vec::new();
        let mut all_unknown_licenses: Vec<String> = Vec::new();

        for record in &valid {
            let response_time = match datediff_in_millisecs(&record.started_at, &record.ended_at) {
                Ok(ms) => ms,
                Err(err) => {
                    warn!(error = %err, "skipping record with unparseable audit timestamps");
                    continue;
                }
            };

            *request_counts.entry(record.ecosystem).or_insert(0) += 1;
            *response_totals.entry(record.ecosystem).or_insert(0.0) += response_time;
            total_response_time += response_time;

            for cve in &record.cves {
                all_cves.push(cve.frequency_key());
            }
            all_unknown_licenses.extend(record.unknown_licenses.iter().cloned());

            details.push(StackDetail {
                ecosystem: record.ecosystem,
                stack: normalize_deps_list(&record.dependencies),
                unknown_dependencies: normalize_deps_list(&record.unknown_dependencies),
                license: LicenseSection {
                    conflict: false,
                    unknown: record.unknown_licenses.clone(),
                },
                security: SecuritySection {
                    cve_list: record.cves.clone(),
                },
                response_time: format_millis(response_time),
            });
        }

        let frequencies = count_frequencies(&valid);

        let mut ecosystems: BTreeMap<Ecosystem, EcosystemSummary> = BTreeMap::new();
        for (eco, freqs) in frequencies {
            let count = request_counts.get(&eco).copied().unwrap_or(0);
            let total = response_totals.get(&eco).copied().unwrap_or(0.0);
            let average = if count > 0 { total / count as f64 } else { 0.0 };

            ecosystems.insert(
                eco,
                EcosystemSummary {
                    stack_requests_count: count,
                    unique_dependencies_with_frequency: freqs.dependencies.clone(),
                    unique_unknown_dependencies_with_frequency: freqs.unknown_dependencies,
                    unique_stacks_with_deps_count: stack_deps_counts(&freqs.stacks),
                    top_stacks: get_trending(&freqs.stacks, self.top_n),
                    top_dependencies: get_trending(&freqs.dependencies, self.top_n),
                    unique_stacks_with_frequency: freqs.stacks,
                    average_response_time: format_millis(average),
                    previously_unknown_dependencies: Vec::new(),
                },
            );
        }

        let total_requests = details.len() as u64;
        let total_average = if total_requests > 0 {
            total_response_time / total_requests as f64
        } else {
            0.0
        };

        ReportTemplate {
            report: report_header(period),
            stacks_summary: StacksSummary {
                total_stack_requests_count: total_requests,
                ecosystems,
                unique_unknown_licenses_with_frequency: super::frequency::populate_key_count(
                    all_unknown_licenses,
                ),
                unique_cves: super::frequency::populate_key_count(all_cves),
                total_average_response_time: format_millis(total_average),
            },
            stacks_details: details,
        }
    }
}

/// Header for a persisted report document, stamped now.
pub fn report_header(period: &ReportPeriod) -> ReportHeader {
    ReportHeader {
        from: period.from_str_date(),
        to: period.to_str_date(),
        generated_on: Utc::now()
            .naive_utc()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string(),
    }
}

fn format_millis(ms: f64) -> String {
    format!("{:.3} ms", ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::entities::{CveItem, DependencyRef};

    fn record(eco: Ecosystem, deps: &[(&str, &str)]) -> StackRecord {
        StackRecord {
            ecosystem: eco,
            dependencies: deps
                .iter()
                .map(|(p, v)| DependencyRef {
                    package: p.to_string(),
                    version: v.to_string(),
                })
                .collect(),
            unknown_dependencies: vec![],
            cves: vec![],
            unknown_licenses: vec![],
            started_at: "2018-08-23T17:05:52.000000".to_string(),
            ended_at: "2018-08-23T17:05:52.500000".to_string(),
        }
    }

    fn period() -> ReportPeriod {
        ReportPeriod::parse("2018-10-10", "2018-10-18").unwrap()
    }

    #[test]
    fn datediff_same_instant_is_zero() {
        let ts = "2018-08-23T17:05:52.912429";
        assert_eq!(datediff_in_millisecs(ts, ts).unwrap(), 0.0);
    }

    #[test]
    fn datediff_spans_seconds() {
        let ms =
            datediff_in_millisecs("2018-08-23T17:05:52.912429", "2018-08-23T17:05:53.624783")
                .unwrap();
        assert!((ms - 712.354).abs() < 1e-9);
    }

    #[test]
    fn datediff_never_negative() {
        let ms =
            datediff_in_millisecs("2018-08-23T17:05:53.624783", "2018-08-23T17:05:52.912429")
                .unwrap();
        assert!((ms - 712.354).abs() < 1e-9);
    }

    #[test]
    fn datediff_rejects_garbage() {
        assert!(datediff_in_millisecs("not-a-time", "2018-08-23T17:05:52.0").is_err());
    }

    #[test]
    fn unrecognized_worker_is_a_noop() {
        let normalizer = ReportNormalizer::new(5);
        let records = vec![Ok(record(Ecosystem::Npm, &[("a", "1")]))];
        assert!(normalizer
            .normalize_worker_data("recommendation_v2", records, &period())
            .is_none());
    }

    #[test]
    fn one_malformed_record_does_not_abort_the_batch() {
        let normalizer = ReportNormalizer::new(5);
        let records = vec![
            Ok(record(Ecosystem::Npm, &[("a", "1")])),
            Err(ReportError::malformed("missing dependencies")),
            Ok(record(Ecosystem::Maven, &[("b", "2")])),
        ];
        let report = normalizer
            .normalize_worker_data(STACK_AGGREGATOR_WORKER, records, &period())
            .unwrap();
        assert_eq!(report.stacks_details.len(), 2);
        assert_eq!(report.stacks_summary.total_stack_requests_count, 2);
    }

    #[test]
    fn summary_count_matches_details_length() {
        let normalizer = ReportNormalizer::new(5);
        let records = vec![
            Ok(record(Ecosystem::Npm, &[("a", "1")])),
            Ok(record(Ecosystem::Npm, &[])), // zero deps: skipped
            Ok(record(Ecosystem::Npm, &[("a", "1")])),
        ];
        let report = normalizer
            .normalize_worker_data(STACK_AGGREGATOR_WORKER, records, &period())
            .unwrap();
        assert_eq!(
            report.stacks_summary.total_stack_requests_count,
            report.stacks_details.len() as u64
        );
        assert_eq!(report.stacks_summary.total_stack_requests_count, 2);
    }

    #[test]
    fn empty_batch_produces_zeroed_summary() {
        let normalizer = ReportNormalizer::new(5);
        let report = normalizer
            .normalize_worker_data(STACK_AGGREGATOR_WORKER, vec![], &period())
            .unwrap();
        assert_eq!(report.stacks_summary.total_stack_requests_count, 0);
        assert_eq!(report.stacks_summary.total_average_response_time, "0.000 ms");
        assert!(report.stacks_summary.ecosystems.is_empty());
    }

    #[test]
    fn cves_and_licenses_aggregate_across_ecosystems() {
        let mut npm = record(Ecosystem::Npm, &[("a", "1")]);
        npm.cves = vec![CveItem {
            id: "CVE-2014-6393".to_string(),
            cvss: "4.3".into(),
        }];
        npm.unknown_licenses = vec!["mpl-2.0".to_string()];
        let mut maven = record(Ecosystem::Maven, &[("b", "2")]);
        maven.cves = vec![CveItem {
            id: "CVE-2014-6393".to_string(),
            cvss: "4.3".into(),
        }];
        maven.unknown_licenses = vec!["mpl-2.0".to_string()];

        let normalizer = ReportNormalizer::new(5);
        let report = normalizer
            .normalize_worker_data(STACK_AGGREGATOR_WORKER, vec![Ok(npm), Ok(maven)], &period())
            .unwrap();

        assert_eq!(
            report.stacks_summary.unique_cves.get("CVE-2014-6393:4.3"),
            Some(&2)
        );
        assert_eq!(
            report
                .stacks_summary
                .unique_unknown_licenses_with_frequency
                .get("mpl-2.0"),
            Some(&2)
        );
    }

    #[test]
    fn per_ecosystem_summary_carries_trending_sections() {
        let normalizer = ReportNormalizer::new(1);
        let records = vec![
            Ok(record(Ecosystem::Npm, &[("a", "1"), ("b", "2")])),
            Ok(record(Ecosystem::Npm, &[("a", "1"), ("b", "2")])),
            Ok(record(Ecosystem::Npm, &[("c", "3")])),
        ];
        let report = normalizer
            .normalize_worker_data(STACK_AGGREGATOR_WORKER, records, &period())
            .unwrap();
        let npm = &report.stacks_summary.ecosystems[&Ecosystem::Npm];
        assert_eq!(npm.stack_requests_count, 3);
        assert_eq!(npm.top_stacks.len(), 1);
        assert_eq!(npm.top_stacks.get("a 1,b 2"), Some(&2));
        assert_eq!(npm.top_dependencies.len(), 1);
        assert_eq!(npm.unique_stacks_with_deps_count.get("a 1,b 2"), Some(&2));
    }
}
