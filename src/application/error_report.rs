//! Error-report assembly from the error-tracking collaborator
//!
//! Recent issues are grouped by the service that raised them (derived from
//! the impacted pod name) with their flattened stacktraces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::infrastructure::error_tracking::IssueDigest;

/// One issue entry inside the error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub id: String,
    #[serde(rename = "lastSeen")]
    pub last_seen: String,
    pub title: String,
    pub pods_impacted: String,
    pub stacktrace: String,
}

/// Errors grouped under one originating service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceErrors {
    pub total_errors: u64,
    pub errors: Vec<ErrorEntry>,
}

/// The persisted error-report document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error_report: BTreeMap<String, ServiceErrors>,
}

/// Derive the service name from a pod name by stripping the replica-set and
/// pod hash suffixes (`bayesian-api-6f9488fd-x2v5q` → `bayesian-api`).
pub fn service_name_from_pod(pod_name: &str) -> String {
    let segments: Vec<&str> = pod_name.split('-').collect();
    if segments.len() > 2 {
        segments[..segments.len() - 2].join("-")
    } else {
        pod_name.to_string()
    }
}

/// Group issue digests by originating service.
pub fn build_error_report(issues: Vec<IssueDigest>) -> ErrorReport {
    let mut report = ErrorReport::default();
    for issue in issues {
        let service = service_name_from_pod(&issue.pods_impacted);
        let entry = report.error_report.entry(service).or_default();
        entry.total_errors += 1;
        entry.errors.push(ErrorEntry {
            id: issue.id,
            last_seen: issue.last_seen,
            title: issue.title,
            pods_impacted: issue.pods_impacted,
            stacktrace: issue.stacktrace,
        });
    }
    report
}
