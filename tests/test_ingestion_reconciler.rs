//! Ingestion reconciliation against a graph double

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::mocks::{latest_info, MockGraph};

use venus_report::application::reconciler::IngestionReconciler;
use venus_report::domain::ingestion::entities::Epv;
use venus_report::domain::report::value_objects::ReportPeriod;

fn period() -> ReportPeriod {
    ReportPeriod::parse("2018-10-10", "2018-10-18").unwrap()
}

fn observed_epvs() -> Vec<Epv> {
    vec![
        Epv::new("npm", "lodash", "4.17.11"),
        Epv::new("npm", "jquery", "3.3.1"),
        Epv::new("maven", "dep1", "4.17.11"),
        Epv::new("maven", "dep2", "3.3.1"),
        Epv::new("pypi", "dep2", "3.3.2"),
    ]
}

fn graph_double() -> MockGraph {
    let mut existence = BTreeMap::new();
    existence.insert("npm@DELIM@lodash@DELIM@4.17.11".to_string(), "true".to_string());
    existence.insert("npm@DELIM@jquery@DELIM@3.3.1".to_string(), "false".to_string());
    existence.insert("maven@DELIM@dep1@DELIM@4.17.11".to_string(), "true".to_string());
    existence.insert("maven@DELIM@dep2@DELIM@3.3.1".to_string(), "false".to_string());
    existence.insert("pypi@DELIM@dep2@DELIM@3.3.2".to_string(), "true".to_string());
    // answers for the actual-latest existence pass
    existence.insert("npm@DELIM@jquery@DELIM@3.6.4".to_string(), "false".to_string());
    existence.insert("maven@DELIM@dep2@DELIM@3.6.4".to_string(), "false".to_string());
    existence.insert("pypi@DELIM@dep2@DELIM@3.3.2".to_string(), "true".to_string());

    let mut latest = BTreeMap::new();
    latest.insert(
        "npm@DELIM@lodash".to_string(),
        latest_info("4.17.11", "4.17.11"),
    );
    latest.insert("npm@DELIM@jquery".to_string(), latest_info("3.6.3", "3.6.4"));
    latest.insert("maven@DELIM@dep1".to_string(), latest_info("4.17.11", "4.17.11"));
    latest.insert("maven@DELIM@dep2".to_string(), latest_info("3.3.1", "3.6.4"));
    latest.insert("pypi@DELIM@dep2".to_string(), latest_info("3.3.1", "3.3.2"));
    MockGraph::new(existence, latest)
}

#[tokio::test]
async fn counts_ingestion_success_and_failure_per_ecosystem() {
    let reconciler = IngestionReconciler::new(Arc::new(graph_double()));
    let outcome = reconciler.reconcile(observed_epvs(), &period()).await.unwrap();

    let summary = &outcome.report.ingestion_summary;
    assert_eq!(summary.total_epv_ingestion_count, 5);
    assert_eq!(summary.ecosystems["npm"].epv_ingestion_count, 2);
    assert_eq!(summary.ecosystems["npm"].epv_successfully_ingested_count, 1);
    assert_eq!(summary.ecosystems["npm"].failed_epv_ingestion_count, 1);
    assert_eq!(summary.ecosystems["maven"].failed_epv_ingestion_count, 1);
    assert_eq!(summary.ecosystems["pypi"].failed_epv_ingestion_count, 0);

    // the not-ingested EPVs are listed
    assert!(summary
        .unknown_deps
        .contains(&Epv::new("npm", "jquery", "3.3.1")));
    assert!(summary
        .unknown_deps
        .contains(&Epv::new("maven", "dep2", "3.3.1")));
    assert_eq!(summary.unknown_deps.len(), 2);
}

#[tokio::test]
async fn latest_version_mismatch_is_counted_once_per_package() {
    let reconciler = IngestionReconciler::new(Arc::new(graph_double()));
    let outcome = reconciler.reconcile(observed_epvs(), &period()).await.unwrap();

    let summary = &outcome.report.ingestion_summary;
    assert_eq!(summary.ecosystems["npm"].incorrect_latest_version_count, 1);
    assert_eq!(summary.ecosystems["maven"].incorrect_latest_version_count, 1);
    assert_eq!(summary.ecosystems["pypi"].incorrect_latest_version_count, 1);
    assert_eq!(summary.incorrect_latest_versions.len(), 3);

    let jquery = summary
        .incorrect_latest_versions
        .iter()
        .find(|m| m.package == "jquery")
        .unwrap();
    assert_eq!(jquery.known_latest_version, "3.6.3");
    assert_eq!(jquery.actual_latest_version, "3.6.4");
}

#[tokio::test]
async fn rerun_on_same_input_counts_identically() {
    let reconciler = IngestionReconciler::new(Arc::new(graph_double()));
    let first = reconciler.reconcile(observed_epvs(), &period()).await.unwrap();
    let second = reconciler.reconcile(observed_epvs(), &period()).await.unwrap();

    assert_eq!(
        first.report.ingestion_summary.incorrect_latest_versions,
        second.report.ingestion_summary.incorrect_latest_versions
    );
    assert_eq!(
        first.report.ingestion_summary.ecosystems,
        second.report.ingestion_summary.ecosystems
    );
}

#[tokio::test]
async fn missing_latest_nodes_come_from_the_second_pass() {
    let reconciler = IngestionReconciler::new(Arc::new(graph_double()));
    let outcome = reconciler.reconcile(observed_epvs(), &period()).await.unwrap();

    // jquery 3.6.4 and maven dep2 3.6.4 are absent from the graph
    assert_eq!(
        outcome.missing_latest_nodes.get("npm"),
        Some(&vec!["jquery".to_string()])
    );
    assert_eq!(
        outcome.missing_latest_nodes.get("maven"),
        Some(&vec!["dep2".to_string()])
    );
    // pypi's actual latest exists: no trigger
    assert!(!outcome.missing_latest_nodes.contains_key("pypi"));
}

#[tokio::test]
async fn private_packages_are_excluded_from_mismatch_accounting() {
    let mut existence = BTreeMap::new();
    existence.insert(
        "npm@DELIM@corp-internal@DELIM@1.0.0".to_string(),
        "true".to_string(),
    );
    let mut latest = BTreeMap::new();
    latest.insert(
        "npm@DELIM@corp-internal".to_string(),
        latest_info("1.0.0", ""),
    );
    let reconciler = IngestionReconciler::new(Arc::new(MockGraph::new(existence, latest)));

    let outcome = reconciler
        .reconcile(vec![Epv::new("npm", "corp-internal", "1.0.0")], &period())
        .await
        .unwrap();

    let summary = &outcome.report.ingestion_summary;
    assert_eq!(summary.ecosystems["npm"].private_package_count, 1);
    assert_eq!(summary.ecosystems["npm"].incorrect_latest_version_count, 0);
    assert!(summary.incorrect_latest_versions.is_empty());
    assert!(outcome.missing_latest_nodes.is_empty());

    let details = &outcome.report.ingestion_details["npm"]["corp-internal"];
    assert!(details.private_package);
}

#[tokio::test]
async fn empty_period_produces_an_empty_report_without_graph_calls() {
    let graph = Arc::new(graph_double());
    let reconciler = IngestionReconciler::new(Arc::clone(&graph) as _);
    let outcome = reconciler.reconcile(Vec::new(), &period()).await.unwrap();

    assert_eq!(outcome.report.ingestion_summary.total_epv_ingestion_count, 0);
    assert!(outcome.report.ingestion_summary.ecosystems.is_empty());
    assert!(outcome.report.ingestion_details.is_empty());
    assert!(graph.exist_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn version_entries_record_graph_existence() {
    let reconciler = IngestionReconciler::new(Arc::new(graph_double()));
    let outcome = reconciler.reconcile(observed_epvs(), &period()).await.unwrap();

    let jquery = &outcome.report.ingestion_details["npm"]["jquery"];
    assert_eq!(jquery.versions.len(), 1);
    assert_eq!(jquery.versions[0].version, "3.3.1");
    assert!(!jquery.versions[0].ingested_in_graph);
    assert!(jquery.package_known);
    assert_eq!(jquery.known_latest_version, "3.6.3");
    assert_eq!(jquery.actual_latest_version, "3.6.4");
}
