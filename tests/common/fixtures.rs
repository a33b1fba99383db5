//! Raw worker-row fixtures mirroring what the analysis workers write

use serde_json::json;

/// A complete worker result row for the given ecosystem and dependencies.
pub fn worker_row(
    ecosystem: &str,
    deps: &[(&str, &str)],
    unknown: &[(&str, &str)],
    cves: &[(&str, f64)],
    unknown_licenses: &[&str],
) -> serde_json::Value {
    let deps: Vec<_> = deps
        .iter()
        .map(|(p, v)| json!({"package": p, "version": v}))
        .collect();
    let unknown: Vec<_> = unknown
        .iter()
        .map(|(p, v)| json!({"name": p, "version": v}))
        .collect();
    let security: Vec<_> = cves
        .iter()
        .map(|(cve, cvss)| json!({"CVE": cve, "CVSS": cvss}))
        .collect();
    let licenses: Vec<_> = unknown_licenses
        .iter()
        .map(|l| json!({"license": l}))
        .collect();

    json!({
        "stack_data": [{
            "user_stack_info": {
                "ecosystem": ecosystem,
                "dependencies": deps,
                "unknown_dependencies": unknown,
                "license_analysis": {
                    "unknown_licenses": {"really_unknown": licenses}
                },
                "analyzed_dependencies": [{"security": security}]
            }
        }],
        "_audit": {
            "started_at": "2018-08-23T17:05:52.912429",
            "ended_at": "2018-08-23T17:05:53.624783"
        }
    })
}

/// Two-stack batch sharing one CVE and one unknown license across an npm
/// and a maven stack.
pub fn sample_stack_batch() -> Vec<serde_json::Value> {
    vec![
        worker_row(
            "npm",
            &[("serve-static", "1.7.1"), ("lodash", "4.17.4")],
            &[("leftpad", "0.0.1")],
            &[("CVE-2014-6393", 4.3)],
            &["mpl-2.0"],
        ),
        worker_row(
            "maven",
            &[("org.example:lib", "1.0")],
            &[],
            &[("CVE-2014-6393", 4.3)],
            &["mpl-2.0"],
        ),
    ]
}
