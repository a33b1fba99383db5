//! Error-tracking (Sentry-compatible) API client
//!
//! Lists recent issues and fetches each issue's latest event, flattening the
//! exception stack frames into a single stacktrace string.

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, instrument, warn};

use crate::config::ErrorTrackingConfig;
use crate::domain::report::errors::ReportError;

use super::resilience::{retry_with_fixed_backoff, RetryConfig};

const SERVICE: &str = "error-tracking";

/// One recent issue as listed by the tracking service
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(rename = "lastSeen")]
    pub last_seen: String,
}

/// Fully resolved issue: listing fields plus event detail
#[derive(Debug, Clone)]
pub struct IssueDigest {
    pub id: String,
    pub title: String,
    pub last_seen: String,
    pub pods_impacted: String,
    pub stacktrace: String,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(default)]
    tags: Vec<EventTag>,
    #[serde(default)]
    entries: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct EventTag {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    data: EventEntryData,
}

#[derive(Debug, Default, Deserialize)]
struct EventEntryData {
    #[serde(default)]
    values: Vec<ExceptionValue>,
}

#[derive(Debug, Deserialize)]
struct ExceptionValue {
    stacktrace: Option<Stacktrace>,
}

#[derive(Debug, Deserialize)]
struct Stacktrace {
    #[serde(default)]
    frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    filename: String,
    #[serde(rename = "lineNo")]
    line_no: Option<u64>,
    #[serde(default)]
    function: String,
    /// `[line_no, source_line]` pairs surrounding the frame
    #[serde(default)]
    context: Vec<(u64, String)>,
}

/// Flatten exception stack frames into one string, one `" || "`-terminated
/// segment per frame.
fn flatten_stacktrace(event: &Event) -> String {
    let mut stacktrace = String::new();
    for entry in &event.entries {
        if entry.entry_type != "exception" {
            continue;
        }
        let Some(frames) = entry
            .data
            .values
            .first()
            .and_then(|v| v.stacktrace.as_ref())
            .map(|st| &st.frames)
        else {
            continue;
        };
        for frame in frames {
            let line_no = frame.line_no.unwrap_or(0);
            let mut segment = format!(
                "File {}, Line {}, Function {}",
                frame.filename, line_no, frame.function
            );
            if let Some((_, statement)) = frame.context.iter().find(|(n, _)| *n == line_no) {
                segment.push_str(&format!(", Statement {}", statement));
            }
            segment.push_str(" || ");
            stacktrace.push_str(&segment);
        }
    }
    stacktrace
}

fn server_name(event: &Event) -> String {
    event
        .tags
        .iter()
        .find(|tag| tag.key == "server_name")
        .map(|tag| tag.value.clone())
        .unwrap_or_default()
}

/// Client for the error-tracking API
pub struct ErrorTrackingClient {
    client: Client,
    issues_url: String,
    events_url: String,
    auth_token: String,
    max_issues: usize,
    retry: RetryConfig,
}

impl ErrorTrackingClient {
    pub fn new(config: &ErrorTrackingConfig, retry: RetryConfig) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .user_agent("venus-report/0.1.0")
            .build()
            .map_err(|e| ReportError::network(SERVICE, e.to_string()))?;

        Ok(Self {
            client,
            issues_url: config.issues_url.clone(),
            events_url: config.events_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            max_issues: config.max_issues,
            retry,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ReportError> {
        retry_with_fixed_backoff(&self.retry, SERVICE, || async {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.auth_token)
                .send()
                .await
                .map_err(|e| ReportError::network(SERVICE, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                error!(url = %url, status = status.as_u16(), "error-tracking API call failed");
                return Err(ReportError::Http {
                    service: SERVICE.to_string(),
                    status: status.as_u16(),
                });
            }

            response
                .json::<T>()
                .await
                .map_err(|e| ReportError::network(SERVICE, e.to_string()))
        })
        .await
    }

    /// Issues seen in the last 24 hours.
    pub async fn recent_issues(&self) -> Result<Vec<Issue>, ReportError> {
        let url = format!("{}?statsPeriod=24h", self.issues_url);
        self.get_json(&url).await
    }

    /// Latest event detail for one issue, flattened for reporting.
    pub async fn issue_digest(&self, issue: &Issue) -> Result<IssueDigest, ReportError> {
        let url = format!("{}/{}/events/latest/", self.events_url, issue.id);
        let event: Event = self.get_json(&url).await?;

        Ok(IssueDigest {
            id: issue.id.clone(),
            title: issue.title.clone(),
            last_seen: issue.last_seen.clone(),
            pods_impacted: server_name(&event),
            stacktrace: flatten_stacktrace(&event),
        })
    }

    /// Resolve the most recent issues into digests, capped at the configured
    /// maximum. Per-issue failures are logged and dropped.
    #[instrument(skip(self))]
    pub async fn recent_issue_digests(&self) -> Result<Vec<IssueDigest>, ReportError> {
        let issues = self.recent_issues().await?;

        let mut digests = Vec::new();
        for issue in issues.iter().take(self.max_issues) {
            match self.issue_digest(issue).await {
                Ok(digest) => digests.push(digest),
                Err(err) => {
                    warn!(issue = %issue.id, error = %err, "unable to resolve issue events");
                }
            }
        }
        Ok(digests)
    }
}
