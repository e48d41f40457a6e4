//! Load generator: submits synthetic jobs to the ingress at fixed concurrency.
//!
//! Every submission resolves independently. A failed request never aborts the
//! batch, and [`LoadGenerator::run`] returns only after all of them resolved.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

pub const DEFAULT_TEMPLATE: &str = "{}|select * from country limit 10";
pub const DEFAULT_CONCURRENCY: usize = 10;

/// How one submission resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionResult {
    /// 2xx reply; `body` is the response text.
    Accepted { status: u16, body: String },
    /// Non-2xx reply.
    Rejected { status: u16, body: String },
    /// The request never got a reply.
    Transport { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    /// Job number substituted into the template.
    pub request: u64,
    pub result: SubmissionResult,
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, SubmissionResult::Accepted { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// In completion order.
    pub outcomes: Vec<SubmissionOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl LoadReport {
    fn push(&mut self, outcome: SubmissionOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

#[derive(Debug, Clone)]
pub struct LoadGenerator {
    client: reqwest::Client,
    endpoint: String,
    concurrency: usize,
    template: String,
}

impl LoadGenerator {
    /// `endpoint` is the full submission URL, e.g. `http://localhost:8080/request`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            concurrency: DEFAULT_CONCURRENCY,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The `message` text for job `n`: the first `{}` replaced by `n`.
    pub fn message(&self, n: u64) -> String {
        self.template.replacen("{}", &n.to_string(), 1)
    }

    /// The JSON envelope posted for job `n`.
    pub fn envelope(&self, n: u64) -> String {
        serde_json::json!({ "message": self.message(n) }).to_string()
    }

    /// Submit jobs `1..=total`, at most `concurrency` in flight.
    pub async fn run(&self, total: u64) -> LoadReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for n in 1..=total {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            let body = self.envelope(n);

            join_set.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = submit(&client, &endpoint, body).await;
                SubmissionOutcome { request: n, result }
            });
        }

        let mut report = LoadReport::default();
        let mut reported = HashSet::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => {
                    log_outcome(report.outcomes.len() + 1, &outcome);
                    reported.insert(outcome.request);
                    report.push(outcome);
                }
                Err(join_error) => {
                    error!(error = %join_error, "submission task failed");
                }
            }
        }

        // A task that died still gets a failure outcome.
        for request in (1..=total).filter(|n| !reported.contains(n)) {
            report.push(SubmissionOutcome {
                request,
                result: SubmissionResult::Transport {
                    error: "submission task failed".to_string(),
                },
            });
        }

        info!(
            total,
            succeeded = report.succeeded,
            failed = report.failed,
            "load run finished"
        );
        report
    }
}

async fn submit(client: &reqwest::Client, endpoint: &str, body: String) -> SubmissionResult {
    let response = client
        .post(endpoint)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    let response = match response {
        Ok(response) => response,
        Err(e) => return SubmissionResult::Transport { error: e.to_string() },
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(text) => text,
        Err(e) => return SubmissionResult::Transport { error: e.to_string() },
    };

    if status.is_success() {
        SubmissionResult::Accepted {
            status: status.as_u16(),
            body,
        }
    } else {
        SubmissionResult::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

fn log_outcome(completed: usize, outcome: &SubmissionOutcome) {
    match &outcome.result {
        SubmissionResult::Accepted { status, .. } => {
            info!(completed, request = outcome.request, status, "submission accepted");
        }
        SubmissionResult::Rejected { status, body } => {
            warn!(completed, request = outcome.request, status, body = %body, "submission rejected");
        }
        SubmissionResult::Transport { error } => {
            warn!(completed, request = outcome.request, error = %error, "submission failed");
        }
    }
}
