// ABOUTME: Retrieves comparison results by polling the backend or accepting webhook callbacks
// ABOUTME: Both paths share one envelope interpretation and a memo of terminal outcomes

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::normalize::normalize_result;
use super::types::{ComparisonOutcome, FetchOutcome, JobStatus, Provenance};
use crate::error::{DiffError, Result};
use crate::remote::models::ResultEnvelope;
use crate::remote::{RequestSpec, RetryingInvoker};

/// Default number of terminal outcomes a retriever keeps.
pub const DEFAULT_MEMO_CAPACITY: usize = 1024;

/// Terminal outcomes by job id, evicting the oldest once full.
struct TerminalMemo {
    capacity: usize,
    entries: HashMap<String, FetchOutcome>,
    order: VecDeque<String>,
}

impl TerminalMemo {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, job_id: &str) -> Option<&FetchOutcome> {
        self.entries.get(job_id)
    }

    /// Keeps the first terminal outcome seen for a job.
    fn insert(&mut self, job_id: &str, outcome: &FetchOutcome) {
        if let Some(existing) = self.entries.get(job_id) {
            if existing != outcome {
                warn!(
                    "Ignoring conflicting terminal outcome for comparison {}; keeping the first one",
                    job_id
                );
            }
            return;
        }
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.entries.insert(job_id.to_string(), outcome.clone());
        self.order.push_back(job_id.to_string());
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct ComparisonResultRetriever {
    invoker: RetryingInvoker,
    terminal: Mutex<TerminalMemo>,
}

impl ComparisonResultRetriever {
    pub fn new(invoker: RetryingInvoker) -> Self {
        Self::with_memo_capacity(invoker, DEFAULT_MEMO_CAPACITY)
    }

    pub fn with_memo_capacity(invoker: RetryingInvoker, capacity: usize) -> Self {
        Self {
            invoker,
            terminal: Mutex::new(TerminalMemo::new(capacity)),
        }
    }

    pub fn cached(&self, job_id: &str) -> Option<FetchOutcome> {
        self.terminal.lock().ok()?.get(job_id).cloned()
    }

    pub fn memo_len(&self) -> usize {
        self.terminal.lock().map(|memo| memo.len()).unwrap_or(0)
    }

    fn remember(&self, job_id: &str, outcome: &FetchOutcome) {
        if matches!(outcome, FetchOutcome::Pending(_)) {
            return;
        }
        if let Ok(mut terminal) = self.terminal.lock() {
            terminal.insert(job_id, outcome);
        }
    }

    /// Makes exactly one status request (retries aside) and reports what it saw.
    pub async fn fetch_once(&self, job_id: &str) -> Result<FetchOutcome> {
        if job_id.trim().is_empty() {
            return Err(DiffError::UnknownJob(job_id.to_string()));
        }
        if let Some(outcome) = self.cached(job_id) {
            debug!("Serving terminal outcome for {} from memo", job_id);
            return Ok(outcome);
        }

        let path = format!("/compare/results/{}", urlencoding::encode(job_id));
        let response = match self.invoker.invoke(&RequestSpec::get(path)).await {
            Ok(response) => response,
            Err(DiffError::Permanent {
                status: Some(404), ..
            }) => return Err(DiffError::UnknownJob(job_id.to_string())),
            Err(e) => return Err(e),
        };

        let envelope: ResultEnvelope = response.json()?;
        let outcome = interpret(envelope, Some(job_id))?;
        self.remember(job_id, &outcome);
        Ok(outcome)
    }

    /// Polls until the job reaches a terminal state or `max_wait` elapses.
    pub async fn await_completion(
        &self,
        job_id: &str,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<ComparisonOutcome> {
        let started = Instant::now();
        loop {
            match self.fetch_once(job_id).await? {
                FetchOutcome::Completed(outcome) => {
                    info!("Comparison {} completed after {:?}", job_id, started.elapsed());
                    return Ok(outcome);
                }
                FetchOutcome::Failed { message } => {
                    return Err(DiffError::ComparisonFailed {
                        job_id: job_id.to_string(),
                        message,
                    });
                }
                FetchOutcome::Pending(status) => {
                    let elapsed = started.elapsed();
                    if elapsed >= max_wait {
                        warn!("Comparison {} still {:?} after {:?}", job_id, status, elapsed);
                        return Err(DiffError::ComparisonTimeout {
                            job_id: job_id.to_string(),
                            waited: elapsed,
                        });
                    }
                    let pause = poll_interval.min(max_wait - elapsed);
                    debug!("Comparison {} is {:?}, checking again in {:?}", job_id, status, pause);
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Accepts a pushed result. Callbacks only ever report terminal states.
    pub fn accept_callback(&self, payload: &Value) -> Result<FetchOutcome> {
        let payload = payload
            .get("body")
            .filter(|body| body.is_object())
            .unwrap_or(payload);
        let envelope: ResultEnvelope = serde_json::from_value(payload.clone())
            .map_err(|e| DiffError::InvalidPayload(format!("callback is not a result envelope: {}", e)))?;
        let job_id = envelope.comparison_id.clone();

        let outcome = interpret(envelope, None)?;
        if let FetchOutcome::Pending(status) = outcome {
            return Err(DiffError::InvalidPayload(format!(
                "callback reported non-terminal status {:?}",
                status
            )));
        }
        if let Some(id) = job_id {
            info!("Accepted callback for comparison {}", id);
            self.remember(&id, &outcome);
            if let Some(first) = self.cached(&id) {
                return Ok(first);
            }
        }
        Ok(outcome)
    }
}

fn interpret(envelope: ResultEnvelope, requested_id: Option<&str>) -> Result<FetchOutcome> {
    let status = JobStatus::parse(&envelope.status).ok_or_else(|| {
        DiffError::InvalidPayload(format!("unrecognized job status '{}'", envelope.status))
    })?;

    match status {
        JobStatus::Pending | JobStatus::Running => Ok(FetchOutcome::Pending(status)),
        JobStatus::Failed => Ok(FetchOutcome::Failed {
            message: envelope
                .error
                .unwrap_or_else(|| "comparison failed without an error message".to_string()),
        }),
        JobStatus::Completed => {
            let raw = envelope.result.ok_or_else(|| {
                DiffError::InvalidPayload("completed job carries no result".to_string())
            })?;
            Ok(FetchOutcome::Completed(ComparisonOutcome {
                job_id: envelope
                    .comparison_id
                    .or_else(|| requested_id.map(str::to_string)),
                provenance: if envelope.materialized_from_db {
                    Provenance::DurableStore
                } else {
                    Provenance::Cache
                },
                result: normalize_result(&raw, None)?,
            }))
        }
    }
}
