//! Bounded, cancellable fan-out of oracle requests.
//!
//! ```text
//! start(requests) ──> dispatcher task
//!                       ├─ Semaphore(max_workers) gates each spawn
//!                       ├─ JoinSet of annotate() calls, each under timeout
//!                       └─ progress ──mpsc──> EnrichmentHandle
//!                                               └─ collect_until(deadline)
//! ```
//!
//! Every subject moves `pending -> requested -> {enriched | failed}` exactly
//! once; nothing is retried. Whatever is still pending or requested when the
//! deadline passes or the run is cancelled ends up `failed`.

use crate::config::EnrichmentConfig;
use crate::error::OracleError;
use crate::oracle::{Annotation, OracleRequest, SemanticOracle, Subject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-subject enrichment state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum EnrichmentState {
    Pending,
    Requested,
    Enriched(Annotation),
    Failed(String),
}

impl EnrichmentState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Enriched(_) | Self::Failed(_))
    }
}

enum Progress {
    Requested(Subject),
    Finished(Subject, Result<Annotation, OracleError>),
}

/// Counts per final state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    pub total: usize,
    pub enriched: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Final state of every subject once collection stops
#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    states: BTreeMap<Subject, EnrichmentState>,
    timed_out: usize,
}

impl EnrichmentReport {
    pub fn state(&self, subject: &Subject) -> Option<&EnrichmentState> {
        self.states.get(subject)
    }

    pub fn states(&self) -> impl Iterator<Item = (&Subject, &EnrichmentState)> {
        self.states.iter()
    }

    /// Successful annotations, in subject order
    pub fn annotations(&self) -> impl Iterator<Item = (&Subject, &Annotation)> {
        self.states.iter().filter_map(|(subject, state)| match state {
            EnrichmentState::Enriched(annotation) => Some((subject, annotation)),
            _ => None,
        })
    }

    pub fn summary(&self) -> EnrichmentSummary {
        let enriched = self.annotations().count();
        EnrichmentSummary {
            total: self.states.len(),
            enriched,
            failed: self.states.len() - enriched,
            timed_out: self.timed_out,
        }
    }
}

/// Dispatches oracle requests through a bounded worker pool
pub struct EnrichmentCoordinator {
    oracle: Arc<dyn SemanticOracle>,
    config: EnrichmentConfig,
}

impl EnrichmentCoordinator {
    pub fn new(oracle: Arc<dyn SemanticOracle>, config: EnrichmentConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    /// Spawn the dispatcher and return immediately.
    ///
    /// Cancelling `cancel` (or a token it was derived from) aborts in-flight
    /// calls. Must be called from within a tokio runtime.
    pub fn start(&self, requests: Vec<OracleRequest>, cancel: CancellationToken) -> EnrichmentHandle {
        let mut states = BTreeMap::new();
        let mut queue = Vec::with_capacity(requests.len());
        for request in requests {
            // Duplicate subjects are asked once
            if states.contains_key(&request.subject) {
                continue;
            }
            states.insert(request.subject.clone(), EnrichmentState::Pending);
            queue.push(request);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let token = cancel.child_token();

        log::info!(
            "Enriching {} subjects with up to {} concurrent oracle calls",
            queue.len(),
            self.config.workers()
        );

        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(&self.oracle),
            queue,
            self.config.workers(),
            self.config.call_timeout(),
            token.clone(),
            tx,
        ));

        EnrichmentHandle {
            states,
            progress: rx,
            cancel: token,
            dispatcher,
            timed_out: 0,
        }
    }
}

async fn dispatch(
    oracle: Arc<dyn SemanticOracle>,
    queue: Vec<OracleRequest>,
    workers: usize,
    call_timeout: Duration,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Progress>,
) {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for request in queue {
        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let subject = request.subject.clone();
        if tx.send(Progress::Requested(subject.clone())).is_err() {
            break;
        }

        let oracle = Arc::clone(&oracle);
        let tx = tx.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let outcome = match tokio::time::timeout(call_timeout, oracle.annotate(request)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout(call_timeout)),
            };
            let _ = tx.send(Progress::Finished(subject, outcome));
        });
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            tasks.abort_all();
        }
        _ = async { while tasks.join_next().await.is_some() {} } => {}
    }
    while tasks.join_next().await.is_some() {}
}

/// Live view of a running enrichment
pub struct EnrichmentHandle {
    states: BTreeMap<Subject, EnrichmentState>,
    progress: mpsc::UnboundedReceiver<Progress>,
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
    timed_out: usize,
}

impl EnrichmentHandle {
    /// Stop dispatching and abort in-flight calls
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self, subject: &Subject) -> Option<&EnrichmentState> {
        self.states.get(subject)
    }

    /// Apply progress until every subject settled, the deadline passed or
    /// the run was cancelled, whichever comes first.
    pub async fn collect_until(mut self, deadline: Instant) -> EnrichmentReport {
        let mut stop_reason = None;

        while !self.all_settled() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    stop_reason = Some(OracleError::Cancelled);
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    stop_reason = Some(OracleError::DeadlineExceeded);
                    break;
                }
                progress = self.progress.recv() => match progress {
                    Some(progress) => self.apply(progress),
                    None => break,
                },
            }
        }

        self.cancel.cancel();
        if let Err(err) = (&mut self.dispatcher).await {
            if !err.is_cancelled() {
                log::warn!("Enrichment dispatcher failed: {err}");
            }
        }

        // Answers that landed before the stop still count
        while let Ok(progress) = self.progress.try_recv() {
            self.apply(progress);
        }

        let reason = stop_reason.unwrap_or(OracleError::Cancelled);
        let mut abandoned = 0;
        for state in self.states.values_mut() {
            if !state.is_settled() {
                *state = EnrichmentState::Failed(reason.to_string());
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            log::warn!("{abandoned} enrichment requests abandoned: {reason}");
        }

        let report = EnrichmentReport {
            states: self.states,
            timed_out: self.timed_out,
        };
        let summary = report.summary();
        log::info!(
            "Enrichment finished: {} enriched, {} failed ({} timed out)",
            summary.enriched,
            summary.failed,
            summary.timed_out
        );
        report
    }

    /// Wait for every subject to settle, with no deadline
    pub async fn wait(self) -> EnrichmentReport {
        let far = Instant::now() + Duration::from_secs(60 * 60 * 24 * 365);
        self.collect_until(far).await
    }

    fn all_settled(&self) -> bool {
        self.states.values().all(EnrichmentState::is_settled)
    }

    fn apply(&mut self, progress: Progress) {
        match progress {
            Progress::Requested(subject) => {
                if let Some(state) = self.states.get_mut(&subject) {
                    if *state == EnrichmentState::Pending {
                        *state = EnrichmentState::Requested;
                    }
                }
            }
            Progress::Finished(subject, outcome) => {
                let Some(state) = self.states.get_mut(&subject) else {
                    return;
                };
                if state.is_settled() {
                    return;
                }
                *state = match outcome {
                    Ok(annotation) => EnrichmentState::Enriched(annotation),
                    Err(err) => {
                        if matches!(err, OracleError::Timeout(_)) {
                            self.timed_out += 1;
                        }
                        log::debug!("Oracle failed for {subject}: {err}");
                        EnrichmentState::Failed(err.to_string())
                    }
                };
            }
        }
    }
}
