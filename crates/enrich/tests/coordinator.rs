use archmap_enrich::{
    Annotation, EnrichmentConfig, EnrichmentCoordinator, EnrichmentState, OracleError,
    OracleRequest, SemanticOracle, Subject,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Sleeps per subject, records peak concurrency
#[derive(Default)]
struct SlowOracle {
    delay: Duration,
    slow_subjects: HashSet<String>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowOracle {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Only these subjects sleep; the rest answer at once
    fn slow_for(delay: Duration, ids: &[&str]) -> Self {
        Self {
            delay,
            slow_subjects: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SemanticOracle for SlowOracle {
    async fn annotate(&self, request: OracleRequest) -> Result<Annotation, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let id = match &request.subject {
            Subject::Node { id } => id.clone(),
            Subject::Edge { source, .. } => source.clone(),
        };
        if self.slow_subjects.is_empty() || self.slow_subjects.contains(&id) {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Annotation {
            purpose: Some(format!("purpose of {id}")),
            ..Default::default()
        })
    }
}

fn requests(n: usize) -> Vec<OracleRequest> {
    (0..n)
        .map(|i| OracleRequest {
            subject: Subject::node(format!("n{i}")),
            summary: String::new(),
        })
        .collect()
}

fn config(workers: usize, call_timeout_ms: u64) -> EnrichmentConfig {
    EnrichmentConfig {
        max_workers: workers,
        call_timeout_ms,
        ..Default::default()
    }
}

#[tokio::test]
async fn concurrency_never_exceeds_worker_limit() {
    let oracle = Arc::new(SlowOracle::new(Duration::from_millis(20)));
    let coordinator = EnrichmentCoordinator::new(oracle.clone(), config(3, 5_000));

    let report = coordinator
        .start(requests(12), CancellationToken::new())
        .wait()
        .await;

    assert_eq!(report.summary().enriched, 12);
    assert!(oracle.peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn slow_call_times_out_and_fails_alone() {
    let oracle = Arc::new(SlowOracle::slow_for(Duration::from_secs(5), &["n1"]));
    let coordinator = EnrichmentCoordinator::new(oracle, config(4, 50));

    let report = coordinator
        .start(requests(3), CancellationToken::new())
        .wait()
        .await;

    let summary = report.summary();
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.timed_out, 1);
    assert!(matches!(
        report.state(&Subject::node("n1")),
        Some(EnrichmentState::Failed(reason)) if reason.contains("timed out")
    ));
}

#[tokio::test]
async fn deadline_stops_collection_early() {
    let oracle = Arc::new(SlowOracle::new(Duration::from_secs(30)));
    let coordinator = EnrichmentCoordinator::new(oracle, config(2, 60_000));

    let started = std::time::Instant::now();
    let handle = coordinator.start(requests(4), CancellationToken::new());
    let report = handle
        .collect_until(Instant::now() + Duration::from_millis(100))
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.summary().failed, 4);
    assert!(report.states().all(|(_, state)| matches!(
        state,
        EnrichmentState::Failed(reason) if reason == &OracleError::DeadlineExceeded.to_string()
    )));
}

#[tokio::test]
async fn cancellation_aborts_in_flight_calls() {
    let oracle = Arc::new(SlowOracle::new(Duration::from_secs(30)));
    let coordinator = EnrichmentCoordinator::new(oracle.clone(), config(2, 60_000));

    let cancel = CancellationToken::new();
    let handle = coordinator.start(requests(6), cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    });

    let started = std::time::Instant::now();
    let report = handle.wait().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.summary().enriched, 0);
    assert!(report.states().all(|(_, state)| matches!(
        state,
        EnrichmentState::Failed(reason) if reason == &OracleError::Cancelled.to_string()
    )));
    // Only the first two ever reached the oracle
    assert!(oracle.calls.load(Ordering::SeqCst) <= 2);
    assert_eq!(oracle.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn finished_answers_survive_a_deadline() {
    let oracle = Arc::new(SlowOracle::slow_for(Duration::from_secs(30), &["n2"]));
    let coordinator = EnrichmentCoordinator::new(oracle, config(4, 60_000));

    let report = coordinator
        .start(requests(3), CancellationToken::new())
        .collect_until(Instant::now() + Duration::from_millis(200))
        .await;

    assert!(matches!(
        report.state(&Subject::node("n0")),
        Some(EnrichmentState::Enriched(a)) if a.purpose.as_deref() == Some("purpose of n0")
    ));
    assert!(matches!(
        report.state(&Subject::node("n2")),
        Some(EnrichmentState::Failed(_))
    ));
    assert_eq!(report.annotations().count(), 2);
}
