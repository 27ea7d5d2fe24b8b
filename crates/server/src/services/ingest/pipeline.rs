//! Concurrent ingestion pipeline.
//!
//! A run pre-fills a bounded queue with the whole batch, closes it, and lets a
//! fixed pool of workers drain it through [`UserService::create`]:
//!
//! ```text
//!   Vec<User> ──► [ bounded queue, capacity = len, closed ] ──┬─► worker 0 ─┐
//!                                                             ├─► worker 1 ─┼─► UserService::create
//!                                                             └─► worker W ─┘
//!                                                                     │
//!                                                           per-item outcomes ──► IngestReport
//! ```
//!
//! The top-level wait ends at the first of: every worker exited, the deadline
//! elapsed, or the shutdown signal fired. An in-flight create is never
//! interrupted; workers only stop pulling new items. Workers still running when
//! the wait ends are detached, not aborted.
//!
//! Failed creates are logged and collected in the report. They are never
//! retried and never turn the run into an error.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use sika_core::{User, UserId};

use super::loader::{LoadError, load_batch};
use crate::config::IngestConfig;
use crate::services::UserService;

/// Lifecycle of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Loading,
    FanningOut,
    Draining,
    Done(Completion),
}

/// How a run reached `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every queued item was attempted.
    Drained,
    /// The deadline elapsed first. Some items may be unattempted.
    DeadlineElapsed,
    /// The shutdown signal fired first. Some items may be unattempted.
    ShutdownRequested,
}

/// A record whose create call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub id: UserId,
    pub error: String,
}

/// Summary of one run.
///
/// Only outcomes reported before the run returned are included; creates still
/// in flight at the deadline count as unfinished.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Number of records in the batch.
    pub total: usize,
    /// Ids created successfully, in completion order.
    pub succeeded: Vec<UserId>,
    /// Records whose create failed.
    pub failed: Vec<FailedRecord>,
    pub completion: Completion,
    pub elapsed: Duration,
}

impl IngestReport {
    /// Records with no reported outcome.
    #[must_use]
    pub fn unfinished(&self) -> usize {
        self.total
            .saturating_sub(self.succeeded.len() + self.failed.len())
    }

    /// Whether every record was attempted.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.completion == Completion::Drained
    }
}

enum Outcome {
    Created(UserId),
    Failed(FailedRecord),
}

/// Bounded worker pool that drives a batch through [`UserService::create`].
pub struct IngestPipeline<S> {
    service: Arc<S>,
    workers: usize,
    deadline: Duration,
    state: watch::Sender<PipelineState>,
}

impl<S: UserService + 'static> IngestPipeline<S> {
    /// Create a pipeline with `workers` concurrent workers (at least one is
    /// always started) and an overall `deadline` per run.
    #[must_use]
    pub fn new(service: Arc<S>, workers: usize, deadline: Duration) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            service,
            workers: workers.max(1),
            deadline,
            state,
        }
    }

    /// Create a pipeline from the ingest section of the app config.
    #[must_use]
    pub fn from_config(service: Arc<S>, config: &IngestConfig) -> Self {
        Self::new(service, config.workers, config.deadline)
    }

    /// Number of workers started per run.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Current state of the most recent run.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Load a batch from `path` and ingest it.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the source cannot be read or decoded. In that
    /// case no worker is started and no create call is made.
    pub async fn run_file(&self, path: impl AsRef<Path>) -> Result<IngestReport, LoadError> {
        self.run_file_until(path, std::future::pending()).await
    }

    /// Load a batch from `path` and ingest it, stopping early if `shutdown`
    /// completes.
    ///
    /// The deadline covers loading as well as fan-out.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the source cannot be read or decoded. In that
    /// case no worker is started and no create call is made.
    pub async fn run_file_until<F>(
        &self,
        path: impl AsRef<Path>,
        shutdown: F,
    ) -> Result<IngestReport, LoadError>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        self.set_state(PipelineState::Loading);

        let users = match load_batch(path).await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to load batch, nothing ingested");
                self.set_state(PipelineState::Idle);
                return Err(e);
            }
        };

        Ok(self
            .fan_out(users, started, started + self.deadline, shutdown)
            .await)
    }

    /// Ingest an already-materialized batch.
    pub async fn run(&self, users: Vec<User>) -> IngestReport {
        self.run_until(users, std::future::pending()).await
    }

    /// Ingest an already-materialized batch, stopping early if `shutdown`
    /// completes.
    pub async fn run_until<F>(&self, users: Vec<User>, shutdown: F) -> IngestReport
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        self.fan_out(users, started, started + self.deadline, shutdown)
            .await
    }

    #[instrument(skip_all, fields(total = users.len(), workers = self.workers))]
    async fn fan_out<F>(
        &self,
        users: Vec<User>,
        started: Instant,
        deadline_at: Instant,
        shutdown: F,
    ) -> IngestReport
    where
        F: Future<Output = ()>,
    {
        self.set_state(PipelineState::FanningOut);
        // Let subscribers observe the fan-out before the workers start.
        tokio::task::yield_now().await;
        let total = users.len();

        let (queue_tx, queue_rx) = mpsc::channel(total.max(1));
        for user in users {
            if let Err(e) = queue_tx.try_send(user) {
                error!(error = %e, "Ingestion queue rejected a record");
            }
        }
        drop(queue_tx);

        let queue = Arc::new(Mutex::new(queue_rx));
        let stop = Arc::new(AtomicBool::new(false));
        let attempted = Arc::new(AtomicUsize::new(0));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        info!(
            total,
            workers = self.workers,
            deadline_secs = self.deadline.as_secs(),
            "Starting ingestion"
        );

        let mut join_set = JoinSet::new();
        for worker_id in 0..self.workers {
            join_set.spawn(worker(
                worker_id,
                Arc::clone(&self.service),
                Arc::clone(&queue),
                outcome_tx.clone(),
                Arc::clone(&stop),
                Arc::clone(&attempted),
                deadline_at,
            ));
        }
        drop(outcome_tx);

        self.set_state(PipelineState::Draining);

        let drained = async {
            while let Some(result) = join_set.join_next().await {
                if let Err(join_err) = result {
                    if join_err.is_panic() {
                        error!(error = %join_err, "Ingestion worker panicked");
                    } else {
                        debug!("Ingestion worker was cancelled");
                    }
                }
            }
        };

        let completion = tokio::select! {
            biased;
            () = drained => Completion::Drained,
            () = tokio::time::sleep_until(deadline_at) => Completion::DeadlineElapsed,
            () = shutdown => Completion::ShutdownRequested,
        };

        // Workers also exit on their own once the deadline passes, leaving
        // the queue non-empty.
        let completion = match completion {
            Completion::Drained if attempted.load(Ordering::Acquire) < total => {
                Completion::DeadlineElapsed
            }
            other => other,
        };

        if completion != Completion::Drained {
            stop.store(true, Ordering::Release);
            let still_running = join_set.len();
            join_set.detach_all();
            warn!(
                ?completion,
                still_running, "Ingestion stopped before the queue drained"
            );
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        while let Ok(outcome) = outcome_rx.try_recv() {
            match outcome {
                Outcome::Created(id) => succeeded.push(id),
                Outcome::Failed(record) => failed.push(record),
            }
        }

        let report = IngestReport {
            total,
            succeeded,
            failed,
            completion,
            elapsed: started.elapsed(),
        };

        info!(
            total,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            unfinished = report.unfinished(),
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            ?completion,
            "Ingestion finished"
        );

        self.set_state(PipelineState::Done(completion));
        report
    }

    fn set_state(&self, state: PipelineState) {
        debug!(?state, "Pipeline state changed");
        self.state.send_replace(state);
    }
}

/// Pull items until the queue is closed and empty, or the run is stopped.
async fn worker<S: UserService>(
    worker_id: usize,
    service: Arc<S>,
    queue: Arc<Mutex<mpsc::Receiver<User>>>,
    outcomes: mpsc::UnboundedSender<Outcome>,
    stop: Arc<AtomicBool>,
    attempted: Arc<AtomicUsize>,
    deadline_at: Instant,
) {
    let mut processed = 0_usize;

    loop {
        if stop.load(Ordering::Acquire) || Instant::now() >= deadline_at {
            debug!(worker_id, processed, "Worker stopping before queue drained");
            break;
        }

        // The queue is closed before workers start, so this never parks.
        let next = queue.lock().await.recv().await;
        let Some(user) = next else {
            break;
        };
        attempted.fetch_add(1, Ordering::AcqRel);

        let id = user.id.clone();
        let outcome = match service.create(user).await {
            Ok(_) => Outcome::Created(id),
            Err(e) => {
                warn!(worker_id, user_id = %id, error = %e, "Failed to create user");
                Outcome::Failed(FailedRecord {
                    id,
                    error: e.to_string(),
                })
            }
        };
        processed += 1;

        // The receiver is gone once the run has returned; nothing to report to.
        if outcomes.send(outcome).is_err() {
            debug!(worker_id, "Run already returned, outcome dropped");
        }
    }

    debug!(worker_id, processed, "Worker exited");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use crate::db::RepositoryError;

    use super::*;

    /// Records every create call; optionally slow and optionally failing.
    #[derive(Default)]
    struct RecordingService {
        delay: Duration,
        fail_ids: HashSet<String>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        created: std::sync::Mutex<Vec<UserId>>,
    }

    impl RecordingService {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl UserService for RecordingService {
        async fn create(&self, user: User) -> Result<User, RepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_ids.contains(user.id.as_str()) {
                return Err(RepositoryError::Conflict(format!(
                    "user {} already exists",
                    user.id
                )));
            }
            self.created.lock().unwrap().push(user.id.clone());
            Ok(user)
        }

        async fn get(&self, _id: &UserId) -> Result<User, RepositoryError> {
            Err(RepositoryError::NotFound)
        }
    }

    fn batch(n: usize) -> Vec<User> {
        (0..n)
            .map(|i| User {
                id: UserId::parse(&format!("u-{i}")).unwrap(),
                name: format!("User {i}"),
                email: format!("user{i}@example.com"),
                phone_number: format!("555-{i:04}"),
                addresses: Vec::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_every_item_attempted_once() {
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 3, Duration::from_secs(60));

        let report = pipeline.run(batch(20)).await;

        assert_eq!(service.calls(), 20);
        assert_eq!(report.total, 20);
        assert_eq!(report.succeeded.len(), 20);
        assert!(report.failed.is_empty());
        assert!(report.is_drained());

        let unique: HashSet<_> = service.created.lock().unwrap().iter().cloned().collect();
        assert_eq!(unique.len(), 20);
    }

    #[tokio::test]
    async fn test_more_workers_than_items() {
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 10, Duration::from_secs(60));

        let report = pipeline.run(batch(2)).await;

        assert_eq!(service.calls(), 2);
        assert!(report.is_drained());
    }

    #[tokio::test]
    async fn test_empty_batch_drains_immediately() {
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 4, Duration::from_secs(60));

        let report = pipeline.run(Vec::new()).await;

        assert_eq!(service.calls(), 0);
        assert_eq!(report.total, 0);
        assert_eq!(report.completion, Completion::Drained);
    }

    #[tokio::test]
    async fn test_zero_workers_still_runs_one() {
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 0, Duration::from_secs(60));

        assert_eq!(pipeline.workers(), 1);
        let report = pipeline.run(batch(3)).await;
        assert_eq!(report.succeeded.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bounded_by_worker_count() {
        let service = Arc::new(RecordingService::with_delay(Duration::from_millis(50)));
        let pipeline = IngestPipeline::new(Arc::clone(&service), 4, Duration::from_secs(60));

        let report = pipeline.run(batch(16)).await;

        assert!(report.is_drained());
        assert_eq!(service.calls(), 16);
        assert_eq!(service.max_in_flight.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_failures_reported_not_retried() {
        let service = Arc::new(RecordingService {
            fail_ids: ["u-1", "u-3"].into_iter().map(String::from).collect(),
            ..RecordingService::default()
        });
        let pipeline = IngestPipeline::new(Arc::clone(&service), 2, Duration::from_secs(60));

        let report = pipeline.run(batch(5)).await;

        assert_eq!(service.calls(), 5);
        assert!(report.is_drained());
        assert_eq!(report.succeeded.len(), 3);

        let mut failed: Vec<&str> = report.failed.iter().map(|f| f.id.as_str()).collect();
        failed.sort_unstable();
        assert_eq!(failed, ["u-1", "u-3"]);
        assert!(report.failed.iter().all(|f| f.error.contains("already exists")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_pulling_but_not_in_flight() {
        let service = Arc::new(RecordingService::with_delay(Duration::from_secs(10)));
        let pipeline = IngestPipeline::new(Arc::clone(&service), 1, Duration::from_secs(15));

        let report = pipeline.run(batch(5)).await;

        assert_eq!(report.completion, Completion::DeadlineElapsed);
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.unfinished(), 4);
        // The second item was in flight when the deadline fired.
        assert_eq!(service.calls(), 2);

        // The detached worker finishes its in-flight item, then takes no more.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(service.calls(), 2);
        assert_eq!(service.created.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_signal_ends_run() {
        let service = Arc::new(RecordingService::with_delay(Duration::from_secs(10)));
        let pipeline = IngestPipeline::new(Arc::clone(&service), 2, Duration::from_secs(3600));

        let report = pipeline
            .run_until(batch(10), tokio::time::sleep(Duration::from_secs(25)))
            .await;

        assert_eq!(report.completion, Completion::ShutdownRequested);
        assert_eq!(report.succeeded.len(), 4);
        assert!(report.unfinished() > 0);
        assert_eq!(
            pipeline.state(),
            PipelineState::Done(Completion::ShutdownRequested)
        );
    }

    #[tokio::test]
    async fn test_state_ends_done_drained() {
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(service, 2, Duration::from_secs(60));
        let rx = pipeline.subscribe();
        assert_eq!(*rx.borrow(), PipelineState::Idle);

        pipeline.run(batch(3)).await;

        assert_eq!(*rx.borrow(), PipelineState::Done(Completion::Drained));
    }

    fn batch_file(users: &[User]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("sika-batch-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_json::to_string(users).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_state_transitions_observed_in_order() {
        let path = batch_file(&batch(3));
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(service, 2, Duration::from_secs(60));

        let mut rx = pipeline.subscribe();
        let watcher = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = *rx.borrow_and_update();
                seen.push(state);
                if matches!(state, PipelineState::Done(_)) {
                    break;
                }
            }
            seen
        });

        let report = pipeline.run_file(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        let seen = watcher.await.unwrap();

        assert!(report.is_drained());
        assert_eq!(
            seen,
            [
                PipelineState::Loading,
                PipelineState::FanningOut,
                PipelineState::Draining,
                PipelineState::Done(Completion::Drained),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_deadline_is_not_reported_as_drained() {
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 2, Duration::ZERO);
        let rx = pipeline.subscribe();

        let report = pipeline.run(batch(5)).await;

        assert_eq!(report.completion, Completion::DeadlineElapsed);
        assert!(!report.is_drained());
        assert!(report.succeeded.is_empty());
        assert_eq!(report.unfinished(), 5);
        assert_eq!(
            *rx.borrow(),
            PipelineState::Done(Completion::DeadlineElapsed)
        );

        // Detached workers see the stop flag and never start an item.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_load_slower_than_deadline_attempts_nothing() {
        let path = batch_file(&batch(4));
        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 2, Duration::from_nanos(1));

        let report = pipeline.run_file(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(report.completion, Completion::DeadlineElapsed);
        assert_eq!(report.total, 4);
        assert_eq!(report.unfinished(), 4);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_load_error_spawns_no_workers() {
        let path = std::env::temp_dir().join(format!("sika-bad-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{ not json").unwrap();

        let service = Arc::new(RecordingService::default());
        let pipeline = IngestPipeline::new(Arc::clone(&service), 4, Duration::from_secs(60));

        let result = pipeline.run_file(&path).await;
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(LoadError::Decode { .. })));
        assert_eq!(service.calls(), 0);
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}
