//! In-process batch job scheduler.
//!
//! One dispatch loop pulls ready jobs from the waiting set on a fixed interval, up to the
//! concurrency ceiling, and runs each on its own tokio task raced against a timeout.
//! Failed attempts are re-queued with exponential backoff until the retry budget is spent.
//!
//! Lock order: `registry` before `state`. Neither lock is held across persistence or
//! handler awaits. A job leaves the waiting set and enters `running` under one `state`
//! guard, so it cannot be dispatched twice.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::jobs::error::JobError;
use crate::jobs::events::JobEvent;
use crate::jobs::persistence::JobPersistence;
use crate::jobs::queue::{QueueItem, WaitingQueue};
use crate::jobs::registry::{ExecutorRegistry, JobContext, JobExecutor};
use crate::models::batch::{
    BatchJob, JobId, JobPriority, JobResults, JobStatus, JobType, Progress, SchedulerStats,
};

const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent_jobs: usize,
    pub default_timeout: Duration,
    pub default_max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_backoff_multiplier: f64,
    pub retry_max_delay: Duration,
    pub dispatch_interval: Duration,
    pub progress_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            default_timeout: Duration::from_secs(300),
            default_max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_backoff_multiplier: 2.0,
            retry_max_delay: Duration::from_secs(300),
            dispatch_interval: Duration::from_secs(1),
            progress_interval: Duration::from_secs(5),
        }
    }
}

impl SchedulerConfig {
    /// `base × multiplier^retry_count`, capped at `retry_max_delay`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let factor = self.retry_backoff_multiplier.max(1.0).powi(exponent);
        let millis = self.retry_base_delay.as_millis() as f64 * factor;
        let cap = self.retry_max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= cap {
            self.retry_max_delay
        } else {
            Duration::from_millis(millis as u64)
        }
    }
}

/// Per-job overrides accepted by `create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateOptions {
    #[serde(default)]
    pub priority: Option<JobPriority>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Units of work known up front, so `progress.total` is accurate before dispatch.
    #[serde(default)]
    pub expected_total: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub in_memory: usize,
    pub persisted: u64,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, BatchJob>,
    waiting: WaitingQueue,
    running: HashSet<JobId>,
    finished: HashSet<JobId>,
}

pub struct Scheduler {
    config: SchedulerConfig,
    registry: RwLock<ExecutorRegistry>,
    state: Mutex<QueueState>,
    persistence: Arc<dyn JobPersistence>,
    events: broadcast::Sender<JobEvent>,
    shutdown_tx: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, persistence: Arc<dyn JobPersistence>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            registry: RwLock::new(ExecutorRegistry::default()),
            state: Mutex::new(QueueState::default()),
            persistence,
            events,
            shutdown_tx,
            dispatcher: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub async fn register(&self, executor: Arc<dyn JobExecutor>) {
        let (job_type, name) = (executor.job_type(), executor.name());
        if self.registry.write().await.insert(executor).is_some() {
            warn!(%job_type, name, "Replaced previously registered executor");
        } else {
            info!(%job_type, name, "Registered job executor");
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Operations
    // ────────────────────────────────────────────────────────────────────────

    pub async fn create(
        &self,
        job_type: JobType,
        name: &str,
        parameters: Value,
        options: CreateOptions,
    ) -> Result<JobId, JobError> {
        let executor = self.registry.read().await.get(job_type, name).ok_or_else(|| {
            JobError::Validation(format!("no executor registered for {job_type}/{name}"))
        })?;
        executor.validate_parameters(&parameters)?;

        let mut job = BatchJob::new(job_type, name, parameters);
        job.priority = options.priority.unwrap_or_default();
        job.metadata.max_retries = options
            .max_retries
            .unwrap_or(self.config.default_max_retries);
        job.metadata.timeout_ms = options.timeout_ms;
        job.metadata.tags = options.tags;
        job.progress = Progress::new(options.expected_total.unwrap_or(0));

        let job_id = job.id;
        {
            let mut state = self.state.lock().await;
            state.waiting.push(QueueItem::ready_now(&job));
            state.jobs.insert(job_id, job.clone());
        }

        if let Err(e) = self.persistence.persist_job(&job).await {
            warn!(%job_id, error = %e, "Failed to persist new job");
        }
        info!(
            %job_id,
            %job_type,
            name,
            priority = job.priority.as_str(),
            "Job created"
        );
        self.emit(JobEvent::Created {
            job_id,
            job_type,
            name: job.name,
            priority: job.priority,
        });
        Ok(job_id)
    }

    pub async fn get_job(&self, job_id: JobId) -> Option<BatchJob> {
        self.state.lock().await.jobs.get(&job_id).cloned()
    }

    /// Newest first.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Vec<BatchJob> {
        let state = self.state.lock().await;
        let mut jobs: Vec<BatchJob> = state
            .jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.timing.created_at.cmp(&a.timing.created_at));
        jobs
    }

    /// Pending jobs are cancelled immediately. Running jobs are flagged; the handler may
    /// notice through `JobContext`, and whatever it returns is discarded. The concurrency
    /// slot is released once the handler returns.
    pub async fn cancel_job(&self, job_id: JobId) -> bool {
        let snapshot = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(job) = state.jobs.get_mut(&job_id) else {
                return false;
            };
            match job.status {
                JobStatus::Pending => {
                    state.waiting.remove(job_id);
                    job.mark_cancelled(Utc::now());
                    state.finished.insert(job_id);
                }
                JobStatus::Running => job.mark_cancelled(Utc::now()),
                _ => return false,
            }
            job.clone()
        };

        info!(%job_id, "Job cancelled");
        self.persist_update(&snapshot).await;
        self.emit(JobEvent::Cancelled { job_id });
        true
    }

    /// Re-enqueues a permanently failed job with fresh progress and results.
    pub async fn retry_job(&self, job_id: JobId) -> bool {
        let snapshot = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(job) = state.jobs.get_mut(&job_id) else {
                return false;
            };
            if job.status != JobStatus::Failed || state.waiting.contains(job_id) {
                return false;
            }
            job.reset_for_manual_retry();
            state.finished.remove(&job_id);
            state.waiting.push(QueueItem::ready_now(job));
            job.clone()
        };

        info!(
            %job_id,
            retry_count = snapshot.metadata.retry_count,
            "Job manually re-queued"
        );
        self.persist_update(&snapshot).await;
        self.emit(JobEvent::Retrying {
            job_id,
            retry_count: snapshot.metadata.retry_count,
            delay_ms: 0,
            error: "manual retry".to_string(),
        });
        true
    }

    pub async fn get_stats(&self) -> SchedulerStats {
        let state = self.state.lock().await;
        let mut stats = SchedulerStats {
            waiting: state.waiting.len(),
            running: state.running.len(),
            total: state.jobs.len(),
            ..SchedulerStats::default()
        };

        let mut durations = Vec::new();
        let mut by_type = BTreeMap::new();
        let mut by_status = BTreeMap::new();
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Completed => {
                    stats.completed += 1;
                    if let Some(ms) = job.timing.actual_duration_ms {
                        durations.push(ms as f64);
                    }
                }
                JobStatus::Failed if state.finished.contains(&job.id) => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
                _ => {}
            }
            *by_type.entry(job.job_type.as_str().to_string()).or_insert(0) += 1;
            *by_status.entry(job.status.as_str().to_string()).or_insert(0) += 1;
        }

        let decided = stats.completed + stats.failed;
        stats.success_rate = if decided == 0 {
            0.0
        } else {
            stats.completed as f64 / decided as f64
        };
        stats.average_duration_ms = if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum::<f64>() / durations.len() as f64)
        };
        stats.by_type = by_type;
        stats.by_status = by_status;
        stats
    }

    /// Rehydrates unfinished jobs from storage. Returns how many were re-queued.
    ///
    /// Jobs found `running` were interrupted by a restart and count as a failed attempt.
    pub async fn recover(&self) -> Result<usize, JobError> {
        let stored = self.persistence.load_unfinished().await?;
        let registry = self.registry.read().await;
        let mut changed = Vec::new();
        let mut requeued = 0;

        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let now = Utc::now();

            for mut job in stored {
                if state.jobs.contains_key(&job.id) {
                    continue;
                }

                if !registry.contains(job.job_type, &job.name) {
                    job.mark_failed(
                        format!("no executor registered for {}/{}", job.job_type, job.name),
                        now,
                    );
                    state.finished.insert(job.id);
                    changed.push(job.clone());
                    state.jobs.insert(job.id, job);
                    continue;
                }

                match job.status {
                    JobStatus::Pending => {
                        state.waiting.push(QueueItem::ready_now(&job));
                        requeued += 1;
                    }
                    JobStatus::Running => {
                        job.mark_failed("interrupted by process restart", now);
                        if job.metadata.retry_count < job.metadata.max_retries {
                            job.requeue_for_retry();
                            state.waiting.push(QueueItem::ready_now(&job));
                            requeued += 1;
                        } else {
                            state.finished.insert(job.id);
                        }
                        changed.push(job.clone());
                    }
                    _ => continue,
                }
                state.jobs.insert(job.id, job);
            }
        }
        drop(registry);

        for job in &changed {
            self.persist_update(job).await;
        }
        info!(requeued, rewritten = changed.len(), "Recovered unfinished jobs");
        Ok(requeued)
    }

    /// Drops terminal jobs completed before `before` from memory and storage.
    pub async fn purge_finished(&self, before: DateTime<Utc>) -> Result<PurgeOutcome, JobError> {
        let in_memory = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let expired: Vec<JobId> = state
                .finished
                .iter()
                .filter(|id| {
                    state.jobs.get(*id).is_some_and(|j| {
                        j.status.is_terminal()
                            && j.timing.completed_at.is_some_and(|c| c < before)
                    })
                })
                .copied()
                .collect();
            for id in &expired {
                state.jobs.remove(id);
                state.finished.remove(id);
            }
            expired.len()
        };
        let persisted = self.persistence.purge_finished_before(before).await?;
        info!(in_memory, persisted, %before, "Purged finished jobs");
        Ok(PurgeOutcome {
            in_memory,
            persisted,
        })
    }

    // ────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────────────────

    /// Starts the dispatch loop. Calling twice is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut dispatcher = self.dispatcher.lock().await;
        if dispatcher.is_some() {
            return;
        }
        self.shutdown_tx.send_replace(false);
        let shutdown = self.shutdown_tx.subscribe();
        let scheduler = Arc::clone(self);
        *dispatcher = Some(tokio::spawn(scheduler.run_dispatch_loop(shutdown)));
        info!(
            max_concurrent = self.config.max_concurrent_jobs,
            interval_ms = self.config.dispatch_interval.as_millis() as u64,
            "Scheduler started"
        );
    }

    /// Stops dispatching. Jobs already running finish on their own tasks.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let handle = self.dispatcher.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Dispatch loop panicked");
            }
            info!("Scheduler stopped");
        }
    }

    async fn run_dispatch_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.dispatch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.dispatch_ready().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One dispatch pass. Returns the number of jobs started.
    pub async fn dispatch_ready(self: &Arc<Self>) -> usize {
        let registry = self.registry.read().await;
        let mut started = Vec::new();
        let mut orphaned = Vec::new();
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let available = self
                .config
                .max_concurrent_jobs
                .saturating_sub(state.running.len());
            if available == 0 {
                return 0;
            }

            let now = Utc::now();
            for item in state.waiting.take_ready(Instant::now(), available) {
                let Some(job) = state.jobs.get_mut(&item.job_id) else {
                    continue;
                };
                match registry.get(job.job_type, &job.name) {
                    Some(executor) => {
                        job.mark_running(now);
                        state.running.insert(job.id);
                        started.push((job.clone(), executor));
                    }
                    None => {
                        job.mark_failed(
                            format!("no executor registered for {}/{}", job.job_type, job.name),
                            now,
                        );
                        state.finished.insert(job.id);
                        orphaned.push(job.clone());
                    }
                }
            }
        }
        drop(registry);

        for job in orphaned {
            error!(job_id = %job.id, name = %job.name, "Executor missing at dispatch");
            self.persist_update(&job).await;
            self.emit(JobEvent::Failed {
                job_id: job.id,
                error: "executor missing".to_string(),
            });
        }

        let count = started.len();
        for (job, executor) in started {
            info!(job_id = %job.id, name = %job.name, "Job started");
            self.persist_update(&job).await;
            self.emit(JobEvent::Started { job_id: job.id });
            tokio::spawn(Arc::clone(self).execute(job, executor));
        }
        count
    }

    async fn execute(self: Arc<Self>, job: BatchJob, executor: Arc<dyn JobExecutor>) {
        let job_id = job.id;
        let timeout = job
            .metadata
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_timeout);

        let ticker = tokio::spawn(Arc::clone(&self).progress_ticker(job_id));
        let ctx = JobContext::new(job, Arc::clone(&self));
        let outcome = match tokio::time::timeout(timeout, executor.execute(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(JobError::Timeout(timeout)),
        };
        ticker.abort();

        self.finish(job_id, outcome).await;
    }

    async fn progress_ticker(self: Arc<Self>, job_id: JobId) {
        let mut ticker = interval(self.config.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(snapshot) = self.get_job(job_id).await else {
                return;
            };
            if snapshot.status != JobStatus::Running {
                return;
            }
            self.persist_update(&snapshot).await;
            self.emit(JobEvent::Progress {
                job_id,
                progress: snapshot.progress,
            });
        }
    }

    async fn finish(&self, job_id: JobId, outcome: Result<JobResults, JobError>) {
        let (snapshot, event) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            state.running.remove(&job_id);
            let Some(job) = state.jobs.get_mut(&job_id) else {
                return;
            };
            let now = Utc::now();

            if job.status == JobStatus::Cancelled {
                state.finished.insert(job_id);
                debug!(%job_id, "Discarding outcome of cancelled job");
                (job.clone(), None)
            } else {
                match outcome {
                    Ok(results) => {
                        job.mark_completed(results, now);
                        state.finished.insert(job_id);
                        info!(
                            %job_id,
                            duration_ms = job.timing.actual_duration_ms,
                            processed = job.results.processed,
                            failed = job.results.failed,
                            "Job completed"
                        );
                        let event = JobEvent::Completed {
                            job_id,
                            duration_ms: job.timing.actual_duration_ms,
                        };
                        (job.clone(), Some(event))
                    }
                    Err(e) => {
                        let message = e.to_string();
                        job.mark_failed(message.clone(), now);
                        if job.metadata.retry_count < job.metadata.max_retries {
                            let delay = self.config.backoff_delay(job.metadata.retry_count);
                            job.requeue_for_retry();
                            state.waiting.push(QueueItem::after(job, delay));
                            warn!(
                                %job_id,
                                retry_count = job.metadata.retry_count,
                                max_retries = job.metadata.max_retries,
                                delay_ms = delay.as_millis() as u64,
                                error = %message,
                                "Job attempt failed, retrying"
                            );
                            let event = JobEvent::Retrying {
                                job_id,
                                retry_count: job.metadata.retry_count,
                                delay_ms: delay.as_millis() as u64,
                                error: message,
                            };
                            (job.clone(), Some(event))
                        } else {
                            state.finished.insert(job_id);
                            error!(
                                %job_id,
                                retry_count = job.metadata.retry_count,
                                error = %message,
                                "Job failed permanently"
                            );
                            (job.clone(), Some(JobEvent::Failed { job_id, error: message }))
                        }
                    }
                }
            }
        };

        self.persist_update(&snapshot).await;
        if let Some(event) = event {
            self.emit(event);
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Handler callbacks
    // ────────────────────────────────────────────────────────────────────────

    pub(crate) async fn update_progress(&self, job_id: JobId, apply: impl FnOnce(&mut Progress)) {
        let mut state = self.state.lock().await;
        if let Some(job) = state.jobs.get_mut(&job_id) {
            if job.status == JobStatus::Running {
                apply(&mut job.progress);
            }
        }
    }

    pub(crate) async fn is_cancelled(&self, job_id: JobId) -> bool {
        self.state
            .lock()
            .await
            .jobs
            .get(&job_id)
            .is_some_and(|j| j.status == JobStatus::Cancelled)
    }

    async fn persist_update(&self, job: &BatchJob) {
        if let Err(e) = self.persistence.update_persisted_job(job).await {
            warn!(job_id = %job.id, error = %e, "Failed to persist job update");
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
