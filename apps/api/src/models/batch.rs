//! Batch job record shared by the scheduler, executors, persistence, and the HTTP layer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::common::ValidationError;

pub type JobId = Uuid;

/// Per-job cap on stored error entries; further failures are only counted.
pub const MAX_RECORDED_ERRORS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Matching,
    Recommendations,
    Embeddings,
    Cleanup,
    Analytics,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Matching => "matching",
            JobType::Recommendations => "recommendations",
            JobType::Embeddings => "embeddings",
            JobType::Cleanup => "cleanup",
            JobType::Analytics => "analytics",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matching" => Ok(JobType::Matching),
            "recommendations" => Ok(JobType::Recommendations),
            "embeddings" => Ok(JobType::Embeddings),
            "cleanup" => Ok(JobType::Cleanup),
            "analytics" => Ok(JobType::Analytics),
            other => Err(ValidationError::new("type", format!("unknown job type '{other}'"))),
        }
    }
}

/// Dispatch priority. Declaration order is the ordering: `Critical` is greatest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl JobPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            JobPriority::Low => "low",
            JobPriority::Medium => "medium",
            JobPriority::High => "high",
            JobPriority::Critical => "critical",
        }
    }
}

impl FromStr for JobPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(JobPriority::Low),
            "medium" => Ok(JobPriority::Medium),
            "high" => Ok(JobPriority::High),
            "critical" => Ok(JobPriority::Critical),
            other => Err(ValidationError::new(
                "priority",
                format!("unknown priority '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(ValidationError::new("status", format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub percentage: f64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            current: 0,
            total,
            percentage: 0.0,
        }
    }

    /// Raising the total never drops below the work already done.
    pub fn set_total(&mut self, total: u64) {
        self.total = total.max(self.current);
        self.recompute();
    }

    pub fn advance(&mut self, units: u64) {
        self.current = self.current.saturating_add(units).min(self.total);
        self.recompute();
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.percentage = if self.total == 0 {
            0.0
        } else {
            ((self.current as f64 / self.total as f64) * 10_000.0).round() / 100.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Item the failure applies to (e.g. `candidate:job` pair); `None` for whole-job failures.
    pub item: Option<String>,
    pub message: String,
    pub attempt: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub errors: Vec<ErrorEntry>,
    pub warnings: Vec<String>,
    /// Errors counted in `failed` but not stored once `MAX_RECORDED_ERRORS` was reached.
    #[serde(default)]
    pub suppressed_errors: u64,
    #[serde(default)]
    pub output: Option<Value>,
}

impl JobResults {
    pub fn record_success(&mut self, units: u64) {
        self.processed += units;
        self.successful += units;
    }

    /// Counts `units` failed items and stores one error entry for them.
    pub fn record_failure(&mut self, item: impl Into<String>, message: impl Into<String>, units: u64) {
        self.processed += units;
        self.failed += units;
        self.push_error(ErrorEntry {
            item: Some(item.into()),
            message: message.into(),
            attempt: 0,
            occurred_at: Utc::now(),
        });
    }

    pub fn push_error(&mut self, entry: ErrorEntry) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(entry);
        } else {
            if self.suppressed_errors == 0 {
                self.warnings.push(format!(
                    "error log truncated after {MAX_RECORDED_ERRORS} entries"
                ));
            }
            self.suppressed_errors += 1;
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Folds a chunk's outcome into the job-level totals.
    pub fn merge(&mut self, other: JobResults) {
        self.processed += other.processed;
        self.successful += other.successful;
        self.failed += other.failed;
        for entry in other.errors {
            self.push_error(entry);
        }
        self.suppressed_errors += other.suppressed_errors;
        self.warnings.extend(other.warnings);
        if other.output.is_some() {
            self.output = other.output;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_duration_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A unit of scheduled scoring or maintenance work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub name: String,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub progress: Progress,
    pub parameters: Value,
    pub results: JobResults,
    pub timing: Timing,
    pub metadata: JobMetadata,
}

impl BatchJob {
    pub fn new(job_type: JobType, name: impl Into<String>, parameters: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type,
            name: name.into(),
            priority: JobPriority::default(),
            status: JobStatus::Pending,
            progress: Progress::default(),
            parameters,
            results: JobResults::default(),
            timing: Timing {
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                actual_duration_ms: None,
            },
            metadata: JobMetadata {
                retry_count: 0,
                max_retries: 0,
                timeout_ms: None,
                tags: Vec::new(),
            },
        }
    }

    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.timing.started_at = Some(now);
        self.timing.completed_at = None;
        self.timing.actual_duration_ms = None;
    }

    /// Stores handler output. Errors from earlier attempts survive as warnings.
    pub fn mark_completed(&mut self, mut results: JobResults, now: DateTime<Utc>) {
        let earlier: Vec<String> = self
            .results
            .errors
            .iter()
            .filter(|e| e.item.is_none())
            .map(|e| format!("attempt {} failed: {}", e.attempt + 1, e.message))
            .collect();
        if !earlier.is_empty() {
            let mut warnings = earlier;
            warnings.append(&mut results.warnings);
            results.warnings = warnings;
        }
        self.results = results;
        self.status = JobStatus::Completed;
        self.finish_timing(now);
    }

    /// Records a whole-attempt failure. Status becomes `Failed`; the scheduler decides
    /// whether it goes back to pending.
    pub fn mark_failed(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.results.push_error(ErrorEntry {
            item: None,
            message: message.into(),
            attempt: self.metadata.retry_count,
            occurred_at: now,
        });
        self.status = JobStatus::Failed;
        self.finish_timing(now);
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Cancelled;
        if self.timing.started_at.is_some() {
            self.finish_timing(now);
        } else {
            self.timing.completed_at = Some(now);
        }
    }

    /// Automatic retry after a failed attempt: keeps the error history.
    pub fn requeue_for_retry(&mut self) {
        self.metadata.retry_count += 1;
        self.status = JobStatus::Pending;
        self.progress.reset();
        self.timing.started_at = None;
        self.timing.completed_at = None;
        self.timing.actual_duration_ms = None;
    }

    /// Explicit retry of a permanently failed job: clears progress and results.
    pub fn reset_for_manual_retry(&mut self) {
        self.metadata.retry_count += 1;
        if self.metadata.retry_count > self.metadata.max_retries {
            self.metadata.max_retries = self.metadata.retry_count;
        }
        self.status = JobStatus::Pending;
        self.progress.reset();
        self.results = JobResults::default();
        self.timing.started_at = None;
        self.timing.completed_at = None;
        self.timing.actual_duration_ms = None;
    }

    fn finish_timing(&mut self, now: DateTime<Utc>) {
        self.timing.completed_at = Some(now);
        self.timing.actual_duration_ms = self
            .timing
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0));
    }
}

/// Aggregate counters returned by `Scheduler::get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub waiting: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
    /// `completed / (completed + failed)`; 0 when nothing has finished.
    pub success_rate: f64,
    pub average_duration_ms: Option<f64>,
    pub by_type: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_ordering() {
        assert!(JobPriority::Critical > JobPriority::High);
        assert!(JobPriority::High > JobPriority::Medium);
        assert!(JobPriority::Medium > JobPriority::Low);
        assert_eq!(JobPriority::default(), JobPriority::Medium);
    }

    #[test]
    fn test_progress_never_exceeds_total() {
        let mut progress = Progress::new(10);
        progress.advance(7);
        progress.advance(7);
        assert_eq!(progress.current, 10);
        assert_eq!(progress.percentage, 100.0);
    }

    #[test]
    fn test_progress_total_cannot_drop_below_current() {
        let mut progress = Progress::new(10);
        progress.advance(4);
        progress.set_total(2);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percentage, 100.0);
    }

    #[test]
    fn test_progress_percentage_rounded() {
        let mut progress = Progress::new(3);
        progress.advance(1);
        assert_eq!(progress.percentage, 33.33);
    }

    #[test]
    fn test_error_log_is_capped() {
        let mut results = JobResults::default();
        for i in 0..(MAX_RECORDED_ERRORS + 5) {
            results.record_failure(format!("item-{i}"), "boom", 1);
        }
        assert_eq!(results.errors.len(), MAX_RECORDED_ERRORS);
        assert_eq!(results.failed, (MAX_RECORDED_ERRORS + 5) as u64);
        assert_eq!(results.suppressed_errors, 5);
        assert_eq!(results.warnings.len(), 1);
    }

    #[test]
    fn test_merge_accumulates_chunks() {
        let mut total = JobResults::default();
        let mut chunk = JobResults::default();
        chunk.record_success(4);
        chunk.record_failure("c1:j1", "save failed", 1);
        total.merge(chunk.clone());
        total.merge(chunk);
        assert_eq!(total.processed, 10);
        assert_eq!(total.successful, 8);
        assert_eq!(total.failed, 2);
        assert_eq!(total.errors.len(), 2);
    }

    #[test]
    fn test_completion_keeps_earlier_attempt_errors_as_warnings() {
        let mut job = BatchJob::new(JobType::Matching, "large_scale_matching", json!({}));
        job.metadata.max_retries = 3;
        job.mark_running(Utc::now());
        job.mark_failed("connection reset", Utc::now());
        job.requeue_for_retry();
        job.mark_running(Utc::now());
        job.mark_completed(JobResults::default(), Utc::now());

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.results.warnings, vec!["attempt 1 failed: connection reset"]);
        assert!(job.timing.actual_duration_ms.is_some());
    }

    #[test]
    fn test_manual_retry_keeps_retry_invariant() {
        let mut job = BatchJob::new(JobType::Cleanup, "data_cleanup", json!({}));
        job.metadata.max_retries = 1;
        job.metadata.retry_count = 1;
        job.status = JobStatus::Failed;
        job.reset_for_manual_retry();
        assert_eq!(job.metadata.retry_count, 2);
        assert!(job.metadata.retry_count <= job.metadata.max_retries);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.results.errors.is_empty());
    }

    #[test]
    fn test_job_type_round_trips_through_str() {
        for t in [
            JobType::Matching,
            JobType::Recommendations,
            JobType::Embeddings,
            JobType::Cleanup,
            JobType::Analytics,
        ] {
            assert_eq!(t.as_str().parse::<JobType>().unwrap(), t);
        }
        assert!("render".parse::<JobType>().is_err());
    }

    #[test]
    fn test_batch_job_serializes_type_field() {
        let job = BatchJob::new(JobType::Analytics, "analytics_generation", json!({}));
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "analytics");
        assert_eq!(value["status"], "pending");
    }
}
