//! Waiting set: jobs not yet dispatched, ordered by priority tier then creation time.
//!
//! Items carry a monotonic `ready_at`. Items still in backoff keep their place in the
//! order but are skipped by `take_ready`, so they never block ready work behind them.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::models::batch::{BatchJob, JobId, JobPriority};

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub job_id: JobId,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    pub ready_at: Instant,
}

impl QueueItem {
    /// Item eligible immediately.
    pub fn ready_now(job: &BatchJob) -> Self {
        Self::after(job, std::time::Duration::ZERO)
    }

    /// Item eligible once `delay` has elapsed.
    pub fn after(job: &BatchJob, delay: std::time::Duration) -> Self {
        Self {
            job_id: job.id,
            priority: job.priority,
            created_at: job.timing.created_at,
            ready_at: Instant::now() + delay,
        }
    }

    /// True when `self` should be dispatched before `other`.
    fn precedes(&self, other: &QueueItem) -> bool {
        self.priority > other.priority
            || (self.priority == other.priority && self.created_at < other.created_at)
    }
}

#[derive(Debug, Default)]
pub struct WaitingQueue {
    items: Vec<QueueItem>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts behind every item that precedes or ties with it, so equal keys stay FIFO.
    pub fn push(&mut self, item: QueueItem) {
        let index = self.items.partition_point(|existing| !item.precedes(existing));
        self.items.insert(index, item);
    }

    /// Removes and returns up to `limit` items whose `ready_at` has passed, in order.
    pub fn take_ready(&mut self, now: Instant, limit: usize) -> Vec<QueueItem> {
        let mut taken = Vec::new();
        let mut index = 0;
        while index < self.items.len() && taken.len() < limit {
            if self.items[index].ready_at <= now {
                taken.push(self.items.remove(index));
            } else {
                index += 1;
            }
        }
        taken
    }

    pub fn remove(&mut self, job_id: JobId) -> Option<QueueItem> {
        let index = self.items.iter().position(|i| i.job_id == job_id)?;
        Some(self.items.remove(index))
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        self.items.iter().any(|i| i.job_id == job_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::batch::JobType;
    use serde_json::json;
    use std::time::Duration;

    fn job(priority: JobPriority, offset_ms: i64) -> BatchJob {
        let mut job = BatchJob::new(JobType::Matching, "large_scale_matching", json!({}));
        job.priority = priority;
        job.timing.created_at = Utc::now() + chrono::Duration::milliseconds(offset_ms);
        job
    }

    #[tokio::test(start_paused = true)]
    async fn test_orders_by_priority_then_age() {
        let mut queue = WaitingQueue::new();
        let old_medium = job(JobPriority::Medium, 0);
        let new_medium = job(JobPriority::Medium, 10);
        let low = job(JobPriority::Low, -100);
        let critical = job(JobPriority::Critical, 50);

        for j in [&new_medium, &low, &old_medium, &critical] {
            queue.push(QueueItem::ready_now(j));
        }

        let order: Vec<JobId> = queue.iter().map(|i| i.job_id).collect();
        assert_eq!(order, vec![critical.id, old_medium.id, new_medium.id, low.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_keys_stay_fifo() {
        let mut queue = WaitingQueue::new();
        let a = job(JobPriority::High, 0);
        let mut b = job(JobPriority::High, 0);
        b.timing.created_at = a.timing.created_at;
        queue.push(QueueItem::ready_now(&a));
        queue.push(QueueItem::ready_now(&b));
        let taken = queue.take_ready(Instant::now(), 1);
        assert_eq!(taken[0].job_id, a.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_ready_skips_backoff_items() {
        let mut queue = WaitingQueue::new();
        let delayed = job(JobPriority::Critical, 0);
        let ready = job(JobPriority::Low, 0);
        queue.push(QueueItem::after(&delayed, Duration::from_secs(5)));
        queue.push(QueueItem::ready_now(&ready));

        let taken = queue.take_ready(Instant::now(), 10);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].job_id, ready.id);
        assert!(queue.contains(delayed.id));

        tokio::time::advance(Duration::from_secs(5)).await;
        let taken = queue.take_ready(Instant::now(), 10);
        assert_eq!(taken[0].job_id, delayed.id);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_ready_respects_limit_and_remove() {
        let mut queue = WaitingQueue::new();
        let jobs: Vec<BatchJob> = (0..4).map(|i| job(JobPriority::Medium, i)).collect();
        for j in &jobs {
            queue.push(QueueItem::ready_now(j));
        }
        assert!(queue.remove(jobs[0].id).is_some());
        assert!(queue.remove(jobs[0].id).is_none());

        let taken = queue.take_ready(Instant::now(), 2);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].job_id, jobs[1].id);
        assert_eq!(queue.len(), 1);
        assert!(queue.take_ready(Instant::now(), 0).is_empty());
    }
}
