//! Job lifecycle events, broadcast in-process and forwarded to Redis pub/sub.

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::batch::{JobId, JobPriority, JobType, Progress};

pub const EVENTS_CHANNEL: &str = "batch_jobs:events";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Created {
        job_id: JobId,
        job_type: JobType,
        name: String,
        priority: JobPriority,
    },
    Started {
        job_id: JobId,
    },
    Progress {
        job_id: JobId,
        progress: Progress,
    },
    Retrying {
        job_id: JobId,
        retry_count: u32,
        delay_ms: u64,
        error: String,
    },
    Completed {
        job_id: JobId,
        duration_ms: Option<i64>,
    },
    Failed {
        job_id: JobId,
        error: String,
    },
    Cancelled {
        job_id: JobId,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Created { job_id, .. }
            | JobEvent::Started { job_id }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Retrying { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Cancelled { job_id } => *job_id,
        }
    }
}

/// Publishes every event on `EVENTS_CHANNEL` until the broadcast channel closes.
/// Publish failures are logged and skipped.
pub fn spawn_redis_forwarder(
    client: redis::Client,
    mut events: broadcast::Receiver<JobEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut conn = match client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Redis unavailable, job events will not be forwarded");
                return;
            }
        };
        info!(channel = EVENTS_CHANNEL, "Forwarding job events to Redis");

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event forwarder lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let payload = match serde_json::to_string(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize job event");
                    continue;
                }
            };

            if let Err(e) = conn.publish::<_, _, ()>(EVENTS_CHANNEL, payload).await {
                warn!(job_id = %event.job_id(), error = %e, "Failed to publish job event");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_event_serializes_with_tag() {
        let id = Uuid::new_v4();
        let event = JobEvent::Retrying {
            job_id: id,
            retry_count: 1,
            delay_ms: 2000,
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "retrying");
        assert_eq!(json["delay_ms"], 2000);
        assert_eq!(event.job_id(), id);
    }
}
