//! In-process FIFO of render jobs waiting for a worker.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::job::RenderJob;

/// Shared handle to the queue. Cloning is cheap.
#[derive(Clone, Default)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: Mutex<VecDeque<RenderJob>>,
    available: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. Returns the queue length including the new job.
    pub async fn enqueue(&self, job: RenderJob) -> usize {
        let len = {
            let mut jobs = self.inner.jobs.lock().await;
            jobs.push_back(job);
            jobs.len()
        };
        self.inner.available.notify_one();
        debug!("Queue length now {}", len);
        len
    }

    /// Take the oldest job, waiting until one is available.
    pub async fn dequeue(&self) -> RenderJob {
        loop {
            if let Some(job) = self.try_dequeue().await {
                return job;
            }
            self.inner.available.notified().await;
        }
    }

    /// Take the oldest job if there is one.
    pub async fn try_dequeue(&self) -> Option<RenderJob> {
        self.inner.jobs.lock().await.pop_front()
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub async fn len(&self) -> usize {
        self.inner.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocap_models::{JobId, RotationMode};
    use std::time::Duration;

    fn job(id: &str) -> RenderJob {
        RenderJob::new(JobId::from_string(id), "/tmp/clip.bvh", RotationMode::Default)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = JobQueue::new();
        assert_eq!(queue.enqueue(job("a")).await, 1);
        assert_eq!(queue.enqueue(job("b")).await, 2);
        assert_eq!(queue.enqueue(job("c")).await, 3);

        assert_eq!(queue.dequeue().await.job_id.as_str(), "a");
        assert_eq!(queue.dequeue().await.job_id.as_str(), "b");
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = JobQueue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.enqueue(job("late")).await;
        let got = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.job_id.as_str(), "late");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_try_dequeue_on_empty_queue() {
        let queue = JobQueue::new();
        assert!(queue.try_dequeue().await.is_none());
    }
}
