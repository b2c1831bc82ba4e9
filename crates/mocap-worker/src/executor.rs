//! Job executor.

use std::sync::Arc;

use mocap_media::RenderBackend;
use mocap_queue::{JobQueue, JobStore};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::processor::JobProcessor;

/// Drains the render queue, running at most `max_concurrent_jobs` jobs at once.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: JobQueue,
    processor: Arc<JobProcessor>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(
        config: WorkerConfig,
        queue: JobQueue,
        store: JobStore,
        backend: Arc<dyn RenderBackend>,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        let processor = Arc::new(JobProcessor::new(config.clone(), store, backend));

        Self {
            config,
            queue,
            processor,
            job_semaphore,
            shutdown,
        }
    }

    /// Stop taking jobs. `run` returns once in-flight jobs finish or the
    /// shutdown timeout passes.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            let permit = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => {
                    permit.map_err(|_| WorkerError::job_failed("Semaphore closed"))?
                }
            };

            let job = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_rx) => break,
                job = self.queue.dequeue() => job,
            };

            debug!("Dequeued job {}", job.job_id);
            let processor = Arc::clone(&self.processor);
            let semaphore = Arc::clone(&self.job_semaphore);
            let max_jobs = self.config.max_concurrent_jobs;
            metrics::set_jobs_in_flight(max_jobs - semaphore.available_permits());

            tokio::spawn(async move {
                processor.run(job).await;
                drop(permit);
                metrics::set_jobs_in_flight(max_jobs - semaphore.available_permits());
            });
        }

        info!("Shutdown signal received, waiting for in-flight jobs...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    async fn wait_for_jobs(&self) {
        let all = self.config.max_concurrent_jobs as u32;
        let _ = self.job_semaphore.acquire_many(all).await;
    }
}

/// Resolves once the shutdown flag is set; never resolves if the sender is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
