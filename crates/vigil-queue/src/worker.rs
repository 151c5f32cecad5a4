use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vigil_store::types::{QueueStatus, QueueTask};
use vigil_store::Store;

use vigil_core::config::QueueConfig;

/// Poll delay when the queue is empty.
const IDLE_POLL: Duration = Duration::from_secs(2);

/// Executes one claimed job. Returning `Err` triggers the bounded retry
/// path; the error string lands in `error_message`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, task: &QueueTask) -> std::result::Result<(), String>;
}

/// A pool of claim-loop workers plus the lease reaper.
pub struct WorkerPool {
    store: Arc<Store>,
    handler: Arc<dyn JobHandler>,
    model_name: String,
    config: QueueConfig,
}

impl WorkerPool {
    pub fn new(
        store: Arc<Store>,
        handler: Arc<dyn JobHandler>,
        model_name: String,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            handler,
            model_name,
            config,
        }
    }

    /// Spawn the configured number of workers and one reaper. The returned
    /// handles finish once `shutdown` flips to true.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.config.workers + 1);
        for worker_id in 0..self.config.workers {
            let pool = self.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, shutdown).await;
            }));
        }
        let pool = self.clone();
        handles.push(tokio::spawn(async move {
            pool.reaper_loop(shutdown).await;
        }));
        handles
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id, model = %self.model_name, "queue worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let claimed = match self.store.claim(&self.model_name) {
                Ok(c) => c,
                Err(e) => {
                    error!(worker_id, error = %e, "claim failed");
                    None
                }
            };
            match claimed {
                Some(task) => self.run_one(worker_id, task).await,
                None => {
                    // Idle: wait for either the poll delay or shutdown.
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_POLL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        info!(worker_id, "queue worker stopped");
    }

    async fn run_one(&self, worker_id: usize, task: QueueTask) {
        debug!(worker_id, task_id = task.id, task_type = %task.task_type, "job claimed");
        match self.handler.handle(&task).await {
            Ok(()) => {
                if let Err(e) = self.store.complete(task.id, QueueStatus::Completed) {
                    error!(task_id = task.id, error = %e, "completion write failed");
                }
            }
            Err(reason) => {
                warn!(task_id = task.id, %reason, "job failed");
                match self.store.retry(task.id, &reason, self.config.max_retries) {
                    Ok(status) => {
                        debug!(task_id = task.id, status = %status, "job requeued")
                    }
                    Err(e) => error!(task_id = task.id, error = %e, "retry write failed"),
                }
            }
        }
    }

    async fn reaper_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.reap_interval_secs);
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.store.reap_expired(
                        self.config.lease_timeout_minutes,
                        self.config.max_retries,
                    ) {
                        Ok(0) => {}
                        Ok(n) => warn!(reaped = n, "abandoned leases returned to pending"),
                        Err(e) => error!(error = %e, "reaper pass failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        handled: AtomicUsize,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for Counter {
        async fn handle(&self, _task: &QueueTask) -> std::result::Result<(), String> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err("transient failure".to_string());
            }
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(workers: usize) -> QueueConfig {
        QueueConfig {
            workers,
            max_retries: 3,
            lease_timeout_minutes: 10,
            reap_interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn pool_drains_the_queue_and_stops_on_shutdown() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        for i in 0..6 {
            store
                .enqueue("summary", "X", &format!("job {i}"), &json!({}), i, None)
                .unwrap();
        }
        let handler = Arc::new(Counter {
            handled: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(0),
        });
        let pool = Arc::new(WorkerPool::new(
            store.clone(),
            handler.clone(),
            "X".to_string(),
            config(3),
        ));
        let (tx, rx) = watch::channel(false);
        let handles = pool.spawn(rx);

        // Wait for the queue to drain.
        for _ in 0..100 {
            if store.queue_stats().unwrap().completed == 6 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tx.send(true).unwrap();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(handler.handled.load(Ordering::SeqCst), 6);
        assert_eq!(store.queue_stats().unwrap().completed, 6);
    }

    #[tokio::test]
    async fn failed_jobs_are_retried_to_completion() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let id = store
            .enqueue("summary", "X", "flaky", &json!({}), 1, None)
            .unwrap();
        let handler = Arc::new(Counter {
            handled: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(1),
        });
        let pool = Arc::new(WorkerPool::new(
            store.clone(),
            handler.clone(),
            "X".to_string(),
            config(1),
        ));
        let (tx, rx) = watch::channel(false);
        let handles = pool.spawn(rx);

        for _ in 0..200 {
            if store.queue_stats().unwrap().completed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tx.send(true).unwrap();
        for h in handles {
            h.await.unwrap();
        }
        let task = store.get_queue_task(id).unwrap();
        assert_eq!(task.status, QueueStatus::Completed);
        assert_eq!(task.retry_count, 1);
        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
    }
}
