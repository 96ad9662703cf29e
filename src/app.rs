// src/app.rs

use crate::config::Config;
use crate::core::models::ScanJob;
use crate::core::orchestrator::{Orchestrator, TerminalOutcome};
use crate::core::queue::{ScanQueue, WorkItem};
use crate::core::scanner::{NetworkScanner, ScanTarget, SiteScanner};
use crate::core::store::{FileJobStore, JobStore, LenientJobStore};
use crate::error::{ScanError, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

/// Wires the store, checks, orchestrator and queue together, and offers the
/// submit/status operations a front end needs.
pub struct App {
    store: Arc<dyn JobStore>,
    queue: ScanQueue,
    // Completion signals of submitted jobs, until someone waits on them.
    pending: Mutex<HashMap<String, Pending>>,
}

struct Pending {
    url: String,
    outcome: oneshot::Receiver<TerminalOutcome>,
}

impl App {
    /// Builds the production setup: file-backed job records and live network checks.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let files = FileJobStore::open(config.store_dir()).await?;
        let store: Arc<dyn JobStore> = if config.store.lenient {
            Arc::new(LenientJobStore::new(files))
        } else {
            Arc::new(files)
        };
        let scanner = Arc::new(NetworkScanner::new(config.timeout(), config.scan.user_agent.clone()));
        Ok(Self::with_parts(config, store, scanner))
    }

    /// Builds an app from explicit collaborators.
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn JobStore>,
        scanner: Arc<dyn SiteScanner>,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&store), scanner));
        let queue = ScanQueue::start(orchestrator, config.retry_policy(), config.queue.workers);
        Self {
            store,
            queue,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a `queued` job for `url` and hands it to the queue. Returns the new job id.
    ///
    /// Only validates what the scanners need: an http(s) URL with a host.
    pub async fn submit(&self, url: &str) -> Result<String, ScanError> {
        let target = ScanTarget::parse(url)?;
        if target.scheme != "http" && target.scheme != "https" {
            return Err(ScanError::InvalidTarget {
                url: url.to_string(),
                reason: "URL must start with http:// or https://".to_string(),
            });
        }

        let job_id = Uuid::new_v4().to_string();
        self.store.create(&job_id, url).await?;
        let outcome = self
            .queue
            .enqueue(WorkItem {
                job_id: job_id.clone(),
                url: url.to_string(),
            })
            .await?;
        self.pending.lock().await.insert(
            job_id.clone(),
            Pending {
                url: url.to_string(),
                outcome,
            },
        );
        info!(job_id = %job_id, url, "Scan submitted.");
        Ok(job_id)
    }

    pub async fn status(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError> {
        self.store.get(job_id).await
    }

    /// Polls a job until it reaches `done` or `error`.
    ///
    /// For a job submitted through this app, the queue's completion signal also ends the
    /// wait. If the store never recorded the terminal state (a lenient store may drop
    /// writes), the returned record is the stored one with the outcome applied.
    pub async fn wait_for(
        &self,
        job_id: &str,
        poll_interval: Duration,
    ) -> Result<ScanJob, StoreError> {
        let mut pending = self.pending.lock().await.remove(job_id);
        loop {
            let stored = self.status(job_id).await?;
            match &stored {
                Some(job) if job.status.is_terminal() => return Ok(job.clone()),
                None if pending.is_none() => {
                    return Err(StoreError::NotFound(job_id.to_string()));
                }
                _ => {}
            }

            let finished = match pending.as_mut() {
                Some(waiting) => tokio::select! {
                    outcome = &mut waiting.outcome => Some(outcome),
                    _ = tokio::time::sleep(poll_interval) => None,
                },
                None => {
                    tokio::time::sleep(poll_interval).await;
                    None
                }
            };

            match finished {
                Some(Ok(outcome)) => {
                    let url = pending.map(|p| p.url).unwrap_or_default();
                    return self.settle(job_id, &url, outcome).await;
                }
                // The worker went away without reporting; fall back to polling.
                Some(Err(_)) => pending = None,
                None => {}
            }
        }
    }

    async fn settle(
        &self,
        job_id: &str,
        url: &str,
        outcome: TerminalOutcome,
    ) -> Result<ScanJob, StoreError> {
        let stored = self.status(job_id).await?;
        if let Some(job) = &stored {
            if job.status.is_terminal() {
                return Ok(job.clone());
            }
        }
        warn!(job_id, "Job finished but the store does not show a terminal state.");
        let mut job = stored.unwrap_or_else(|| ScanJob::new(job_id, url));
        job.apply(outcome.to_update())?;
        Ok(job)
    }

    /// Waits for all submitted jobs to finish.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}
