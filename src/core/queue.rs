//! In-process task queue: delivers `(job_id, url)` items to the orchestrator and
//! retries a job whose run fails outside the check stages.

use crate::core::orchestrator::{Orchestrator, TerminalOutcome};
use crate::error::QueueError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// A job waiting to be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub job_id: String,
    pub url: String,
}

/// Retry behaviour for failed runs. Each retry re-runs the whole job from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(60),
        }
    }
}

/// Runs a job with retries. The terminal `error` is written only once the retries are used up,
/// so a job's status never falls back from `error` to `running`.
pub async fn process(
    orchestrator: &Orchestrator,
    item: &WorkItem,
    policy: RetryPolicy,
) -> TerminalOutcome {
    let mut attempt = 0;
    loop {
        match orchestrator.attempt(&item.job_id, &item.url).await {
            Ok(bundle) => return TerminalOutcome::Done(bundle),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    job_id = %item.job_id,
                    error = %e,
                    retry = attempt,
                    max_retries = policy.max_retries,
                    delay_secs = policy.delay.as_secs(),
                    "Scan attempt failed, retrying."
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id = %item.job_id, retries = attempt, "Retries exhausted.");
                orchestrator.record_failure(&item.job_id, &message).await;
                return TerminalOutcome::Failed { message };
            }
        }
    }
}

// A queued item and where to report how its job ended.
struct Envelope {
    item: WorkItem,
    done: oneshot::Sender<TerminalOutcome>,
}

/// Handle to a running queue. Jobs run concurrently, at most `workers` at a time.
pub struct ScanQueue {
    sender: mpsc::Sender<Envelope>,
    dispatcher: JoinHandle<()>,
}

impl ScanQueue {
    pub fn start(orchestrator: Arc<Orchestrator>, policy: RetryPolicy, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel(workers.max(1) * 16);
        let dispatcher = tokio::spawn(dispatch(receiver, orchestrator, policy, workers.max(1)));
        info!(workers, max_retries = policy.max_retries, "Scan queue started.");
        Self { sender, dispatcher }
    }

    /// Queues a job. The returned receiver resolves with the job's outcome once it has
    /// run to completion, retries included, whatever the store recorded.
    pub async fn enqueue(
        &self,
        item: WorkItem,
    ) -> Result<oneshot::Receiver<TerminalOutcome>, QueueError> {
        debug!(job_id = %item.job_id, "Enqueuing scan.");
        let (done, outcome) = oneshot::channel();
        self.sender
            .send(Envelope { item, done })
            .await
            .map_err(|_| QueueError::Closed)?;
        Ok(outcome)
    }

    /// Stops accepting work and waits for every queued and in-flight job to finish.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.dispatcher.await {
            error!(error = %e, "Queue dispatcher panicked.");
        }
        info!("Scan queue stopped.");
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<Envelope>,
    orchestrator: Arc<Orchestrator>,
    policy: RetryPolicy,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();

    while let Some(Envelope { item, done }) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let orchestrator = Arc::clone(&orchestrator);
        running.spawn(async move {
            let _permit = permit;
            let outcome = process(&orchestrator, &item, policy).await;
            match &outcome {
                TerminalOutcome::Done(bundle) => {
                    info!(job_id = %item.job_id, score = ?bundle.score, "Job done.")
                }
                TerminalOutcome::Failed { message } => {
                    warn!(job_id = %item.job_id, error = %message, "Job failed permanently.")
                }
            }
            if done.send(outcome).is_err() {
                debug!(job_id = %item.job_id, "Nobody is waiting for this job.");
            }
        });
        // Reap finished jobs so the set does not grow with the queue's lifetime.
        while running.try_join_next().is_some() {}
    }

    while let Some(joined) = running.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Scan task panicked.");
        }
    }
}
