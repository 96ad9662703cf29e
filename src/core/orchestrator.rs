// src/core/orchestrator.rs

use crate::core::models::{JobResult, JobStatus, JobUpdate, ResultBundle, Stage};
use crate::core::scanner::{ScanTarget, SiteScanner};
use crate::core::scoring;
use crate::core::store::JobStore;
use crate::error::ScanError;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Progress written when the job starts running.
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_TLS: u8 = 30;
pub const PROGRESS_HEADERS: u8 = 50;
pub const PROGRESS_DNS: u8 = 70;
pub const PROGRESS_FINGERPRINT: u8 = 80;
pub const PROGRESS_DONE: u8 = 100;

/// How a job run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalOutcome {
    Done(ResultBundle),
    Failed { message: String },
}

impl TerminalOutcome {
    /// The job record write that states this outcome.
    pub fn to_update(&self) -> JobUpdate {
        match self {
            TerminalOutcome::Done(bundle) => JobUpdate::default()
                .status(JobStatus::Done)
                .progress(PROGRESS_DONE)
                .bundle(bundle.clone()),
            TerminalOutcome::Failed { message } => JobUpdate::default()
                .status(JobStatus::Error)
                .result(JobResult::Failed {
                    error: message.clone(),
                }),
        }
    }
}

/// Drives one job through the check pipeline and records its progress.
///
/// Stages run in a fixed order (TLS, headers, DNS, fingerprint). Each stage is isolated:
/// whatever goes wrong inside it, including a panic, becomes that stage's failed
/// variant and the pipeline moves on. After every stage the whole accumulated bundle is
/// checkpointed. Only failures outside the stages, such as a store write, fail the run.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    scanner: Arc<dyn SiteScanner>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn JobStore>, scanner: Arc<dyn SiteScanner>) -> Self {
        Self { store, scanner }
    }

    /// Runs the job once. A pipeline fault is recorded as the job's terminal `error`.
    pub async fn run(&self, job_id: &str, url: &str) -> TerminalOutcome {
        match self.attempt(job_id, url).await {
            Ok(bundle) => TerminalOutcome::Done(bundle),
            Err(e) => {
                let message = e.to_string();
                self.record_failure(job_id, &message).await;
                TerminalOutcome::Failed { message }
            }
        }
    }

    /// Executes the pipeline without writing a terminal error on failure, so a caller
    /// that retries the job can decide when the failure becomes final.
    pub async fn attempt(&self, job_id: &str, url: &str) -> Result<ResultBundle, ScanError> {
        info!(job_id, url, "Starting scan.");
        self.checkpoint(
            job_id,
            JobUpdate::default()
                .status(JobStatus::Running)
                .progress(PROGRESS_STARTED),
        )
        .await?;

        let target = ScanTarget::parse(url)?;
        let mut bundle = ResultBundle::default();

        let scanner = Arc::clone(&self.scanner);
        let (host, port) = (target.host.clone(), target.tls_port);
        bundle.tls = Some(isolate("tls", async move { scanner.tls(&host, port).await }).await);
        self.checkpoint(job_id, progress_with(PROGRESS_TLS, &bundle)).await?;

        let scanner = Arc::clone(&self.scanner);
        let page = target.url.clone();
        bundle.headers = Some(isolate("headers", async move { scanner.headers(&page).await }).await);
        self.checkpoint(job_id, progress_with(PROGRESS_HEADERS, &bundle)).await?;

        let scanner = Arc::clone(&self.scanner);
        let domain = target.host.clone();
        bundle.dns = Some(isolate("dns", async move { scanner.dns(&domain).await }).await);
        self.checkpoint(job_id, progress_with(PROGRESS_DNS, &bundle)).await?;

        let scanner = Arc::clone(&self.scanner);
        let page = target.url.clone();
        bundle.fingerprint =
            Some(isolate("fingerprint", async move { scanner.fingerprint(&page).await }).await);
        self.checkpoint(job_id, progress_with(PROGRESS_FINGERPRINT, &bundle)).await?;

        let score = scoring::score(&bundle);
        bundle.apply_score(score);
        info!(job_id, score = score.score, grade = %score.grade, "Scan scored.");

        self.checkpoint(
            job_id,
            JobUpdate::default()
                .status(JobStatus::Done)
                .progress(PROGRESS_DONE)
                .bundle(bundle.clone()),
        )
        .await?;

        info!(job_id, "Scan finished.");
        Ok(bundle)
    }

    /// Writes the terminal `error` state with the bundle reduced to the message.
    /// The store may itself be what failed, so a write error here is only logged.
    pub async fn record_failure(&self, job_id: &str, message: &str) {
        error!(job_id, error = message, "Scan failed.");
        let update = TerminalOutcome::Failed {
            message: message.to_string(),
        }
        .to_update();
        if let Err(e) = self.store.update(job_id, update).await {
            warn!(job_id, error = %e, "Could not record scan failure.");
        }
    }

    async fn checkpoint(&self, job_id: &str, update: JobUpdate) -> Result<(), ScanError> {
        debug!(job_id, progress = ?update.progress, status = ?update.status, "Checkpoint.");
        self.store.update(job_id, update).await?;
        Ok(())
    }
}

fn progress_with(progress: u8, bundle: &ResultBundle) -> JobUpdate {
    JobUpdate::default().progress(progress).bundle(bundle.clone())
}

/// Runs one stage on its own task so that a panic inside a check is contained.
async fn isolate<T, F>(stage: &'static str, check: F) -> Stage<T>
where
    F: Future<Output = Stage<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(check).await {
        Ok(outcome) => {
            if let Some(e) = outcome.error() {
                warn!(stage, error = e, "Stage failed.");
            }
            outcome
        }
        Err(e) => {
            error!(stage, error = %e, "Stage task aborted.");
            Stage::failed(format!("{} stage aborted: {}", stage, e))
        }
    }
}
