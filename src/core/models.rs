// src/core/models.rs

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

// --- Stage Outcomes ---

// The outcome of a single check stage. A failed stage carries only its error message,
// so one failing check never hides the data of the others.
// `Failed` is listed first: untagged deserialization only picks it when an `error` key is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Stage<T> {
    Failed { error: String },
    Success(T),
}

impl<T> Stage<T> {
    pub fn failed(error: impl Into<String>) -> Self {
        Stage::Failed { error: error.into() }
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Stage::Success(data) => Some(data),
            Stage::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Stage::Failed { error } => Some(error),
            Stage::Success(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Stage::Failed { .. })
    }
}

// Checks report `Result<T, String>`; the error string becomes the failed stage.
impl<T> From<Result<T, String>> for Stage<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(data) => Stage::Success(data),
            Err(error) => Stage::Failed { error },
        }
    }
}

// --- TLS Stage ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsStageResult {
    pub valid: bool,
    pub certificate_valid: bool,
    pub expiry_date: Option<String>,
    pub issuer: Option<String>,
    pub protocol_version: Option<String>,
    pub cipher_suite: Option<String>,
}

// --- Headers Stage ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadersStageResult {
    /// Canonical short name (e.g. `HSTS`) to the raw header value, present headers only.
    pub security_headers: BTreeMap<String, String>,
    /// Catalog names that were absent, in catalog order.
    pub missing_headers: Vec<String>,
    pub recommendations: Vec<String>,
}

impl HeadersStageResult {
    pub fn has(&self, name: &str) -> bool {
        self.security_headers.contains_key(name)
    }
}

// --- DNS Stage ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsStageResult {
    pub a_records: Vec<String>,
    pub aaaa_records: Vec<String>,
    pub mx_records: Vec<String>,
    pub ns_records: Vec<String>,
    pub txt_records: Vec<String>,
    pub dnssec: bool,
}

// --- Fingerprint Stage ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FingerprintStageResult {
    pub server: Option<String>,
    pub powered_by: Option<String>,
    // Not deduplicated: several signals may name the same technology.
    pub technologies: Vec<String>,
}

// --- Scoring ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
pub enum Grade {
    #[serde(rename = "A+")]
    #[strum(serialize = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Maps a capped score to its letter grade. Thresholds are inclusive.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Grade::APlus,
            80..=89 => Grade::A,
            70..=79 => Grade::B,
            60..=69 => Grade::C,
            50..=59 => Grade::D,
            _ => Grade::F,
        }
    }
}

// Per-contribution points. Field names are the contribution names seen by consumers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub tls_certificate: u8,
    pub hsts_header: u8,
    pub csp_header: u8,
    pub frame_options: u8,
    pub dnssec: u8,
    pub https_redirect: u8,
    pub server_fingerprint: u8,
    pub bonus_points: u8,
}

impl ScoreBreakdown {
    /// Uncapped sum of every contribution.
    pub fn total(&self) -> u16 {
        [
            self.tls_certificate,
            self.hsts_header,
            self.csp_header,
            self.frame_options,
            self.dnssec,
            self.https_redirect,
            self.server_fingerprint,
            self.bonus_points,
        ]
        .iter()
        .map(|p| u16::from(*p))
        .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityScore {
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub grade: Grade,
}

// --- Result Bundle ---

// Accumulated check outcomes for a job. Stages that have not run yet are absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultBundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Stage<TlsStageResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Stage<HeadersStageResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Stage<DnsStageResult>>,
    #[serde(default, rename = "fingerprinting", skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Stage<FingerprintStageResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<ScoreBreakdown>,
}

impl ResultBundle {
    pub fn tls(&self) -> Option<&TlsStageResult> {
        self.tls.as_ref().and_then(Stage::success)
    }

    pub fn headers(&self) -> Option<&HeadersStageResult> {
        self.headers.as_ref().and_then(Stage::success)
    }

    pub fn dns(&self) -> Option<&DnsStageResult> {
        self.dns.as_ref().and_then(Stage::success)
    }

    pub fn fingerprint(&self) -> Option<&FingerprintStageResult> {
        self.fingerprint.as_ref().and_then(Stage::success)
    }

    pub fn apply_score(&mut self, score: SecurityScore) {
        self.score = Some(score.score);
        self.grade = Some(score.grade);
        self.score_breakdown = Some(score.breakdown);
    }
}

// What a job record holds as its result: the bundle, or just the message of a pipeline fault.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JobResult {
    Failed { error: String },
    Bundle(ResultBundle),
}

impl Default for JobResult {
    fn default() -> Self {
        JobResult::Bundle(ResultBundle::default())
    }
}

impl JobResult {
    pub fn bundle(&self) -> Option<&ResultBundle> {
        match self {
            JobResult::Bundle(bundle) => Some(bundle),
            JobResult::Failed { .. } => None,
        }
    }
}

// --- Jobs ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Done | JobStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Whether a record in `self` may be written with status `next`.
    /// Re-writing the current non-terminal status is allowed; terminal states are final.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == self || next.rank() > self.rank()
    }
}

// A partial overwrite of a job record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub result: Option<JobResult>,
}

impl JobUpdate {
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    pub fn result(mut self, result: JobResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn bundle(self, bundle: ResultBundle) -> Self {
        self.result(JobResult::Bundle(bundle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanJob {
    pub job_id: String,
    pub url: String,
    pub status: JobStatus,
    pub progress: u8,
    pub result: JobResult,
    /// Epoch milliseconds.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl ScanJob {
    pub fn new(job_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            url: url.into(),
            status: JobStatus::Queued,
            progress: 0,
            result: JobResult::default(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Applies a partial update while keeping the record's invariants: status only moves
    /// forward and progress never decreases. A rejected status leaves the record untouched.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), StoreError> {
        if let Some(next) = update.status {
            if !self.status.can_advance_to(next) {
                return Err(StoreError::InvalidTransition {
                    job_id: self.job_id.clone(),
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        if let Some(result) = update.result {
            self.result = result;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_stage_serializes_to_error_only() {
        let stage: Stage<TlsStageResult> = Stage::failed("connection refused");
        assert_eq!(serde_json::to_value(&stage).unwrap(), json!({"error": "connection refused"}));
    }

    #[test]
    fn test_bundle_round_trips_through_json() {
        let bundle = ResultBundle {
            tls: Some(Stage::failed("handshake failed")),
            dns: Some(Stage::Success(DnsStageResult {
                a_records: vec!["93.184.216.34".to_string()],
                ..Default::default()
            })),
            ..Default::default()
        };
        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["tls"], json!({"error": "handshake failed"}));
        assert_eq!(value["dns"]["a_records"], json!(["93.184.216.34"]));
        assert!(value.get("headers").is_none());
        assert!(value.get("score").is_none());

        let back: ResultBundle = serde_json::from_value(value).unwrap();
        assert_eq!(back, bundle);
    }

    #[test]
    fn test_job_result_error_shape() {
        let result = JobResult::Failed { error: "store unavailable".to_string() };
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"error": "store unavailable"}));
        assert_eq!(serde_json::to_value(JobResult::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_grade_serializes_with_plus() {
        assert_eq!(serde_json::to_value(Grade::APlus).unwrap(), json!("A+"));
        assert_eq!(Grade::APlus.to_string(), "A+");
        assert_eq!(JobStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut job = ScanJob::new("job-1", "https://example.com");
        job.apply(JobUpdate::default().status(JobStatus::Running)).unwrap();
        job.apply(JobUpdate::default().status(JobStatus::Running)).unwrap();
        job.apply(JobUpdate::default().status(JobStatus::Done)).unwrap();

        let err = job.apply(JobUpdate::default().status(JobStatus::Running));
        assert!(matches!(err, Err(StoreError::InvalidTransition { .. })));
        assert!(job.apply(JobUpdate::default().status(JobStatus::Error)).is_err());
        assert_eq!(job.status, JobStatus::Done);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = ScanJob::new("job-1", "https://example.com");
        job.apply(JobUpdate::default().progress(70)).unwrap();
        job.apply(JobUpdate::default().progress(10)).unwrap();
        assert_eq!(job.progress, 70);
        job.apply(JobUpdate::default().progress(250)).unwrap();
        assert_eq!(job.progress, 100);
    }
}
