//! Common test utilities: canned checks and a job store that records every write.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use webposture::core::models::{
    DnsStageResult, FingerprintStageResult, HeadersStageResult, JobUpdate, ScanJob, Stage,
    TlsStageResult,
};
use webposture::core::scanner::SiteScanner;
use webposture::core::store::{JobStore, MemoryJobStore};
use webposture::error::StoreError;

pub const TEST_URL: &str = "https://example.com";

/// Checks that return fixed outcomes without touching the network.
#[derive(Clone)]
pub struct FakeScanner {
    pub tls: Stage<TlsStageResult>,
    pub headers: Stage<HeadersStageResult>,
    pub dns: Stage<DnsStageResult>,
    pub fingerprint: Stage<FingerprintStageResult>,
    pub panic_in_dns: bool,
    pub tls_calls: Arc<AtomicUsize>,
}

impl FakeScanner {
    /// TLS valid, HSTS + CSP + X-Frame-Options, A and NS records, a Server header.
    pub fn healthy() -> Self {
        let mut headers = HeadersStageResult::default();
        for name in ["HSTS", "CSP", "X-Frame-Options"] {
            headers.security_headers.insert(name.to_string(), "set".to_string());
        }
        headers.missing_headers = vec![
            "X-Content-Type-Options".to_string(),
            "X-XSS-Protection".to_string(),
            "Referrer-Policy".to_string(),
            "Permissions-Policy".to_string(),
        ];
        Self {
            tls: Stage::Success(TlsStageResult {
                valid: true,
                certificate_valid: true,
                expiry_date: Some("Jun  1 12:00:00 2030 GMT".to_string()),
                issuer: Some("Let's Encrypt".to_string()),
                protocol_version: Some("TLSv1.3".to_string()),
                cipher_suite: Some("TLS_AES_256_GCM_SHA384".to_string()),
            }),
            headers: Stage::Success(headers),
            dns: Stage::Success(DnsStageResult {
                a_records: vec!["93.184.216.34".to_string()],
                ns_records: vec!["a.iana-servers.net.".to_string()],
                ..Default::default()
            }),
            fingerprint: Stage::Success(FingerprintStageResult {
                server: Some("nginx".to_string()),
                powered_by: None,
                technologies: vec!["Nginx".to_string()],
            }),
            panic_in_dns: false,
            tls_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn all_failing() -> Self {
        Self {
            tls: Stage::failed("TLS Handshake Error: certificate verify failed"),
            headers: Stage::failed("HTTP request failed: timed out"),
            dns: Stage::failed("Resolver configuration error: no nameservers"),
            fingerprint: Stage::failed("HTTP request failed: timed out"),
            ..Self::healthy()
        }
    }

    pub fn tls_calls(&self) -> usize {
        self.tls_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SiteScanner for FakeScanner {
    async fn tls(&self, _host: &str, _port: u16) -> Stage<TlsStageResult> {
        self.tls_calls.fetch_add(1, Ordering::SeqCst);
        self.tls.clone()
    }

    async fn headers(&self, _url: &str) -> Stage<HeadersStageResult> {
        self.headers.clone()
    }

    async fn dns(&self, _domain: &str) -> Stage<DnsStageResult> {
        if self.panic_in_dns {
            panic!("resolver exploded");
        }
        self.dns.clone()
    }

    async fn fingerprint(&self, _url: &str) -> Stage<FingerprintStageResult> {
        self.fingerprint.clone()
    }
}

/// One `update` call seen by the recording store.
#[derive(Debug, Clone)]
pub struct Write {
    pub at: Instant,
    pub update: JobUpdate,
    pub accepted: bool,
}

type FailRule = Box<dyn Fn(&JobUpdate) -> bool + Send + Sync>;

/// An in-memory store that logs every update and can be told to reject some of them.
pub struct RecordingStore {
    inner: MemoryJobStore,
    writes: Mutex<Vec<Write>>,
    fail_when: FailRule,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::failing_when(|_| false)
    }

    pub fn failing_when(rule: impl Fn(&JobUpdate) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: MemoryJobStore::new(),
            writes: Mutex::new(Vec::new()),
            fail_when: Box::new(rule),
        }
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn accepted(&self) -> Vec<JobUpdate> {
        self.writes()
            .into_iter()
            .filter(|w| w.accepted)
            .map(|w| w.update)
            .collect()
    }

    pub async fn job(&self, job_id: &str) -> ScanJob {
        self.inner.get(job_id).await.unwrap().expect("job exists")
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn create(&self, job_id: &str, url: &str) -> Result<(), StoreError> {
        self.inner.create(job_id, url).await
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let rejected = (self.fail_when)(&update);
        let result = if rejected {
            Err(StoreError::Unavailable("injected write failure".to_string()))
        } else {
            self.inner.update(job_id, update.clone()).await
        };
        self.writes.lock().unwrap().push(Write {
            at: Instant::now(),
            update,
            accepted: result.is_ok(),
        });
        result
    }

    async fn get(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError> {
        self.inner.get(job_id).await
    }
}
