// src/core/scanner/mod.rs

// This file acts as the public interface for the `scanner` module.
// It declares the four check modules and the seam the orchestrator drives them through.
pub mod dns_scanner;
pub mod fingerprint_scanner;
pub mod headers_scanner;
pub mod ssl_scanner;

use crate::core::models::{
    DnsStageResult, FingerprintStageResult, HeadersStageResult, Stage, TlsStageResult,
};
use crate::error::ScanError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use self::dns_scanner::analyze_dns;
use self::fingerprint_scanner::analyze_fingerprinting;
use self::headers_scanner::analyze_headers;
use self::ssl_scanner::analyze_tls;

pub const DEFAULT_TLS_PORT: u16 = 443;
pub const DEFAULT_USER_AGENT: &str = "WebPosture/0.1";

/// What the checks need to know about a job's URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub url: String,
    pub scheme: String,
    pub host: String,
    /// Explicit port from the URL, else 443.
    pub tls_port: u16,
}

impl ScanTarget {
    /// Derives the check target from an already validated absolute URL.
    pub fn parse(raw: &str) -> Result<Self, ScanError> {
        let invalid = |reason: String| ScanError::InvalidTarget {
            url: raw.to_string(),
            reason,
        };
        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("URL has no host".to_string()))?;
        // IPv6 literals come back bracketed from `host_str`.
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        Ok(Self {
            url: raw.to_string(),
            scheme: url.scheme().to_string(),
            host,
            tls_port: url.port().unwrap_or(DEFAULT_TLS_PORT),
        })
    }
}

/// Builds the HTTP client shared by the header and fingerprint checks.
///
/// Redirects are followed with reqwest's default policy, and `timeout` bounds the whole request.
pub(crate) fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}

/// The four checks of a scan. The orchestrator only talks to this trait, so tests can
/// substitute canned stage outcomes for network access.
#[async_trait]
pub trait SiteScanner: Send + Sync {
    async fn tls(&self, host: &str, port: u16) -> Stage<TlsStageResult>;
    async fn headers(&self, url: &str) -> Stage<HeadersStageResult>;
    async fn dns(&self, domain: &str) -> Stage<DnsStageResult>;
    async fn fingerprint(&self, url: &str) -> Stage<FingerprintStageResult>;
}

/// Checks the live target over the network, every operation bounded by one timeout.
#[derive(Debug, Clone)]
pub struct NetworkScanner {
    timeout: Duration,
    user_agent: String,
}

impl NetworkScanner {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl SiteScanner for NetworkScanner {
    async fn tls(&self, host: &str, port: u16) -> Stage<TlsStageResult> {
        analyze_tls(host, port, self.timeout).await
    }

    async fn headers(&self, url: &str) -> Stage<HeadersStageResult> {
        analyze_headers(url, self.timeout, &self.user_agent).await
    }

    async fn dns(&self, domain: &str) -> Stage<DnsStageResult> {
        analyze_dns(domain, self.timeout).await
    }

    async fn fingerprint(&self, url: &str) -> Stage<FingerprintStageResult> {
        analyze_fingerprinting(url, self.timeout, &self.user_agent).await
    }
}
