// src/core/scanner/dns_scanner.rs

use tracing::{debug, info, warn};

use crate::core::models::{DnsStageResult, Stage};
use async_trait::async_trait;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;

/// A source of DNS records. Implemented by the live resolver; tests substitute their own.
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Returns the text form of every record of `record_type` for `domain`.
    async fn records(&self, domain: &str, record_type: RecordType) -> Result<Vec<String>, String>;
}

#[async_trait]
impl RecordLookup for TokioAsyncResolver {
    async fn records(&self, domain: &str, record_type: RecordType) -> Result<Vec<String>, String> {
        let lookup = self
            .lookup(domain, record_type)
            .await
            .map_err(|e| format!("DNS Error: {}", e))?;
        Ok(lookup.iter().map(|rdata| rdata.to_string()).collect())
    }
}

/// Runs the DNS record survey for a domain.
///
/// Builds a resolver from the system configuration, then collects A, AAAA, MX, NS and
/// TXT records. Only a failure to set up the resolver fails the stage; a failed lookup
/// just leaves its own list empty.
///
/// # Arguments
/// * `domain` - The host name to query.
/// * `timeout` - Bound on each query.
pub async fn analyze_dns(domain: &str, timeout: Duration) -> Stage<DnsStageResult> {
    info!(domain, "Starting DNS scan.");

    let (config, mut opts) = match read_system_conf() {
        Ok(conf) => conf,
        Err(e) => {
            warn!(error = %e, "Could not read system resolver configuration.");
            return Stage::failed(format!("Resolver configuration error: {}", e));
        }
    };
    opts.timeout = timeout;

    let resolver = TokioAsyncResolver::tokio(config, opts);
    let results = collect_records(&resolver, domain, timeout).await;
    Stage::Success(results)
}

/// Runs the five lookups concurrently. Each one is isolated: its failure or timeout is
/// logged and yields an empty list for that record type only.
pub async fn collect_records(
    lookup: &dyn RecordLookup,
    domain: &str,
    timeout: Duration,
) -> DnsStageResult {
    let (a_records, aaaa_records, mx_records, ns_records, txt_records) = tokio::join!(
        lookup_or_empty(lookup, domain, RecordType::A, timeout),
        lookup_or_empty(lookup, domain, RecordType::AAAA, timeout),
        lookup_or_empty(lookup, domain, RecordType::MX, timeout),
        lookup_or_empty(lookup, domain, RecordType::NS, timeout),
        lookup_or_empty(lookup, domain, RecordType::TXT, timeout)
    );

    debug!("All DNS lookups completed.");
    let results = DnsStageResult {
        a_records,
        aaaa_records,
        mx_records,
        ns_records,
        txt_records,
        // Not queried.
        dnssec: false,
    };
    info!(
        a = results.a_records.len(),
        aaaa = results.aaaa_records.len(),
        mx = results.mx_records.len(),
        ns = results.ns_records.len(),
        txt = results.txt_records.len(),
        "DNS scan finished."
    );
    results
}

async fn lookup_or_empty(
    lookup: &dyn RecordLookup,
    domain: &str,
    record_type: RecordType,
    timeout: Duration,
) -> Vec<String> {
    debug!(domain, %record_type, "Looking up records.");
    match tokio::time::timeout(timeout, lookup.records(domain, record_type)).await {
        Ok(Ok(records)) => {
            debug!(%record_type, count = records.len(), "Lookup succeeded.");
            records
        }
        Ok(Err(e)) => {
            warn!(domain, %record_type, error = %e, "Lookup failed.");
            Vec::new()
        }
        Err(_) => {
            warn!(domain, %record_type, "Lookup timed out.");
            Vec::new()
        }
    }
}
