// src/core/scanner/ssl_scanner.rs

use tracing::{debug, error, info, warn};

use crate::core::models::{Stage, TlsStageResult};
use openssl::ssl::{SslConnector, SslMethod};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use ::time::macros::format_description;
use tokio::task::spawn_blocking;
use x509_parser::prelude::*;

/// Connects to `hostname:port` and reports the negotiated TLS parameters.
///
/// The handshake always verifies the certificate chain and the host name; there is no
/// way to turn that off. A successful handshake marks both `valid` and
/// `certificate_valid`; any DNS, socket or handshake failure (including `timeout`
/// expiring) yields a failed stage.
pub async fn analyze_tls(hostname: &str, port: u16, timeout: Duration) -> Stage<TlsStageResult> {
    info!(host = hostname, port, "Starting TLS scan.");
    let host = hostname.to_string();

    debug!("Spawning blocking task for TLS connection.");
    let task = spawn_blocking(move || perform_tls_scan(&host, port, timeout));
    let scan_result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(panic = %e, "Blocking TLS scan task panicked!");
            Err(format!("Task panicked: {}", e))
        }
        Err(_) => {
            warn!(host = hostname, port, "TLS scan timed out.");
            Err(format!("TLS scan timed out after {}s", timeout.as_secs_f32()))
        }
    };

    match &scan_result {
        Ok(tls) => info!(protocol = ?tls.protocol_version, issuer = ?tls.issuer, "TLS scan finished."),
        Err(e) => info!(error = %e, "TLS scan failed."),
    }
    scan_result.into()
}

fn perform_tls_scan(host: &str, port: u16, timeout: Duration) -> Result<TlsStageResult, String> {
    debug!(host, port, "Performing TLS connection and handshake.");

    // The default connector verifies the peer against the system trust store.
    let connector = SslConnector::builder(SslMethod::tls())
        .map_err(|e| {
            error!(error = %e, "Failed to create SslConnector");
            format!("TLS connector error: {}", e)
        })?
        .build();

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| {
            warn!(host, error = %e, "Host resolution failed");
            format!("Could not resolve {}: {}", host, e)
        })?
        .collect();
    if addrs.is_empty() {
        return Err(format!("No address found for {}", host));
    }

    let stream = connect_any(&addrs, timeout)?;
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|_| stream.set_write_timeout(Some(timeout)))
        .map_err(|e| format!("Could not set socket timeouts: {}", e))?;

    debug!(host, "Performing TLS handshake.");
    let stream = connector.connect(host, stream).map_err(|e| {
        warn!(error = %e, "TLS handshake failed");
        format!("TLS Handshake Error: {}", e)
    })?;

    let ssl = stream.ssl();
    let protocol_version = ssl.version_str().to_string();
    let cipher_suite = ssl.current_cipher().map(|c| c.name().to_string());
    debug!(protocol = %protocol_version, cipher = ?cipher_suite, "Handshake negotiated.");

    let cert = ssl
        .peer_certificate()
        .ok_or_else(|| "Server did not provide a certificate.".to_string())?;
    let cert_der = cert.to_der().map_err(|e| {
        error!(error = %e, "Failed to convert certificate to DER format");
        format!("Could not convert certificate to DER: {}", e)
    })?;
    verified_result(protocol_version, cipher_suite, &cert_der)
}

/// Tries each resolved address in turn and returns the first stream that connects.
fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> Result<TcpStream, String> {
    let mut last_error = None;
    for addr in addrs {
        debug!(%addr, "Connecting TCP stream.");
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                warn!(%addr, error = %e, "TCP connection failed");
                last_error = Some(e);
            }
        }
    }
    Err(match last_error {
        Some(e) => format!("TCP Connection Error: {}", e),
        None => "TCP Connection Error: no addresses to try".to_string(),
    })
}

/// The stage result of a handshake that passed chain and host name verification.
fn verified_result(
    protocol_version: String,
    cipher_suite: Option<String>,
    cert_der: &[u8],
) -> Result<TlsStageResult, String> {
    let (issuer, expiry_date) = describe_certificate(cert_der)?;
    Ok(TlsStageResult {
        valid: true,
        certificate_valid: true,
        expiry_date: Some(expiry_date),
        issuer: Some(issuer),
        protocol_version: Some(protocol_version),
        cipher_suite,
    })
}

/// Returns the issuer organization (or "Unknown") and the `notAfter` timestamp of a
/// DER certificate. The timestamp is not compared against the current time.
fn describe_certificate(der: &[u8]) -> Result<(String, String), String> {
    let (_, x509) = parse_x509_certificate(der).map_err(|e| {
        error!(error = %e, "Failed to parse X.509 certificate");
        format!("X.509 Parse Error: {}", e)
    })?;

    let issuer = x509
        .issuer()
        .iter_organization()
        .next()
        .and_then(|org| org.as_str().ok())
        .unwrap_or("Unknown")
        .to_string();
    let expiry_date = format_certificate_time(&x509.validity().not_after);

    info!(subject = %x509.subject(), issuer = %issuer, expiry = %expiry_date, "Parsed peer certificate.");
    Ok((issuer, expiry_date))
}

// Renders in the OpenSSL text form, e.g. "Jun  1 12:00:00 2025 GMT".
fn format_certificate_time(time: &ASN1Time) -> String {
    let format = format_description!(
        "[month repr:short] [day padding:space] [hour]:[minute]:[second] [year] GMT"
    );
    time.to_datetime()
        .format(&format)
        .unwrap_or_else(|_| time.to_string())
}
