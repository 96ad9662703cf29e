//! Integration tests for the network checks against local servers

use std::time::Duration;
use webposture::core::scanner::fingerprint_scanner::analyze_fingerprinting;
use webposture::core::scanner::headers_scanner::analyze_headers;
use webposture::core::scanner::ssl_scanner::analyze_tls;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);
const UA: &str = "webposture-tests";

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_headers_scan_partitions_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Strict-Transport-Security", "max-age=63072000")
                .insert_header("X-Content-Type-Options", "nosniff"),
        )
        .mount(&server)
        .await;

    let stage = analyze_headers(&format!("{}/", server.uri()), TIMEOUT, UA).await;
    let result = stage.success().expect("headers stage should succeed");

    assert_eq!(
        result.security_headers.get("HSTS").map(String::as_str),
        Some("max-age=63072000")
    );
    assert_eq!(
        result.security_headers.get("X-Content-Type-Options").map(String::as_str),
        Some("nosniff")
    );
    assert_eq!(result.missing_headers.len(), 5);
    assert!(result.missing_headers.contains(&"CSP".to_string()));
    assert!(!result.recommendations.is_empty());
}

#[tokio::test]
async fn test_headers_scan_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Security-Policy", "default-src 'self'"))
        .mount(&server)
        .await;

    let stage = analyze_headers(&format!("{}/old", server.uri()), TIMEOUT, UA).await;
    let result = stage.success().expect("headers stage should succeed");
    assert!(result.has("CSP"));
}

#[tokio::test]
async fn test_headers_scan_fails_on_refused_connection() {
    let url = format!("http://127.0.0.1:{}/", closed_port());
    let stage = analyze_headers(&url, TIMEOUT, UA).await;
    assert!(stage.error().unwrap().starts_with("HTTP request failed"));
}

#[tokio::test]
async fn test_fingerprint_scan_reads_server_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "Apache/2.4.57 (Debian)")
                .insert_header("X-Powered-By", "PHP/8.2")
                .insert_header("X-Generator", "WordPress 6.4"),
        )
        .mount(&server)
        .await;

    let stage = analyze_fingerprinting(&server.uri(), TIMEOUT, UA).await;
    let result = stage.success().expect("fingerprint stage should succeed");

    assert_eq!(result.server.as_deref(), Some("Apache/2.4.57 (Debian)"));
    assert_eq!(result.powered_by.as_deref(), Some("PHP/8.2"));
    assert_eq!(result.technologies, vec!["PHP/8.2", "Apache", "WordPress 6.4"]);
}

#[tokio::test]
async fn test_fingerprint_scan_accepts_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("Server", "nginx"))
        .mount(&server)
        .await;

    let stage = analyze_fingerprinting(&server.uri(), TIMEOUT, UA).await;
    let result = stage.success().expect("a response of any status is usable");
    assert_eq!(result.technologies, vec!["Nginx"]);
}

#[tokio::test]
async fn test_fingerprint_scan_fails_on_refused_connection() {
    let url = format!("http://127.0.0.1:{}/", closed_port());
    let stage = analyze_fingerprinting(&url, TIMEOUT, UA).await;
    assert!(stage.is_failed());
}

#[tokio::test]
async fn test_tls_scan_fails_on_refused_connection() {
    let stage = analyze_tls("127.0.0.1", closed_port(), TIMEOUT).await;
    assert!(stage.is_failed());
}

#[tokio::test]
async fn test_tls_scan_fails_against_plain_http() {
    let server = MockServer::start().await;
    let port = server.address().port();

    let stage = analyze_tls("127.0.0.1", port, TIMEOUT).await;
    assert!(stage.error().unwrap().starts_with("TLS Handshake Error"));
}
