// src/core/scanner/headers_scanner.rs

use tracing::{debug, info, warn};
use crate::core::knowledge_base::{recommendations_for, SECURITY_HEADERS};
use crate::core::models::{HeadersStageResult, Stage};
use crate::core::scanner::http_client;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Reads a header value, tolerating non-UTF-8 bytes. Repeated headers are joined
/// with `", "` into one value.
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name)
        .iter()
        .map(|value| match value.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => {
                warn!(header_name = name, "Header found but contained invalid UTF-8.");
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            }
        })
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

/// Runs the security header check against a URL.
///
/// Sends one GET (following redirects) and partitions the fixed header catalog into
/// present and missing. A request failure yields a failed stage.
///
/// # Arguments
/// * `url` - The absolute URL to fetch.
/// * `timeout` - Bound on the whole request.
/// * `user_agent` - The User-Agent to send.
pub async fn analyze_headers(
    url: &str,
    timeout: Duration,
    user_agent: &str,
) -> Stage<HeadersStageResult> {
    info!(url, "Starting headers scan.");

    let client = match http_client(timeout, user_agent) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client for headers scan.");
            return Stage::failed(e);
        }
    };

    match client.get(url).send().await {
        Ok(response) => {
            info!(status = %response.status(), final_url = %response.url(), "Received HTTP response for headers scan.");
            let results = partition_headers(response.headers());
            info!(
                present = results.security_headers.len(),
                missing = results.missing_headers.len(),
                "Headers scan finished."
            );
            Stage::Success(results)
        }
        Err(e) => {
            warn!(url, error = %e, "HTTP request failed for headers scan.");
            Stage::failed(format!("HTTP request failed: {}", e))
        }
    }
}

/// Splits the catalog into headers present in `headers` (keyed by short name) and
/// the missing remainder, then derives the recommendations.
pub fn partition_headers(headers: &HeaderMap) -> HeadersStageResult {
    let mut results = HeadersStageResult::default();

    for entry in SECURITY_HEADERS {
        match header_value(headers, entry.header) {
            Some(value) => {
                debug!(header_name = entry.header, value = %value, "Header found.");
                results.security_headers.insert(entry.name.to_string(), value);
            }
            None => {
                debug!(header_name = entry.header, "Header not found.");
                results.missing_headers.push(entry.name.to_string());
            }
        }
    }

    results.recommendations = recommendations_for(&results.missing_headers);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::collections::BTreeSet;

    fn catalog() -> BTreeSet<String> {
        SECURITY_HEADERS.iter().map(|h| h.name.to_string()).collect()
    }

    #[test]
    fn test_empty_response_misses_everything() {
        let results = partition_headers(&HeaderMap::new());
        assert!(results.security_headers.is_empty());
        assert_eq!(results.missing_headers.len(), 7);
        assert_eq!(results.missing_headers[0], "HSTS");
        assert_eq!(results.recommendations.len(), 3);
    }

    #[test]
    fn test_present_and_missing_partition_the_catalog() {
        let mut headers = HeaderMap::new();
        headers.insert("strict-transport-security", HeaderValue::from_static("max-age=63072000"));
        headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
        headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
        headers.insert("x-unrelated", HeaderValue::from_static("1"));

        let results = partition_headers(&headers);
        assert_eq!(results.security_headers.get("HSTS").map(String::as_str), Some("max-age=63072000"));

        let present: BTreeSet<String> = results.security_headers.keys().cloned().collect();
        let missing: BTreeSet<String> = results.missing_headers.iter().cloned().collect();
        assert!(present.is_disjoint(&missing));
        assert_eq!(present.union(&missing).cloned().collect::<BTreeSet<_>>(), catalog());
        assert_eq!(
            results.recommendations,
            vec![
                "Add Content Security Policy header".to_string(),
                "Add X-Frame-Options to prevent clickjacking".to_string(),
            ]
        );
    }

    #[test]
    fn test_non_utf8_value_is_kept_lossily() {
        let mut headers = HeaderMap::new();
        headers.insert("x-frame-options", HeaderValue::from_bytes(b"DENY\xff").unwrap());
        let results = partition_headers(&headers);
        assert!(results.security_headers["X-Frame-Options"].starts_with("DENY"));
    }

    #[test]
    fn test_repeated_header_values_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("content-security-policy", HeaderValue::from_static("default-src 'self'"));
        headers.append("content-security-policy", HeaderValue::from_static("img-src *"));

        let results = partition_headers(&headers);
        assert_eq!(results.security_headers["CSP"], "default-src 'self', img-src *");
    }
}
