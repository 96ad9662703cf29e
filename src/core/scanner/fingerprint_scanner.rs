// src/core/scanner/fingerprint_scanner.rs

use tracing::{debug, info, warn};
use crate::core::models::{FingerprintStageResult, Stage};
use crate::core::scanner::headers_scanner::header_value;
use crate::core::scanner::http_client;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Where a technology signal comes from.
enum Signal {
    /// The header's presence alone names the technology.
    Presence(&'static str),
    /// The header's value is the technology name.
    Value,
}

/// A response header that reveals a framework or CMS.
struct HeaderRule {
    header: &'static str,
    signal: Signal,
}

// Server products recognised in the `Server` header, tried in this order; the first match wins.
static RE_APACHE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)apache").unwrap());
static RE_NGINX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)nginx").unwrap());
static RE_IIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)iis").unwrap());

static SERVER_RULES: &[(&str, &Lazy<Regex>)] = &[
    ("Apache", &RE_APACHE),
    ("Nginx", &RE_NGINX),
    ("IIS", &RE_IIS),
];

// Checked independently of each other, after the server classification.
static HEADER_RULES: &[HeaderRule] = &[
    HeaderRule { header: "x-aspnet-version", signal: Signal::Presence("ASP.NET") },
    HeaderRule { header: "x-drupal-cache", signal: Signal::Presence("Drupal") },
    HeaderRule { header: "x-generator", signal: Signal::Value },
];

/// Runs a header-based fingerprint of the server behind `url`.
///
/// # Arguments
/// * `url` - The absolute URL to fetch (redirects are followed).
/// * `timeout` - Bound on the whole request.
/// * `user_agent` - The User-Agent to send.
///
/// # Returns
/// The `Server` and `X-Powered-By` values and the technologies they and a few
/// framework headers reveal, or a failed stage if the request fails.
pub async fn analyze_fingerprinting(
    url: &str,
    timeout: Duration,
    user_agent: &str,
) -> Stage<FingerprintStageResult> {
    info!(url, "Starting fingerprint scan.");

    let client = match http_client(timeout, user_agent) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client");
            return Stage::failed(e);
        }
    };

    let response = match client.get(url).send().await {
        Ok(res) => {
            info!(status = %res.status(), "Received HTTP response.");
            res
        }
        Err(e) => {
            warn!(url, error = %e, "HTTP request failed");
            return Stage::failed(format!("HTTP request failed: {}", e));
        }
    };

    let results = fingerprint_headers(response.headers());
    info!(count = results.technologies.len(), server = ?results.server, "Fingerprint scan finished.");
    Stage::Success(results)
}

/// Builds the fingerprint from response headers.
///
/// Order of `technologies`: the `X-Powered-By` value, then the classified `Server`
/// product, then each framework header rule. Duplicates are kept.
pub fn fingerprint_headers(headers: &HeaderMap) -> FingerprintStageResult {
    let server = header_value(headers, "server");
    let powered_by = header_value(headers, "x-powered-by");
    let mut technologies = Vec::new();

    if let Some(value) = &powered_by {
        debug!(value = %value, "X-Powered-By present.");
        technologies.push(value.clone());
    }

    if let Some(value) = &server {
        if let Some((name, _)) = SERVER_RULES.iter().find(|(_, re)| re.is_match(value)) {
            debug!(tech = name, server = %value, "Server header matched.");
            technologies.push(name.to_string());
        }
    }

    for rule in HEADER_RULES {
        let Some(value) = header_value(headers, rule.header) else {
            continue;
        };
        let tech = match rule.signal {
            Signal::Presence(name) => name.to_string(),
            Signal::Value => value,
        };
        debug!(header_name = rule.header, tech = %tech, "Rule matched.");
        technologies.push(tech);
    }

    FingerprintStageResult {
        server,
        powered_by,
        technologies,
    }
}
