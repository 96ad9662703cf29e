// src/core/scoring.rs

use crate::core::knowledge_base::{BONUS_HEADERS, CSP, HSTS, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS};
use crate::core::models::{Grade, ResultBundle, ScoreBreakdown, SecurityScore};
use tracing::debug;

const MAX_SCORE: u16 = 100;

/// Computes the weighted security score of a result bundle.
///
/// Pure and additive: each contribution looks only at the stage fields it needs, and a
/// failed or missing stage simply contributes nothing. The table tops out at 96, still
/// capped at 100; the grade is taken from the capped value.
pub fn score(bundle: &ResultBundle) -> SecurityScore {
    let tls = bundle.tls();
    let headers = bundle.headers();
    let dns = bundle.dns();
    let fingerprint = bundle.fingerprint();

    let has_header = |name: &str| headers.is_some_and(|h| h.has(name));
    let tls_valid = tls.is_some_and(|t| t.valid);

    let mut breakdown = ScoreBreakdown::default();

    if tls.is_some_and(|t| t.valid && t.certificate_valid) {
        breakdown.tls_certificate = 20;
    }
    if has_header(HSTS) {
        breakdown.hsts_header = 15;
    }
    if has_header(CSP) {
        breakdown.csp_header = 15;
    }
    if has_header(X_FRAME_OPTIONS) || has_header(X_CONTENT_TYPE_OPTIONS) {
        breakdown.frame_options = 10;
    }
    // No resolver validates DNSSEC; A + NS presence is what actually earns these points.
    if dns.is_some_and(|d| d.dnssec || (!d.a_records.is_empty() && !d.ns_records.is_empty())) {
        breakdown.dnssec = 10;
    }
    // Proxy signal: there is no HTTP to HTTPS redirect check.
    if tls_valid && has_header(HSTS) {
        breakdown.https_redirect = 10;
    }
    if fingerprint
        .and_then(|f| f.server.as_deref())
        .is_some_and(|server| !server.is_empty())
    {
        breakdown.server_fingerprint = 10;
    }
    // Counted on top of frame_options even for headers it already rewarded.
    breakdown.bonus_points = BONUS_HEADERS.iter().filter(|name| has_header(**name)).count() as u8 * 2;

    let total = breakdown.total();
    let capped = total.min(MAX_SCORE) as u8;
    let grade = Grade::from_score(capped);
    debug!(total, score = capped, %grade, "Computed security score.");

    SecurityScore {
        score: capped,
        breakdown,
        grade,
    }
}
