//! Static catalog of the security headers the scanner looks for, and the
//! advisory text attached to the ones that are missing.
//!
//! Keeping this data-driven means the header scanner and the scoring engine agree
//! on one list of names.

/// A security header as it appears on the wire, and the short name used in reports.
pub struct SecurityHeader {
    /// The HTTP header name (matched case-insensitively).
    pub header: &'static str,
    /// The canonical short name (e.g. "HSTS") used as a key in results.
    pub name: &'static str,
}

pub const HSTS: &str = "HSTS";
pub const CSP: &str = "CSP";
pub const X_FRAME_OPTIONS: &str = "X-Frame-Options";
pub const X_CONTENT_TYPE_OPTIONS: &str = "X-Content-Type-Options";
pub const X_XSS_PROTECTION: &str = "X-XSS-Protection";
pub const REFERRER_POLICY: &str = "Referrer-Policy";
pub const PERMISSIONS_POLICY: &str = "Permissions-Policy";

/// The fixed catalog, in report order.
pub static SECURITY_HEADERS: &[SecurityHeader] = &[
    SecurityHeader { header: "Strict-Transport-Security", name: HSTS },
    SecurityHeader { header: "Content-Security-Policy", name: CSP },
    SecurityHeader { header: "X-Frame-Options", name: X_FRAME_OPTIONS },
    SecurityHeader { header: "X-Content-Type-Options", name: X_CONTENT_TYPE_OPTIONS },
    SecurityHeader { header: "X-XSS-Protection", name: X_XSS_PROTECTION },
    SecurityHeader { header: "Referrer-Policy", name: REFERRER_POLICY },
    SecurityHeader { header: "Permissions-Policy", name: PERMISSIONS_POLICY },
];

/// Headers worth two bonus points each when present.
pub static BONUS_HEADERS: &[&str] = &[X_XSS_PROTECTION, REFERRER_POLICY, PERMISSIONS_POLICY];

/// Recommendation rules, evaluated in order against the missing set.
/// Only these three headers get advice; the rest of the catalog is reported as missing without one.
static RECOMMENDATIONS: &[(&str, &str)] = &[
    (HSTS, "Implement HSTS header for better security"),
    (CSP, "Add Content Security Policy header"),
    (X_FRAME_OPTIONS, "Add X-Frame-Options to prevent clickjacking"),
];

/// Builds the ordered recommendation list for a set of missing short names.
pub fn recommendations_for(missing: &[String]) -> Vec<String> {
    RECOMMENDATIONS
        .iter()
        .filter(|(name, _)| missing.iter().any(|m| m == name))
        .map(|(_, advice)| advice.to_string())
        .collect()
}
