//! External security posture assessment of a single website.
//!
//! A scan job runs four checks against the target (TLS, HTTP security headers, DNS,
//! server fingerprint), checkpoints partial results to a job store after each one,
//! and reduces the findings to a score and letter grade.

pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
