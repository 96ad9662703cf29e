// src/core/mod.rs

// The root of the scan engine: data model, checks, scoring, and the machinery that
// runs a job through them.

/// Jobs, stage outcomes, and the result bundle handed to consumers.
pub mod models;

/// The four checks (TLS, headers, DNS, fingerprint) and the seam the orchestrator
/// drives them through.
pub mod scanner;

/// The fixed security header catalog and the advice attached to missing headers.
pub mod knowledge_base;

/// Weighted score, breakdown and grade of a result bundle.
pub mod scoring;

pub mod orchestrator;
pub mod queue;
pub mod store;
