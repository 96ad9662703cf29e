// src/logging.rs

use crate::config::data_dir;
use color_eyre::eyre::Result;
use lazy_static::lazy_static;
use std::fs::File;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref LOG_ENV: String =
        format!("{}_LOGLEVEL", env!("CARGO_CRATE_NAME").to_uppercase());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

/// Directive for the log file: `RUST_LOG`, else `WEBPOSTURE_LOGLEVEL`, else this crate at `info`.
fn file_directive(lookup: impl Fn(&str) -> Option<String>) -> String {
    lookup("RUST_LOG")
        .or_else(|| lookup(LOG_ENV.as_str()))
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Scan progress goes to a log file in the data directory. Only warnings and errors
/// reach stderr, so they do not mix with the JSON the CLI prints on stdout.
pub fn initialize_logging() -> Result<()> {
    let directory = data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_file = File::create(directory.join(LOG_FILE.as_str()))?;
    let directive = file_directive(|key| std::env::var(key).ok());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(directive));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(format!("{}=warn", env!("CARGO_CRATE_NAME"))));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let directive = file_directive(|key| match key {
            "RUST_LOG" => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        });
        assert_eq!(directive, "debug");
    }

    #[test]
    fn test_crate_variable_is_the_fallback() {
        let directive = file_directive(|key| {
            (key == "WEBPOSTURE_LOGLEVEL").then(|| "webposture=debug".to_string())
        });
        assert_eq!(directive, "webposture=debug");
    }

    #[test]
    fn test_blank_or_missing_means_info() {
        assert_eq!(file_directive(|_| None), "webposture=info");
        assert_eq!(file_directive(|_| Some("  ".to_string())), "webposture=info");
    }
}
