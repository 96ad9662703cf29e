// src/main.rs

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use webposture::app::App;
use webposture::config::Config;
use webposture::core::store::{FileJobStore, JobStore};
use webposture::logging::initialize_logging;

#[derive(Parser)]
#[command(name = "webposture", version, about = "External security posture scanner for a single website")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding job records (overrides the configuration).
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a URL and print the finished job as JSON.
    Scan {
        url: String,
        /// Network timeout in seconds for every check operation.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print a stored job as JSON.
    Status { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    initialize_logging()?;

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.store_dir {
        config.store.dir = Some(dir);
    }

    match cli.command {
        Command::Scan { url, timeout } => {
            if let Some(secs) = timeout {
                config.scan.timeout_secs = secs;
                config.validate()?;
            }
            let app = App::from_config(&config).await?;
            let job_id = app.submit(&url).await?;
            eprintln!("Scanning {} (job {})", url, job_id);
            let job = app.wait_for(&job_id, Duration::from_millis(250)).await?;
            app.shutdown().await;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Status { job_id } => {
            let store = FileJobStore::open(config.store_dir()).await?;
            let job = store
                .get(&job_id)
                .await?
                .ok_or_else(|| eyre!("no job '{}' in {}", job_id, store.dir().display()))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
    }

    Ok(())
}
