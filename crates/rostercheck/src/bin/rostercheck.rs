//! Command-line front end: ingest one upload and report on it.
//!
//! ```bash
//! rostercheck [--config <file>] ingest <FILE> [--flagged <N>]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use rostercheck::config::{apply_env_overrides, default_config_path, validate_config};
use rostercheck::projection::{flagged_providers, FlaggedScope};
use rostercheck::telemetry::init_logging;
use rostercheck::{load_config, Config, IngestError, JobStatus, RosterError, UploadService};

#[derive(Parser, Debug)]
#[clap(name = "rostercheck")]
#[clap(about = "Validate provider rosters against the validation backend")]
struct Cli {
    /// Config file (defaults to the platform config dir, if present)
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a CSV roster or a ZIP bundle of documents
    Ingest {
        /// Upload to process; `.zip` files go through extraction
        file: PathBuf,

        /// Print the N highest-priority flagged providers afterwards
        #[clap(long, value_name = "N")]
        flagged: Option<usize>,
    },
}

fn resolve_config(explicit: Option<&Path>) -> Result<Config, RosterError> {
    if let Some(path) = explicit {
        return Ok(load_config(path)?);
    }
    if let Some(path) = default_config_path().filter(|p| p.exists()) {
        return Ok(load_config(path)?);
    }
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("Failed to render output: {}", e),
    }
}

async fn ingest(
    config: &Config,
    file: &Path,
    flagged: Option<usize>,
) -> Result<JobStatus, RosterError> {
    let content = std::fs::read(file).map_err(|e| IngestError::ReadFile {
        path: file.to_path_buf(),
        source: e,
    })?;
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let service = UploadService::from_config(config)?;
    let events = service.subscribe();
    let handle = service.submit(&filename, content)?;
    let job_id = handle.job_id().to_string();

    if let Some(mut events) = events {
        let watched = job_id.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.job_id == watched => info!(
                        "{}: {} ({}/{}, eta {:?}s)",
                        event.job_id,
                        event.phase,
                        event.processed_count,
                        event.total_count,
                        event.eta_seconds
                    ),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    handle.wait().await;

    let store = service.store();
    let Some(job) = store.get(&job_id) else {
        return Err(rostercheck::LookupError::JobNotFound(job_id).into());
    };
    print_json(&job.summary());

    if let Some(limit) = flagged {
        print_json(&flagged_providers(store, FlaggedScope::AllCompleted, limit, 0));
    }

    Ok(job.status)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Ingest { file, flagged } => match ingest(&config, &file, flagged).await {
            Ok(JobStatus::Completed) => ExitCode::SUCCESS,
            Ok(_) => ExitCode::FAILURE,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}
