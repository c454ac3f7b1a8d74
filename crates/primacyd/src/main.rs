//! primacyd — the primacy daemon.
//!
//! Builds the election and services described by `primacy.toml`, then
//! prints a single verdict, follows the verdict as the group changes, or
//! transfers an object through the configured services.
//!
//! # Usage
//!
//! ```text
//! primacyd --config /etc/primacy/primacy.toml check --json
//! primacyd --config /etc/primacy/primacy.toml --group fleet-a watch
//! primacyd --config /etc/primacy/primacy.toml put s3://bundles/latest.zip ./bundle.zip
//! primacyd --config /etc/primacy/primacy.toml get s3://bundles/latest.zip --profile ops
//! ```

mod wiring;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use primacy_core::{PrimacyConfig, ServicesBackend};
use primacy_services::ExternalResult;

#[derive(Parser)]
#[command(name = "primacyd", about = "primacy daemon")]
struct Cli {
    /// Path to primacy.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Group name prefix to elect within (overrides the config file).
    #[arg(long, global = true, env = "PRIMACY_GROUP")]
    group: Option<String>,

    /// This instance's id (overrides the config file).
    #[arg(long, global = true, env = "PRIMACY_INSTANCE_ID")]
    instance_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one election round and print the verdict.
    Check {
        /// Print the verdict as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Keep the election running and log every verdict change.
    Watch,
    /// Stream an object to stdout.
    Get {
        url: String,
        #[command(flatten)]
        profile: ProfileArgs,
    },
    /// Upload a local file as an object.
    Put {
        url: String,
        file: PathBuf,
        #[command(flatten)]
        profile: ProfileArgs,
    },
}

#[derive(Args)]
struct ProfileArgs {
    /// Credential profile. Omitted or `default` uses the default credential.
    #[arg(long)]
    profile: Option<String>,
    /// Region for a named profile.
    #[arg(long)]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,primacyd=debug,primacy=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PrimacyConfig::from_file(path)?,
        None => PrimacyConfig::default(),
    };
    if cli.group.is_some() {
        config.election.group = cli.group;
    }
    if cli.instance_id.is_some() {
        config.identity.instance_id = cli.instance_id;
    }
    config.validate()?;

    match cli.command {
        Command::Check { json } => run_check(&config, json).await,
        Command::Watch => run_watch(&config).await,
        Command::Get { url, profile } => run_get(&config, &url, &profile).await,
        Command::Put { url, file, profile } => run_put(&config, &url, &file, &profile).await,
    }
}

async fn run_check(config: &PrimacyConfig, json: bool) -> anyhow::Result<()> {
    let election = wiring::build_election(config)?;
    let is_primary = election.is_primary().await;
    election.scheduler.shutdown();

    let report = election.report(is_primary);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} is {}primary in {}",
            report.instance_id,
            if is_primary { "" } else { "not " },
            report.group.as_deref().unwrap_or("<standalone>")
        );
    }
    Ok(())
}

async fn run_watch(config: &PrimacyConfig) -> anyhow::Result<()> {
    let election = wiring::build_election(config)?;
    let is_primary = election.is_primary().await;
    info!(is_primary, instance_id = %election.instance_id, "initial verdict");

    if election.group.is_none() {
        warn!("no group configured; standalone instance stays primary");
    }
    if election.backend == ServicesBackend::Noop {
        warn!("noop services configured; this instance always reports primary");
    }

    let mut changes = election.scheduler.subscribe();
    let mut last = is_primary;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *changes.borrow_and_update();
                if state.is_primary != last {
                    info!(
                        is_primary = state.is_primary,
                        last_evaluated = ?state.last_evaluated,
                        "verdict changed"
                    );
                    last = state.is_primary;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    election.scheduler.shutdown();
    info!("primacyd stopped");
    Ok(())
}

async fn run_get(config: &PrimacyConfig, url: &str, profile: &ProfileArgs) -> anyhow::Result<()> {
    let election = wiring::build_election(config)?;
    let mut stdout = tokio::io::stdout();
    let result = election
        .services
        .get_file_as_stream(
            url,
            &mut stdout,
            profile.profile.as_deref(),
            profile.region.as_deref(),
        )
        .await;
    stdout.flush().await?;
    finish(url, result)
}

async fn run_put(
    config: &PrimacyConfig,
    url: &str,
    file: &Path,
    profile: &ProfileArgs,
) -> anyhow::Result<()> {
    let election = wiring::build_election(config)?;
    let result = election
        .services
        .put_file(
            url,
            file,
            profile.profile.as_deref(),
            profile.region.as_deref(),
        )
        .await;
    finish(url, result)
}

fn finish(url: &str, result: ExternalResult) -> anyhow::Result<()> {
    if result.success {
        info!(%url, "transfer complete");
        Ok(())
    } else {
        anyhow::bail!(
            "transfer of {url} failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        )
    }
}
