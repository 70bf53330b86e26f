use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use volume_provisioner::{ProvisionerIdentity, ServerConfig, VersionInfo};

#[derive(Parser)]
#[command(name = "volumed", about = "Persistent volume provisioner server")]
enum Cli {
    /// Start the server and run until interrupted
    Up {
        /// Register a reference provisioner (repeatable, overrides VOLUMED_PROVISIONERS)
        #[arg(long = "provisioner", value_name = "LABEL/NAME")]
        provisioners: Vec<ProvisionerIdentity>,
        /// Deadline for each capability operation, 0 disables it
        #[arg(long, value_name = "SECS")]
        operation_timeout: Option<u64>,
    },
    /// Print the version
    Version {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse() {
        Cli::Up {
            provisioners,
            operation_timeout,
        } => up(provisioners, operation_timeout).await,
        Cli::Version { json } => version(json),
    }
}

async fn up(provisioners: Vec<ProvisionerIdentity>, operation_timeout: Option<u64>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("volumed=info,volume_provisioner=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig::from_env()
        .context("failed to load configuration")?
        .with_provisioners(provisioners);
    if let Some(secs) = operation_timeout {
        config = config.with_operation_timeout_secs(secs);
    }

    let version = VersionInfo::current();
    info!(%version, "starting");

    let registry = config
        .build_registry()
        .context("failed to register provisioners")?;
    info!(
        provisioners = registry.len(),
        operation_timeout = ?config.operation_timeout,
        "volumed up, waiting for shutdown signal"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received, exiting");
    Ok(())
}

fn version(json: bool) -> Result<()> {
    let version = VersionInfo::current();
    if json {
        println!("{}", serde_json::to_string_pretty(&version)?);
    } else {
        println!("{version}");
    }
    Ok(())
}
