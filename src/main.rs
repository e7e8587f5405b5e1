use anyhow::Result;
use brevet_api::brevet::{import, SqliteRecordRepository};
use brevet_api::{gateway, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Brevet control listing API
#[derive(Parser)]
#[command(name = "brevet-api")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Append control records from a JSON array file to the brevet store
    Import {
        /// JSON file holding an array of `{open_time, close_time, ...}` objects
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            gateway::run_gateway(config).await
        }
        Commands::Import { file } => {
            let records = import::load_records(&file)?;
            let repo = SqliteRecordRepository::open(&config.storage.brevet_db())?;
            let count = repo.insert_many(&records)?;
            tracing::info!(
                count,
                db = %config.storage.brevet_db().display(),
                "Import complete"
            );
            Ok(())
        }
    }
}
