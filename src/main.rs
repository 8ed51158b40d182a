//! HTTP Auditor - self-instrumenting HTTP server with a queryable request log.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use http_auditor::config::{AppConfig, ConfigLoader};
use http_auditor::server::{HostServer, ServerError};
use http_auditor::units::builtin_catalog;

#[derive(Parser)]
#[command(
    name = "http-auditor",
    about = "Self-instrumenting HTTP server with a queryable request log",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server.
    Serve {
        /// Config file to use instead of `$HTTP_AUDITOR_CONFIG` or the search paths.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Address to bind to.
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
        /// Request log database file.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List the feature units compiled into the server.
    Units,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ServerError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load()?)
}

async fn serve(config: AppConfig) -> Result<(), ServerError> {
    let server = HostServer::build(config, builtin_catalog()).await?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received ctrl-c");
                shutdown.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "Failed to listen for ctrl-c"),
        }
    });

    server.run(cancel).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            db,
        } => {
            let mut config = match load_config(config) {
                Ok(config) => config,
                Err(err) => {
                    tracing::error!(error = %err, "Failed to load configuration");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(db) = db {
                config.storage.path = db;
            }

            tracing::info!(
                address = %config.server.addr(),
                db = %config.storage.path.display(),
                "Loaded configuration"
            );
            if let Err(err) = serve(config).await {
                tracing::error!(error = %err, "Server failed");
                return ExitCode::FAILURE;
            }
        }
        Commands::Units => {
            for unit in builtin_catalog().iter() {
                println!(
                    "{}\t{}\t{}\t{}",
                    unit.name,
                    unit.version,
                    if unit.enabled { "enabled" } else { "disabled" },
                    unit.description
                );
            }
        }
    }

    ExitCode::SUCCESS
}
