use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tether_runtime::BlobStoreClient;
use tether_service::SessionManager;
use tether_service::config::TetherConfig;
use tether_service::http::{AppState, router};
use tether_service::registry::RegistryClient;
use tether_service::session::ChildProcessConnector;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "tether", about = "tether: LLM tool calling over sandboxed WASM tool hosts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tool sources, start a runtime host for each and serve the chat API
    Serve {
        /// Path to tether.toml
        #[arg(long, short, default_value = "tether.toml")]
        config: PathBuf,
    },
    /// Upload a .wasm module to the blob store
    Publish {
        /// Module file to upload
        file: PathBuf,

        /// Blob store base URL
        #[arg(long, env = "TETHER_BLOB_STORE", default_value = "http://localhost:8001")]
        store: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_env("TETHER_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(config).await,
        Commands::Publish { file, store } => publish(file, store).await,
    }
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let config = TetherConfig::from_file(&config_path)?;
    let llm = config.build_llm_client()?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    let sources = RegistryClient::new(&config.registry.url)?.fetch_sources().await;

    let connector = ChildProcessConnector::new(config.runtime.host_command());
    let mut manager = SessionManager::new(Arc::new(connector));
    let catalog = Arc::new(manager.start_all(&sources).await);

    let state = Arc::new(AppState {
        catalog,
        llm,
        settings: config.orchestrator_settings(),
    });

    tracing::info!(bind = %config.server.bind, "tether serving");

    let served = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    manager.shutdown().await;
    tracing::info!("tether stopped");
    served.context("HTTP server failed")
}

async fn publish(file: PathBuf, store: String) -> Result<()> {
    let client = BlobStoreClient::new(store);
    let receipt = client
        .upload(&file)
        .await
        .with_context(|| format!("failed to publish {}", file.display()))?;
    println!("{}", receipt.url);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
