use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rmcp::ServiceExt;
use tether_runtime::handlers::WeatherEndpoints;
use tether_runtime::handlers::weather::{DEFAULT_FORECAST_URL, DEFAULT_GEOCODING_URL};
use tether_runtime::{ArtifactCache, EngineConfig, ModuleEngine, SandboxPolicy};
use tracing_subscriber::{EnvFilter, fmt};

mod server;

use server::RuntimeHost;

#[derive(Parser)]
#[command(
    name = "tether-host",
    about = "tether runtime host: loads WASM tool modules and serves them over MCP stdio"
)]
struct Cli {
    /// URL of a module to load. Repeatable; modules load in the order given.
    #[arg(long = "url")]
    urls: Vec<String>,

    /// Artifact cache directory (default: ~/.tether/artifacts)
    #[arg(long, env = "TETHER_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Give modules access to the host network
    #[arg(long, env = "TETHER_WASI_NETWORK", default_value_t = true, action = ArgAction::Set)]
    allow_network: bool,

    /// Geocoding endpoint used by get_weather
    #[arg(long, env = "TETHER_GEOCODING_URL", default_value = DEFAULT_GEOCODING_URL)]
    geocoding_url: String,

    /// Forecast endpoint used by get_weather
    #[arg(long, env = "TETHER_FORECAST_URL", default_value = DEFAULT_FORECAST_URL)]
    forecast_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP stream; logs must go to stderr.
    fmt()
        .with_env_filter(EnvFilter::from_env("TETHER_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cache_dir = cli.cache_dir.unwrap_or_else(ArtifactCache::default_path);
    let cache = ArtifactCache::new(cache_dir);
    cache.init()?;
    tracing::debug!(cache = %cache.base_dir().display(), "Artifact cache ready");

    let engine = ModuleEngine::new(EngineConfig {
        sandbox: SandboxPolicy {
            allow_network: cli.allow_network,
        },
        weather: WeatherEndpoints {
            geocoding_url: cli.geocoding_url,
            forecast_url: cli.forecast_url,
        },
        ..EngineConfig::default()
    })?;

    // Any fetch or load failure here is fatal: the owning session sees the
    // transport close.
    for url in &cli.urls {
        let artifact = cache
            .fetch(url)
            .await
            .with_context(|| format!("failed to fetch module {url}"))?;
        engine
            .load(&artifact.local_path)
            .await
            .with_context(|| format!("failed to load module {url}"))?;
    }

    let host = RuntimeHost::new(Arc::new(engine));
    let server = host.serve(rmcp::transport::io::stdio()).await?;

    tracing::info!(modules = cli.urls.len(), "Runtime host serving on stdio");

    server.waiting().await?;

    tracing::info!("Runtime host shutting down");
    Ok(())
}
