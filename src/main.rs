use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solocast::config::AppConfig;
use solocast::recordings::RetentionSweeper;
use solocast::state::AppState;
use solocast::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Solocast command line arguments
#[derive(Parser, Debug)]
#[command(name = "solocast")]
#[command(version, about = "Single-broadcaster live signaling and recording server", long_about = None)]
struct CliArgs {
    /// Listen address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Recordings directory (overrides config file)
    #[arg(short = 'd', long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level);

    tracing::info!("Starting solocast v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration and apply CLI overrides
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.web.bind_address = address;
    }
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.recordings.data_dir = data_dir.to_string_lossy().to_string();
    }

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Create application state
    let state = AppState::new(config.clone(), shutdown_tx.clone());

    // Ensure the per-kind recording directories exist
    state.store.ensure_dirs().await?;
    tracing::info!("Recordings directory: {}", state.store.root().display());

    // Start the retention sweeper
    let sweeper = Arc::new(RetentionSweeper::new(
        state.store.clone(),
        Duration::from_secs(u64::from(config.recordings.retention_days) * 24 * 3600),
        Duration::from_secs(config.recordings.sweep_interval_hours * 3600),
    ));
    sweeper.spawn(state.shutdown_signal());

    // Create router and bind
    let app = web::create_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.web.bind_address, config.web.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    // Setup graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel) {
    let filter = match level {
        LogLevel::Error => "solocast=error,tower_http=error",
        LogLevel::Warn => "solocast=warn,tower_http=warn",
        LogLevel::Info => "solocast=info,tower_http=info",
        LogLevel::Debug => "solocast=debug,tower_http=debug",
        LogLevel::Trace => "solocast=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
