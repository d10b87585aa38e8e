//! Lost & Found Matching Server - Entry Point
//!
//! Loads configuration and items, binds the listener, and serves until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lostfound_server::{
    Acceptor, ItemStore, JsonFileStore, MemoryStore, Persistence, ServerConfig,
};

#[derive(Debug, Parser)]
#[command(version, about = "Lost & found matching and chat relay server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Item data file (overrides the config file)
    #[arg(short, long)]
    data_file: Option<PathBuf>,

    /// Keep items in memory only
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=lostfound_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lostfound_server=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(data_file) = args.data_file {
        config.data_file = data_file;
    }
    config.validate()?;

    let persistence: Box<dyn Persistence> = if args.ephemeral {
        info!("Running without persistence");
        Box::new(MemoryStore::new())
    } else {
        Box::new(JsonFileStore::new(&config.data_file))
    };
    let store = ItemStore::load(config.locations.clone(), persistence);

    // Start TCP listener
    let acceptor = Acceptor::bind(config).await?;
    info!("Lost & Found server listening on {}", acceptor.local_addr()?);

    let shutdown = acceptor.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            shutdown.trigger();
        }
    });

    acceptor.run(store).await?;
    info!("Server shutdown complete");

    Ok(())
}
