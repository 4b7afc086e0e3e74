//! CFP arena server.
//!
//! Hosts Connect-Four engines, plays them against each other and
//! streams everything to observers over a line-based TCP channel.
//!
//! # Configuration
//!
//! Settings are resolved in priority order:
//!
//! 1. CLI arguments (highest)
//! 2. Config file (`--config`, TOML)
//! 3. Built-in defaults
//!
//! Logging is controlled by the `CFP_LOG` environment variable
//! (`tracing_subscriber::EnvFilter` syntax).

mod net;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cfp_arena::{ArenaConfig, Hub};

/// CFP arena server.
#[derive(Parser, Debug)]
#[command(name = "cfp-arena")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address the observer transport listens on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding engine binaries
    #[arg(short, long)]
    engine_dir: Option<PathBuf>,

    /// Maximum concurrent observers
    #[arg(long)]
    max_observers: Option<usize>,

    /// Per-turn think budget in milliseconds
    #[arg(long)]
    turn_time_ms: Option<u64>,

    /// Enable debug logging regardless of CFP_LOG
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// File config under CLI overrides, defaults underneath.
    fn resolve_config(&self) -> Result<ArenaConfig> {
        let mut config = ArenaConfig::default();
        if let Some(path) = &self.config {
            let layer = ArenaConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            config.merge(&layer);
        }
        if let Some(engine_dir) = &self.engine_dir {
            config.engine_dir = engine_dir.clone();
        }
        if let Some(max_observers) = self.max_observers {
            config.max_observers = max_observers;
        }
        if let Some(turn_time_ms) = self.turn_time_ms {
            config.turn_time_ms = turn_time_ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("CFP_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.resolve_config()?;
    info!(
        engine_dir = %config.engine_dir.display(),
        bind = %args.bind,
        "starting arena"
    );

    let hub = Hub::new(config);
    let roster = hub.roster();
    let client_tx = hub.client_sender();
    let buffer = hub.config().event_buffer.max(1);
    tokio::spawn(hub.run());

    net::serve(&args.bind, roster, client_tx, buffer).await
}
