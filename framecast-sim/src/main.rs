//! Framecast simulator — entry point.
//!
//! ```text
//! framecast-sim                    Dry run against the recording transport
//! framecast-sim --ndi              Publish to the real NDI runtime
//! framecast-sim --config <path>    Load a custom config TOML
//! framecast-sim --ticks <n>        Override the configured tick count
//! framecast-sim --gen-config       Write the default config to stdout
//! ```

mod config;
mod harness;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::Parser;
use framecast_core::{MemoryTransport, NdiRuntime, NdiTransport, Transport};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::SimConfig;
use crate::harness::SimHarness;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "framecast-sim",
    about = "Drives the relay filter without a compositor host"
)]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framecast-sim.toml")]
    config: PathBuf,

    /// Publish to the real NDI runtime instead of the in-memory recorder.
    #[arg(long)]
    ndi: bool,

    /// Override the configured tick count (0 = run until Ctrl-C).
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the configured stream name.
    #[arg(long)]
    name: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&SimConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = SimConfig::load(&cli.config);
    if let Some(ticks) = cli.ticks {
        config.timing.ticks = ticks;
    }
    if let Some(name) = cli.name {
        config.output.sender_name = name;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "framecast-sim v{} (core v{})",
        env!("CARGO_PKG_VERSION"),
        framecast_core::VERSION
    );
    info!("stream name: {}", config.output.sender_name);
    info!(
        "pattern: {}x{} at {} ticks/s",
        config.pattern.width, config.pattern.height, config.timing.tick_rate
    );

    if cli.ndi {
        let runtime = NdiRuntime::load()?;
        run(config, NdiTransport::new(Arc::new(runtime))).await
    } else {
        info!("dry run: frames go to the in-memory recording transport");
        run(config, MemoryTransport::new()).await
    }
}

/// Drive the harness to completion, stopping early on Ctrl-C.
async fn run<T: Transport>(
    config: SimConfig,
    transport: T,
) -> Result<(), Box<dyn std::error::Error>> {
    let harness = SimHarness::new(config, transport)?;
    let stop = harness.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    harness.run().await?;
    Ok(())
}
