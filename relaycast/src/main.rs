mod server;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use relaycast_core::{bootstrap::load_config, logging, StreamKeyRegistry};
use relaycast_livestream::{build_engine, FfmpegLauncher, RelayWorkerSupervisor, SimulcastService, StreamRelayRegistry};
use relaycast_platforms::{credentials, IntegrationRegistry, PlatformFanout};

use server::RelaycastServer;

#[derive(Parser, Debug)]
#[command(name = "relaycast")]
#[command(about = "Simulcast relay server", long_about = None)]
struct Args {
    /// Configuration file (YAML)
    #[arg(long, short = 'c', env = "RELAYCAST_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("relaycast starting...");
    info!("HTTP address: {}", config.http_address());
    info!("RTMP ingest: {}", config.rtmp.ingest_url("<stream-key>"));

    // 3. Stream key registry
    let keys = Arc::new(StreamKeyRegistry::new());

    // 4. Relay engine adapter and relay registry
    let engine = build_engine(&config.engine)?;
    info!(strategy = engine.name(), "Relay engine adapter selected");
    let relay = Arc::new(StreamRelayRegistry::new(engine, config.rtmp.clone()));

    // 4.5. Probe the engine; it may come up after us
    match relay.health_check().await {
        Ok(()) => info!("Relay engine is running"),
        Err(e) => warn!("Relay engine not reachable yet: {}", e),
    }

    // 5. Platform integrations and fanout
    let platform_timeout = config.fanout.platform_timeout();
    let integrations = IntegrationRegistry::from_config(&config.platforms, platform_timeout)?;
    info!(platforms = ?integrations.platforms(), "Platform integrations initialized");
    let fanout = Arc::new(PlatformFanout::new(
        Arc::new(integrations),
        credentials::from_config(&config.credentials),
        platform_timeout,
    ));

    // 6. Relay worker supervisor
    let supervisor = Arc::new(RelayWorkerSupervisor::new(
        Arc::new(FfmpegLauncher::new(&config.workers.ffmpeg_path)),
        config.workers.grace_period(),
    ));
    if config.workers.enabled {
        info!(
            platforms = ?config.workers.platforms,
            ffmpeg = %config.workers.ffmpeg_path,
            "Local relay workers enabled"
        );
    }

    // 7. Simulcast service
    let simulcast = Arc::new(SimulcastService::new(
        keys,
        relay,
        fanout,
        supervisor,
        config.workers.clone(),
    ));

    // 8. Serve until shutdown
    RelaycastServer::new(config, simulcast).start().await
}
