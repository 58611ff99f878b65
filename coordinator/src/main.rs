//! Entry point for the fleet coordinator process. Takes no required
//! arguments; one process serves the whole fleet plus the GCS
//! WebSocket broadcaster.

mod coordinator;
mod fleet;
mod gcs;

use std::sync::Arc;

use clap::Parser;
use mob_bus::BusClient;
use mob_domain::{MissionConfig, MissionError};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "mob-coordinator", about = "Fleet coordinator and GCS WebSocket broadcaster")]
struct Cli {
    /// Path to the mission TOML config. Falls back to the built-in default if
    /// unreadable, unless --strict is set.
    #[arg(long, default_value = "mission.toml")]
    config: String,

    /// Refuse to fall back to the built-in default config on a read/parse
    /// failure; fail fast instead.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "coordinator exiting");
        if e.is_fatal() {
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<(), MissionError> {
    let config = MissionConfig::load(&cli.config, cli.strict)?;

    let mqtt_addr = format!("{}:{}", config.mqtt.host, config.mqtt.port);
    let bus = Arc::new(BusClient::connect(mqtt_addr).await?);

    let (command_sink, operator_rx, broadcaster) = gcs::channel_pair();

    let gcs_addr = format!("{}:{}", config.gcs.host, config.gcs.port);
    let gcs_handle = tokio::spawn(gcs::serve(gcs_addr, command_sink, broadcaster.clone()));

    let coordinator = coordinator::Coordinator::new(config, bus, broadcaster);
    coordinator.subscribe_topics().await;

    let evolve_handle = tokio::spawn(coordinator.clone().run_map_evolution_loop());

    tokio::select! {
        _ = coordinator.run(operator_rx) => {}
        result = gcs_handle => {
            if let Ok(Err(e)) = result {
                return Err(e);
            }
        }
    }

    evolve_handle.abort();
    Ok(())
}
