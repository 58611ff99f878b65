//! Entry point for a single drone's mission agent process. One process per
//! drone; `--id` selects which `[[drones]]` entry in the mission config this
//! process embodies.

use std::sync::Arc;

use clap::Parser;
use mob_bus::BusClient;
use mob_domain::{DroneKind, MissionConfig, MissionError, Position};
use mob_drone_agent::agent::{self, AgentContext};
use mob_drone_agent::simulated::{SimulatedController, SimulatedDetector};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "mob-drone-agent", about = "Per-drone mission kernel agent")]
struct Cli {
    /// Drone id; must match one of the `[[drones]]` entries in the mission config.
    #[arg(long)]
    id: String,

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
        error!(error = %e, "drone agent exiting");
        if e.is_fatal() {
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<(), MissionError> {
    let config = MissionConfig::load(&cli.config, cli.strict)?;

    let drone = config
        .drone(&cli.id)
        .ok_or_else(|| MissionError::FatalConfig(format!("no [[drones]] entry for id {}", cli.id)))?
        .clone();

    if drone.kind != DroneKind::Simulated {
        return Err(MissionError::FatalConfig(format!(
            "drone {} requests controller kind {:?}, but only the simulated backend ships in this workspace",
            drone.id, drone.kind
        )));
    }

    let addr = format!("{}:{}", config.mqtt.host, config.mqtt.port);
    let bus = Arc::new(BusClient::connect(&addr).await?);

    let mut controller = SimulatedController::new(drone.id.clone(), Position::default());
    controller.connect().await?;
    let detector = SimulatedDetector::new(drone.id.clone());

    let ctx: Arc<AgentContext> =
        AgentContext::new(drone.id.clone(), drone.role, config, bus, Box::new(controller), Box::new(detector));

    agent::run(ctx).await;
    Ok(())
}
