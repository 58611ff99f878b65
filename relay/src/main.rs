//! Satellite relay: a stateless topic-rewriter. Subscribes to
//! `mission/start`, `fleet/event/+`, `fleet/state/+` on the local bus and
//! republishes each incoming (topic, payload) unmodified to
//! `global_hq/uplink/<original_topic>`. Carries no state of its own —
//! restart loses nothing but in-flight messages.

use clap::Parser;
use mob_bus::BusClient;
use mob_domain::wire::{TOPIC_FLEET_EVENT_WILDCARD, TOPIC_FLEET_STATE_WILDCARD, TOPIC_MISSION_START};
use mob_domain::{MissionConfig, MissionError};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "mob-relay", about = "Satellite relay: uplinks high-priority fleet events to global_hq")]
struct Cli {
    /// Path to the mission TOML config. Only `[mqtt]` is consulted; falls
    /// back to the built-in default if unreadable, unless --strict is set.
    #[arg(long, default_value = "mission.toml")]
    config: String,

    /// Refuse to fall back to the built-in default config on a read/parse
    /// failure; fail fast instead.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Override the bus address (host:port) from the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "relay exiting");
        if e.is_fatal() {
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<(), MissionError> {
    let config = MissionConfig::load(&cli.config, cli.strict)?;
    let bus_addr = cli.bind.unwrap_or_else(|| format!("{}:{}", config.mqtt.host, config.mqtt.port));

    let bus = BusClient::connect(bus_addr).await?;
    bus.subscribe(TOPIC_MISSION_START).await;
    bus.subscribe(TOPIC_FLEET_EVENT_WILDCARD).await;
    bus.subscribe(TOPIC_FLEET_STATE_WILDCARD).await;

    info!("relay uplinking mission/start, fleet/event/+, fleet/state/+ to global_hq/uplink/*");

    while let Some(envelope) = bus.recv().await {
        let uplink_topic = format!("global_hq/uplink/{}", envelope.topic);
        bus.publish(uplink_topic, envelope.payload).await;
    }

    Ok(())
}
