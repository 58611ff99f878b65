//! Standalone bus broker process. Every other mission-kernel binary connects
//! to this as a `BusClient`; it holds no mission state of its own, it only
//! fans out published envelopes to matching subscribers.

use std::sync::Arc;

use clap::Parser;
use mob_bus::Broker;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mob-broker", about = "Mission kernel message bus broker")]
struct Args {
    #[arg(long, default_value = "0.0.0.0:7883")]
    bind: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "mob_broker=info".into()))
        .init();

    let args = Args::parse();
    let broker = Arc::new(Broker::new());
    if let Err(e) = broker.serve(&args.bind).await {
        tracing::error!(error = %e, bind = %args.bind, "broker failed to bind");
        std::process::exit(1);
    }
    Ok(())
}
