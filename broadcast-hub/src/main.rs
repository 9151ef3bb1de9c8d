use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use broadcast_hub::{BroadcastHub, cli::Cli};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut hubs = Vec::new();
    for (channel, config) in cli.hub_configs() {
        let hub = BroadcastHub::with_config(config);
        hub.set_subscriber(move |line| info!(%channel, %line, "event"));
        let addr = hub
            .start()
            .await
            .with_context(|| format!("failed to start {channel} hub"))?;
        hubs.push((channel, hub, addr));
    }

    for (channel, _, addr) in &hubs {
        info!("{channel} hub listening on {addr}");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to install ctrl-c handler")?;
    info!("shutting down");

    Ok(())
}
