use hostkit::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod first_middleware;
mod startup;
mod user_logic;

use startup::DemoStartup;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting startup demo...");

    let settings = ConfigService::from_env();
    let config = HostConfig::from_config(&settings)?;
    let stopped_delay = Duration::from_millis(settings.get_or("DEMO_STOPPED_DELAY_MS", 0)?);

    let host = Host::builder()
        .config(config)
        .startup(DemoStartup { stopped_delay })
        .build()?;

    tracing::info!(
        "Try: curl http://127.0.0.1:{}/hello, then curl http://127.0.0.1:{}/shutdown",
        host.config().port,
        host.config().port
    );

    host.run().await?;
    Ok(())
}
