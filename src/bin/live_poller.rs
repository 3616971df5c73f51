//! Live Poller Binary - Standalone live match diffing loop
//!
//! Usage:
//!   CONFIG_PATH=config/gateway.yaml ./live_poller

use anyhow::Result;
use matchday_gateway::bin_common::{
    load_config_from_env, print_banner, print_shutdown, ConfigType, RunConfig,
};
use matchday_gateway::matchday::infrastructure::init_tracing_with_level;
use matchday_gateway::matchday::{GatewayConfig, MatchdayApp};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = load_config_from_env(ConfigType::Gateway);
    let config = GatewayConfig::load(&config_path)?;

    init_tracing_with_level(&config.log_level);
    config.log();

    let run_config = RunConfig::new("Live Match Poller")
        .with_description(format!("Publishing to '{}'", config.poller.channel));
    print_banner(&run_config);

    let app = MatchdayApp::new(config).await?;
    let broadcaster = Arc::new(app.broadcaster());
    let poller = Arc::new(app.poller(broadcaster.clone()));

    poller.run(app.shutdown.clone()).await;

    broadcaster.flush().await;
    app.close().await;
    print_shutdown(&run_config, None);
    Ok(())
}
