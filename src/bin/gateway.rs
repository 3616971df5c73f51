//! Gateway Binary - Cached HTTP front for the football API
//!
//! Serves cached upstream endpoints and, when `poller.enabled`, runs the
//! live match poller in the background.
//!
//! Usage:
//!   CONFIG_PATH=config/gateway.yaml ./gateway

use anyhow::Result;
use matchday_gateway::bin_common::{
    load_config_from_env, print_banner, print_shutdown, ConfigType, RunConfig,
};
use matchday_gateway::matchday::infrastructure::{create_router, init_tracing_with_level, serve};
use matchday_gateway::matchday::{GatewayConfig, MatchdayApp};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = load_config_from_env(ConfigType::Gateway);
    let config = GatewayConfig::load(&config_path)?;

    init_tracing_with_level(&config.log_level);
    config.log();

    let run_config = RunConfig::new("Matchday Gateway")
        .with_description(format!("Listening on {}", config.server.bind));
    print_banner(&run_config);

    let app = MatchdayApp::new(config).await?;
    let gateway = Arc::new(app.gateway());
    let broadcaster = Arc::new(app.broadcaster());

    let poller_task = if app.config.poller.enabled {
        let poller = Arc::new(app.poller(broadcaster.clone()));
        let shutdown = app.shutdown.clone();
        Some(tokio::spawn(async move { poller.run(shutdown).await }))
    } else {
        info!("Live poller disabled");
        None
    };

    let state = Arc::new(app.app_state(gateway.clone(), broadcaster.clone()));
    if let Err(e) = serve(&app.config.server.bind, create_router(state), app.shutdown.clone()).await {
        error!("HTTP server failed: {}", e);
        app.shutdown.cancel();
    }

    if let Some(task) = poller_task {
        if let Err(e) = task.await {
            error!("Poller task failed: {}", e);
        }
    }
    broadcaster.flush().await;
    app.close().await;

    let stats = gateway.stats();
    print_shutdown(
        &run_config,
        Some(&format!(
            "Hits: {}, misses: {}, stale: {}, rate limited: {}, upstream errors: {}",
            stats.hits, stats.misses, stats.stale, stats.rate_limited, stats.upstream_errors
        )),
    );
    Ok(())
}
