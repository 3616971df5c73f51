//! Precache Binary - One-shot cache warming run
//!
//! Usage:
//!   ./precache                 # configured days ahead
//!   ./precache --days 3        # today and the next two days
//!   ./precache --weekend       # upcoming Friday to Sunday
//!   ./precache --force         # refetch even fresh entries

use anyhow::{anyhow, Result};
use matchday_gateway::bin_common::{
    load_config_from_env, parse_args, print_banner, print_shutdown, ConfigType, PrecacheArgs,
    RunConfig,
};
use matchday_gateway::matchday::infrastructure::init_tracing_with_level;
use matchday_gateway::matchday::{GatewayConfig, MatchdayApp};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = PrecacheArgs::parse(&parse_args()).map_err(|e| anyhow!(e))?;

    let config_path = load_config_from_env(ConfigType::Gateway);
    let config = GatewayConfig::load(&config_path)?;

    init_tracing_with_level(&config.log_level);
    config.log();

    let days = args.days.unwrap_or(config.precache.days_ahead);
    let description = if args.weekend {
        "Weekend fixtures".to_string()
    } else {
        format!("{} days ahead", days)
    };
    let run_config = RunConfig::new("Precache")
        .with_description(description)
        .one_shot();
    print_banner(&run_config);

    let app = MatchdayApp::new(config).await?;
    let scheduler = app.precache();
    info!("{} leagues configured", scheduler.leagues().len());

    let result = if args.weekend {
        scheduler.run_weekend(args.force).await
    } else {
        scheduler.run(days, args.force).await
    };
    app.close().await;

    let stats = result?;
    print_shutdown(
        &run_config,
        Some(&format!(
            "Success: {}, failed: {}, skipped: {}",
            stats.success, stats.failed, stats.skipped
        )),
    );
    Ok(())
}
