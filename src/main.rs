use clap::Parser;
use cocoro_homekit_bridge::cocoro::SimulatedCloud;
use cocoro_homekit_bridge::config::{Config, load_dotenv};
use cocoro_homekit_bridge::homekit::LocalHost;
use cocoro_homekit_bridge::platform::CocoroPlatform;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser)]
#[command(name = "cocoro-homekit-bridge")]
#[command(about = "Expose Sharp Cocoro air conditioners as HomeKit accessories")]
struct Cli {
    /// JSON platform block with appSecret/appKey and optional tuning
    #[arg(long, env = "COCORO_CONFIG")]
    config: Option<PathBuf>,

    /// Accessory cache file (overrides ACCESSORY_CACHE_PATH)
    #[arg(long)]
    cache: Option<PathBuf>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Before the runtime starts: load_dotenv mutates the process environment
    load_dotenv();
    init_logger();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> cocoro_homekit_bridge::error::Result<()> {
    info!("Starting Cocoro HomeKit Bridge");

    let mut config = match &cli.config {
        Some(path) => Config::from_platform_file(path)?,
        None => Config::from_env(),
    };
    if let Some(cache) = cli.cache {
        config.cache.path = cache;
    }
    config.validate()?;

    info!("Configuration loaded:");
    info!("  Platform: {}", config.platform.name);
    info!("  Submit debounce: {:?}", config.platform.submit_debounce());
    info!("  Debounce scope: {:?}", config.platform.debounce_scope);
    info!("  Refresh interval: {:?}", config.platform.refresh_interval());
    info!("  Accessory cache: {}", config.cache.path.display());

    let host = Arc::new(LocalHost::with_cache(config.cache.path.clone()));
    let cloud = Arc::new(
        SimulatedCloud::new(config.cocoro.clone())
            .with_demo_devices()
            .with_room_temperature_drift(true),
    );
    let platform = Arc::new(CocoroPlatform::new(
        config.platform.clone(),
        cloud,
        host.clone(),
    ));

    for accessory in host.cached_accessories() {
        platform.configure_accessory(accessory);
    }
    platform.did_finish_launching().await;
    platform.spawn_discovery_loop();

    info!("Cocoro HomeKit Bridge is running");
    info!("  - {} accessory(ies) active", platform.accessory_count());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    platform.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
