use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use huddle_core::App;
use huddle_store::Store;

/// Host process for the messaging core: opens the snapshot store, runs the
/// deferred-task loop, and hands the [`App`] to the request layer. The
/// HTTP routing itself lives outside this crate.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug".into()),
        )
        .init();

    // Config
    let data_path = std::env::var("HUDDLE_DATA_PATH").unwrap_or_else(|_| "huddle.json".into());
    let tick_ms: u64 = std::env::var("HUDDLE_TICK_MS")
        .unwrap_or_else(|_| "250".into())
        .parse()?;

    let store = Arc::new(Store::open(&PathBuf::from(&data_path))?);
    let app = App::new(store);

    let scheduler = app.scheduler().clone();
    tokio::spawn(scheduler.run_loop(Duration::from_millis(tick_ms)));
    info!(
        "huddle core running; deferred-task loop ticking every {}ms",
        tick_ms
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
