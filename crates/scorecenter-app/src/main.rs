// ScoreCenter entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not the console)
// 2. Load config
// 3. Build the data source and its cache
// 4. Build the drawer
// 5. Create mpsc channels
// 6. Populate the tree and make the first selection
// 7. Spawn app logic task
// 8. Run the console until the user quits
// 9. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use scorecenter_app::app;
use scorecenter_app::config;
use scorecenter_app::console;
use scorecenter_app::sections::SectionPanel;
use scorecenter_core::source::{EspnDataSource, HttpFetcher};
use scorecenter_core::{DataLoader, RemoteDataSource};
use scorecenter_drawer::DrawerEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not the console)
    init_tracing()?;
    info!("ScoreCenter starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: favorite={} / {}, {} starter sports, cache capacity {}",
        config.sports.favorite,
        config.sports.favorite_league,
        config.sports.starters.len(),
        config.cache.capacity
    );
    if config.credentials.espn_api_key.is_none() {
        info!("No ESPN API key configured; requests go out without one");
    }

    // 3. Data source and cache
    let fetcher =
        HttpFetcher::new(config.request_timeout()).context("failed to build HTTP client")?;
    let source: Arc<dyn RemoteDataSource> =
        Arc::new(EspnDataSource::new(config.espn_settings(), fetcher));
    let loader = Arc::new(DataLoader::with_capacity(source, config.cache.capacity));

    // 4. Drawer
    let drawer = DrawerEngine::build(&config.drawer, SectionPanel::resolve)
        .context("failed to build drawer")?;
    info!("Drawer built with {} panels", drawer.panel_count());

    // 5. Create mpsc channels
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (load_tx, load_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // 6. Populate the tree and make the first selection
    let mut app_state = app::AppState::new(&config, loader, drawer, load_tx);
    for update in app_state.startup().await {
        ui_tx
            .send(update)
            .await
            .context("UI channel closed during startup")?;
    }

    // 7. Spawn app logic task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, load_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    // 8. Run the console (blocks until the user quits or stdin closes)
    info!("Application ready");
    if let Err(e) = console::run(ui_rx, cmd_tx).await {
        error!("Console error: {}", e);
    }

    // 9. Cleanup: wait for the app task to finish (with timeout)
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("ScoreCenter shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which the console uses).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("scorecenter.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scorecenter=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
