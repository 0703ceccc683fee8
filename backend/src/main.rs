use std::io::Write;
use tokio::sync::mpsc;

use crypto_dashboard::config::DashboardConfig;
use crypto_dashboard::logging::{init_logging, LoggingConfig};
use crypto_dashboard::render;
use crypto_dashboard::services::dashboard_service::{forward_commands, Command, RefreshLoop};
use crypto_dashboard::services::market_data_service::MarketDataService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = DashboardConfig::from_env()?;
    tracing::info!(
        "🚀 Crypto dashboard starting (api: {}, coincap only: {}, window: {}h, refresh: {}s)",
        config.enable_api,
        config.use_coincap_only,
        config.history_window.hours(),
        config.refresh_interval.as_secs()
    );

    let service = MarketDataService::from_config(&config)?;
    let window = service.window();
    let (tx, rx) = mpsc::channel(8);

    // Plain thread: the process must be able to exit while a read is pending
    let stdin_tx = tx.clone();
    std::thread::spawn(move || forward_commands(std::io::stdin().lock(), &stdin_tx));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(Command::Quit).await;
        }
    });

    let interval = config.refresh_interval;
    RefreshLoop::new(service, interval)
        .run(rx, |state| {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\x1B[2J\x1B[H{}", render::render(state, window, interval));
            let _ = stdout.flush();
        })
        .await;

    Ok(())
}
