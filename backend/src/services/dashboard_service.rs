use chrono::{DateTime, Utc};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{PriceSeries, PriceSnapshot};
use crate::services::market_data_service::{LoadResult, MarketDataService};

/// What the dashboard currently shows.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// None until the first successful load.
    pub tickers: Option<Vec<PriceSnapshot>>,
    pub series: PriceSeries,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DashboardState {
    /// A failed cycle only sets the error; whatever was on screen stays.
    pub fn apply(&mut self, result: Result<LoadResult, AppError>) {
        match result {
            Ok(loaded) => {
                self.tickers = Some(loaded.snapshots);
                self.series = loaded.series;
                self.error = None;
                self.last_updated = Some(loaded.loaded_at);
            }
            Err(e) => {
                self.error = Some(e.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Initial,
    Tick,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Quit,
}

impl Command {
    /// `q` or `quit` stops the dashboard; any other line refreshes it.
    pub fn from_line(line: &str) -> Self {
        match line.trim() {
            "q" | "quit" => Command::Quit,
            _ => Command::Refresh,
        }
    }
}

/// Turns input lines into commands until `Quit`, end of input, or the loop
/// going away. Blocks on reads, so give it its own OS thread: a tokio stdin
/// read can't be cancelled and would hold up runtime shutdown.
pub fn forward_commands<R: BufRead>(reader: R, tx: &mpsc::Sender<Command>) {
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let command = Command::from_line(&line);
        if tx.blocking_send(command).is_err() || command == Command::Quit {
            break;
        }
    }
}

/// Drives load cycles from the initial load, the refresh interval and manual
/// refresh commands. Cycles run one at a time.
pub struct RefreshLoop {
    service: MarketDataService,
    interval: Duration,
    state: DashboardState,
}

impl RefreshLoop {
    pub fn new(service: MarketDataService, interval: Duration) -> Self {
        Self {
            service,
            interval,
            state: DashboardState::default(),
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub async fn run_cycle(&mut self, trigger: Trigger) -> &DashboardState {
        info!("🔄 Load cycle started ({:?})", trigger);
        let result = self.service.load_cycle().await;
        match &result {
            Ok(loaded) => info!(
                "✅ Load cycle finished: {} tickers, {} chart points",
                loaded.snapshots.len(),
                loaded.series.len()
            ),
            Err(e) => error!("❌ Load cycle failed: {}", e),
        }
        self.state.apply(result);
        &self.state
    }

    /// Runs until a `Quit` command arrives or every command sender is gone.
    /// `on_update` sees the state after each cycle.
    pub async fn run<F>(mut self, mut commands: mpsc::Receiver<Command>, mut on_update: F) -> DashboardState
    where
        F: FnMut(&DashboardState),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick fires immediately; that's the initial load.
        ticker.tick().await;
        on_update(self.run_cycle(Trigger::Initial).await);

        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => Trigger::Tick,
                command = commands.recv() => match command {
                    Some(Command::Refresh) => Trigger::Manual,
                    Some(Command::Quit) | None => break,
                },
            };
            on_update(self.run_cycle(trigger).await);
        }

        info!("👋 Refresh loop stopped");
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::price_provider::{HistoryRequest, PriceProvider, PriceProviderError};
    use crate::models::{AssetId, HistoryWindow, SeriesPoint};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Succeeds until told to fail.
    #[derive(Default)]
    struct Flaky {
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PriceProvider for Flaky {
        fn source_name(&self) -> &'static str {
            "flaky"
        }

        async fn fetch_snapshots(&self, ids: &[AssetId]) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            if self.failing.load(Ordering::SeqCst) {
                return Err(PriceProviderError::Network("connection reset".into()));
            }
            Ok(ids.iter().map(|id| PriceSnapshot::new(*id, 100.0 + n, 0.0)).collect())
        }

        async fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<SeriesPoint>, PriceProviderError> {
            Ok(vec![SeriesPoint::new(request.now, 1.0)])
        }
    }

    fn refresh_loop(source: Arc<Flaky>, interval: Duration) -> RefreshLoop {
        let service = MarketDataService::new(source.clone(), source, HistoryWindow::default());
        RefreshLoop::new(service, interval)
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_data() {
        let source = Arc::new(Flaky::default());
        let mut refresh = refresh_loop(source.clone(), Duration::from_secs(30));

        refresh.run_cycle(Trigger::Initial).await;
        let first = refresh.state().clone();
        assert!(first.error.is_none());
        assert_eq!(first.tickers.as_ref().unwrap().len(), 3);

        source.failing.store(true, Ordering::SeqCst);
        let state = refresh.run_cycle(Trigger::Tick).await;

        assert!(state.error.as_ref().unwrap().contains("connection reset"));
        assert_eq!(state.tickers, first.tickers);
        assert_eq!(state.series, first.series);
        assert_eq!(state.last_updated, first.last_updated);
    }

    #[tokio::test]
    async fn test_next_success_clears_error() {
        let source = Arc::new(Flaky::default());
        source.failing.store(true, Ordering::SeqCst);
        let mut refresh = refresh_loop(source.clone(), Duration::from_secs(30));

        let state = refresh.run_cycle(Trigger::Initial).await;
        assert!(state.tickers.is_none());
        assert!(state.error.is_some());

        source.failing.store(false, Ordering::SeqCst);
        let state = refresh.run_cycle(Trigger::Manual).await;
        assert!(state.error.is_none());
        assert!(state.tickers.is_some());
    }

    #[tokio::test]
    async fn test_run_handles_manual_refresh_then_quit() {
        let source = Arc::new(Flaky::default());
        let refresh = refresh_loop(source.clone(), Duration::from_secs(3600));
        let (tx, rx) = mpsc::channel(4);
        tx.send(Command::Refresh).await.unwrap();
        tx.send(Command::Quit).await.unwrap();

        let mut updates = 0;
        let state = refresh.run(rx, |_| updates += 1).await;

        assert_eq!(updates, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.tickers.unwrap()[0].price_usd, 101.0);
    }

    #[test]
    fn test_command_from_line() {
        assert_eq!(Command::from_line("q"), Command::Quit);
        assert_eq!(Command::from_line("  quit \n"), Command::Quit);
        assert_eq!(Command::from_line(""), Command::Refresh);
        assert_eq!(Command::from_line("r"), Command::Refresh);
    }

    #[tokio::test]
    async fn test_forwarded_lines_stop_at_quit() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = std::io::Cursor::new("\nrefresh\nq\nnever read\n");
        std::thread::spawn(move || forward_commands(input, &tx))
            .join()
            .unwrap();

        assert_eq!(rx.recv().await, Some(Command::Refresh));
        assert_eq!(rx.recv().await, Some(Command::Refresh));
        assert_eq!(rx.recv().await, Some(Command::Quit));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_forwarding_ends_when_loop_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let input = std::io::Cursor::new("r\nr\nr\n");
        std::thread::spawn(move || forward_commands(input, &tx))
            .join()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_are_dropped() {
        let source = Arc::new(Flaky::default());
        let refresh = refresh_loop(source, Duration::from_secs(3600));
        let (tx, rx) = mpsc::channel(1);
        drop(tx);

        let state = refresh.run(rx, |_| {}).await;
        assert!(state.tickers.is_some());
    }
}
