use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::DashboardConfig;
use crate::errors::AppError;
use crate::external::coincap::{CoinCapCandleProvider, CoinCapProvider};
use crate::external::coingecko::CoinGeckoProvider;
use crate::external::fallback::FallbackProvider;
use crate::external::price_provider::{HistoryRequest, PriceProvider};
use crate::external::synthetic::SyntheticProvider;
use crate::models::{keep_latest, AssetId, HistoryWindow, PriceSeries, PriceSnapshot, SeriesPoint};
use crate::services::synthetic_market::SyntheticMarket;

/// Result of one load cycle: both halves succeeded.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub snapshots: Vec<PriceSnapshot>,
    pub series: PriceSeries,
    pub loaded_at: DateTime<Utc>,
}

/// Entry point of the acquisition layer. Callers ask for snapshots or a
/// history series and never see which provider answered.
pub struct MarketDataService {
    assets: Vec<AssetId>,
    history_asset: AssetId,
    window: HistoryWindow,
    snapshot_source: Arc<dyn PriceProvider>,
    history_source: Arc<dyn PriceProvider>,
}

impl MarketDataService {
    pub fn new(
        snapshot_source: Arc<dyn PriceProvider>,
        history_source: Arc<dyn PriceProvider>,
        window: HistoryWindow,
    ) -> Self {
        Self {
            assets: AssetId::ALL.to_vec(),
            history_asset: AssetId::Bitcoin,
            window,
            snapshot_source,
            history_source,
        }
    }

    /// Wires either the offline feed or the network fallback chains.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, AppError> {
        if config.is_offline() {
            info!("📴 Network access disabled, serving synthetic prices");
            let market = match config.synthetic_seed {
                Some(seed) => SyntheticMarket::seeded(seed),
                None => SyntheticMarket::from_os_rng(),
            };
            let synthetic: Arc<dyn PriceProvider> = Arc::new(SyntheticProvider::new(market));
            return Ok(Self::new(synthetic.clone(), synthetic, config.history_window));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        let coincap: Arc<dyn PriceProvider> =
            Arc::new(CoinCapProvider::new(client.clone(), &config.coincap_base_url));
        let candles: Arc<dyn PriceProvider> =
            Arc::new(CoinCapCandleProvider::new(client.clone(), &config.coincap_base_url));

        let mut snapshot_chain: Vec<Arc<dyn PriceProvider>> = Vec::new();
        let mut history_chain: Vec<Arc<dyn PriceProvider>> = Vec::new();

        if !config.use_coincap_only {
            let coingecko: Arc<dyn PriceProvider> = Arc::new(CoinGeckoProvider::new(
                client,
                &config.coingecko_base_url,
                config.coingecko_api_key.clone(),
            ));
            snapshot_chain.push(coingecko.clone());
            history_chain.push(coingecko);
        }
        snapshot_chain.push(coincap.clone());
        history_chain.extend([coincap, candles]);

        let snapshots = FallbackProvider::new("snapshots", snapshot_chain);
        let history = FallbackProvider::new("history", history_chain);
        info!(
            "📊 Using price providers: snapshots {:?}, history {:?}",
            snapshots.provider_names(),
            history.provider_names()
        );

        Ok(Self::new(Arc::new(snapshots), Arc::new(history), config.history_window))
    }

    pub fn window(&self) -> HistoryWindow {
        self.window
    }

    /// One snapshot per dashboard asset, in display order.
    pub async fn fetch_snapshots(&self) -> Result<Vec<PriceSnapshot>, AppError> {
        self.snapshot_source
            .fetch_snapshots(&self.assets)
            .await
            .map_err(|e| {
                error!("Failed to fetch price snapshots: {}", e);
                AppError::from(e)
            })
    }

    pub async fn fetch_history(&self) -> Result<PriceSeries, AppError> {
        self.fetch_history_window(self.window).await
    }

    pub async fn fetch_history_window(&self, window: HistoryWindow) -> Result<PriceSeries, AppError> {
        let request = HistoryRequest::new(self.history_asset, window);
        let points = self
            .history_source
            .fetch_history(&request)
            .await
            .map_err(|e| {
                error!("Failed to fetch {} history: {}", self.history_asset, e);
                AppError::from(e)
            })?;

        let points = normalize(points, window);
        if points.is_empty() {
            return Err(AppError::External(format!("no history available for {}", self.history_asset)));
        }
        Ok(PriceSeries::from_points(&points))
    }

    /// Fetches snapshots and history concurrently; the cycle only completes
    /// once both have finished.
    pub async fn load_cycle(&self) -> Result<LoadResult, AppError> {
        let (snapshots, series) = tokio::join!(self.fetch_snapshots(), self.fetch_history());
        Ok(LoadResult {
            snapshots: snapshots?,
            series: series?,
            loaded_at: Utc::now(),
        })
    }
}

/// Oldest first, at most one window's worth of points.
fn normalize(mut points: Vec<SeriesPoint>, window: HistoryWindow) -> Vec<SeriesPoint> {
    points.sort_by_key(|p| p.timestamp);
    keep_latest(points, window.point_count())
}
