use async_trait::async_trait;
use parking_lot::Mutex;

use crate::external::price_provider::{HistoryRequest, PriceProvider, PriceProviderError};
use crate::models::{AssetId, PriceSnapshot, SeriesPoint};
use crate::services::synthetic_market::SyntheticMarket;

pub const SOURCE: &str = "synthetic";

/// Serves the offline random-walk feed through the provider interface.
/// Never touches the network.
pub struct SyntheticProvider {
    market: Mutex<SyntheticMarket>,
}

impl SyntheticProvider {
    pub fn new(market: SyntheticMarket) -> Self {
        Self { market: Mutex::new(market) }
    }
}

#[async_trait]
impl PriceProvider for SyntheticProvider {
    fn source_name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_snapshots(
        &self,
        ids: &[AssetId],
    ) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
        Ok(self.market.lock().snapshots(ids))
    }

    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<SeriesPoint>, PriceProviderError> {
        Ok(self.market.lock().history(request))
    }
}
