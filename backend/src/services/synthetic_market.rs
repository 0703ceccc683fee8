use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::external::price_provider::HistoryRequest;
use crate::models::{AssetId, PriceSnapshot, SeriesPoint, SERIES_STEP_MINUTES};

/// Prices are never walked below this floor.
pub const PRICE_FLOOR: f64 = 0.000_000_1;

/// Per-step volatility bound for history points.
pub const HISTORY_VOLATILITY: f64 = 0.004;

/// History starts slightly below the last snapshot price.
const HISTORY_DISCOUNT: f64 = 0.98;

pub fn base_price(id: AssetId) -> f64 {
    match id {
        AssetId::Bitcoin => 65_000.0,
        AssetId::Ethereum => 3_500.0,
        AssetId::Dogecoin => 0.12,
    }
}

/// Per-refresh volatility bound used for snapshots.
pub fn snapshot_volatility(id: AssetId) -> f64 {
    match id {
        AssetId::Dogecoin => 0.02,
        AssetId::Ethereum => 0.012,
        AssetId::Bitcoin => 0.008,
    }
}

/// One multiplicative step with a uniform change in `[-volatility, volatility]`.
pub fn random_walk<R: Rng>(rng: &mut R, prev: f64, volatility: f64) -> f64 {
    let change = rng.random_range(-volatility..=volatility);
    (prev * (1.0 + change)).max(PRICE_FLOOR)
}

/// Offline price feed. Owns its own last-price state and RNG, so two markets
/// never influence each other and a seeded market is fully reproducible.
pub struct SyntheticMarket {
    last_prices: HashMap<AssetId, f64>,
    rng: StdRng,
}

impl SyntheticMarket {
    pub fn new(rng: StdRng) -> Self {
        let last_prices = AssetId::ALL
            .iter()
            .map(|id| (*id, base_price(*id)))
            .collect();
        Self { last_prices, rng }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    pub fn last_price(&self, id: AssetId) -> f64 {
        self.last_prices.get(&id).copied().unwrap_or_else(|| base_price(id))
    }

    /// Advances every requested asset one step.
    ///
    /// The reported change is the move since the previous call, carried in the
    /// 24h field the dashboard displays.
    pub fn snapshots(&mut self, ids: &[AssetId]) -> Vec<PriceSnapshot> {
        ids.iter()
            .map(|id| {
                let prev = self.last_price(*id);
                let next = random_walk(&mut self.rng, prev, snapshot_volatility(*id));
                self.last_prices.insert(*id, next);
                PriceSnapshot::new(*id, next, (next - prev) / prev * 100.0)
            })
            .collect()
    }

    /// Exactly `window.point_count()` points at 15-minute spacing ending at
    /// `request.now`. Leaves the snapshot state untouched.
    pub fn history(&mut self, request: &HistoryRequest) -> Vec<SeriesPoint> {
        let count = request.window.point_count();
        let step = Duration::minutes(SERIES_STEP_MINUTES);
        let mut price = self.last_price(request.asset) * HISTORY_DISCOUNT;

        (0..count)
            .rev()
            .map(|i| {
                price = random_walk(&mut self.rng, price, HISTORY_VOLATILITY);
                SeriesPoint::new(request.now - step * i as i32, price)
            })
            .collect()
    }
}
