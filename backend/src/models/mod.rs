mod asset;
mod price_point;
mod price_snapshot;

pub use asset::{AssetId, AssetMeta};
pub use price_point::{format_label, keep_latest, HistoryWindow, PriceSeries, SeriesPoint, SERIES_STEP_MINUTES};
pub use price_snapshot::PriceSnapshot;
