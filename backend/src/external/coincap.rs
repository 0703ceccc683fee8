use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use crate::external::price_provider::{get_json, HistoryRequest, PriceProvider, PriceProviderError};
use crate::models::{keep_latest, AssetId, PriceSnapshot, SeriesPoint};

pub const SOURCE: &str = "coincap";
pub const CANDLES_SOURCE: &str = "coincap-candles";
pub const DEFAULT_BASE_URL: &str = "https://api.coincap.io/v2";

/// CoinCap asset and history endpoints. No key required.
pub struct CoinCapProvider {
    client: reqwest::Client,
    base_url: String,
}

/// CoinCap aggregated candles (Binance, quoted in tether). Only used for history,
/// when the asset history endpoint comes back empty.
pub struct CoinCapCandleProvider {
    client: reqwest::Client,
    base_url: String,
}

/// CoinCap sends most numbers as strings; tolerate either.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn to_f64(&self, field: &str) -> Result<f64, PriceProviderError> {
        let value = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s.trim().parse::<f64>().map_err(|e| {
                PriceProviderError::Parse(format!("{} field {} = {:?}: {}", SOURCE, field, s, e))
            })?,
        };
        if !value.is_finite() {
            return Err(PriceProviderError::Parse(format!("{} field {} is not finite", SOURCE, field)));
        }
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    data: Vec<AssetRecord>,
}

#[derive(Debug, Deserialize)]
struct AssetRecord {
    id: String,
    #[serde(rename = "priceUsd")]
    price_usd: Numeric,
    #[serde(rename = "changePercent24Hr", default)]
    change_percent_24hr: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<HistoryRecord>,
}

#[derive(Debug, Deserialize)]
struct HistoryRecord {
    #[serde(rename = "priceUsd")]
    price_usd: Numeric,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    data: Vec<CandleRecord>,
}

#[derive(Debug, Deserialize)]
struct CandleRecord {
    period: i64,
    close: Numeric,
}

fn to_point(millis: i64, price: &Numeric, field: &str) -> Result<SeriesPoint, PriceProviderError> {
    let price = price.to_f64(field)?;
    SeriesPoint::from_millis(millis, price)
        .ok_or_else(|| PriceProviderError::Parse(format!("bad timestamp {}", millis)))
}

fn finish_series(
    mut points: Vec<SeriesPoint>,
    request: &HistoryRequest,
    source: &str,
) -> Result<Vec<SeriesPoint>, PriceProviderError> {
    if points.is_empty() {
        return Err(PriceProviderError::EmptyResult(format!(
            "{} returned no points for {}",
            source, request.asset
        )));
    }
    points.sort_by_key(|p| p.timestamp);
    Ok(keep_latest(points, request.window.point_count()))
}

impl CoinCapProvider {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn history_request(&self, asset: AssetId) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/assets/{}/history", self.base_url, asset))
            .query(&[("interval", "m15")])
    }
}

#[async_trait]
impl PriceProvider for CoinCapProvider {
    fn source_name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_snapshots(
        &self,
        ids: &[AssetId],
    ) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
        let joined = AssetId::join(ids);
        let body: AssetsResponse = get_json(
            SOURCE,
            self.client
                .get(format!("{}/assets", self.base_url))
                .query(&[("ids", joined.as_str())]),
        )
        .await?;

        let by_id: HashMap<&str, &AssetRecord> =
            body.data.iter().map(|r| (r.id.as_str(), r)).collect();

        ids.iter()
            .map(|id| {
                let record = by_id.get(id.as_str()).ok_or_else(|| {
                    PriceProviderError::Parse(format!("{} response missing {}", SOURCE, id))
                })?;
                let price = record.price_usd.to_f64("priceUsd")?;
                if price < 0.0 {
                    return Err(PriceProviderError::Parse(format!(
                        "{} returned negative price for {}",
                        SOURCE, id
                    )));
                }
                let change = match &record.change_percent_24hr {
                    Some(change) => change.to_f64("changePercent24Hr")?,
                    None => 0.0,
                };
                Ok(PriceSnapshot::new(*id, price, change))
            })
            .collect()
    }

    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<SeriesPoint>, PriceProviderError> {
        let start = request.start().timestamp_millis().to_string();
        let end = request.now.timestamp_millis().to_string();

        let ranged = self
            .history_request(request.asset)
            .query(&[("start", start.as_str()), ("end", end.as_str())]);

        let body: HistoryResponse = match get_json(SOURCE, ranged).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{} ranged history failed: {}. Retrying with the default window", SOURCE, e);
                get_json(SOURCE, self.history_request(request.asset)).await?
            }
        };

        let points = body
            .data
            .iter()
            .map(|r| to_point(r.time, &r.price_usd, "priceUsd"))
            .collect::<Result<Vec<_>, _>>()?;

        finish_series(points, request, SOURCE)
    }
}

impl CoinCapCandleProvider {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn candles(
        &self,
        request: &HistoryRequest,
        interval: &str,
    ) -> Result<CandlesResponse, PriceProviderError> {
        let start = request.start().timestamp_millis().to_string();
        let end = request.now.timestamp_millis().to_string();

        get_json(
            CANDLES_SOURCE,
            self.client.get(format!("{}/candles", self.base_url)).query(&[
                ("exchange", "binance"),
                ("interval", interval),
                ("baseId", request.asset.as_str()),
                ("quoteId", "tether"),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ]),
        )
        .await
    }
}

#[async_trait]
impl PriceProvider for CoinCapCandleProvider {
    fn source_name(&self) -> &'static str {
        CANDLES_SOURCE
    }

    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<SeriesPoint>, PriceProviderError> {
        let body = match self.candles(request, "m15").await {
            Ok(body) => body,
            Err(e) => {
                warn!("{} m15 candles failed: {}. Trying hourly candles", CANDLES_SOURCE, e);
                self.candles(request, "h1").await?
            }
        };

        let points = body
            .data
            .iter()
            .map(|c| to_point(c.period, &c.close, "close"))
            .collect::<Result<Vec<_>, _>>()?;

        finish_series(points, request, CANDLES_SOURCE)
    }
}
