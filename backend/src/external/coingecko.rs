use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::external::price_provider::{get_json, HistoryRequest, PriceProvider, PriceProviderError};
use crate::models::{keep_latest, AssetId, PriceSnapshot, SeriesPoint};

pub const SOURCE: &str = "coingecko";
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_API_KEY_HEADER: &str = "x-cg-api-key";

/// API key plus the header it travels in. Demo and pro accounts expect
/// different header names.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKey {
    pub header: String,
    pub value: String,
}

pub struct CoinGeckoProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<ApiKey>,
}

impl CoinGeckoProvider {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<ApiKey>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.header(key.header.as_str(), key.value.as_str()),
            None => req,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SimplePriceEntry {
    usd: f64,
    // Null for assets CoinGecko has no 24h data for
    #[serde(default)]
    usd_24h_change: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    // [timestamp_ms, price]
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn source_name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch_snapshots(
        &self,
        ids: &[AssetId],
    ) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
        let joined = AssetId::join(ids);
        let body: HashMap<String, SimplePriceEntry> = get_json(
            SOURCE,
            self.get("/simple/price").query(&[
                ("ids", joined.as_str()),
                ("vs_currencies", "usd"),
                ("include_24hr_change", "true"),
            ]),
        )
        .await?;

        ids.iter()
            .map(|id| {
                let entry = body.get(id.as_str()).ok_or_else(|| {
                    PriceProviderError::Parse(format!("{} response missing {}", SOURCE, id))
                })?;
                if !entry.usd.is_finite() || entry.usd < 0.0 {
                    return Err(PriceProviderError::Parse(format!(
                        "{} returned invalid price {} for {}",
                        SOURCE, entry.usd, id
                    )));
                }
                Ok(PriceSnapshot::new(*id, entry.usd, entry.usd_24h_change.unwrap_or(0.0)))
            })
            .collect()
    }

    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<SeriesPoint>, PriceProviderError> {
        // Hourly granularity is the finest the keyless tier allows for a 1-day span;
        // the window is cut out client-side.
        let path = format!("/coins/{}/market_chart", request.asset);
        let body: MarketChartResponse = get_json(
            SOURCE,
            self.get(&path).query(&[
                ("vs_currency", "usd"),
                ("days", "1"),
                ("interval", "hourly"),
            ]),
        )
        .await?;

        if body.prices.is_empty() {
            return Err(PriceProviderError::EmptyResult(format!(
                "{} market chart for {} has no prices",
                SOURCE, request.asset
            )));
        }

        let mut points = body
            .prices
            .into_iter()
            .map(|(ts, price)| {
                SeriesPoint::from_millis(ts as i64, price)
                    .ok_or_else(|| PriceProviderError::Parse(format!("bad timestamp {}", ts)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        points.sort_by_key(|p| p.timestamp);

        let window = request.window.duration();
        let in_window: Vec<SeriesPoint> = points
            .iter()
            .filter(|p| request.now - p.timestamp <= window)
            .copied()
            .collect();

        if in_window.is_empty() {
            // Stale feed: show the newest hourly points rather than nothing
            let fallback = request.window.hours().max(1) as usize;
            return Ok(keep_latest(points, fallback));
        }

        Ok(in_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryWindow;
    use chrono::{DateTime, Duration, Utc};
    use mockito::Matcher;

    fn provider(url: &str, api_key: Option<ApiKey>) -> CoinGeckoProvider {
        CoinGeckoProvider::new(reqwest::Client::new(), url, api_key)
    }

    #[tokio::test]
    async fn test_snapshots_follow_requested_order() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::UrlEncoded("ids".into(), "dogecoin,bitcoin".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"bitcoin":{"usd":65000.5,"usd_24h_change":1.25},
                    "dogecoin":{"usd":0.12,"usd_24h_change":-3.5}}"#,
            )
            .create_async()
            .await;

        let snaps = provider(&server.url(), None)
            .fetch_snapshots(&[AssetId::Dogecoin, AssetId::Bitcoin])
            .await
            .unwrap();

        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].id, AssetId::Dogecoin);
        assert_eq!(snaps[0].symbol, "DOGE");
        assert_eq!(snaps[0].change_24h_percent, -3.5);
        assert_eq!(snaps[1].id, AssetId::Bitcoin);
        assert_eq!(snaps[1].price_usd, 65000.5);
    }

    #[tokio::test]
    async fn test_api_key_sent_in_configured_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .match_header("x-cg-demo-api-key", "secret")
            .with_status(200)
            .with_body(r#"{"bitcoin":{"usd":1.0,"usd_24h_change":0.0}}"#)
            .expect(1)
            .create_async()
            .await;

        let key = ApiKey { header: "x-cg-demo-api-key".into(), value: "secret".into() };
        provider(&server.url(), Some(key))
            .fetch_snapshots(&[AssetId::Bitcoin])
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = provider(&server.url(), None)
            .fetch_snapshots(&AssetId::ALL)
            .await
            .unwrap_err();

        assert_eq!(err, PriceProviderError::Auth { provider: SOURCE, status: 401 });
    }

    #[tokio::test]
    async fn test_missing_asset_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/simple/price")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"bitcoin":{"usd":1.0,"usd_24h_change":0.0}}"#)
            .create_async()
            .await;

        let err = provider(&server.url(), None)
            .fetch_snapshots(&AssetId::ALL)
            .await
            .unwrap_err();

        assert!(matches!(err, PriceProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_history_keeps_only_window() {
        let now = DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap();
        let prices: Vec<String> = (0..24)
            .rev()
            .map(|h| {
                let ts = (now - Duration::hours(h)).timestamp_millis();
                format!("[{},{}]", ts, 60000 + h)
            })
            .collect();
        let body = format!(r#"{{"prices":[{}]}}"#, prices.join(","));

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/coins/bitcoin/market_chart")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let request = HistoryRequest::at(AssetId::Bitcoin, HistoryWindow::new(3).unwrap(), now);
        let points = provider(&server.url(), None).fetch_history(&request).await.unwrap();

        // hours 3, 2, 1, 0 ago
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].price, 60003.0);
        assert_eq!(points[3].price, 60000.0);
    }

    #[tokio::test]
    async fn test_stale_history_falls_back_to_latest_points() {
        let now = Utc::now();
        let old = now - Duration::days(3);
        let prices: Vec<String> = (0..10)
            .map(|h| format!("[{},{}]", (old + Duration::hours(h)).timestamp_millis(), 100 + h))
            .collect();
        let body = format!(r#"{{"prices":[{}]}}"#, prices.join(","));

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/coins/bitcoin/market_chart")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let request = HistoryRequest::at(AssetId::Bitcoin, HistoryWindow::new(2).unwrap(), now);
        let points = provider(&server.url(), None).fetch_history(&request).await.unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].price, 109.0);
    }

    #[tokio::test]
    async fn test_empty_chart_is_empty_result() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/coins/bitcoin/market_chart")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"prices":[]}"#)
            .create_async()
            .await;

        let request = HistoryRequest::new(AssetId::Bitcoin, HistoryWindow::default());
        let err = provider(&server.url(), None).fetch_history(&request).await.unwrap_err();

        assert!(matches!(err, PriceProviderError::EmptyResult(_)));
    }
}
