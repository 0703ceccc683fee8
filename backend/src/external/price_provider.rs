use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::models::{AssetId, HistoryWindow, PriceSnapshot, SeriesPoint};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceProviderError {
    #[error("{provider} rejected the request credentials (HTTP {status})")]
    Auth { provider: &'static str, status: u16 },

    #[error("{provider} request failed: HTTP {status}")]
    Http { provider: &'static str, status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data: {0}")]
    EmptyResult(String),

    #[error("{0} does not support this request")]
    Unsupported(&'static str),
}

impl PriceProviderError {
    /// True when a request was actually attempted and went wrong, as opposed to
    /// a successful call that produced nothing usable.
    pub fn is_request_failure(&self) -> bool {
        !matches!(
            self,
            PriceProviderError::EmptyResult(_) | PriceProviderError::Unsupported(_)
        )
    }
}

/// Parameters of a history lookup. `now` is explicit so a request always
/// describes the same window no matter when a provider evaluates it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRequest {
    pub asset: AssetId,
    pub window: HistoryWindow,
    pub now: DateTime<Utc>,
}

impl HistoryRequest {
    pub fn new(asset: AssetId, window: HistoryWindow) -> Self {
        Self::at(asset, window, Utc::now())
    }

    pub fn at(asset: AssetId, window: HistoryWindow, now: DateTime<Utc>) -> Self {
        Self { asset, window, now }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.now - self.window.duration()
    }
}

#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// One snapshot per id, in the order of `ids`.
    async fn fetch_snapshots(
        &self,
        _ids: &[AssetId],
    ) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
        Err(PriceProviderError::Unsupported(self.source_name()))
    }

    /// Chronologically ordered points covering the request window.
    async fn fetch_history(
        &self,
        _request: &HistoryRequest,
    ) -> Result<Vec<SeriesPoint>, PriceProviderError> {
        Err(PriceProviderError::Unsupported(self.source_name()))
    }
}

/// Sends a GET and decodes a JSON body, classifying failures the same way for
/// every provider.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<T, PriceProviderError> {
    let resp = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| PriceProviderError::Network(e.to_string()))?;

    debug!("{} responded {} for {}", provider, resp.status(), resp.url());

    check_status(provider, resp.status())?;

    resp.json::<T>()
        .await
        .map_err(|e| PriceProviderError::Parse(format!("{}: {}", provider, e)))
}

pub(crate) fn check_status(provider: &'static str, status: StatusCode) -> Result<(), PriceProviderError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PriceProviderError::Auth { provider, status: status.as_u16() });
    }
    if !status.is_success() {
        return Err(PriceProviderError::Http { provider, status: status.as_u16() });
    }
    Ok(())
}
