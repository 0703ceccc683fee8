use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::external::price_provider::{HistoryRequest, PriceProvider, PriceProviderError};
use crate::models::{AssetId, PriceSnapshot, SeriesPoint};

/// FallbackProvider tries an ordered list of providers until one returns usable data.
///
/// Each provider is called at most once per request. Any error, including a
/// successful call with no data, moves on to the next provider. Providers that
/// don't support a request kind are skipped silently.
pub struct FallbackProvider {
    name: &'static str,
    providers: Vec<Arc<dyn PriceProvider>>,
}

impl FallbackProvider {
    pub fn new(name: &'static str, providers: Vec<Arc<dyn PriceProvider>>) -> Self {
        Self { name, providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.source_name()).collect()
    }
}

/// Tracks what went wrong across the chain so the surfaced error is the most
/// informative one: the last real request failure beats "no data".
#[derive(Default)]
struct Failures {
    last_request_failure: Option<PriceProviderError>,
    last_empty: Option<PriceProviderError>,
}

impl Failures {
    fn record(&mut self, err: PriceProviderError) {
        match err {
            PriceProviderError::Unsupported(_) => {}
            e if e.is_request_failure() => self.last_request_failure = Some(e),
            e => self.last_empty = Some(e),
        }
    }

    fn into_error(self, chain: &str) -> PriceProviderError {
        self.last_request_failure
            .or(self.last_empty)
            .unwrap_or_else(|| PriceProviderError::EmptyResult(format!("{} has no usable providers", chain)))
    }
}

#[async_trait]
impl PriceProvider for FallbackProvider {
    fn source_name(&self) -> &'static str {
        self.name
    }

    async fn fetch_snapshots(
        &self,
        ids: &[AssetId],
    ) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
        let mut failures = Failures::default();

        for provider in &self.providers {
            match provider.fetch_snapshots(ids).await {
                Ok(snapshots) => {
                    info!("✓ Fetched {} snapshots from {}", snapshots.len(), provider.source_name());
                    return Ok(snapshots);
                }
                Err(PriceProviderError::Unsupported(_)) => continue,
                Err(e @ PriceProviderError::Auth { .. }) => {
                    warn!("⚠️ {} rejected credentials ({}), trying next provider", provider.source_name(), e);
                    failures.record(e);
                }
                Err(e) => {
                    warn!("⚠️ {} snapshot fetch failed: {}", provider.source_name(), e);
                    failures.record(e);
                }
            }
        }

        Err(failures.into_error(self.name))
    }

    async fn fetch_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<SeriesPoint>, PriceProviderError> {
        let mut failures = Failures::default();

        for provider in &self.providers {
            match provider.fetch_history(request).await {
                Ok(points) if !points.is_empty() => {
                    info!(
                        "✓ Fetched {} history points for {} from {}",
                        points.len(),
                        request.asset,
                        provider.source_name()
                    );
                    return Ok(points);
                }
                Ok(_) => {
                    info!("No history from {}, trying next provider", provider.source_name());
                    failures.record(PriceProviderError::EmptyResult(format!(
                        "{} returned no points for {}",
                        provider.source_name(),
                        request.asset
                    )));
                }
                Err(PriceProviderError::Unsupported(_)) => continue,
                Err(e) => {
                    warn!("⚠️ {} history fetch failed: {}", provider.source_name(), e);
                    failures.record(e);
                }
            }
        }

        Err(failures.into_error(self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryWindow;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned provider that counts calls.
    struct Scripted {
        name: &'static str,
        snapshots: Result<Vec<PriceSnapshot>, PriceProviderError>,
        history: Result<Vec<SeriesPoint>, PriceProviderError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            snapshots: Result<Vec<PriceSnapshot>, PriceProviderError>,
            history: Result<Vec<SeriesPoint>, PriceProviderError>,
        ) -> Arc<Self> {
            Arc::new(Self { name, snapshots, history, calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PriceProvider for Scripted {
        fn source_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_snapshots(&self, _ids: &[AssetId]) -> Result<Vec<PriceSnapshot>, PriceProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.snapshots.clone()
        }

        async fn fetch_history(&self, _request: &HistoryRequest) -> Result<Vec<SeriesPoint>, PriceProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history.clone()
        }
    }

    fn request() -> HistoryRequest {
        HistoryRequest::new(AssetId::Bitcoin, HistoryWindow::default())
    }

    fn auth() -> PriceProviderError {
        PriceProviderError::Auth { provider: "a", status: 401 }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let a = Scripted::new("a", Ok(vec![PriceSnapshot::new(AssetId::Bitcoin, 1.0, 0.0)]), Ok(vec![]));
        let b = Scripted::new("b", Ok(vec![]), Ok(vec![]));
        let chain = FallbackProvider::new("chain", vec![a.clone(), b.clone()]);

        let snaps = chain.fetch_snapshots(&[AssetId::Bitcoin]).await.unwrap();

        assert_eq!(snaps.len(), 1);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_falls_back_once() {
        let a = Scripted::new("a", Err(auth()), Ok(vec![]));
        let b = Scripted::new("b", Ok(vec![PriceSnapshot::new(AssetId::Bitcoin, 2.0, 0.0)]), Ok(vec![]));
        let chain = FallbackProvider::new("chain", vec![a.clone(), b.clone()]);

        let snaps = chain.fetch_snapshots(&[AssetId::Bitcoin]).await.unwrap();

        assert_eq!(snaps[0].price_usd, 2.0);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_history_moves_on() {
        let point = SeriesPoint::new(Utc::now(), 5.0);
        let a = Scripted::new("a", Ok(vec![]), Err(PriceProviderError::Network("down".into())));
        let b = Scripted::new("b", Ok(vec![]), Ok(vec![]));
        let c = Scripted::new("c", Ok(vec![]), Ok(vec![point]));
        let chain = FallbackProvider::new("chain", vec![a, b, c.clone()]);

        let points = chain.fetch_history(&request()).await.unwrap();

        assert_eq!(points, vec![point]);
        assert_eq!(c.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_last_request_failure() {
        let a = Scripted::new("a", Ok(vec![]), Err(auth()));
        let b = Scripted::new("b", Ok(vec![]), Err(PriceProviderError::Http { provider: "b", status: 503 }));
        let c = Scripted::new("c", Ok(vec![]), Err(PriceProviderError::EmptyResult("none".into())));
        let chain = FallbackProvider::new("chain", vec![a, b, c]);

        let err = chain.fetch_history(&request()).await.unwrap_err();

        assert_eq!(err, PriceProviderError::Http { provider: "b", status: 503 });
    }

    #[tokio::test]
    async fn test_all_empty_reports_empty_result() {
        let a = Scripted::new("a", Ok(vec![]), Ok(vec![]));
        let chain = FallbackProvider::new("chain", vec![a]);

        let err = chain.fetch_history(&request()).await.unwrap_err();

        assert!(matches!(err, PriceProviderError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn test_unsupported_providers_are_skipped() {
        let a = Scripted::new("a", Err(PriceProviderError::Unsupported("a")), Ok(vec![]));
        let chain = FallbackProvider::new("chain", vec![a]);

        let err = chain.fetch_snapshots(&AssetId::ALL).await.unwrap_err();

        assert!(matches!(err, PriceProviderError::EmptyResult(_)));
    }
}
