use std::time::Duration;

use crate::errors::AppError;
use crate::external::{coincap, coingecko};
use crate::external::coingecko::ApiKey;
use crate::models::HistoryWindow;

/// Everything the acquisition layer needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// When false, no request ever leaves the process and the synthetic feed is used.
    pub enable_api: bool,
    pub use_coincap_only: bool,
    pub coingecko_api_key: Option<ApiKey>,
    pub coingecko_base_url: String,
    pub coincap_base_url: String,
    pub refresh_interval: Duration,
    pub history_window: HistoryWindow,
    pub request_timeout: Duration,
    pub synthetic_seed: Option<u64>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enable_api: false,
            use_coincap_only: false,
            coingecko_api_key: None,
            coingecko_base_url: coingecko::DEFAULT_BASE_URL.to_string(),
            coincap_base_url: coincap::DEFAULT_BASE_URL.to_string(),
            refresh_interval: Duration::from_secs(30),
            history_window: HistoryWindow::default(),
            request_timeout: Duration::from_secs(10),
            synthetic_seed: None,
        }
    }
}

fn flag(value: Option<String>) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn number<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, AppError> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", name, v))),
    }
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any key/value source. `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let coingecko_api_key = lookup("COINGECKO_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|value| ApiKey {
                header: lookup("COINGECKO_API_KEY_HEADER")
                    .map(|h| h.trim().to_string())
                    .filter(|h| !h.is_empty())
                    .unwrap_or_else(|| coingecko::DEFAULT_API_KEY_HEADER.to_string()),
                value,
            });

        let history_window = match number::<u32>("HISTORY_HOURS", lookup("HISTORY_HOURS"))? {
            Some(hours) => HistoryWindow::new(hours).map_err(AppError::Config)?,
            None => defaults.history_window,
        };

        let config = Self {
            enable_api: flag(lookup("ENABLE_API")),
            use_coincap_only: flag(lookup("USE_COINCAP_ONLY")),
            coingecko_api_key,
            coingecko_base_url: lookup("COINGECKO_BASE_URL").unwrap_or(defaults.coingecko_base_url),
            coincap_base_url: lookup("COINCAP_BASE_URL").unwrap_or(defaults.coincap_base_url),
            refresh_interval: number::<u64>("REFRESH_INTERVAL_SECS", lookup("REFRESH_INTERVAL_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_interval),
            history_window,
            request_timeout: number::<u64>("REQUEST_TIMEOUT_SECS", lookup("REQUEST_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            synthetic_seed: number::<u64>("SYNTHETIC_SEED", lookup("SYNTHETIC_SEED"))?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("COINGECKO_BASE_URL", &self.coingecko_base_url),
            ("COINCAP_BASE_URL", &self.coincap_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{} is not a valid URL ({}): {}", name, value, e)))?;
        }
        if self.refresh_interval.is_zero() {
            return Err(AppError::Config("REFRESH_INTERVAL_SECS must be greater than zero".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(AppError::Config("REQUEST_TIMEOUT_SECS must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn is_offline(&self) -> bool {
        !self.enable_api
    }
}
