use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            loki_enabled: std::env::var("LOKI_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            loki_url: std::env::var("LOKI_URL").ok(),
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "crypto-dashboard".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.loki_enabled && self.loki_url.is_none() {
            return Err(AppError::Logging("LOKI_ENABLED is true but LOKI_URL is not set".to_string()));
        }
        Ok(())
    }

    fn filter(&self) -> Result<tracing_subscriber::EnvFilter, AppError> {
        tracing_subscriber::EnvFilter::try_new(&self.log_level)
            .map_err(|e| AppError::Logging(format!("invalid log level {:?}: {}", self.log_level, e)))
    }
}

/// Logs go to stderr; stdout belongs to the dashboard screen.
pub fn init_logging(config: LoggingConfig) -> Result<(), AppError> {
    config.validate()?;

    #[cfg(feature = "loki")]
    {
        if config.loki_enabled {
            if let Some(loki_url) = config.loki_url.clone() {
                return init_with_loki(config, &loki_url);
            }
        }
    }

    init_console_only(config)
}

fn init_console_only(config: LoggingConfig) -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::info!("📊 Console logging initialized for {}", config.service_name);
    Ok(())
}

#[cfg(feature = "loki")]
fn init_with_loki(config: LoggingConfig, loki_url: &str) -> Result<(), AppError> {
    let url = url::Url::parse(loki_url)
        .map_err(|e| AppError::Logging(format!("invalid LOKI_URL: {}", e)))?;

    let (loki_layer, task) = tracing_loki::builder()
        .label("service", &config.service_name)
        .and_then(|b| b.label("environment", &config.environment))
        .and_then(|b| b.build_url(url))
        .map_err(|e| AppError::Logging(e.to_string()))?;

    // Ships buffered log lines to Loki in the background
    tokio::spawn(task);

    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(loki_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    tracing::info!("✅ Loki logging initialized at {}", loki_url);
    Ok(())
}
