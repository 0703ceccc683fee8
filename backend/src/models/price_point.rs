use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

/// Chart resolution in minutes.
pub const SERIES_STEP_MINUTES: i64 = 15;

// A single historical price for the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// Builds a point from an epoch-millisecond timestamp as sent by both providers.
    pub fn from_millis(millis: i64, price: f64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(|timestamp| Self { timestamp, price })
    }
}

/// Requested chart window, in whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    hours: u32,
}

impl HistoryWindow {
    pub const MIN_HOURS: u32 = 1;
    pub const MAX_HOURS: u32 = 6;

    pub fn new(hours: u32) -> Result<Self, String> {
        if !(Self::MIN_HOURS..=Self::MAX_HOURS).contains(&hours) {
            return Err(format!(
                "history window must be between {} and {} hours, got {}",
                Self::MIN_HOURS,
                Self::MAX_HOURS,
                hours
            ));
        }
        Ok(Self { hours })
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn duration(&self) -> Duration {
        Duration::hours(self.hours as i64)
    }

    /// Number of 15-minute points covering the window, never zero.
    pub fn point_count(&self) -> usize {
        let points = (self.hours as f64 * 60.0 / SERIES_STEP_MINUTES as f64).round();
        points.max(1.0) as usize
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self { hours: Self::MAX_HOURS }
    }
}

/// Keeps the newest `n` points of a chronologically ordered series.
pub fn keep_latest(mut points: Vec<SeriesPoint>, n: usize) -> Vec<SeriesPoint> {
    if points.len() > n {
        points.drain(..points.len() - n);
    }
    points
}

/// Chart-ready series: parallel label and price columns, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
}

impl PriceSeries {
    pub fn from_points(points: &[SeriesPoint]) -> Self {
        let (labels, prices) = points
            .iter()
            .map(|p| (format_label(p.timestamp), p.price))
            .unzip();
        Self { labels, prices }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Local hour:minute label.
pub fn format_label(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}
