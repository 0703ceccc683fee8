//! Plain-text rendering of the dashboard state.

use chrono::Local;
use std::fmt::Write;
use std::time::Duration;

use crate::models::{HistoryWindow, PriceSeries, PriceSnapshot};
use crate::services::dashboard_service::DashboardState;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// `$1,234.56`, two decimals.
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, frac_part)
}

/// `+1.23%` for flat or rising prices, `-1.23%` otherwise.
pub fn format_change(percent: f64) -> String {
    let sign = if percent >= 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, percent)
}

pub fn price_card(snapshot: &PriceSnapshot) -> String {
    let arrow = if snapshot.is_up() { '▲' } else { '▼' };
    format!(
        "{:<20} {:>16}  {} {:>8}",
        format!("{} ({})", snapshot.name, snapshot.symbol),
        format_usd(snapshot.price_usd),
        arrow,
        format_change(snapshot.change_24h_percent)
    )
}

pub fn sparkline(prices: &[f64]) -> String {
    let (min, max) = min_max(prices);
    let span = max - min;
    prices
        .iter()
        .map(|p| {
            if span <= 0.0 {
                return SPARK_LEVELS[SPARK_LEVELS.len() / 2];
            }
            let level = ((p - min) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

fn min_max(prices: &[f64]) -> (f64, f64) {
    prices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(*p), hi.max(*p))
    })
}

fn chart(series: &PriceSeries, out: &mut String) {
    if series.is_empty() {
        let _ = writeln!(out, "  Loading chart...");
        return;
    }
    let (low, high) = min_max(&series.prices);
    let _ = writeln!(out, "  {}", sparkline(&series.prices));
    let _ = writeln!(
        out,
        "  {} -> {}   low {}   high {}",
        series.labels.first().map(String::as_str).unwrap_or(""),
        series.labels.last().map(String::as_str).unwrap_or(""),
        format_usd(low),
        format_usd(high)
    );
}

/// Full screen for one state.
pub fn render(state: &DashboardState, window: HistoryWindow, refresh_interval: Duration) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Live Crypto Price Dashboard");
    let _ = writeln!(
        out,
        "BTC, ETH, DOGE - auto-refresh every {}s (Enter to refresh, q to quit)",
        refresh_interval.as_secs()
    );
    if let Some(updated) = state.last_updated {
        let _ = writeln!(out, "Last update: {}", updated.with_timezone(&Local).format("%H:%M:%S"));
    }
    let _ = writeln!(out);

    if let Some(err) = &state.error {
        let _ = writeln!(out, "! {}", err);
        let _ = writeln!(out);
    }

    match &state.tickers {
        Some(tickers) => {
            for snapshot in tickers {
                let _ = writeln!(out, "  {}", price_card(snapshot));
            }
        }
        None => {
            let _ = writeln!(out, "  Loading prices...");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Bitcoin Price (Last {} hours)", window.hours());
    chart(&state.series, &mut out);

    out
}
