pub mod coincap;
pub mod coingecko;
pub mod fallback;
pub mod price_provider;
pub mod synthetic;
