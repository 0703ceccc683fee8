pub mod dashboard_service;
pub mod market_data_service;
pub mod synthetic_market;
