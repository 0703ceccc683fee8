use serde::{Deserialize, Serialize};

use super::AssetId;

/// Point-in-time price reading for one asset.
///
/// `change_24h_percent` comes straight from the provider. The offline feed
/// fills it with the change since the previous refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSnapshot {
    pub id: AssetId,
    pub name: String,
    pub symbol: String,
    pub price_usd: f64,
    #[serde(rename = "change24hPercent")]
    pub change_24h_percent: f64,
}

impl PriceSnapshot {
    pub fn new(id: AssetId, price_usd: f64, change_24h_percent: f64) -> Self {
        let meta = id.meta();
        Self {
            id,
            name: meta.name.to_string(),
            symbol: meta.symbol.to_string(),
            price_usd,
            change_24h_percent,
        }
    }

    pub fn is_up(&self) -> bool {
        self.change_24h_percent >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_meta() {
        let snap = PriceSnapshot::new(AssetId::Ethereum, 3500.0, -1.5);
        assert_eq!(snap.name, "Ethereum");
        assert_eq!(snap.symbol, "ETH");
        assert!(!snap.is_up());
    }

    #[test]
    fn test_serializes_dashboard_field_names() {
        let snap = PriceSnapshot::new(AssetId::Bitcoin, 65000.0, 0.0);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["id"], "bitcoin");
        assert_eq!(json["priceUsd"], 65000.0);
        assert_eq!(json["change24hPercent"], 0.0);
    }
}
