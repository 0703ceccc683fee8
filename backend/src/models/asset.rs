use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of assets shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetId {
    Bitcoin,
    Ethereum,
    Dogecoin,
}

/// Display metadata for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetMeta {
    pub name: &'static str,
    pub symbol: &'static str,
}

impl AssetId {
    /// Display order used by the dashboard cards.
    pub const ALL: [AssetId; 3] = [AssetId::Bitcoin, AssetId::Ethereum, AssetId::Dogecoin];

    /// Identifier used by both upstream providers.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetId::Bitcoin => "bitcoin",
            AssetId::Ethereum => "ethereum",
            AssetId::Dogecoin => "dogecoin",
        }
    }

    pub fn meta(&self) -> AssetMeta {
        match self {
            AssetId::Bitcoin => AssetMeta { name: "Bitcoin", symbol: "BTC" },
            AssetId::Ethereum => AssetMeta { name: "Ethereum", symbol: "ETH" },
            AssetId::Dogecoin => AssetMeta { name: "Dogecoin", symbol: "DOGE" },
        }
    }

    /// Comma-joined id list as used in bulk price requests.
    pub fn join(ids: &[AssetId]) -> String {
        ids.iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
