use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FUEL: &str = "FUEL";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Market {
    pub symbol: String,
    #[serde(default)]
    pub exports: Vec<TradeGood>,
    #[serde(default)]
    pub imports: Vec<TradeGood>,
    #[serde(default)]
    pub exchange: Vec<TradeGood>,
    #[serde(default)]
    pub transactions: Option<Vec<MarketTransaction>>,
    /// Only present while one of our ships is at the market
    #[serde(rename = "tradeGoods", default)]
    pub trade_goods: Option<Vec<MarketTradeGood>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TradeGood {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketTradeGood {
    pub symbol: String,
    #[serde(rename = "tradeVolume")]
    pub trade_volume: i32,
    #[serde(default)]
    pub supply: String,
    pub activity: Option<String>,
    /// What a ship pays to buy one unit here
    #[serde(rename = "purchasePrice")]
    pub purchase_price: i64,
    /// What a ship receives for selling one unit here
    #[serde(rename = "sellPrice")]
    pub sell_price: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketTransaction {
    #[serde(rename = "waypointSymbol")]
    pub waypoint_symbol: String,
    #[serde(rename = "shipSymbol")]
    pub ship_symbol: String,
    #[serde(rename = "tradeSymbol")]
    pub trade_symbol: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub units: i32,
    #[serde(rename = "pricePerUnit")]
    pub price_per_unit: i64,
    #[serde(rename = "totalPrice")]
    pub total_price: i64,
    #[serde(default)]
    pub timestamp: String,
}

/// Result of a purchase or sale of cargo.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TradeData {
    pub agent: crate::models::Agent,
    pub cargo: crate::models::ShipCargo,
    pub transaction: MarketTransaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub purchase_price: i64,
    pub sell_price: i64,
    pub trade_volume: i32,
    pub supply: String,
}

/// Prices observed at one waypoint at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub waypoint: String,
    pub goods: HashMap<String, PriceQuote>,
    pub observed_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn new(waypoint: impl Into<String>, quotes: Vec<PriceQuote>, observed_at: DateTime<Utc>) -> Self {
        Self {
            waypoint: waypoint.into(),
            goods: quotes.into_iter().map(|q| (q.symbol.clone(), q)).collect(),
            observed_at,
        }
    }

    /// Capture a snapshot; `None` when the market hid its prices
    pub fn from_market(market: &Market, observed_at: DateTime<Utc>) -> Option<Self> {
        let trade_goods = market.trade_goods.as_ref()?;
        let quotes = trade_goods
            .iter()
            .map(|good| PriceQuote {
                symbol: good.symbol.clone(),
                purchase_price: good.purchase_price,
                sell_price: good.sell_price,
                trade_volume: good.trade_volume,
                supply: good.supply.clone(),
            })
            .collect();
        Some(Self::new(market.symbol.clone(), quotes, observed_at))
    }

    pub fn quote(&self, symbol: &str) -> Option<&PriceQuote> {
        self.goods.get(symbol)
    }

    pub fn sells_fuel(&self) -> bool {
        self.goods.contains_key(FUEL)
    }
}
