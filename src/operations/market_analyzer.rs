// Market Analyzer - price snapshots, history and trade route candidates
use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::{FleetConfig, MarketConfig};
use crate::models::{FUEL, MarketSnapshot, PriceQuote, Waypoint};
use crate::operations::navigation::{self, FlightMode};

/// Credits for `units` of ship fuel; markets price FUEL per 100 units
pub fn fuel_credits(units: i32, price_per_hundred: i64) -> i64 {
    if units <= 0 {
        return 0;
    }
    (units as i64 * price_per_hundred + 99) / 100
}

/// A (buy waypoint, sell waypoint, commodity) triple with a positive expected margin
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCandidate {
    pub good: String,
    pub buy_at: String,
    pub sell_at: String,
    pub buy_price: i64,
    pub sell_price: i64,
    pub units: i32,
    /// Credits of fuel for the buy to sell leg
    pub fuel_cost: i64,
    pub expected_margin: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketInsight {
    pub good: String,
    pub trend: f64,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Copy)]
struct PricePoint {
    at: DateTime<Utc>,
    purchase_price: i64,
}

pub struct MarketAnalyzer {
    snapshots: HashMap<String, MarketSnapshot>,
    history: HashMap<(String, String), Vec<PricePoint>>,
    max_age: Duration,
    history_window: Duration,
    trend_threshold: f64,
    default_fuel_price: i64,
    mode: FlightMode,
}

impl MarketAnalyzer {
    pub fn new(config: &FleetConfig) -> Self {
        let mut analyzer = Self {
            snapshots: HashMap::new(),
            history: HashMap::new(),
            max_age: Duration::minutes(60),
            history_window: Duration::hours(24),
            trend_threshold: 0.5,
            default_fuel_price: 72,
            mode: FlightMode::Cruise,
        };
        analyzer.apply_config(config);
        analyzer
    }

    pub fn apply_config(&mut self, config: &FleetConfig) {
        let market: &MarketConfig = &config.market;
        self.max_age = Duration::minutes(market.snapshot_max_age_minutes);
        self.history_window = Duration::hours(market.history_window_hours);
        self.trend_threshold = market.trend_threshold;
        self.default_fuel_price = config.fuel.default_fuel_price;
        self.mode = FlightMode::parse(&config.scheduler.flight_mode).unwrap_or(FlightMode::Cruise);
    }

    /// Store a snapshot unless a newer one for the same waypoint is already held
    pub fn observe(&mut self, snapshot: MarketSnapshot) -> bool {
        if let Some(existing) = self.snapshots.get(&snapshot.waypoint) {
            if existing.observed_at > snapshot.observed_at {
                debug!("⏭️ Ignoring older snapshot for {}", snapshot.waypoint);
                return false;
            }
        }

        let cutoff = snapshot.observed_at - self.history_window;
        for quote in snapshot.goods.values() {
            let points = self
                .history
                .entry((snapshot.waypoint.clone(), quote.symbol.clone()))
                .or_default();
            points.push(PricePoint {
                at: snapshot.observed_at,
                purchase_price: quote.purchase_price,
            });
            points.sort_by_key(|p| p.at);
            points.retain(|p| p.at > cutoff);
        }

        debug!(
            "📈 Observed {} goods at {}",
            snapshot.goods.len(),
            snapshot.waypoint
        );
        self.snapshots.insert(snapshot.waypoint.clone(), snapshot);
        true
    }

    pub fn snapshot(&self, waypoint: &str) -> Option<&MarketSnapshot> {
        self.snapshots.get(waypoint)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_fresh(&self, waypoint: &str, now: DateTime<Utc>) -> bool {
        self.snapshots
            .get(waypoint)
            .is_some_and(|s| now.signed_duration_since(s.observed_at) <= self.max_age)
    }

    pub fn fresh_snapshots(&self, now: DateTime<Utc>) -> impl Iterator<Item = &MarketSnapshot> {
        self.snapshots
            .values()
            .filter(move |s| now.signed_duration_since(s.observed_at) <= self.max_age)
    }

    pub fn fuel_price(&self, waypoint: &str) -> Option<i64> {
        self.snapshots
            .get(waypoint)?
            .quote(FUEL)
            .map(|q| q.purchase_price)
    }

    pub fn sells_fuel(&self, waypoint: &str) -> bool {
        self.fuel_price(waypoint).is_some()
    }

    /// Average observed FUEL price, or the configured default
    pub fn fuel_price_estimate(&self) -> i64 {
        let prices: Vec<i64> = self
            .snapshots
            .values()
            .filter_map(|s| s.quote(FUEL))
            .map(|q| q.purchase_price)
            .collect();
        if prices.is_empty() {
            self.default_fuel_price
        } else {
            prices.iter().sum::<i64>() / prices.len() as i64
        }
    }

    /// Highest price any fresh market pays for `good`
    pub fn best_sell(&self, good: &str, now: DateTime<Utc>) -> Option<(String, i64)> {
        self.fresh_snapshots(now)
            .filter_map(|s| s.quote(good).map(|q| (s.waypoint.clone(), q.sell_price)))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
    }

    /// Lowest price any fresh market charges for `good`
    pub fn cheapest_buy(&self, good: &str, now: DateTime<Utc>) -> Option<(String, PriceQuote)> {
        self.fresh_snapshots(now)
            .filter_map(|s| s.quote(good).map(|q| (s.waypoint.clone(), q.clone())))
            .min_by(|a, b| a.1.purchase_price.cmp(&b.1.purchase_price).then_with(|| a.0.cmp(&b.0)))
    }

    /// Profitable routes between fresh markets among `waypoints`, best margin first.
    ///
    /// margin = (sell - buy) * units - fuel credits for the buy to sell leg, where
    /// units is bounded by both markets' trade volume and the cargo capacity.
    pub fn candidates(
        &self,
        waypoints: &HashMap<String, Waypoint>,
        cargo_capacity: i32,
        now: DateTime<Utc>,
    ) -> Vec<TradeCandidate> {
        if cargo_capacity <= 0 {
            return Vec::new();
        }
        let fuel_price = self.fuel_price_estimate();
        let markets: Vec<(&MarketSnapshot, &Waypoint)> = self
            .fresh_snapshots(now)
            .filter_map(|s| waypoints.get(&s.waypoint).map(|wp| (s, wp)))
            .collect();

        let mut candidates = Vec::new();
        for (source, source_wp) in &markets {
            for (sink, sink_wp) in &markets {
                if source.waypoint == sink.waypoint || source_wp.system_symbol != sink_wp.system_symbol {
                    continue;
                }
                let fuel = navigation::fuel_cost(navigation::distance(source_wp, sink_wp), self.mode);
                let fuel_cost = fuel_credits(fuel, fuel_price);

                for (good, buy) in &source.goods {
                    let Some(sell) = sink.quote(good) else {
                        continue;
                    };
                    let units = buy.trade_volume.min(sell.trade_volume).min(cargo_capacity);
                    if units <= 0 {
                        continue;
                    }
                    let expected_margin = (sell.sell_price - buy.purchase_price) * units as i64 - fuel_cost;
                    if expected_margin <= 0 {
                        continue;
                    }
                    candidates.push(TradeCandidate {
                        good: good.clone(),
                        buy_at: source.waypoint.clone(),
                        sell_at: sink.waypoint.clone(),
                        buy_price: buy.purchase_price,
                        sell_price: sell.sell_price,
                        units,
                        fuel_cost,
                        expected_margin,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.expected_margin
                .cmp(&a.expected_margin)
                .then_with(|| a.good.cmp(&b.good))
                .then_with(|| a.buy_at.cmp(&b.buy_at))
                .then_with(|| a.sell_at.cmp(&b.sell_at))
        });
        candidates
    }

    /// Normalized purchase-price trend in [-1, 1] over the history window
    pub fn price_trend(&self, waypoint: &str, good: &str, now: DateTime<Utc>) -> f64 {
        let Some(points) = self.history.get(&(waypoint.to_string(), good.to_string())) else {
            return 0.0;
        };
        let cutoff = now - self.history_window;
        let recent: Vec<i64> = points
            .iter()
            .filter(|p| p.at > cutoff)
            .map(|p| p.purchase_price)
            .collect();
        if recent.len() < 2 {
            return 0.0;
        }

        let change = recent[recent.len() - 1] - recent[0];
        let max = recent.iter().copied().max().unwrap_or(0);
        let min = recent.iter().copied().min().unwrap_or(0);
        let range = if max == min { 1 } else { max - min };
        change as f64 / range as f64
    }

    pub fn insights(&self, waypoint: &str, now: DateTime<Utc>) -> Vec<MarketInsight> {
        let Some(snapshot) = self.snapshots.get(waypoint) else {
            return Vec::new();
        };
        let mut insights: Vec<MarketInsight> = snapshot
            .goods
            .keys()
            .map(|good| {
                let trend = self.price_trend(waypoint, good, now);
                let recommendation = if trend > self.trend_threshold {
                    Recommendation::Sell
                } else if trend < -self.trend_threshold {
                    Recommendation::Buy
                } else {
                    Recommendation::Hold
                };
                MarketInsight {
                    good: good.clone(),
                    trend,
                    recommendation,
                }
            })
            .collect();
        insights.sort_by(|a, b| {
            b.trend
                .abs()
                .partial_cmp(&a.trend.abs())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.good.cmp(&b.good))
        });
        insights
    }
}
