// Fleet expansion - buys extra mining ships when credits allow
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::GameApi;
use crate::config::{FleetConfig, FleetExpansionConfig};
use crate::error::{FleetError, Result};
use crate::models::{Ship, Shipyard, Waypoint, system_of};
use crate::storage::{ShipRecord, WorldCache};

#[derive(Debug, Clone, PartialEq)]
pub struct PurchasePlan {
    pub shipyard: String,
    pub ship_type: String,
    pub price: i64,
}

pub struct FleetExpansion {
    config: FleetExpansionConfig,
}

pub fn miner_count(ships: &[ShipRecord]) -> usize {
    ships.iter().filter(|r| r.ship.has_mining_mount()).count()
}

impl FleetExpansion {
    pub fn new(config: &FleetConfig) -> Self {
        Self {
            config: config.fleet.clone(),
        }
    }

    pub fn apply_config(&mut self, config: &FleetConfig) {
        self.config = config.fleet.clone();
    }

    /// Shipyards where an idle ship currently sits, sorted and deduplicated
    pub fn reachable_shipyards(
        &self,
        ships: &[ShipRecord],
        waypoint: impl Fn(&str) -> Option<Waypoint>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut yards: Vec<String> = ships
            .iter()
            .filter(|r| r.is_available(now))
            .map(|r| r.ship.location().to_string())
            .filter(|symbol| waypoint(symbol).is_some_and(|wp| wp.is_shipyard()))
            .collect();
        yards.sort();
        yards.dedup();
        yards
    }

    /// Decide whether this shipyard offer should be bought
    pub fn choose(&self, shipyard: &Shipyard, credits: i64, miners: usize) -> Option<PurchasePlan> {
        if !self.config.auto_purchase || miners >= self.config.max_mining_ships {
            return None;
        }
        let price = shipyard.price_of(&self.config.purchase_ship_type)?;
        if credits <= price + self.config.min_credits_for_ship_purchase {
            debug!(
                "💸 {} costs {} at {}, holding {} credits",
                self.config.purchase_ship_type, price, shipyard.symbol, credits
            );
            return None;
        }
        Some(PurchasePlan {
            shipyard: shipyard.symbol.clone(),
            ship_type: self.config.purchase_ship_type.clone(),
            price,
        })
    }

    /// Buy at most one ship this cycle; the new ship goes straight into the cache
    pub async fn expand(&self, api: &dyn GameApi, cache: &RwLock<WorldCache>) -> Result<Option<Ship>> {
        if !self.config.auto_purchase {
            return Ok(None);
        }

        let now = Utc::now();
        let (yards, credits, miners) = {
            let cache = cache.read().await;
            let ships = cache.ships();
            let yards = self.reachable_shipyards(&ships, |symbol| cache.waypoint(symbol).cloned(), now);
            (yards, cache.credits(), miner_count(&ships))
        };
        if miners >= self.config.max_mining_ships {
            debug!("⛏️ Mining fleet at capacity ({} ships)", miners);
            return Ok(None);
        }

        for yard in yards {
            let shipyard = match api.get_shipyard(&system_of(&yard), &yard).await {
                Ok(shipyard) => shipyard,
                Err(err) => {
                    let err = FleetError::from(err);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!("⚠️ Could not read shipyard {}: {}", yard, err);
                    continue;
                }
            };
            let Some(plan) = self.choose(&shipyard, credits, miners) else {
                continue;
            };

            info!("🏭 Buying {} at {} for {} credits", plan.ship_type, plan.shipyard, plan.price);
            let data = api.purchase_ship(&plan.ship_type, &plan.shipyard).await?;
            let mut cache = cache.write().await;
            cache.set_credits(data.agent.credits);
            cache.insert_ship(data.ship.clone(), now);
            info!("🚢 New ship {} joined the fleet", data.ship.symbol);
            return Ok(Some(data.ship));
        }
        Ok(None)
    }
}
