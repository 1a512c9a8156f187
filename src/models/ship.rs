use serde::{Deserialize, Serialize};

use crate::error::FleetError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ship {
    pub symbol: String,
    #[serde(default)]
    pub registration: ShipRegistration,
    pub nav: ShipNav,
    #[serde(default)]
    pub crew: ShipCrew,
    #[serde(default)]
    pub frame: ShipFrame,
    #[serde(default)]
    pub reactor: ShipModule,
    #[serde(default)]
    pub engine: ShipEngine,
    #[serde(default)]
    pub cooldown: Option<ShipCooldown>,
    #[serde(default)]
    pub modules: Vec<ShipModule>,
    #[serde(default)]
    pub mounts: Vec<ShipMount>,
    pub cargo: ShipCargo,
    pub fuel: ShipFuel,
}

impl Ship {
    /// Probes carry no fuel tank and travel for free
    pub fn is_probe(&self) -> bool {
        self.fuel.capacity == 0
    }

    pub fn has_mining_mount(&self) -> bool {
        let mentions_mining = |s: &str| s.contains("MINING") || s.contains("DRILL");
        mentions_mining(&self.frame.symbol) || self.mounts.iter().any(|m| mentions_mining(&m.symbol))
    }

    pub fn has_surveyor(&self) -> bool {
        self.mounts.iter().any(|m| m.symbol.contains("SURVEYOR"))
    }

    pub fn speed(&self) -> i32 {
        self.engine.speed.max(1)
    }

    pub fn fuel_fraction(&self) -> f64 {
        if self.fuel.capacity <= 0 {
            return 1.0;
        }
        self.fuel.current as f64 / self.fuel.capacity as f64
    }

    pub fn is_docked(&self) -> bool {
        self.nav.status == NavStatus::Docked
    }

    pub fn location(&self) -> &str {
        &self.nav.waypoint_symbol
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipRegistration {
    pub name: String,
    #[serde(rename = "factionSymbol")]
    pub faction_symbol: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavStatus {
    InTransit,
    #[default]
    InOrbit,
    Docked,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipNav {
    #[serde(rename = "systemSymbol")]
    pub system_symbol: String,
    #[serde(rename = "waypointSymbol")]
    pub waypoint_symbol: String,
    #[serde(default)]
    pub route: ShipRoute,
    pub status: NavStatus,
    #[serde(rename = "flightMode", default)]
    pub flight_mode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipRoute {
    pub destination: ShipRouteWaypoint,
    pub origin: ShipRouteWaypoint,
    #[serde(rename = "departureTime")]
    pub departure_time: String,
    pub arrival: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipRouteWaypoint {
    pub symbol: String,
    #[serde(rename = "type")]
    pub waypoint_type: String,
    #[serde(rename = "systemSymbol")]
    pub system_symbol: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipCrew {
    pub current: i32,
    pub required: i32,
    pub capacity: i32,
    pub rotation: String,
    pub morale: i32,
    pub wages: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipFrame {
    pub symbol: String,
    pub name: String,
    pub description: String,
    pub condition: Option<f64>,
    pub integrity: Option<f64>,
    #[serde(rename = "moduleSlots")]
    pub module_slots: i32,
    #[serde(rename = "mountingPoints")]
    pub mounting_points: i32,
    #[serde(rename = "fuelCapacity")]
    pub fuel_capacity: i32,
    pub requirements: ShipRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipModule {
    pub symbol: String,
    pub capacity: Option<i32>,
    pub range: Option<i32>,
    pub name: String,
    pub description: String,
    pub requirements: ShipRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipEngine {
    pub symbol: String,
    pub name: String,
    pub description: String,
    pub speed: i32,
    pub requirements: ShipRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipMount {
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    pub strength: Option<i32>,
    pub deposits: Option<Vec<String>>,
    pub requirements: ShipRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipRequirements {
    pub power: Option<i32>,
    pub crew: Option<i32>,
    pub slots: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipCooldown {
    #[serde(rename = "shipSymbol")]
    pub ship_symbol: String,
    #[serde(rename = "totalSeconds")]
    pub total_seconds: i32,
    #[serde(rename = "remainingSeconds")]
    pub remaining_seconds: i32,
    pub expiration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipCargo {
    pub capacity: i32,
    pub units: i32,
    pub inventory: Vec<CargoItem>,
}

impl ShipCargo {
    pub fn free_space(&self) -> i32 {
        (self.capacity - self.units).max(0)
    }

    pub fn units_of(&self, symbol: &str) -> i32 {
        self.inventory
            .iter()
            .filter(|item| item.symbol == symbol)
            .map(|item| item.units)
            .sum()
    }

    pub fn is_full(&self) -> bool {
        self.units >= self.capacity
    }

    /// Whether the hold respects its capacity and the inventory adds up
    pub fn is_consistent(&self) -> bool {
        let total: i32 = self.inventory.iter().map(|item| item.units).sum();
        self.units <= self.capacity && total == self.units
    }

    /// Load units into the hold, refusing anything beyond capacity
    pub fn add(&mut self, ship: &str, symbol: &str, units: i32) -> Result<(), FleetError> {
        if units <= 0 {
            return Ok(());
        }
        let free = self.free_space();
        if units > free {
            return Err(FleetError::CargoOverflow {
                ship: ship.to_string(),
                requested: units,
                free,
            });
        }

        match self.inventory.iter_mut().find(|item| item.symbol == symbol) {
            Some(item) => item.units += units,
            None => self.inventory.push(CargoItem {
                symbol: symbol.to_string(),
                name: symbol.to_string(),
                description: String::new(),
                units,
            }),
        }
        self.units += units;
        Ok(())
    }

    /// Remove up to `units`, returning how many were actually removed
    pub fn remove(&mut self, symbol: &str, units: i32) -> i32 {
        let Some(index) = self.inventory.iter().position(|item| item.symbol == symbol) else {
            return 0;
        };
        let removed = units.clamp(0, self.inventory[index].units);
        self.inventory[index].units -= removed;
        if self.inventory[index].units == 0 {
            self.inventory.remove(index);
        }
        self.units -= removed;
        removed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CargoItem {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub units: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipFuel {
    pub current: i32,
    pub capacity: i32,
    #[serde(default)]
    pub consumed: Option<ShipFuelConsumed>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipFuelConsumed {
    pub amount: i32,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationData {
    pub fuel: ShipFuel,
    pub nav: ShipNav,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipyard {
    pub symbol: String,
    #[serde(rename = "shipTypes", default)]
    pub ship_types: Vec<ShipyardShipType>,
    #[serde(default)]
    pub ships: Option<Vec<ShipyardShip>>,
    #[serde(rename = "modificationsFee", default)]
    pub modifications_fee: i32,
}

impl Shipyard {
    /// Listed price for a ship type, only known while a ship is present
    pub fn price_of(&self, ship_type: &str) -> Option<i64> {
        self.ships
            .as_ref()?
            .iter()
            .find(|s| s.ship_type == ship_type)
            .map(|s| s.purchase_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipyardShipType {
    #[serde(rename = "type")]
    pub ship_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipyardShip {
    #[serde(rename = "type")]
    pub ship_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "purchasePrice")]
    pub purchase_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipPurchaseData {
    pub agent: Agent,
    pub ship: Ship,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Agent {
    #[serde(rename = "accountId", default)]
    pub account_id: Option<String>,
    pub symbol: String,
    pub headquarters: String,
    pub credits: i64,
    #[serde(rename = "startingFaction")]
    pub starting_faction: String,
    #[serde(rename = "shipCount", default)]
    pub ship_count: i32,
}
