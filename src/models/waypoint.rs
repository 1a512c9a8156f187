use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Waypoint {
    pub symbol: String,
    #[serde(rename = "type")]
    pub waypoint_type: String,
    #[serde(rename = "systemSymbol")]
    pub system_symbol: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub orbitals: Vec<Orbital>,
    #[serde(default)]
    pub traits: Vec<Trait>,
    #[serde(default)]
    pub chart: Option<Chart>,
    #[serde(default)]
    pub faction: Option<WaypointFaction>,
}

impl Waypoint {
    pub fn has_trait(&self, symbol: &str) -> bool {
        self.traits.iter().any(|t| t.symbol == symbol)
    }

    pub fn is_marketplace(&self) -> bool {
        self.has_trait("MARKETPLACE")
    }

    pub fn is_shipyard(&self) -> bool {
        self.has_trait("SHIPYARD")
    }

    pub fn is_asteroid(&self) -> bool {
        matches!(self.waypoint_type.as_str(), "ASTEROID" | "ASTEROID_FIELD" | "ENGINEERED_ASTEROID")
    }
}

/// System part of a waypoint symbol, e.g. `X1-DF55` for `X1-DF55-20250Z`
pub fn system_of(waypoint_symbol: &str) -> String {
    waypoint_symbol
        .splitn(3, '-')
        .take(2)
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Orbital {
    pub symbol: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Trait {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Chart {
    #[serde(rename = "waypointSymbol")]
    pub waypoint_symbol: Option<String>,
    #[serde(rename = "submittedBy")]
    pub submitted_by: Option<String>,
    #[serde(rename = "submittedOn")]
    pub submitted_on: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WaypointFaction {
    pub symbol: String,
}
