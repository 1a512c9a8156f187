// Navigation and fuel estimates for planning routes within a system

use std::collections::HashMap;

use crate::models::{Ship, Waypoint};

/// Fixed overhead the game adds to every flight
const FLIGHT_OVERHEAD_SECONDS: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    Cruise,
    Drift,
    Burn,
    Stealth,
}

impl FlightMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "CRUISE" => Some(FlightMode::Cruise),
            "DRIFT" => Some(FlightMode::Drift),
            "BURN" => Some(FlightMode::Burn),
            "STEALTH" => Some(FlightMode::Stealth),
            _ => None,
        }
    }

    fn time_multiplier(self) -> f64 {
        match self {
            FlightMode::Cruise => 25.0,
            FlightMode::Drift => 250.0,
            FlightMode::Burn => 12.5,
            FlightMode::Stealth => 30.0,
        }
    }
}

/// Euclidean distance between two waypoints
pub fn distance(from: &Waypoint, to: &Waypoint) -> f64 {
    let dx = (to.x - from.x) as f64;
    let dy = (to.y - from.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Fuel units burned over a distance; zero when not moving
pub fn fuel_cost(distance: f64, mode: FlightMode) -> i32 {
    if distance <= 0.0 {
        return 0;
    }
    let base = (distance.round() as i32).max(1);
    match mode {
        FlightMode::Cruise | FlightMode::Stealth => base,
        FlightMode::Drift => 1,
        FlightMode::Burn => base * 2,
    }
}

pub fn travel_seconds(distance: f64, speed: i32, mode: FlightMode) -> u64 {
    if distance <= 0.0 {
        return 0;
    }
    let rounded = distance.max(1.0).round();
    (rounded * mode.time_multiplier() / speed.max(1) as f64 + FLIGHT_OVERHEAD_SECONDS).round() as u64
}

/// One planned hop between two known waypoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub distance: f64,
    pub fuel: i32,
    pub seconds: u64,
}

impl Leg {
    pub const STAY: Leg = Leg {
        distance: 0.0,
        fuel: 0,
        seconds: 0,
    };
}

/// Route estimates over the waypoints of the systems the fleet knows about
pub struct NavigationPlanner<'a> {
    waypoints: &'a HashMap<String, Waypoint>,
    mode: FlightMode,
    safety_margin: i32,
}

impl<'a> NavigationPlanner<'a> {
    pub fn new(waypoints: &'a HashMap<String, Waypoint>, mode: FlightMode, safety_margin: i32) -> Self {
        Self {
            waypoints,
            mode,
            safety_margin: safety_margin.max(0),
        }
    }

    pub fn waypoint(&self, symbol: &str) -> Option<&'a Waypoint> {
        self.waypoints.get(symbol)
    }

    /// `None` when either end is unknown or the ends lie in different systems
    pub fn leg(&self, from: &str, to: &str, speed: i32) -> Option<Leg> {
        if from == to {
            return Some(Leg::STAY);
        }
        let a = self.waypoints.get(from)?;
        let b = self.waypoints.get(to)?;
        if a.system_symbol != b.system_symbol {
            return None;
        }
        let d = distance(a, b);
        Some(Leg {
            distance: d,
            fuel: fuel_cost(d, self.mode),
            seconds: travel_seconds(d, speed, self.mode),
        })
    }

    /// Whether a ship holding `fuel_available` can fly the leg with the safety margin kept
    pub fn can_fly(&self, ship: &Ship, leg: &Leg, fuel_available: i32) -> bool {
        if ship.is_probe() || leg.fuel == 0 {
            return true;
        }
        leg.fuel + self.safety_margin <= fuel_available && leg.fuel <= ship.fuel.capacity
    }

    /// Waypoints in the same system matching `filter`, nearest first
    pub fn nearest<F>(&self, from: &str, filter: F) -> Vec<(&'a Waypoint, f64)>
    where
        F: Fn(&Waypoint) -> bool,
    {
        let Some(origin) = self.waypoints.get(from) else {
            return Vec::new();
        };
        let mut matches: Vec<(&'a Waypoint, f64)> = self
            .waypoints
            .values()
            .filter(|wp| wp.system_symbol == origin.system_symbol && filter(wp))
            .map(|wp| (wp, distance(origin, wp)))
            .collect();
        matches.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.symbol.cmp(&b.0.symbol))
        });
        matches
    }
}
