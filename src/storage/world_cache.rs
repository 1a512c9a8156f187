// In-memory world state: ships, waypoints and the agent, refreshed on demand
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FleetError, Result};
use crate::models::{Agent, NavStatus, Ship, ShipCargo, ShipFuel, ShipNav, ShipPhase, Task, Waypoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipRecord {
    pub ship: Ship,
    pub phase: ShipPhase,
    pub task: Option<Task>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub refreshed_at: DateTime<Utc>,
}

impl ShipRecord {
    pub fn new(ship: Ship, now: DateTime<Utc>) -> Self {
        let cooldown_until = cooldown_expiry(&ship, now);
        Self {
            phase: phase_of(&ship),
            ship,
            task: None,
            cooldown_until,
            refreshed_at: now,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.ship.symbol
    }

    /// Idle with no task; the only state in which a task may be assigned
    pub fn is_idle(&self) -> bool {
        self.phase == ShipPhase::Idle && self.task.is_none()
    }

    pub fn on_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_idle() && !self.on_cooldown(now)
    }
}

/// Ships reported in transit stay out of planning until a later refresh sees them arrive
fn phase_of(ship: &Ship) -> ShipPhase {
    if ship.nav.status == NavStatus::InTransit {
        ShipPhase::Navigating
    } else {
        ShipPhase::Idle
    }
}

fn cooldown_expiry(ship: &Ship, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let cooldown = ship.cooldown.as_ref()?;
    if cooldown.remaining_seconds <= 0 {
        return None;
    }
    cooldown
        .expiration
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
        .or_else(|| Some(now + Duration::seconds(cooldown.remaining_seconds as i64)))
}

#[derive(Debug, Clone)]
struct CachedWaypoints {
    waypoints: Vec<Waypoint>,
    last_scanned: DateTime<Utc>,
}

pub struct WorldCache {
    ships: HashMap<String, ShipRecord>,
    systems: HashMap<String, CachedWaypoints>,
    agent: Option<Agent>,
    last_refresh: Option<DateTime<Utc>>,
    staleness: Duration,
    waypoint_staleness: Duration,
}

impl WorldCache {
    pub fn new(staleness_seconds: i64, waypoint_staleness_minutes: i64) -> Self {
        Self {
            ships: HashMap::new(),
            systems: HashMap::new(),
            agent: None,
            last_refresh: None,
            staleness: Duration::seconds(staleness_seconds),
            waypoint_staleness: Duration::minutes(waypoint_staleness_minutes),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_refresh {
            Some(at) => now.signed_duration_since(at) > self.staleness,
            None => true,
        }
    }

    pub fn mark_stale(&mut self) {
        self.last_refresh = None;
    }

    pub fn set_agent(&mut self, agent: Agent) {
        self.agent = Some(agent);
    }

    pub fn agent(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    pub fn credits(&self) -> i64 {
        self.agent.as_ref().map(|a| a.credits).unwrap_or(0)
    }

    pub fn set_credits(&mut self, credits: i64) {
        if let Some(agent) = self.agent.as_mut() {
            agent.credits = credits;
        }
    }

    /// Merge a fresh ship listing from the API.
    ///
    /// Ships owned by a running task are left alone; their executor is the only writer.
    pub fn refresh_ships(&mut self, ships: Vec<Ship>, now: DateTime<Utc>) {
        for ship in ships {
            match self.ships.get_mut(&ship.symbol) {
                Some(record) if record.task.is_some() => {
                    debug!("⏭️ {} busy with a task, keeping executor state", ship.symbol);
                }
                Some(record) => {
                    record.cooldown_until = cooldown_expiry(&ship, now);
                    record.phase = phase_of(&ship);
                    record.ship = ship;
                    record.refreshed_at = now;
                }
                None => {
                    info!("🚢 Tracking new ship {}", ship.symbol);
                    self.ships.insert(ship.symbol.clone(), ShipRecord::new(ship, now));
                }
            }
        }
        self.last_refresh = Some(now);
    }

    pub fn insert_ship(&mut self, ship: Ship, now: DateTime<Utc>) {
        self.ships.insert(ship.symbol.clone(), ShipRecord::new(ship, now));
    }

    pub fn ship(&self, symbol: &str) -> Option<&ShipRecord> {
        self.ships.get(symbol)
    }

    /// Snapshot of every record, sorted by symbol
    pub fn ships(&self) -> Vec<ShipRecord> {
        let mut records: Vec<ShipRecord> = self.ships.values().cloned().collect();
        records.sort_by(|a, b| a.ship.symbol.cmp(&b.ship.symbol));
        records
    }

    pub fn available_ships(&self, now: DateTime<Utc>) -> Vec<ShipRecord> {
        self.ships()
            .into_iter()
            .filter(|r| r.is_available(now))
            .collect()
    }

    pub fn busy_count(&self) -> usize {
        self.ships.values().filter(|r| r.task.is_some()).count()
    }

    fn record_mut(&mut self, symbol: &str) -> Result<&mut ShipRecord> {
        self.ships
            .get_mut(symbol)
            .ok_or_else(|| FleetError::UnknownShip(symbol.to_string()))
    }

    /// Hand a task to an idle ship; any other state is rejected
    pub fn assign_task(&mut self, task: Task) -> Result<()> {
        let record = self.record_mut(&task.ship)?;
        if !record.is_idle() {
            return Err(FleetError::ShipBusy(task.ship.clone()));
        }
        record.task = Some(task);
        Ok(())
    }

    /// Clear the task and return the ship to Idle
    pub fn finish_task(&mut self, symbol: &str) -> Option<Task> {
        let record = self.ships.get_mut(symbol)?;
        record.phase = ShipPhase::Idle;
        record.task.take()
    }

    pub fn set_phase(&mut self, symbol: &str, phase: ShipPhase) -> Result<()> {
        self.record_mut(symbol)?.phase = phase;
        Ok(())
    }

    pub fn update_nav(&mut self, symbol: &str, nav: ShipNav) -> Result<()> {
        self.record_mut(symbol)?.ship.nav = nav;
        Ok(())
    }

    pub fn update_fuel(&mut self, symbol: &str, fuel: ShipFuel) -> Result<()> {
        self.record_mut(symbol)?.ship.fuel = fuel;
        Ok(())
    }

    /// Store a cargo manifest; a hold over capacity is refused
    pub fn update_cargo(&mut self, symbol: &str, cargo: ShipCargo) -> Result<()> {
        if cargo.units > cargo.capacity {
            warn!(
                "⚠️ Refusing cargo for {}: {}/{} units",
                symbol, cargo.units, cargo.capacity
            );
            return Err(FleetError::CargoOverflow {
                ship: symbol.to_string(),
                requested: cargo.units,
                free: cargo.capacity,
            });
        }
        self.record_mut(symbol)?.ship.cargo = cargo;
        Ok(())
    }

    pub fn set_cooldown(&mut self, symbol: &str, until: Option<DateTime<Utc>>) -> Result<()> {
        self.record_mut(symbol)?.cooldown_until = until;
        Ok(())
    }

    pub fn set_system_waypoints(&mut self, system: &str, waypoints: Vec<Waypoint>, now: DateTime<Utc>) {
        debug!("💾 Cached {} waypoints for system {}", waypoints.len(), system);
        self.systems.insert(
            system.to_string(),
            CachedWaypoints {
                waypoints,
                last_scanned: now,
            },
        );
    }

    pub fn needs_waypoints(&self, system: &str, now: DateTime<Utc>) -> bool {
        match self.systems.get(system) {
            Some(cached) => now.signed_duration_since(cached.last_scanned) > self.waypoint_staleness,
            None => true,
        }
    }

    /// Systems where at least one ship currently sits
    pub fn occupied_systems(&self) -> Vec<String> {
        let mut systems: Vec<String> = self
            .ships
            .values()
            .map(|r| r.ship.nav.system_symbol.clone())
            .collect();
        systems.sort();
        systems.dedup();
        systems
    }

    /// Every known waypoint keyed by symbol
    pub fn waypoints(&self) -> HashMap<String, Waypoint> {
        self.systems
            .values()
            .flat_map(|cached| cached.waypoints.iter())
            .map(|wp| (wp.symbol.clone(), wp.clone()))
            .collect()
    }

    pub fn waypoint(&self, symbol: &str) -> Option<&Waypoint> {
        self.systems
            .values()
            .flat_map(|cached| cached.waypoints.iter())
            .find(|wp| wp.symbol == symbol)
    }
}
