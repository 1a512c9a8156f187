// Fleet Scheduler - turns fleet, market and contract state into one task per idle ship
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::FleetConfig;
use crate::models::{Ship, Step, Task, TaskKind, Waypoint};
use crate::operations::contract_manager::{ContractManager, DeliveryNeed};
use crate::operations::market_analyzer::{MarketAnalyzer, TradeCandidate, fuel_credits};
use crate::operations::navigation::{FlightMode, NavigationPlanner};
use crate::storage::ShipRecord;

/// Everything the scheduler looks at for one planning pass
pub struct PlanInput<'a> {
    pub ships: &'a [ShipRecord],
    pub analyzer: &'a MarketAnalyzer,
    pub contracts: &'a ContractManager,
    pub waypoints: &'a HashMap<String, Waypoint>,
    /// Credits available for purchases across all new tasks
    pub credits: i64,
    /// Mean units per extraction
    pub expected_yield: f64,
    pub now: DateTime<Utc>,
}

/// A resource only one ship may chase per planning pass
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Claim {
    Market { waypoint: String, good: String },
    Contract { id: String, good: String },
    Waypoint(String),
}

#[derive(Debug, Clone)]
struct Candidate {
    task: Task,
    claim: Option<Claim>,
    upfront: i64,
}

impl Candidate {
    fn is_maintenance(&self) -> bool {
        matches!(self.task.kind, TaskKind::Refuel | TaskKind::Reposition)
    }
}

#[derive(Debug, Clone, Copy)]
struct RouteEstimate {
    seconds: u64,
    fuel_cost: i64,
}

#[derive(Debug, Clone)]
struct Settings {
    refuel_threshold: f64,
    safety_margin: i32,
    top_up_on_dock: bool,
    mode: FlightMode,
    transaction_seconds: u64,
    extraction_cooldown_seconds: u64,
    mining_unit_value: i64,
    max_extractions_per_run: u32,
    allow_reposition: bool,
}

impl Settings {
    fn from_config(config: &FleetConfig) -> Self {
        Self {
            refuel_threshold: config.fuel.refuel_threshold,
            safety_margin: config.fuel.fuel_safety_margin,
            top_up_on_dock: config.fuel.top_up_on_dock,
            mode: FlightMode::parse(&config.scheduler.flight_mode).unwrap_or(FlightMode::Cruise),
            transaction_seconds: config.scheduler.transaction_seconds,
            extraction_cooldown_seconds: config.scheduler.extraction_cooldown_seconds,
            mining_unit_value: config.scheduler.mining_unit_value,
            max_extractions_per_run: config.scheduler.max_extractions_per_run.max(1),
            allow_reposition: config.scheduler.allow_reposition,
        }
    }
}

/// Per-pass working state shared by the candidate generators
struct Pass<'a> {
    input: &'a PlanInput<'a>,
    planner: NavigationPlanner<'a>,
    fuel_price: i64,
    trades: Vec<TradeCandidate>,
    needs: Vec<DeliveryNeed>,
    reserved: Vec<String>,
}

pub struct FleetScheduler {
    settings: Settings,
}

/// Append a visit to `waypoint`: navigate unless already there, then dock
fn visit(steps: &mut Vec<Step>, at: &mut String, waypoint: &str) {
    if at.as_str() != waypoint {
        steps.push(Step::Navigate {
            waypoint: waypoint.to_string(),
        });
        *at = waypoint.to_string();
    }
    steps.push(Step::Dock);
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.task
        .profit_per_second()
        .partial_cmp(&a.task.profit_per_second())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.task.estimated_seconds.cmp(&b.task.estimated_seconds))
        .then_with(|| a.task.ship.cmp(&b.task.ship))
        .then_with(|| a.task.target.cmp(&b.task.target))
}

impl FleetScheduler {
    pub fn new(config: &FleetConfig) -> Self {
        Self {
            settings: Settings::from_config(config),
        }
    }

    pub fn apply_config(&mut self, config: &FleetConfig) {
        self.settings = Settings::from_config(config);
    }

    /// Produce at most one task per idle ship, best profit per second first.
    ///
    /// Ships that are not idle, already hold a task or are cooling down are skipped.
    pub fn plan(&self, input: &PlanInput) -> Vec<Task> {
        let available: Vec<&ShipRecord> = input
            .ships
            .iter()
            .filter(|r| r.is_available(input.now))
            .collect();
        if available.is_empty() {
            return Vec::new();
        }

        let max_capacity = available
            .iter()
            .map(|r| r.ship.cargo.capacity)
            .max()
            .unwrap_or(0);
        let pass = Pass {
            input,
            planner: NavigationPlanner::new(input.waypoints, self.settings.mode, self.settings.safety_margin),
            fuel_price: input.analyzer.fuel_price_estimate(),
            trades: input.analyzer.candidates(input.waypoints, max_capacity, input.now),
            needs: input.contracts.delivery_needs(),
            reserved: input.contracts.reserved_goods(),
        };

        let mut candidates: Vec<Candidate> = available
            .iter()
            .flat_map(|record| self.candidates_for(&record.ship, &pass))
            .filter(|c| c.is_maintenance() || c.task.expected_profit > 0)
            .collect();
        candidates.sort_by(rank);

        let mut assigned: HashSet<String> = HashSet::new();
        let mut claimed: HashSet<Claim> = HashSet::new();
        let mut budget = input.credits;
        let mut tasks = Vec::new();

        for candidate in candidates {
            if assigned.contains(&candidate.task.ship) {
                continue;
            }
            if let Some(claim) = &candidate.claim {
                if claimed.contains(claim) {
                    continue;
                }
            }
            if candidate.upfront > budget {
                debug!(
                    "💸 {} cannot afford {:?} to {} ({} > {})",
                    candidate.task.ship, candidate.task.kind, candidate.task.target, candidate.upfront, budget
                );
                continue;
            }

            budget -= candidate.upfront;
            assigned.insert(candidate.task.ship.clone());
            if let Some(claim) = candidate.claim {
                claimed.insert(claim);
            }
            info!(
                "🗺️ {} → {:?} at {} (≈{} credits in {}s)",
                candidate.task.ship,
                candidate.task.kind,
                candidate.task.target,
                candidate.task.expected_profit,
                candidate.task.estimated_seconds
            );
            tasks.push(candidate.task);
        }

        tasks
    }

    fn candidates_for(&self, ship: &Ship, pass: &Pass) -> Vec<Candidate> {
        if !ship.is_probe() && ship.fuel_fraction() < self.settings.refuel_threshold {
            if let Some(refuel) = self.refuel_candidate(ship, pass) {
                return vec![refuel];
            }
            debug!("⛽ {} low on fuel but no reachable fuel market", ship.symbol);
        }

        let mut candidates = Vec::new();
        candidates.extend(self.liquidation_candidates(ship, pass));
        candidates.extend(self.trade_candidates(ship, pass));
        candidates.extend(self.delivery_candidates(ship, pass));
        candidates.extend(self.mining_candidate(ship, pass));
        if self.settings.allow_reposition {
            candidates.extend(self.reposition_candidates(ship, pass));
        }
        candidates
    }

    /// Time and fuel for visiting `stops` in order, docking at each.
    ///
    /// `None` when a waypoint is unknown or a leg exceeds the fuel on hand. Fuel is
    /// topped up at stops whose market sells FUEL.
    fn route(&self, ship: &Ship, stops: &[&str], pass: &Pass) -> Option<RouteEstimate> {
        let mut at = ship.location().to_string();
        let mut fuel = ship.fuel.current;
        let mut fuel_used = 0;
        let mut seconds = 0;

        for stop in stops {
            let leg = pass.planner.leg(&at, stop, ship.speed())?;
            if !pass.planner.can_fly(ship, &leg, fuel) {
                return None;
            }
            if !ship.is_probe() {
                fuel -= leg.fuel;
                fuel_used += leg.fuel;
            }
            seconds += leg.seconds;
            if self.settings.top_up_on_dock && pass.input.analyzer.sells_fuel(stop) {
                fuel = ship.fuel.capacity;
            }
            at = stop.to_string();
        }

        Some(RouteEstimate {
            seconds,
            fuel_cost: fuel_credits(fuel_used, pass.fuel_price),
        })
    }

    fn refuel_candidate(&self, ship: &Ship, pass: &Pass) -> Option<Candidate> {
        let analyzer = pass.input.analyzer;
        let stations: Vec<String> = if analyzer.sells_fuel(ship.location()) {
            vec![ship.location().to_string()]
        } else {
            pass.planner
                .nearest(ship.location(), |wp| analyzer.sells_fuel(&wp.symbol))
                .into_iter()
                .map(|(wp, _)| wp.symbol.clone())
                .collect()
        };

        stations.into_iter().find_map(|station| {
            let route = self.route(ship, &[station.as_str()], pass)?;
            let mut steps = Vec::new();
            let mut at = ship.location().to_string();
            visit(&mut steps, &mut at, &station);
            steps.push(Step::Refuel);

            let price = analyzer.fuel_price(&station).unwrap_or(pass.fuel_price);
            let refill = fuel_credits(ship.fuel.capacity - ship.fuel.current, price);
            Some(Candidate {
                task: Task {
                    ship: ship.symbol.clone(),
                    kind: TaskKind::Refuel,
                    target: station,
                    expected_profit: -(route.fuel_cost + refill),
                    estimated_seconds: route.seconds + 2 * self.settings.transaction_seconds,
                    steps,
                },
                claim: None,
                upfront: 0,
            })
        })
    }

    /// Sell cargo that no accepted contract needs
    fn liquidation_candidates(&self, ship: &Ship, pass: &Pass) -> Vec<Candidate> {
        let sellable: Vec<(&str, i32)> = ship
            .cargo
            .inventory
            .iter()
            .filter(|item| item.units > 0 && !pass.reserved.contains(&item.symbol))
            .map(|item| (item.symbol.as_str(), item.units))
            .collect();
        if sellable.is_empty() {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for snapshot in pass.input.analyzer.fresh_snapshots(pass.input.now) {
            let goods: Vec<(&str, i32, i64)> = sellable
                .iter()
                .filter_map(|(good, units)| {
                    snapshot.quote(good).map(|q| {
                        let units = (*units).min(q.trade_volume.max(1));
                        (*good, units, q.sell_price)
                    })
                })
                .collect();
            if goods.is_empty() {
                continue;
            }
            let Some(route) = self.route(ship, &[snapshot.waypoint.as_str()], pass) else {
                continue;
            };

            let mut steps = Vec::new();
            let mut at = ship.location().to_string();
            visit(&mut steps, &mut at, &snapshot.waypoint);
            let mut revenue = 0;
            for (good, units, price) in &goods {
                revenue += price * *units as i64;
                steps.push(Step::Sell {
                    good: good.to_string(),
                    units: *units,
                });
            }

            candidates.push(Candidate {
                task: Task {
                    ship: ship.symbol.clone(),
                    kind: TaskKind::Trade,
                    target: snapshot.waypoint.clone(),
                    expected_profit: revenue - route.fuel_cost,
                    estimated_seconds: route.seconds + (1 + goods.len() as u64) * self.settings.transaction_seconds,
                    steps,
                },
                claim: None,
                upfront: 0,
            });
        }
        candidates
    }

    fn trade_candidates(&self, ship: &Ship, pass: &Pass) -> Vec<Candidate> {
        let free = ship.cargo.free_space();
        if free <= 0 {
            return Vec::new();
        }

        pass.trades
            .iter()
            .filter_map(|trade| {
                let units = trade.units.min(free);
                if units <= 0 {
                    return None;
                }
                let route = self.route(ship, &[trade.buy_at.as_str(), trade.sell_at.as_str()], pass)?;

                let mut steps = Vec::new();
                let mut at = ship.location().to_string();
                visit(&mut steps, &mut at, &trade.buy_at);
                steps.push(Step::Buy {
                    good: trade.good.clone(),
                    units,
                });
                visit(&mut steps, &mut at, &trade.sell_at);
                steps.push(Step::Sell {
                    good: trade.good.clone(),
                    units,
                });

                Some(Candidate {
                    task: Task {
                        ship: ship.symbol.clone(),
                        kind: TaskKind::Trade,
                        target: trade.buy_at.clone(),
                        expected_profit: (trade.sell_price - trade.buy_price) * units as i64 - route.fuel_cost,
                        estimated_seconds: route.seconds + 4 * self.settings.transaction_seconds,
                        steps,
                    },
                    claim: Some(Claim::Market {
                        waypoint: trade.buy_at.clone(),
                        good: trade.good.clone(),
                    }),
                    upfront: trade.buy_price * units as i64,
                })
            })
            .collect()
    }

    fn delivery_candidates(&self, ship: &Ship, pass: &Pass) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for need in &pass.needs {
            let held = ship.cargo.units_of(&need.good);
            let claim = Some(Claim::Contract {
                id: need.contract_id.clone(),
                good: need.good.clone(),
            });
            let mut steps = Vec::new();
            let mut at = ship.location().to_string();

            let candidate = if held > 0 {
                let units = held.min(need.remaining);
                let Some(route) = self.route(ship, &[need.destination.as_str()], pass) else {
                    continue;
                };
                visit(&mut steps, &mut at, &need.destination);
                steps.push(Step::Deliver {
                    contract_id: need.contract_id.clone(),
                    good: need.good.clone(),
                    units,
                });
                steps.push(Step::Fulfill {
                    contract_id: need.contract_id.clone(),
                });
                Candidate {
                    task: Task {
                        ship: ship.symbol.clone(),
                        kind: TaskKind::Deliver,
                        target: need.destination.clone(),
                        expected_profit: need.unit_payment * units as i64 - route.fuel_cost,
                        estimated_seconds: route.seconds + 3 * self.settings.transaction_seconds,
                        steps,
                    },
                    claim,
                    upfront: 0,
                }
            } else {
                let Some((market, quote)) = pass.input.analyzer.cheapest_buy(&need.good, pass.input.now) else {
                    continue;
                };
                let units = need
                    .remaining
                    .min(ship.cargo.free_space())
                    .min(quote.trade_volume.max(1));
                if units <= 0 {
                    continue;
                }
                let Some(route) = self.route(ship, &[market.as_str(), need.destination.as_str()], pass) else {
                    continue;
                };
                visit(&mut steps, &mut at, &market);
                steps.push(Step::Buy {
                    good: need.good.clone(),
                    units,
                });
                visit(&mut steps, &mut at, &need.destination);
                steps.push(Step::Deliver {
                    contract_id: need.contract_id.clone(),
                    good: need.good.clone(),
                    units,
                });
                steps.push(Step::Fulfill {
                    contract_id: need.contract_id.clone(),
                });
                let cost = quote.purchase_price * units as i64;
                Candidate {
                    task: Task {
                        ship: ship.symbol.clone(),
                        kind: TaskKind::Deliver,
                        target: market,
                        expected_profit: need.unit_payment * units as i64 - cost - route.fuel_cost,
                        estimated_seconds: route.seconds + 5 * self.settings.transaction_seconds,
                        steps,
                    },
                    claim,
                    upfront: cost,
                }
            };
            candidates.push(candidate);
        }
        candidates
    }

    fn mining_candidate(&self, ship: &Ship, pass: &Pass) -> Option<Candidate> {
        let free = ship.cargo.free_space();
        if !ship.has_mining_mount() || free <= 0 {
            return None;
        }

        let asteroids = pass.planner.nearest(ship.location(), Waypoint::is_asteroid);
        asteroids.into_iter().find_map(|(asteroid, _)| {
            let leg = pass.planner.leg(ship.location(), &asteroid.symbol, ship.speed())?;
            if !pass.planner.can_fly(ship, &leg, ship.fuel.current) {
                return None;
            }

            let per_extraction = pass.input.expected_yield.max(1.0);
            let extractions = ((free as f64 / per_extraction).ceil() as u32).clamp(1, self.settings.max_extractions_per_run);
            let units = (free as f64).min(extractions as f64 * per_extraction) as i64;
            let fuel_cost = if ship.is_probe() {
                0
            } else {
                fuel_credits(leg.fuel, pass.fuel_price)
            };

            let mut steps = Vec::new();
            if ship.location() != asteroid.symbol {
                steps.push(Step::Navigate {
                    waypoint: asteroid.symbol.clone(),
                });
            }
            steps.push(Step::Orbit);
            steps.push(Step::Extract {
                wanted: pass.reserved.clone(),
            });

            Some(Candidate {
                task: Task {
                    ship: ship.symbol.clone(),
                    kind: TaskKind::Mine,
                    target: asteroid.symbol.clone(),
                    expected_profit: units * self.settings.mining_unit_value - fuel_cost,
                    estimated_seconds: leg.seconds + extractions as u64 * self.settings.extraction_cooldown_seconds,
                    steps,
                },
                claim: None,
                upfront: 0,
            })
        })
    }

    /// Visit marketplaces whose prices are unknown or stale
    fn reposition_candidates(&self, ship: &Ship, pass: &Pass) -> Vec<Candidate> {
        let analyzer = pass.input.analyzer;
        let now = pass.input.now;
        pass.planner
            .nearest(ship.location(), |wp| wp.is_marketplace() && !analyzer.is_fresh(&wp.symbol, now))
            .into_iter()
            .filter_map(|(wp, _)| {
                let route = self.route(ship, &[wp.symbol.as_str()], pass)?;
                let mut steps = Vec::new();
                let mut at = ship.location().to_string();
                visit(&mut steps, &mut at, &wp.symbol);
                Some(Candidate {
                    task: Task {
                        ship: ship.symbol.clone(),
                        kind: TaskKind::Reposition,
                        target: wp.symbol.clone(),
                        expected_profit: 0,
                        estimated_seconds: route.seconds + self.settings.transaction_seconds,
                        steps,
                    },
                    claim: Some(Claim::Waypoint(wp.symbol.clone())),
                    upfront: 0,
                })
            })
            .collect()
    }
}
