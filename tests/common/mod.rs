// Shared fixtures and an in-memory game server for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use spacetraders_fleet::client::GameApi;
use spacetraders_fleet::error::ApiError;
use spacetraders_fleet::models::*;
use spacetraders_fleet::operations::navigation::{FlightMode, distance, fuel_cost};
use spacetraders_fleet::operations::market_analyzer::fuel_credits;
use spacetraders_fleet::storage::ShipRecord;

pub const SYSTEM: &str = "X1-TEST";

pub fn wp(name: &str) -> String {
    format!("{}-{}", SYSTEM, name)
}

pub fn waypoint(name: &str, kind: &str, x: i32, y: i32, traits: &[&str]) -> Waypoint {
    Waypoint {
        symbol: wp(name),
        waypoint_type: kind.to_string(),
        system_symbol: SYSTEM.to_string(),
        x,
        y,
        traits: traits
            .iter()
            .map(|t| Trait {
                symbol: t.to_string(),
                name: t.to_string(),
                description: String::new(),
            })
            .collect(),
        ..Default::default()
    }
}

pub fn marketplace(name: &str, x: i32, y: i32) -> Waypoint {
    waypoint(name, "PLANET", x, y, &["MARKETPLACE"])
}

pub fn waypoint_map(waypoints: &[Waypoint]) -> HashMap<String, Waypoint> {
    waypoints.iter().map(|w| (w.symbol.clone(), w.clone())).collect()
}

pub fn ship(symbol: &str, at: &str, fuel: i32, fuel_capacity: i32, cargo_capacity: i32) -> Ship {
    Ship {
        symbol: symbol.to_string(),
        nav: ShipNav {
            system_symbol: SYSTEM.to_string(),
            waypoint_symbol: wp(at),
            status: NavStatus::InOrbit,
            flight_mode: "CRUISE".to_string(),
            ..Default::default()
        },
        engine: ShipEngine {
            speed: 30,
            ..Default::default()
        },
        cargo: ShipCargo {
            capacity: cargo_capacity,
            units: 0,
            inventory: Vec::new(),
        },
        fuel: ShipFuel {
            current: fuel,
            capacity: fuel_capacity,
            consumed: None,
        },
        ..Default::default()
    }
}

pub fn miner(symbol: &str, at: &str, fuel: i32, cargo_capacity: i32) -> Ship {
    let mut ship = ship(symbol, at, fuel, fuel, cargo_capacity);
    ship.mounts.push(ShipMount {
        symbol: "MOUNT_MINING_LASER_I".to_string(),
        ..Default::default()
    });
    ship
}

pub fn with_cargo(mut ship: Ship, good: &str, units: i32) -> Ship {
    let name = ship.symbol.clone();
    ship.cargo.add(&name, good, units).expect("fixture cargo fits");
    ship
}

pub fn record(ship: Ship) -> ShipRecord {
    ShipRecord::new(ship, Utc::now())
}

pub fn quote(symbol: &str, buy: i64, sell: i64, volume: i32) -> PriceQuote {
    PriceQuote {
        symbol: symbol.to_string(),
        purchase_price: buy,
        sell_price: sell,
        trade_volume: volume,
        supply: "MODERATE".to_string(),
    }
}

pub fn market(name: &str, goods: &[(&str, i64, i64, i32)]) -> Market {
    Market {
        symbol: wp(name),
        trade_goods: Some(
            goods
                .iter()
                .map(|(symbol, buy, sell, volume)| MarketTradeGood {
                    symbol: symbol.to_string(),
                    trade_volume: *volume,
                    supply: "MODERATE".to_string(),
                    activity: None,
                    purchase_price: *buy,
                    sell_price: *sell,
                })
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn contract(id: &str, good: &str, destination: &str, required: i32, accepted: bool) -> Contract {
    Contract {
        id: id.to_string(),
        faction_symbol: "COSMIC".to_string(),
        contract_type: "PROCUREMENT".to_string(),
        terms: ContractTerms {
            deadline: (Utc::now() + Duration::days(7)).to_rfc3339(),
            payment: Payment {
                on_accepted: 2_000,
                on_fulfilled: 20_000,
            },
            deliver: vec![DeliveryItem {
                trade_symbol: good.to_string(),
                destination_symbol: wp(destination),
                units_required: required,
                units_fulfilled: 0,
            }],
        },
        accepted,
        fulfilled: false,
        expiration: None,
        deadline_to_accept: Some((Utc::now() + Duration::days(1)).to_rfc3339()),
    }
}

pub fn agent(credits: i64) -> Agent {
    Agent {
        account_id: None,
        symbol: "NOVA_TEST".to_string(),
        headquarters: wp("HQ"),
        credits,
        starting_faction: "COSMIC".to_string(),
        ship_count: 0,
    }
}

pub fn survey(signature: &str, at: &str, deposits: &[&str], size: &str) -> Survey {
    Survey {
        signature: signature.to_string(),
        symbol: wp(at),
        deposits: deposits
            .iter()
            .map(|d| SurveyDeposit { symbol: d.to_string() })
            .collect(),
        expiration: (Utc::now() + Duration::hours(1)).to_rfc3339(),
        size: size.to_string(),
    }
}

pub fn conflict(code: u32, message: &str) -> ApiError {
    ApiError::Conflict {
        code,
        message: message.to_string(),
        cooldown: None,
    }
}

/// Mutable world behind the mock API
pub struct MockState {
    pub agent: Agent,
    pub ships: HashMap<String, Ship>,
    pub waypoints: Vec<Waypoint>,
    pub markets: HashMap<String, Market>,
    pub shipyards: HashMap<String, Shipyard>,
    pub contracts: Vec<Contract>,
    pub surveys: Vec<Survey>,
    pub extraction: (String, i32),
    pub extraction_cooldown: i32,
    pub travel_seconds: i64,
    pub failures: HashMap<String, VecDeque<ApiError>>,
    pub calls: Vec<String>,
    pub negotiated: u32,
}

pub struct MockApi {
    state: Mutex<MockState>,
}

impl MockApi {
    pub fn new(credits: i64, waypoints: Vec<Waypoint>) -> Self {
        Self {
            state: Mutex::new(MockState {
                agent: agent(credits),
                ships: HashMap::new(),
                waypoints,
                markets: HashMap::new(),
                shipyards: HashMap::new(),
                contracts: Vec::new(),
                surveys: Vec::new(),
                extraction: ("IRON_ORE".to_string(), 7),
                extraction_cooldown: 70,
                travel_seconds: 2,
                failures: HashMap::new(),
                calls: Vec::new(),
                negotiated: 0,
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    pub fn add_ship(&self, ship: Ship) {
        self.state().ships.insert(ship.symbol.clone(), ship);
    }

    pub fn add_market(&self, market: Market) {
        self.state().markets.insert(market.symbol.clone(), market);
    }

    pub fn add_contract(&self, contract: Contract) {
        self.state().contracts.push(contract);
    }

    /// Queue an error for the next call to `endpoint`
    pub fn fail_next(&self, endpoint: &str, err: ApiError) {
        self.state()
            .failures
            .entry(endpoint.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.state().calls.iter().filter(|c| c.as_str() == endpoint).count()
    }

    pub fn ship_state(&self, symbol: &str) -> Ship {
        self.state().ships.get(symbol).cloned().expect("ship exists in mock")
    }

    pub fn credits(&self) -> i64 {
        self.state().agent.credits
    }

    fn begin(&self, endpoint: &str) -> Result<MutexGuard<'_, MockState>, ApiError> {
        let mut state = self.state();
        state.calls.push(endpoint.to_string());
        if let Some(err) = state.failures.get_mut(endpoint).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }
}

fn missing(what: &str) -> ApiError {
    ApiError::NotFound(what.to_string())
}

fn local_price(state: &MockState, ship: &str, good: &str) -> Result<MarketTradeGood, ApiError> {
    let at = state
        .ships
        .get(ship)
        .map(|s| s.nav.waypoint_symbol.clone())
        .ok_or_else(|| missing(ship))?;
    state
        .markets
        .get(&at)
        .and_then(|m| m.trade_goods.as_ref())
        .and_then(|goods| goods.iter().find(|g| g.symbol == good))
        .cloned()
        .ok_or_else(|| conflict(4602, "good not traded here"))
}

fn transaction(ship: &str, at: &str, good: &str, kind: &str, units: i32, price: i64) -> MarketTransaction {
    MarketTransaction {
        waypoint_symbol: at.to_string(),
        ship_symbol: ship.to_string(),
        trade_symbol: good.to_string(),
        transaction_type: kind.to_string(),
        units,
        price_per_unit: price,
        total_price: price * units as i64,
        timestamp: Utc::now().to_rfc3339(),
    }
}

fn cooldown(ship: &str, seconds: i32) -> ShipCooldown {
    ShipCooldown {
        ship_symbol: ship.to_string(),
        total_seconds: seconds,
        remaining_seconds: seconds,
        expiration: None,
    }
}

#[async_trait]
impl GameApi for MockApi {
    async fn get_agent(&self) -> Result<Agent, ApiError> {
        Ok(self.begin("get_agent")?.agent.clone())
    }

    async fn list_ships(&self) -> Result<Vec<Ship>, ApiError> {
        let state = self.begin("list_ships")?;
        let mut ships: Vec<Ship> = state.ships.values().cloned().collect();
        ships.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(ships)
    }

    async fn get_ship(&self, ship_symbol: &str) -> Result<Ship, ApiError> {
        let state = self.begin("get_ship")?;
        state.ships.get(ship_symbol).cloned().ok_or_else(|| missing(ship_symbol))
    }

    async fn list_waypoints(&self, system_symbol: &str) -> Result<Vec<Waypoint>, ApiError> {
        let state = self.begin("list_waypoints")?;
        Ok(state
            .waypoints
            .iter()
            .filter(|w| w.system_symbol == system_symbol)
            .cloned()
            .collect())
    }

    async fn get_market(&self, _system_symbol: &str, waypoint_symbol: &str) -> Result<Market, ApiError> {
        let state = self.begin("get_market")?;
        state.markets.get(waypoint_symbol).cloned().ok_or_else(|| missing(waypoint_symbol))
    }

    async fn get_shipyard(&self, _system_symbol: &str, waypoint_symbol: &str) -> Result<Shipyard, ApiError> {
        let state = self.begin("get_shipyard")?;
        state.shipyards.get(waypoint_symbol).cloned().ok_or_else(|| missing(waypoint_symbol))
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, ApiError> {
        Ok(self.begin("list_contracts")?.contracts.clone())
    }

    async fn accept_contract(&self, contract_id: &str) -> Result<ContractAcceptData, ApiError> {
        let mut state = self.begin("accept_contract")?;
        let contract = state
            .contracts
            .iter_mut()
            .find(|c| c.id == contract_id)
            .ok_or_else(|| missing(contract_id))?;
        contract.accepted = true;
        let contract = contract.clone();
        state.agent.credits += contract.terms.payment.on_accepted;
        Ok(ContractAcceptData {
            contract,
            agent: state.agent.clone(),
        })
    }

    async fn negotiate_contract(&self, ship_symbol: &str) -> Result<Contract, ApiError> {
        let mut state = self.begin("negotiate_contract")?;
        let docked = state.ships.get(ship_symbol).is_some_and(|s| s.is_docked());
        if !docked {
            return Err(conflict(4244, "ship must be docked to negotiate"));
        }
        state.negotiated += 1;
        let negotiated = contract(&format!("NEGOTIATED-{}", state.negotiated), "COPPER_ORE", "HQ", 30, false);
        state.contracts.push(negotiated.clone());
        Ok(negotiated)
    }

    async fn deliver_contract(
        &self,
        contract_id: &str,
        ship_symbol: &str,
        trade_symbol: &str,
        units: i32,
    ) -> Result<DeliverCargoData, ApiError> {
        let mut state = self.begin("deliver_contract")?;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        let delivered = ship.cargo.remove(trade_symbol, units);
        let cargo = ship.cargo.clone();
        let contract = state
            .contracts
            .iter_mut()
            .find(|c| c.id == contract_id)
            .ok_or_else(|| missing(contract_id))?;
        if let Some(item) = contract.terms.deliver.iter_mut().find(|d| d.trade_symbol == trade_symbol) {
            item.units_fulfilled += delivered;
        }
        Ok(DeliverCargoData {
            contract: contract.clone(),
            cargo,
        })
    }

    async fn fulfill_contract(&self, contract_id: &str) -> Result<FulfillContractData, ApiError> {
        let mut state = self.begin("fulfill_contract")?;
        let contract = state
            .contracts
            .iter_mut()
            .find(|c| c.id == contract_id)
            .ok_or_else(|| missing(contract_id))?;
        if !contract.all_delivered() {
            return Err(conflict(4504, "contract terms not met"));
        }
        contract.fulfilled = true;
        let contract = contract.clone();
        state.agent.credits += contract.terms.payment.on_fulfilled;
        Ok(FulfillContractData {
            agent: state.agent.clone(),
            contract,
        })
    }

    async fn orbit_ship(&self, ship_symbol: &str) -> Result<ShipNav, ApiError> {
        let mut state = self.begin("orbit_ship")?;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        ship.nav.status = NavStatus::InOrbit;
        Ok(ship.nav.clone())
    }

    async fn dock_ship(&self, ship_symbol: &str) -> Result<ShipNav, ApiError> {
        let mut state = self.begin("dock_ship")?;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        ship.nav.status = NavStatus::Docked;
        Ok(ship.nav.clone())
    }

    async fn navigate_ship(&self, ship_symbol: &str, waypoint_symbol: &str) -> Result<NavigationData, ApiError> {
        let mut state = self.begin("navigate_ship")?;
        let travel = state.travel_seconds;
        let origin = state
            .ships
            .get(ship_symbol)
            .map(|s| s.nav.waypoint_symbol.clone())
            .ok_or_else(|| missing(ship_symbol))?;
        let find = |symbol: &str| state.waypoints.iter().find(|w| w.symbol == symbol).cloned();
        let from = find(&origin).ok_or_else(|| missing(&origin))?;
        let to = find(waypoint_symbol).ok_or_else(|| missing(waypoint_symbol))?;
        let burn = fuel_cost(distance(&from, &to), FlightMode::Cruise);

        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        if !ship.is_probe() {
            if ship.fuel.current < burn {
                return Err(conflict(4203, "insufficient fuel"));
            }
            ship.fuel.current -= burn;
        }
        ship.nav.waypoint_symbol = waypoint_symbol.to_string();
        ship.nav.status = NavStatus::InOrbit;
        let mut nav = ship.nav.clone();
        nav.status = NavStatus::InTransit;
        nav.route.arrival = (Utc::now() + Duration::seconds(travel)).to_rfc3339();
        Ok(NavigationData {
            fuel: ship.fuel.clone(),
            nav,
        })
    }

    async fn refuel_ship(&self, ship_symbol: &str) -> Result<RefuelData, ApiError> {
        let mut state = self.begin("refuel_ship")?;
        let price = local_price(&state, ship_symbol, FUEL)?.purchase_price;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        let units = ship.fuel.capacity - ship.fuel.current;
        ship.fuel.current = ship.fuel.capacity;
        let fuel = ship.fuel.clone();
        let at = ship.nav.waypoint_symbol.clone();
        let mut tx = transaction(ship_symbol, &at, FUEL, "PURCHASE", units, price);
        tx.total_price = fuel_credits(units, price);
        state.agent.credits -= tx.total_price;
        Ok(RefuelData {
            agent: state.agent.clone(),
            fuel,
            transaction: tx,
        })
    }

    async fn purchase_cargo(&self, ship_symbol: &str, trade_symbol: &str, units: i32) -> Result<TradeData, ApiError> {
        let mut state = self.begin("purchase_cargo")?;
        let good = local_price(&state, ship_symbol, trade_symbol)?;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        ship.cargo
            .add(ship_symbol, trade_symbol, units)
            .map_err(|e| conflict(4217, &e.to_string()))?;
        let cargo = ship.cargo.clone();
        let tx = transaction(ship_symbol, &ship.nav.waypoint_symbol, trade_symbol, "PURCHASE", units, good.purchase_price);
        state.agent.credits -= tx.total_price;
        Ok(TradeData {
            agent: state.agent.clone(),
            cargo,
            transaction: tx,
        })
    }

    async fn sell_cargo(&self, ship_symbol: &str, trade_symbol: &str, units: i32) -> Result<TradeData, ApiError> {
        let mut state = self.begin("sell_cargo")?;
        let good = local_price(&state, ship_symbol, trade_symbol)?;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        let sold = ship.cargo.remove(trade_symbol, units);
        let cargo = ship.cargo.clone();
        let tx = transaction(ship_symbol, &ship.nav.waypoint_symbol, trade_symbol, "SELL", sold, good.sell_price);
        state.agent.credits += tx.total_price;
        Ok(TradeData {
            agent: state.agent.clone(),
            cargo,
            transaction: tx,
        })
    }

    async fn create_survey(&self, ship_symbol: &str) -> Result<SurveyData, ApiError> {
        let state = self.begin("create_survey")?;
        Ok(SurveyData {
            cooldown: cooldown(ship_symbol, 0),
            surveys: state.surveys.clone(),
        })
    }

    async fn extract_resources(&self, ship_symbol: &str, survey: Option<&Survey>) -> Result<ExtractionData, ApiError> {
        let endpoint = if survey.is_some() { "extract_survey" } else { "extract" };
        let mut state = self.begin(endpoint)?;
        let (good, per_extraction) = state.extraction.clone();
        let seconds = state.extraction_cooldown;
        let ship = state.ships.get_mut(ship_symbol).ok_or_else(|| missing(ship_symbol))?;
        let units = per_extraction.min(ship.cargo.free_space());
        ship.cargo
            .add(ship_symbol, &good, units)
            .map_err(|e| conflict(4228, &e.to_string()))?;
        Ok(ExtractionData {
            cooldown: cooldown(ship_symbol, seconds),
            extraction: ExtractionResult {
                ship_symbol: ship_symbol.to_string(),
                extraction_yield: ExtractionYield { symbol: good, units },
            },
            cargo: ship.cargo.clone(),
        })
    }

    async fn purchase_ship(&self, ship_type: &str, waypoint_symbol: &str) -> Result<ShipPurchaseData, ApiError> {
        let mut state = self.begin("purchase_ship")?;
        let price = state
            .shipyards
            .get(waypoint_symbol)
            .and_then(|y| y.price_of(ship_type))
            .ok_or_else(|| missing(ship_type))?;
        if state.agent.credits < price {
            return Err(conflict(4216, "insufficient credits"));
        }
        state.agent.credits -= price;
        let name = format!("NOVA_TEST-{}", state.ships.len() + 1);
        let mut bought = miner(&name, "HQ", 100, 30);
        bought.nav.waypoint_symbol = waypoint_symbol.to_string();
        state.ships.insert(name, bought.clone());
        Ok(ShipPurchaseData {
            agent: state.agent.clone(),
            ship: bought,
        })
    }
}
