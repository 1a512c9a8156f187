// Task Executor - runs one ship's task step by step against the game API
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{GameApi, RetryPolicy};
use crate::config::FleetConfig;
use crate::error::{ApiError, ErrorKind, FleetError, Result};
use crate::models::{MarketSnapshot, NavStatus, Ship, ShipCooldown, ShipPhase, Step, Task};
use crate::operations::contract_manager::ContractManager;
use crate::operations::market_analyzer::MarketAnalyzer;
use crate::operations::mining::SurveyBook;
use crate::storage::WorldCache;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Net credits earned (negative when the task only spent)
    Completed { credits: i64 },
    /// The task stopped early; the ship is free for a new plan
    Failed { reason: String },
    /// Unrecoverable, automation must halt
    Aborted { reason: String },
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub ship: String,
    pub task: Task,
    pub outcome: TaskOutcome,
}

/// Shared handles every executor works against
#[derive(Clone)]
pub struct TaskExecutor {
    api: Arc<dyn GameApi>,
    cache: Arc<RwLock<WorldCache>>,
    analyzer: Arc<RwLock<MarketAnalyzer>>,
    contracts: Arc<RwLock<ContractManager>>,
    surveys: Arc<Mutex<SurveyBook>>,
    retry: RetryPolicy,
    top_up_on_dock: bool,
    max_extractions: u32,
}

fn cooldown_deadline(cooldown: &ShipCooldown) -> Option<DateTime<Utc>> {
    if cooldown.remaining_seconds <= 0 {
        return None;
    }
    Some(Utc::now() + chrono::Duration::seconds(cooldown.remaining_seconds as i64))
}

fn until(deadline: DateTime<Utc>) -> Duration {
    deadline.signed_duration_since(Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

impl TaskExecutor {
    pub fn new(
        api: Arc<dyn GameApi>,
        cache: Arc<RwLock<WorldCache>>,
        analyzer: Arc<RwLock<MarketAnalyzer>>,
        contracts: Arc<RwLock<ContractManager>>,
        surveys: Arc<Mutex<SurveyBook>>,
        config: &FleetConfig,
    ) -> Self {
        Self {
            api,
            cache,
            analyzer,
            contracts,
            surveys,
            retry: RetryPolicy::from_config(&config.retry),
            top_up_on_dock: config.fuel.top_up_on_dock,
            max_extractions: config.scheduler.max_extractions_per_run.max(1),
        }
    }

    /// Run `task` on its own tokio task and send the report when it ends
    pub fn spawn(self, task: Task, reports: mpsc::UnboundedSender<TaskReport>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let report = self.run(task).await;
            if reports.send(report).is_err() {
                debug!("Report channel closed");
            }
        })
    }

    /// Execute every step, then hand the ship back to Idle whatever happened
    pub async fn run(&self, task: Task) -> TaskReport {
        let ship = task.ship.clone();
        info!("🚀 {} starting {:?} at {} ({} steps)", ship, task.kind, task.target, task.steps.len());

        let outcome = match self.execute(&task).await {
            Ok(credits) => {
                info!("✅ {} finished {:?}: {} credits", ship, task.kind, credits);
                TaskOutcome::Completed { credits }
            }
            Err(err) if err.is_fatal() => {
                warn!("🛑 {} aborted {:?}: {}", ship, task.kind, err);
                TaskOutcome::Aborted {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                warn!("❌ {} failed {:?}: {}", ship, task.kind, err);
                TaskOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        self.cache.write().await.finish_task(&ship);
        TaskReport { ship, task, outcome }
    }

    async fn execute(&self, task: &Task) -> Result<i64> {
        let mut net = 0;
        for step in &task.steps {
            debug!("{} → {}", task.ship, step.label());
            net += match step {
                Step::Navigate { waypoint } => self.navigate(&task.ship, waypoint).await.map(|_| 0)?,
                Step::Dock => self.dock(&task.ship).await?,
                Step::Orbit => self.orbit(&task.ship).await.map(|_| 0)?,
                Step::Refuel => self.refuel(&task.ship).await?,
                Step::Buy { good, units } => self.buy(&task.ship, good, *units).await?,
                Step::Sell { good, units } => self.sell(&task.ship, good, *units).await?,
                Step::Extract { wanted } => self.extract(&task.ship, wanted).await.map(|_| 0)?,
                Step::Deliver {
                    contract_id,
                    good,
                    units,
                } => self.deliver(&task.ship, contract_id, good, *units).await.map(|_| 0)?,
                Step::Fulfill { contract_id } => self.fulfill(&task.ship, contract_id).await?,
            };
        }
        Ok(net)
    }

    /// Call the API, retrying what the error kind allows.
    ///
    /// Rate limits wait the server's delay, transient failures back off, and a
    /// conflict with a cooldown waits it out. Everything else surfaces at once.
    async fn call<T, F, Fut>(&self, ship: &str, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ApiError>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !self.retry.should_retry(attempts) {
                return Err(err.into());
            }

            let delay = match err.kind() {
                ErrorKind::RateLimited => match &err {
                    ApiError::RateLimited { retry_after, .. } => *retry_after,
                    _ => self.retry.next_delay(attempts),
                },
                ErrorKind::Transient => self.retry.next_delay(attempts),
                ErrorKind::Conflict => match err.cooldown() {
                    Some(cooldown) => {
                        self.cache.write().await.set_phase(ship, ShipPhase::CoolingDown)?;
                        cooldown
                    }
                    None => return Err(err.into()),
                },
                ErrorKind::Fatal => return Err(err.into()),
            };
            warn!(
                "🔄 {} {} attempt {} failed ({}), retrying in {:.1}s",
                ship,
                what,
                attempts,
                err,
                delay.as_secs_f64()
            );
            sleep(delay).await;
        }
    }

    async fn ship(&self, symbol: &str) -> Result<Ship> {
        self.cache
            .read()
            .await
            .ship(symbol)
            .map(|record| record.ship.clone())
            .ok_or_else(|| FleetError::UnknownShip(symbol.to_string()))
    }

    async fn orbit(&self, symbol: &str) -> Result<()> {
        if self.ship(symbol).await?.nav.status == NavStatus::InOrbit {
            return Ok(());
        }
        let nav = self.call(symbol, "orbit", || self.api.orbit_ship(symbol)).await?;
        self.cache.write().await.update_nav(symbol, nav)
    }

    async fn navigate(&self, symbol: &str, waypoint: &str) -> Result<()> {
        if self.ship(symbol).await?.location() == waypoint {
            return Ok(());
        }
        self.orbit(symbol).await?;
        self.cache.write().await.set_phase(symbol, ShipPhase::Navigating)?;

        let data = self
            .call(symbol, "navigate", || self.api.navigate_ship(symbol, waypoint))
            .await?;
        let arrival = DateTime::parse_from_rfc3339(&data.nav.route.arrival)
            .ok()
            .map(|t| t.with_timezone(&Utc));
        {
            let mut cache = self.cache.write().await;
            cache.update_fuel(symbol, data.fuel)?;
            cache.update_nav(symbol, data.nav.clone())?;
        }

        let travel = arrival.map(until).unwrap_or(Duration::ZERO);
        info!("🧭 {} en route to {} ({:.0}s)", symbol, waypoint, travel.as_secs_f64());
        sleep(travel).await;

        let mut nav = data.nav;
        nav.waypoint_symbol = waypoint.to_string();
        nav.status = NavStatus::InOrbit;
        self.cache.write().await.update_nav(symbol, nav)
    }

    /// Dock, record the local market and top up fuel where it is sold
    async fn dock(&self, symbol: &str) -> Result<i64> {
        let ship = self.ship(symbol).await?;
        if !ship.is_docked() {
            self.cache.write().await.set_phase(symbol, ShipPhase::Docking)?;
            let nav = self.call(symbol, "dock", || self.api.dock_ship(symbol)).await?;
            self.cache.write().await.update_nav(symbol, nav)?;
        }

        self.observe_market(&ship).await;

        let sells_fuel = self.analyzer.read().await.sells_fuel(ship.location());
        if self.top_up_on_dock && sells_fuel {
            return self.refuel(symbol).await;
        }
        Ok(0)
    }

    async fn observe_market(&self, ship: &Ship) {
        let is_market = self
            .cache
            .read()
            .await
            .waypoint(ship.location())
            .is_some_and(|wp| wp.is_marketplace());
        if !is_market {
            return;
        }

        match self
            .call(&ship.symbol, "market", || {
                self.api.get_market(&ship.nav.system_symbol, ship.location())
            })
            .await
        {
            Ok(market) => {
                if let Some(snapshot) = MarketSnapshot::from_market(&market, Utc::now()) {
                    self.analyzer.write().await.observe(snapshot);
                }
            }
            Err(err) => warn!("⚠️ Could not read market at {}: {}", ship.location(), err),
        }
    }

    async fn refuel(&self, symbol: &str) -> Result<i64> {
        let ship = self.ship(symbol).await?;
        if ship.is_probe() || ship.fuel.current >= ship.fuel.capacity {
            return Ok(0);
        }
        self.cache.write().await.set_phase(symbol, ShipPhase::Transacting)?;
        let data = self.call(symbol, "refuel", || self.api.refuel_ship(symbol)).await?;
        info!(
            "⛽ {} refueled to {}/{} for {} credits",
            symbol, data.fuel.current, data.fuel.capacity, data.transaction.total_price
        );
        let mut cache = self.cache.write().await;
        cache.update_fuel(symbol, data.fuel)?;
        cache.set_credits(data.agent.credits);
        Ok(-data.transaction.total_price)
    }

    /// Largest single transaction the local market allows for `good`
    async fn trade_volume(&self, waypoint: &str, good: &str) -> Option<i32> {
        self.analyzer
            .read()
            .await
            .snapshot(waypoint)
            .and_then(|s| s.quote(good))
            .map(|q| q.trade_volume)
            .filter(|v| *v > 0)
    }

    async fn buy(&self, symbol: &str, good: &str, units: i32) -> Result<i64> {
        let ship = self.ship(symbol).await?;
        let mut remaining = units.min(ship.cargo.free_space());
        if remaining <= 0 {
            debug!("{} has no room for {}", symbol, good);
            return Ok(0);
        }
        let batch = self.trade_volume(ship.location(), good).await.unwrap_or(remaining);

        self.cache.write().await.set_phase(symbol, ShipPhase::Transacting)?;
        let mut spent = 0;
        while remaining > 0 {
            let chunk = remaining.min(batch);
            let data = self
                .call(symbol, "purchase", || self.api.purchase_cargo(symbol, good, chunk))
                .await?;
            info!(
                "🛒 {} bought {} {} for {}",
                symbol, data.transaction.units, good, data.transaction.total_price
            );
            spent += data.transaction.total_price;
            remaining -= chunk;
            let mut cache = self.cache.write().await;
            cache.update_cargo(symbol, data.cargo)?;
            cache.set_credits(data.agent.credits);
        }
        Ok(-spent)
    }

    async fn sell(&self, symbol: &str, good: &str, units: i32) -> Result<i64> {
        let ship = self.ship(symbol).await?;
        let mut remaining = units.min(ship.cargo.units_of(good));
        if remaining <= 0 {
            return Ok(0);
        }
        let batch = self.trade_volume(ship.location(), good).await.unwrap_or(remaining);

        self.cache.write().await.set_phase(symbol, ShipPhase::Transacting)?;
        let mut earned = 0;
        while remaining > 0 {
            let chunk = remaining.min(batch);
            let data = self
                .call(symbol, "sell", || self.api.sell_cargo(symbol, good, chunk))
                .await?;
            info!(
                "💰 {} sold {} {} for {}",
                symbol, data.transaction.units, good, data.transaction.total_price
            );
            earned += data.transaction.total_price;
            remaining -= chunk;
            let mut cache = self.cache.write().await;
            cache.update_cargo(symbol, data.cargo)?;
            cache.set_credits(data.agent.credits);
        }
        Ok(earned)
    }

    async fn wait_for_cooldown(&self, symbol: &str) -> Result<()> {
        let deadline = self
            .cache
            .read()
            .await
            .ship(symbol)
            .and_then(|record| record.cooldown_until);
        let Some(deadline) = deadline else {
            return Ok(());
        };
        let wait = until(deadline);
        if !wait.is_zero() {
            self.cache.write().await.set_phase(symbol, ShipPhase::CoolingDown)?;
            debug!("⏳ {} cooling down for {:.0}s", symbol, wait.as_secs_f64());
            sleep(wait).await;
        }
        self.cache.write().await.set_cooldown(symbol, None)
    }

    async fn survey(&self, symbol: &str) -> Result<()> {
        self.wait_for_cooldown(symbol).await?;
        let data = self.call(symbol, "survey", || self.api.create_survey(symbol)).await?;
        info!("🔭 {} charted {} surveys", symbol, data.surveys.len());
        self.surveys.lock().await.add(data.surveys);
        self.cache
            .write()
            .await
            .set_cooldown(symbol, cooldown_deadline(&data.cooldown))
    }

    /// Extract until the hold is full or the run limit of attempts is reached
    async fn extract(&self, symbol: &str, wanted: &[String]) -> Result<()> {
        let mut extractions = 0;
        while extractions < self.max_extractions {
            let ship = self.ship(symbol).await?;
            if ship.cargo.is_full() {
                break;
            }

            let mut survey = {
                let mut book = self.surveys.lock().await;
                book.prune_expired(Utc::now());
                book.best_for(ship.location(), wanted, Utc::now())
            };
            if survey.is_none() && ship.has_surveyor() {
                self.survey(symbol).await?;
                survey = self.surveys.lock().await.best_for(ship.location(), wanted, Utc::now());
            }

            self.wait_for_cooldown(symbol).await?;
            self.cache.write().await.set_phase(symbol, ShipPhase::Transacting)?;
            // Attempts on an exhausted survey count against the run limit too
            extractions += 1;
            let result = self
                .call(symbol, "extract", || self.api.extract_resources(symbol, survey.as_ref()))
                .await;

            let data = match result {
                Ok(data) => data,
                Err(FleetError::Api(err)) if err.is_survey_exhausted() && survey.is_some() => {
                    if let Some(exhausted) = &survey {
                        debug!("🪨 Survey {} exhausted", exhausted.signature);
                        self.surveys.lock().await.discard(&exhausted.signature);
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };

            let yielded = &data.extraction.extraction_yield;
            info!(
                "⛏️ {} extracted {} {} ({}/{})",
                symbol, yielded.units, yielded.symbol, data.cargo.units, data.cargo.capacity
            );
            self.surveys.lock().await.record_extraction(yielded);
            let mut cache = self.cache.write().await;
            cache.update_cargo(symbol, data.cargo)?;
            cache.set_cooldown(symbol, cooldown_deadline(&data.cooldown))?;
        }
        Ok(())
    }

    async fn deliver(&self, symbol: &str, contract_id: &str, good: &str, units: i32) -> Result<()> {
        let held = self.ship(symbol).await?.cargo.units_of(good);
        let owed = self.contracts.read().await.remaining(contract_id, good);
        let units = units.min(held).min(owed);
        if units <= 0 {
            debug!("{} has nothing to deliver for {}", symbol, contract_id);
            return Ok(());
        }

        self.cache.write().await.set_phase(symbol, ShipPhase::Transacting)?;
        let data = self
            .call(symbol, "deliver", || {
                self.api.deliver_contract(contract_id, symbol, good, units)
            })
            .await?;
        info!("📦 {} delivered {} {} for {}", symbol, units, good, contract_id);
        self.cache.write().await.update_cargo(symbol, data.cargo)?;
        self.contracts.write().await.record_delivery(data.contract)
    }

    /// Fulfill once every delivery is in; otherwise a no-op
    async fn fulfill(&self, symbol: &str, contract_id: &str) -> Result<i64> {
        if !self.contracts.read().await.is_complete(contract_id) {
            return Ok(0);
        }
        self.cache.write().await.set_phase(symbol, ShipPhase::Transacting)?;
        let data = self
            .call(symbol, "fulfill", || self.api.fulfill_contract(contract_id))
            .await?;
        let payment = data.contract.terms.payment.on_fulfilled;
        self.cache.write().await.set_credits(data.agent.credits);
        self.contracts.write().await.mark_fulfilled(data.contract)?;
        Ok(payment)
    }
}
