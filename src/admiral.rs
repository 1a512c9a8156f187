// Admiral module - the fleet control loop tying cache, planning and executors together
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::GameApi;
use crate::config::{ConfigManager, FleetConfig};
use crate::error::{FleetError, Result};
use crate::models::{MarketSnapshot, ShipPhase};
use crate::operations::{
    ContractManager, FleetExpansion, FleetScheduler, MarketAnalyzer, PlanInput, SurveyBook, TaskExecutor,
    TaskOutcome, TaskReport,
};
use crate::storage::WorldCache;

/// What one pass of the control loop did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    pub assigned: usize,
    pub busy: usize,
    pub accepted_contracts: usize,
    pub purchased_ships: usize,
}

/// Totals over the Admiral's lifetime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetStats {
    pub cycles: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub net_credits: i64,
}

pub struct Admiral {
    api: Arc<dyn GameApi>,
    config: FleetConfig,
    config_manager: Option<ConfigManager>,
    cache: Arc<RwLock<WorldCache>>,
    analyzer: Arc<RwLock<MarketAnalyzer>>,
    contracts: Arc<RwLock<ContractManager>>,
    surveys: Arc<Mutex<SurveyBook>>,
    scheduler: FleetScheduler,
    expansion: FleetExpansion,
    reports_tx: mpsc::UnboundedSender<TaskReport>,
    reports_rx: mpsc::UnboundedReceiver<TaskReport>,
    in_flight: usize,
    stats: FleetStats,
}

impl Admiral {
    pub fn new(api: Arc<dyn GameApi>, config: FleetConfig) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let cache = WorldCache::new(
            config.caching.world_staleness_seconds,
            config.caching.waypoint_staleness_minutes,
        );
        Self {
            api,
            cache: Arc::new(RwLock::new(cache)),
            analyzer: Arc::new(RwLock::new(MarketAnalyzer::new(&config))),
            contracts: Arc::new(RwLock::new(ContractManager::new(&config))),
            surveys: Arc::new(Mutex::new(SurveyBook::new())),
            scheduler: FleetScheduler::new(&config),
            expansion: FleetExpansion::new(&config),
            config,
            config_manager: None,
            reports_tx,
            reports_rx,
            in_flight: 0,
            stats: FleetStats::default(),
        }
    }

    /// Build from a hot-reloadable config file
    pub fn with_config_manager(api: Arc<dyn GameApi>, manager: ConfigManager) -> Self {
        let mut admiral = Self::new(api, manager.config().clone());
        admiral.config_manager = Some(manager);
        admiral
    }

    pub fn cache(&self) -> Arc<RwLock<WorldCache>> {
        Arc::clone(&self.cache)
    }

    pub fn analyzer(&self) -> Arc<RwLock<MarketAnalyzer>> {
        Arc::clone(&self.analyzer)
    }

    pub fn contracts(&self) -> Arc<RwLock<ContractManager>> {
        Arc::clone(&self.contracts)
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn stats(&self) -> &FleetStats {
        &self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    async fn apply_config(&mut self, config: FleetConfig) {
        self.scheduler.apply_config(&config);
        self.expansion.apply_config(&config);
        self.analyzer.write().await.apply_config(&config);
        self.contracts.write().await.apply_config(&config);
        self.config = config;
    }

    async fn reload_config(&mut self) {
        let reloaded = match self.config_manager.as_mut() {
            Some(manager) => {
                if !manager.check_and_reload() {
                    return;
                }
                manager.config().clone()
            }
            None => return,
        };
        self.apply_config(reloaded).await;
    }

    /// Pull agent, ships and waypoints from the API when the cache has gone stale
    pub async fn refresh(&self, force: bool) -> Result<()> {
        let now = Utc::now();
        if !force && !self.cache.read().await.is_stale(now) {
            return Ok(());
        }

        let agent = self.api.get_agent().await?;
        let ships = self.api.list_ships().await?;
        debug!("🔄 Refreshed {} with {} ships", agent.symbol, ships.len());
        let systems = {
            let mut cache = self.cache.write().await;
            cache.set_agent(agent);
            cache.refresh_ships(ships, now);
            cache
                .occupied_systems()
                .into_iter()
                .filter(|system| cache.needs_waypoints(system, now))
                .collect::<Vec<_>>()
        };

        for system in systems {
            let waypoints = self.api.list_waypoints(&system).await?;
            info!("🗺️ Scanned {} waypoints in {}", waypoints.len(), system);
            self.cache.write().await.set_system_waypoints(&system, waypoints, now);
        }
        Ok(())
    }

    /// Read prices at every marketplace where an idle ship sits and the snapshot is stale
    pub async fn observe_markets(&self) -> Result<usize> {
        let now = Utc::now();
        let mut targets: Vec<(String, String)> = {
            let cache = self.cache.read().await;
            let analyzer = self.analyzer.read().await;
            cache
                .available_ships(now)
                .into_iter()
                .map(|r| (r.ship.nav.system_symbol.clone(), r.ship.location().to_string()))
                .filter(|(_, wp)| cache.waypoint(wp).is_some_and(|w| w.is_marketplace()))
                .filter(|(_, wp)| !analyzer.is_fresh(wp, now))
                .collect()
        };
        targets.sort();
        targets.dedup();

        let mut observed = 0;
        for (system, waypoint) in targets {
            match self.api.get_market(&system, &waypoint).await {
                Ok(market) => {
                    if let Some(snapshot) = MarketSnapshot::from_market(&market, Utc::now()) {
                        if self.analyzer.write().await.observe(snapshot) {
                            observed += 1;
                        }
                    }
                }
                Err(err) => {
                    let err = FleetError::from(err);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    warn!("⚠️ Could not read market {}: {}", waypoint, err);
                }
            }
        }
        Ok(observed)
    }

    /// Sync, expire, accept worthwhile offers and negotiate when idle.
    ///
    /// Returns the number of contracts accepted.
    pub async fn manage_contracts(&self) -> Result<usize> {
        let now = Utc::now();
        let remote = self.api.list_contracts().await?;
        let offered = {
            let mut contracts = self.contracts.write().await;
            contracts.sync(remote, now);
            contracts.expire_overdue(now);
            contracts
                .offered()
                .into_iter()
                .map(|t| t.contract.clone())
                .collect::<Vec<_>>()
        };

        let fleet_capacity: i32 = self
            .cache
            .read()
            .await
            .ships()
            .iter()
            .map(|r| r.ship.cargo.capacity)
            .sum();

        let mut accepted = 0;
        for contract in offered {
            let evaluation = {
                let contracts = self.contracts.read().await;
                let analyzer = self.analyzer.read().await;
                contracts.evaluate_offer(&contract, &analyzer, fleet_capacity, now)
            };
            if !evaluation.accept {
                debug!("📋 Skipping contract {}: {}", contract.id, evaluation.reason);
                continue;
            }

            info!("📋 Accepting contract {}: {}", contract.id, evaluation.reason);
            let data = self.api.accept_contract(&contract.id).await?;
            self.cache.write().await.set_credits(data.agent.credits);
            self.contracts.write().await.mark_accepted(data.contract)?;
            accepted += 1;
        }

        let nothing_open = {
            let contracts = self.contracts.read().await;
            contracts.active().is_empty() && contracts.offered().is_empty()
        };
        if nothing_open && self.config.contracts.auto_negotiate {
            self.negotiate().await?;
        }
        Ok(accepted)
    }

    async fn negotiate(&self) -> Result<()> {
        let negotiator = self
            .cache
            .read()
            .await
            .available_ships(Utc::now())
            .into_iter()
            .find(|r| r.ship.is_docked())
            .map(|r| r.ship.symbol);
        let Some(ship) = negotiator else {
            debug!("🤝 No docked idle ship to negotiate a contract");
            return Ok(());
        };

        match self.api.negotiate_contract(&ship).await {
            Ok(contract) => {
                info!("🤝 {} negotiated contract {}", ship, contract.id);
                self.contracts.write().await.sync(vec![contract], Utc::now());
                Ok(())
            }
            Err(err) => {
                let err = FleetError::from(err);
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("⚠️ {} could not negotiate a contract: {}", ship, err);
                Ok(())
            }
        }
    }

    /// Plan and dispatch tasks for every idle ship
    pub async fn dispatch(&mut self) -> Result<usize> {
        let now = Utc::now();
        let expected_yield = self
            .surveys
            .lock()
            .await
            .expected_yield(self.config.scheduler.default_extraction_yield);

        let tasks = {
            let cache = self.cache.read().await;
            let analyzer = self.analyzer.read().await;
            let contracts = self.contracts.read().await;
            let ships = cache.ships();
            let waypoints = cache.waypoints();
            let input = PlanInput {
                ships: &ships,
                analyzer: &analyzer,
                contracts: &contracts,
                waypoints: &waypoints,
                credits: cache.credits(),
                expected_yield,
                now,
            };
            self.scheduler.plan(&input)
        };

        let mut assigned = 0;
        for task in tasks {
            if let Err(err) = self.cache.write().await.assign_task(task.clone()) {
                warn!("⚠️ Not dispatching task for {}: {}", task.ship, err);
                continue;
            }
            let executor = TaskExecutor::new(
                Arc::clone(&self.api),
                Arc::clone(&self.cache),
                Arc::clone(&self.analyzer),
                Arc::clone(&self.contracts),
                Arc::clone(&self.surveys),
                &self.config,
            );
            executor.spawn(task, self.reports_tx.clone());
            self.in_flight += 1;
            assigned += 1;
        }
        Ok(assigned)
    }

    /// Fold a finished task into the stats; an aborted task halts the loop
    pub async fn handle_report(&mut self, report: TaskReport) -> Result<()> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match report.outcome {
            TaskOutcome::Completed { credits } => {
                self.stats.tasks_completed += 1;
                self.stats.net_credits += credits;
                debug!("📈 {} {:?} netted {} credits", report.ship, report.task.kind, credits);
            }
            TaskOutcome::Failed { reason } => {
                self.stats.tasks_failed += 1;
                warn!("🔁 {} will be rescheduled after failure: {}", report.ship, reason);
                self.cache.write().await.mark_stale();
            }
            TaskOutcome::Aborted { reason } => {
                error!("🛑 {} aborted: {}", report.ship, reason);
                return Err(FleetError::Halted(reason));
            }
        }
        Ok(())
    }

    fn drain_reports(&mut self) -> Vec<TaskReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.reports_rx.try_recv() {
            reports.push(report);
        }
        reports
    }

    /// One pass: refresh, observe, contracts, expansion, then dispatch
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        for report in self.drain_reports() {
            self.handle_report(report).await?;
        }

        // STEP 1: world state
        self.refresh(false).await?;
        let pruned = self.surveys.lock().await.prune_expired(Utc::now());
        if pruned > 0 {
            debug!("🔭 Dropped {} expired surveys", pruned);
        }

        // STEP 2: markets
        let observed = self.observe_markets().await?;
        if observed > 0 {
            info!("📈 Observed {} markets", observed);
        }

        // STEP 3: contracts
        let accepted_contracts = self.manage_contracts().await?;

        // STEP 4: fleet expansion
        let purchased_ships = match self.expansion.expand(self.api.as_ref(), &self.cache).await? {
            Some(_) => 1,
            None => 0,
        };

        // STEP 5: plan and dispatch
        let assigned = self.dispatch().await?;
        let busy = self.cache.read().await.busy_count();

        self.stats.cycles += 1;
        Ok(CycleSummary {
            assigned,
            busy,
            accepted_contracts,
            purchased_ships,
        })
    }

    /// Wait for every dispatched task to report back
    pub async fn wait_for_tasks(&mut self) -> Result<()> {
        while self.in_flight > 0 {
            match self.reports_rx.recv().await {
                Some(report) => self.handle_report(report).await?,
                None => break,
            }
        }
        Ok(())
    }

    /// Run cycles until Ctrl-C, a fatal error, or `max_cycles` passes
    pub async fn run(&mut self, max_cycles: Option<u64>) -> Result<()> {
        info!("🎖️ Admiral starting fleet operations");
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;
            self.reload_config().await;
            info!("🔄 ═══════ CYCLE #{} ═══════", cycle);

            let delay = match self.run_cycle().await {
                Ok(summary) => {
                    info!(
                        "✅ Cycle #{}: {} tasks dispatched, {} ships busy",
                        cycle, summary.assigned, summary.busy
                    );
                    self.config.cycle_delay()
                }
                Err(err) if err.is_fatal() => {
                    error!("🛑 Cycle #{} hit a fatal error: {}", cycle, err);
                    return Err(err);
                }
                Err(err) => {
                    warn!("❌ Cycle #{} failed: {}", cycle, err);
                    self.config.error_delay()
                }
            };

            if max_cycles.is_some_and(|max| cycle >= max) {
                info!("🏁 Completed {} cycles, waiting for running tasks", cycle);
                return self.wait_for_tasks().await;
            }

            let pause = sleep(delay);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    _ = &mut pause => break,
                    Some(report) = self.reports_rx.recv() => {
                        self.handle_report(report).await?;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("🛑 Ctrl-C received, stopping after {} cycles", cycle);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Print the agent, fleet and contract picture
    pub async fn print_status(&self) -> Result<()> {
        self.refresh(true).await?;
        let remote = self.api.list_contracts().await?;
        self.contracts.write().await.sync(remote, Utc::now());

        let cache = self.cache.read().await;
        if let Some(agent) = cache.agent() {
            println!("📊 Agent {}", agent.symbol);
            println!("  Headquarters: {}", agent.headquarters);
            println!("  Credits: {}", agent.credits);
            println!("  Faction: {}", agent.starting_faction);
        }

        let ships = cache.ships();
        println!("\n🚢 Fleet ({} ships)", ships.len());
        for record in &ships {
            let ship = &record.ship;
            let role = if ship.is_probe() {
                "probe"
            } else if ship.has_mining_mount() {
                "miner"
            } else {
                "hauler"
            };
            let phase = if record.phase == ShipPhase::Idle { "" } else { " (busy)" };
            println!(
                "  {} [{}] at {} {:?}{} fuel {}/{} cargo {}/{}",
                ship.symbol,
                role,
                ship.location(),
                ship.nav.status,
                phase,
                ship.fuel.current,
                ship.fuel.capacity,
                ship.cargo.units,
                ship.cargo.capacity
            );
            for item in &ship.cargo.inventory {
                println!("      {} x{}", item.symbol, item.units);
            }
        }

        let contracts = self.contracts.read().await;
        let all = contracts.all();
        println!("\n📋 Contracts ({})", all.len());
        for tracked in all {
            println!(
                "  {} {:?} payout {}",
                tracked.contract.id,
                tracked.status,
                tracked.contract.total_payment()
            );
            for item in &tracked.contract.terms.deliver {
                println!(
                    "      {} {}/{} to {}",
                    item.trade_symbol, item.units_fulfilled, item.units_required, item.destination_symbol
                );
            }
        }
        Ok(())
    }
}
