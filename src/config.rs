use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::error::{FleetError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub fleet: FleetExpansionConfig,
    pub fuel: FuelConfig,
    pub market: MarketConfig,
    pub scheduler: SchedulerConfig,
    pub contracts: ContractConfig,
    pub timing: TimingConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub api: ApiConfig,
    pub caching: CachingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetExpansionConfig {
    /// Buy ships automatically when the other conditions hold
    pub auto_purchase: bool,
    /// Credits that must remain after paying for a new ship
    pub min_credits_for_ship_purchase: i64,
    /// Maximum number of mining ships to maintain
    pub max_mining_ships: usize,
    /// Shipyard type symbol to buy
    pub purchase_ship_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelConfig {
    /// Fuel fraction below which ships are sent to refuel (0.0 to 1.0)
    pub refuel_threshold: f64,
    /// Extra fuel units kept in reserve on every leg
    pub fuel_safety_margin: i32,
    /// Credits per 100 fuel units when no market has been observed selling FUEL
    pub default_fuel_price: i64,
    /// Refuel whenever a ship docks at a market that sells FUEL
    pub top_up_on_dock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Snapshots older than this are ignored for planning
    pub snapshot_max_age_minutes: i64,
    /// Price history window for trend calculations
    pub history_window_hours: i64,
    /// Normalized trend above which a good is flagged for selling
    pub trend_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Estimated seconds spent per dock, buy or sell call
    pub transaction_seconds: u64,
    /// Assumed cooldown between extractions when planning mining runs
    pub extraction_cooldown_seconds: u64,
    /// Assumed units per extraction until history says otherwise
    pub default_extraction_yield: f64,
    /// Credits per mined unit used to value a mining run
    pub mining_unit_value: i64,
    /// Upper bound on extractions in one mining task
    pub max_extractions_per_run: u32,
    /// Send ships with nothing profitable to unobserved markets
    pub allow_reposition: bool,
    /// Flight mode used for all planned legs
    pub flight_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Minimum total payout worth accepting
    pub min_payout: i64,
    /// Concurrently accepted contracts
    pub max_active: usize,
    /// Negotiate a new contract when none is offered or active
    pub auto_negotiate: bool,
    /// Unit price assumed for goods never seen on a market
    pub unknown_good_price: i64,
    /// Fuel units budgeted per delivery trip
    pub fuel_per_trip: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Main cycle delay in seconds
    pub main_cycle_delay_seconds: u64,
    /// Retry delay after a failed cycle in seconds
    pub error_retry_delay_seconds: u64,
    /// Config hot-reload check interval in seconds
    pub config_reload_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub burst: u32,
    pub per_second: f64,
    /// Growth of the 429 pause multiplier per consecutive rate-limit
    pub backoff_growth: f64,
    pub max_backoff_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    /// World state older than this is refreshed before planning
    pub world_staleness_seconds: i64,
    /// Waypoint lists are refreshed far less often
    pub waypoint_staleness_minutes: i64,
}

impl Default for FleetExpansionConfig {
    fn default() -> Self {
        Self {
            auto_purchase: false,
            min_credits_for_ship_purchase: 150000,
            max_mining_ships: 5,
            purchase_ship_type: "SHIP_MINING_DRONE".to_string(),
        }
    }
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            refuel_threshold: 0.2, // 20%
            fuel_safety_margin: 0,
            default_fuel_price: 72,
            top_up_on_dock: true,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            snapshot_max_age_minutes: 60,
            history_window_hours: 24,
            trend_threshold: 0.5,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            transaction_seconds: 5,
            extraction_cooldown_seconds: 70,
            default_extraction_yield: 5.0,
            mining_unit_value: 20,
            max_extractions_per_run: 20,
            allow_reposition: true,
            flight_mode: "CRUISE".to_string(),
        }
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            min_payout: 1000,
            max_active: 1,
            auto_negotiate: true,
            unknown_good_price: 100,
            fuel_per_trip: 100,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            main_cycle_delay_seconds: 30,
            error_retry_delay_seconds: 60,
            config_reload_interval_seconds: 30,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: 30,
            per_second: 2.0,
            backoff_growth: 1.5,
            max_backoff_multiplier: 5.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30000,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::API_BASE_URL.to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            world_staleness_seconds: 300,
            waypoint_staleness_minutes: 60,
        }
    }
}

impl FleetConfig {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create(config_path: impl AsRef<Path>) -> Result<Self> {
        let path = config_path.as_ref();
        if path.exists() {
            info!("📋 Loading configuration from {}", path.display());
            let config_str = fs::read_to_string(path)?;
            let config: FleetConfig = toml::from_str(&config_str)?;
            Ok(config)
        } else {
            info!("📋 Creating default configuration at {}", path.display());
            let config = FleetConfig::default();
            config.save(path)?;
            info!("💡 Edit {} to customize fleet behavior", path.display());
            Ok(config)
        }
    }

    pub fn save(&self, config_path: impl AsRef<Path>) -> Result<()> {
        let path = config_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(FleetError::Config(msg.to_string()));

        if !(0.0..=1.0).contains(&self.fuel.refuel_threshold) {
            return invalid("fuel.refuel_threshold must be between 0.0 and 1.0");
        }
        if self.fuel.default_fuel_price <= 0 {
            return invalid("fuel.default_fuel_price must be positive");
        }
        if self.fleet.min_credits_for_ship_purchase < 0 {
            return invalid("fleet.min_credits_for_ship_purchase must not be negative");
        }
        if self.timing.main_cycle_delay_seconds == 0 {
            return invalid("timing.main_cycle_delay_seconds must be greater than 0");
        }
        if self.rate_limit.burst == 0 || self.rate_limit.per_second <= 0.0 {
            return invalid("rate_limit.burst and rate_limit.per_second must be positive");
        }
        if self.rate_limit.backoff_growth < 1.0 || self.rate_limit.max_backoff_multiplier < 1.0 {
            return invalid("rate_limit backoff factors must be at least 1.0");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.retry.multiplier < 1.0 {
            return invalid("retry.multiplier must be at least 1.0");
        }
        if crate::operations::navigation::FlightMode::parse(&self.scheduler.flight_mode).is_none() {
            return invalid("scheduler.flight_mode must be CRUISE, DRIFT, BURN or STEALTH");
        }
        if self.contracts.max_active == 0 {
            return invalid("contracts.max_active must be at least 1");
        }

        Ok(())
    }

    pub fn print_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("   ⛽ Refuel threshold: {:.1}%", self.fuel.refuel_threshold * 100.0);
        info!("   ⏰ Cycle delay: {}s", self.timing.main_cycle_delay_seconds);
        info!(
            "   🚦 Rate limit: {} burst, {}/s",
            self.rate_limit.burst, self.rate_limit.per_second
        );
        info!("   🔁 Retry attempts: {}", self.retry.max_attempts);
        info!("   🔄 Config reload: {}s", self.timing.config_reload_interval_seconds);
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.timing.main_cycle_delay_seconds)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_secs(self.timing.error_retry_delay_seconds)
    }
}

/// Hot-reloadable configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config: FleetConfig,
    config_path: PathBuf,
    last_modified: Option<SystemTime>,
    last_reload_check: SystemTime,
}

impl ConfigManager {
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();
        let config = FleetConfig::load_or_create(&config_path)?;
        config.validate()?;
        config.print_summary();

        let last_modified = fs::metadata(&config_path)
            .and_then(|m| m.modified())
            .ok();

        Ok(Self {
            config,
            config_path,
            last_modified,
            last_reload_check: SystemTime::now(),
        })
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Reload if the check interval has passed and the file changed on disk
    pub fn check_and_reload(&mut self) -> bool {
        let now = SystemTime::now();
        let reload_interval = Duration::from_secs(self.config.timing.config_reload_interval_seconds);

        if now.duration_since(self.last_reload_check).unwrap_or_default() < reload_interval {
            return false;
        }
        self.last_reload_check = now;
        self.reload_if_modified()
    }

    /// Reload immediately if the file's modification time differs from the last load
    pub fn reload_if_modified(&mut self) -> bool {
        let modified = match fs::metadata(&self.config_path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        if Some(modified) == self.last_modified {
            return false;
        }
        self.reload_config(modified)
    }

    fn reload_config(&mut self, new_modified_time: SystemTime) -> bool {
        let new_config = match FleetConfig::load_or_create(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("⚠️ Failed to reload configuration, keeping current config: {}", e);
                return false;
            }
        };
        if let Err(e) = new_config.validate() {
            warn!("⚠️ Invalid configuration detected, keeping current config: {}", e);
            self.last_modified = Some(new_modified_time);
            return false;
        }

        let before = self.describe();
        self.config = new_config;
        self.last_modified = Some(new_modified_time);
        let after = self.describe();

        info!("🔄 Configuration reloaded successfully!");
        if before != after {
            info!("   📝 Changes: {} → {}", before, after);
        }
        true
    }

    fn describe(&self) -> String {
        format!(
            "cycle: {}s, refuel: {:.2}, retry: {}",
            self.config.timing.main_cycle_delay_seconds,
            self.config.fuel.refuel_threshold,
            self.config.retry.max_attempts
        )
    }
}
