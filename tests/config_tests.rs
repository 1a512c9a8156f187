use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use spacetraders_fleet::config::{ConfigManager, FleetConfig};
use spacetraders_fleet::error::FleetError;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("spacetraders_fleet_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir.join("fleet.toml")
}

/// Write `content` and push the mtime forward so the change is always visible
fn rewrite(path: &PathBuf, content: &str, offset_secs: u64) {
    fs::write(path, content).expect("write config");
    let file = fs::File::options().write(true).open(path).expect("open config");
    file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
        .expect("set mtime");
}

#[test]
fn test_missing_file_creates_defaults() {
    let path = scratch("defaults");

    let config = FleetConfig::load_or_create(&path).expect("defaults load");

    assert!(path.exists(), "default config written to disk");
    assert_eq!(config.fuel.refuel_threshold, 0.2);
    assert_eq!(config.fuel.default_fuel_price, 72);
    assert_eq!(config.scheduler.flight_mode, "CRUISE");
    assert!(config.validate().is_ok());

    let reloaded = FleetConfig::load_or_create(&path).expect("saved file loads");
    assert_eq!(reloaded.retry.max_attempts, config.retry.max_attempts);
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let path = scratch("partial");
    fs::write(&path, "[fuel]\nrefuel_threshold = 0.35\n\n[contracts]\nmax_active = 2\n").expect("write config");

    let config = FleetConfig::load_or_create(&path).expect("partial config loads");

    assert_eq!(config.fuel.refuel_threshold, 0.35);
    assert_eq!(config.contracts.max_active, 2);
    assert!(config.fuel.top_up_on_dock, "unspecified keys keep their defaults");
    assert_eq!(config.rate_limit.burst, 30);
}

#[test]
fn test_malformed_file_is_an_error() {
    let path = scratch("malformed");
    fs::write(&path, "[fuel\nrefuel_threshold = ").expect("write config");

    let result = FleetConfig::load_or_create(&path);
    assert!(matches!(result, Err(FleetError::TomlDe(_))), "got {:?}", result.map(|_| ()));
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = FleetConfig::default();
    config.fuel.refuel_threshold = 1.5;
    assert!(matches!(config.validate(), Err(FleetError::Config(_))));

    let mut config = FleetConfig::default();
    config.scheduler.flight_mode = "WARP".to_string();
    assert!(config.validate().is_err(), "unknown flight mode");

    let mut config = FleetConfig::default();
    config.retry.max_attempts = 0;
    assert!(config.validate().is_err(), "at least one attempt");

    let mut config = FleetConfig::default();
    config.contracts.max_active = 0;
    assert!(config.validate().is_err());

    let mut config = FleetConfig::default();
    config.rate_limit.per_second = 0.0;
    assert!(config.validate().is_err());

    let mut config = FleetConfig::default();
    config.scheduler.flight_mode = "burn".to_string();
    assert!(config.validate().is_ok(), "flight modes are case-insensitive");
}

#[test]
fn test_manager_reloads_changed_file() {
    let path = scratch("reload");
    let mut manager = ConfigManager::new(&path).expect("manager starts from defaults");
    assert_eq!(manager.config().timing.main_cycle_delay_seconds, 30);
    assert!(!manager.reload_if_modified(), "nothing changed yet");

    rewrite(&path, "[timing]\nmain_cycle_delay_seconds = 5\n", 10);

    assert!(manager.reload_if_modified());
    assert_eq!(manager.config().timing.main_cycle_delay_seconds, 5);
    assert!(!manager.reload_if_modified(), "same mtime is not reloaded twice");
    println!("✅ Config hot-reload test passed");
}

#[test]
fn test_invalid_reload_keeps_current_config() {
    let path = scratch("invalid_reload");
    let mut manager = ConfigManager::new(&path).expect("manager starts from defaults");

    rewrite(&path, "[fuel]\nrefuel_threshold = 3.0\n", 10);

    assert!(!manager.reload_if_modified(), "invalid config is not applied");
    assert_eq!(manager.config().fuel.refuel_threshold, 0.2);

    rewrite(&path, "[fuel]\nrefuel_threshold = 0.5\n", 20);
    assert!(manager.reload_if_modified(), "a later valid edit is picked up");
    assert_eq!(manager.config().fuel.refuel_threshold, 0.5);
}

#[test]
fn test_reload_check_respects_interval() {
    let path = scratch("interval");
    let mut manager = ConfigManager::new(&path).expect("manager starts from defaults");

    rewrite(&path, "[timing]\nmain_cycle_delay_seconds = 7\n", 10);

    assert!(!manager.check_and_reload(), "the 30s interval has not elapsed");
    assert_eq!(manager.config().timing.main_cycle_delay_seconds, 30);
}
