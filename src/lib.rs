// SpaceTraders Fleet Library
// Scheduling, execution and bookkeeping for an autonomous SpaceTraders fleet

pub mod models;
pub mod client;
pub mod operations;
pub mod storage;
pub mod admiral;
pub mod config;
pub mod error;
pub mod registration;

// Re-export commonly used types
pub use models::{
    ship::{Ship, ShipNav, ShipCargo, CargoItem},
    contract::{Contract, ContractStatus, DeliveryItem},
    waypoint::Waypoint,
    task::{Step, Task, TaskKind},
};

pub use client::{GameApi, RateGate, SpaceTradersClient};
pub use admiral::Admiral;
pub use config::{ConfigManager, FleetConfig};
pub use error::{ApiError, ErrorKind, FleetError, Result};

// Constants
pub const API_BASE_URL: &str = "https://api.spacetraders.io/v2";
pub const AGENT_TOKEN_FILE: &str = "AGENT_TOKEN";
