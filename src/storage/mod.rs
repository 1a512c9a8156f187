// Storage module - token file and in-memory world state
pub mod token_store;
pub mod world_cache;

pub use token_store::TokenStore;
pub use world_cache::{ShipRecord, WorldCache};
