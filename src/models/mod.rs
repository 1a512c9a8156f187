// Models module - API wire types and fleet domain types

pub mod ship;
pub mod contract;
pub mod market;
pub mod waypoint;
pub mod transaction;
pub mod responses;
pub mod task;

pub use ship::*;
pub use contract::*;
pub use market::*;
pub use waypoint::*;
pub use transaction::*;
pub use responses::*;
pub use task::*;
