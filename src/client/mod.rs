// Client module - SpaceTraders API gateway
pub mod api;
pub mod rate_limiter;
pub mod retry;

pub use api::{GameApi, SpaceTradersClient};
pub use rate_limiter::RateGate;
pub use retry::RetryPolicy;
