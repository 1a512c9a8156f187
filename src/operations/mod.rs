// Operations module - planning, execution and bookkeeping for the fleet

pub mod navigation;
pub mod market_analyzer;
pub mod contract_manager;
pub mod mining;
pub mod scheduler;
pub mod executor;
pub mod shipyard;

pub use navigation::{FlightMode, Leg, NavigationPlanner};
pub use market_analyzer::{MarketAnalyzer, MarketInsight, Recommendation, TradeCandidate};
pub use contract_manager::{ContractManager, DeliveryNeed, OfferEvaluation, TrackedContract};
pub use mining::{ExtractionStats, SurveyBook};
pub use scheduler::{FleetScheduler, PlanInput};
pub use executor::{TaskExecutor, TaskOutcome, TaskReport};
pub use shipyard::{FleetExpansion, PurchasePlan};
