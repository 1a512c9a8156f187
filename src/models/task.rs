// Tasks handed from the scheduler to ship executors
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Trade,
    Mine,
    Deliver,
    Refuel,
    Reposition,
}

/// Execution phase of a ship, written by its executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShipPhase {
    #[default]
    Idle,
    Navigating,
    Docking,
    Transacting,
    CoolingDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    Navigate { waypoint: String },
    Dock,
    Orbit,
    Refuel,
    Buy { good: String, units: i32 },
    Sell { good: String, units: i32 },
    /// Extract repeatedly until the hold is full or the run limit is hit
    Extract { wanted: Vec<String> },
    Deliver { contract_id: String, good: String, units: i32 },
    Fulfill { contract_id: String },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::Navigate { .. } => "navigate",
            Step::Dock => "dock",
            Step::Orbit => "orbit",
            Step::Refuel => "refuel",
            Step::Buy { .. } => "buy",
            Step::Sell { .. } => "sell",
            Step::Extract { .. } => "extract",
            Step::Deliver { .. } => "deliver",
            Step::Fulfill { .. } => "fulfill",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub ship: String,
    pub kind: TaskKind,
    pub target: String,
    /// Estimated net credits
    pub expected_profit: i64,
    pub estimated_seconds: u64,
    pub steps: Vec<Step>,
}

impl Task {
    pub fn profit_per_second(&self) -> f64 {
        self.expected_profit as f64 / self.estimated_seconds.max(1) as f64
    }
}
