use serde::{Deserialize, Serialize};

// Mining and Survey structures
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Survey {
    pub signature: String,
    pub symbol: String,
    pub deposits: Vec<SurveyDeposit>,
    pub expiration: String,
    pub size: String,
}

impl Survey {
    pub fn size_rank(&self) -> u8 {
        match self.size.as_str() {
            "LARGE" => 3,
            "MODERATE" => 2,
            "SMALL" => 1,
            _ => 0,
        }
    }

    pub fn deposits_of(&self, good: &str) -> usize {
        self.deposits.iter().filter(|d| d.symbol == good).count()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SurveyDeposit {
    pub symbol: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SurveyData {
    pub cooldown: crate::models::ShipCooldown,
    pub surveys: Vec<Survey>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionData {
    pub cooldown: crate::models::ShipCooldown,
    pub extraction: ExtractionResult,
    pub cargo: crate::models::ShipCargo,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionResult {
    #[serde(rename = "shipSymbol")]
    pub ship_symbol: String,
    #[serde(rename = "yield")]
    pub extraction_yield: ExtractionYield,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExtractionYield {
    pub symbol: String,
    pub units: i32,
}

// Refueling structures
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RefuelData {
    pub agent: crate::models::Agent,
    pub fuel: crate::models::ShipFuel,
    pub transaction: crate::models::MarketTransaction,
}
