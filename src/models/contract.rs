use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FleetError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Contract {
    pub id: String,
    #[serde(rename = "factionSymbol")]
    pub faction_symbol: String,
    #[serde(rename = "type")]
    pub contract_type: String,
    pub terms: ContractTerms,
    pub accepted: bool,
    pub fulfilled: bool,
    #[serde(default)]
    pub expiration: Option<String>,
    #[serde(rename = "deadlineToAccept", default)]
    pub deadline_to_accept: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContractTerms {
    pub deadline: String,
    pub payment: Payment,
    #[serde(default)]
    pub deliver: Vec<DeliveryItem>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Payment {
    #[serde(rename = "onAccepted")]
    pub on_accepted: i64,
    #[serde(rename = "onFulfilled")]
    pub on_fulfilled: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryItem {
    #[serde(rename = "tradeSymbol")]
    pub trade_symbol: String,
    #[serde(rename = "destinationSymbol")]
    pub destination_symbol: String,
    #[serde(rename = "unitsRequired")]
    pub units_required: i32,
    #[serde(rename = "unitsFulfilled")]
    pub units_fulfilled: i32,
}

impl DeliveryItem {
    pub fn remaining(&self) -> i32 {
        (self.units_required - self.units_fulfilled).max(0)
    }
}

fn parse_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl Contract {
    pub fn total_payment(&self) -> i64 {
        self.terms.payment.on_accepted + self.terms.payment.on_fulfilled
    }

    pub fn delivery_deadline(&self) -> Option<DateTime<Utc>> {
        parse_time(Some(&self.terms.deadline))
    }

    pub fn accept_deadline(&self) -> Option<DateTime<Utc>> {
        parse_time(self.deadline_to_accept.as_deref().or(self.expiration.as_deref()))
    }

    pub fn remaining_units(&self) -> i32 {
        self.terms.deliver.iter().map(DeliveryItem::remaining).sum()
    }

    pub fn all_delivered(&self) -> bool {
        self.terms.deliver.iter().all(|d| d.remaining() == 0)
    }

    pub fn delivery_for(&self, good: &str) -> Option<&DeliveryItem> {
        self.terms.deliver.iter().find(|d| d.trade_symbol == good)
    }

    /// Status implied by the server's flags and deadlines
    pub fn remote_status(&self, now: DateTime<Utc>) -> ContractStatus {
        if self.fulfilled {
            ContractStatus::Fulfilled
        } else if self.accepted {
            match self.delivery_deadline() {
                Some(deadline) if deadline <= now => ContractStatus::Expired,
                _ => ContractStatus::Accepted,
            }
        } else {
            match self.accept_deadline() {
                Some(deadline) if deadline <= now => ContractStatus::Expired,
                _ => ContractStatus::Offered,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Offered,
    Accepted,
    Fulfilled,
    Expired,
}

impl ContractStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContractStatus::Fulfilled | ContractStatus::Expired)
    }

    pub fn can_advance_to(self, next: ContractStatus) -> bool {
        use ContractStatus::*;
        self == next
            || matches!(
                (self, next),
                (Offered, Accepted) | (Offered, Expired) | (Accepted, Fulfilled) | (Accepted, Expired)
            )
    }

    /// Forward-only transition; moving backward is an error
    pub fn advance(self, id: &str, next: ContractStatus) -> Result<ContractStatus, FleetError> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(FleetError::ContractTransition {
                id: id.to_string(),
                from: self,
                to: next,
            })
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContractAcceptData {
    pub contract: Contract,
    pub agent: crate::models::Agent,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliverCargoData {
    pub contract: Contract,
    pub cargo: crate::models::ShipCargo,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FulfillContractData {
    pub agent: crate::models::Agent,
    pub contract: Contract,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NegotiateContractData {
    pub contract: Contract,
}
