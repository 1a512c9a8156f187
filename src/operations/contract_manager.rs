// Contract Manager - evaluates offers and tracks contracts through their lifecycle
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{ContractConfig, FleetConfig};
use crate::error::{FleetError, Result};
use crate::models::{Contract, ContractStatus};
use crate::operations::market_analyzer::{MarketAnalyzer, fuel_credits};

#[derive(Debug, Clone)]
pub struct TrackedContract {
    pub contract: Contract,
    pub status: ContractStatus,
}

/// Outstanding delivery work on an accepted contract
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryNeed {
    pub contract_id: String,
    pub good: String,
    pub destination: String,
    pub remaining: i32,
    /// Share of the fulfillment payment earned per delivered unit
    pub unit_payment: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferEvaluation {
    pub contract_id: String,
    pub payout: i64,
    pub estimated_cost: i64,
    pub accept: bool,
    pub reason: String,
}

pub struct ContractManager {
    contracts: HashMap<String, TrackedContract>,
    config: ContractConfig,
}

/// Copy delivered units from `from` into `into` without ever lowering them
fn merge_progress(into: &mut Contract, from: &Contract) {
    for item in &mut into.terms.deliver {
        if let Some(previous) = from
            .terms
            .deliver
            .iter()
            .find(|d| d.trade_symbol == item.trade_symbol && d.destination_symbol == item.destination_symbol)
        {
            item.units_fulfilled = item.units_fulfilled.max(previous.units_fulfilled);
        }
    }
}

impl ContractManager {
    pub fn new(config: &FleetConfig) -> Self {
        Self {
            contracts: HashMap::new(),
            config: config.contracts.clone(),
        }
    }

    pub fn apply_config(&mut self, config: &FleetConfig) {
        self.config = config.contracts.clone();
    }

    /// Merge the server's view; neither status nor delivered units ever move backward
    pub fn sync(&mut self, remote: Vec<Contract>, now: DateTime<Utc>) {
        for mut contract in remote {
            let remote_status = contract.remote_status(now);
            match self.contracts.get_mut(&contract.id) {
                None => {
                    debug!("📝 Tracking contract {} ({:?})", contract.id, remote_status);
                    self.contracts.insert(
                        contract.id.clone(),
                        TrackedContract {
                            contract,
                            status: remote_status,
                        },
                    );
                }
                Some(tracked) => {
                    if tracked.status.can_advance_to(remote_status) {
                        tracked.status = remote_status;
                    } else {
                        warn!(
                            "⚠️ Ignoring backward status for {}: {:?} → {:?}",
                            contract.id, tracked.status, remote_status
                        );
                    }
                    merge_progress(&mut contract, &tracked.contract);
                    tracked.contract = contract;
                }
            }
        }
    }

    fn transition(&mut self, contract: Contract, next: ContractStatus) -> Result<ContractStatus> {
        match self.contracts.get_mut(&contract.id) {
            Some(tracked) => {
                let status = tracked.status.advance(&contract.id, next)?;
                let mut contract = contract;
                merge_progress(&mut contract, &tracked.contract);
                tracked.contract = contract;
                tracked.status = status;
                Ok(status)
            }
            None => {
                ContractStatus::Offered.advance(&contract.id, next)?;
                self.contracts.insert(
                    contract.id.clone(),
                    TrackedContract {
                        contract,
                        status: next,
                    },
                );
                Ok(next)
            }
        }
    }

    pub fn mark_accepted(&mut self, contract: Contract) -> Result<()> {
        let id = contract.id.clone();
        self.transition(contract, ContractStatus::Accepted)?;
        info!("✅ Contract {} accepted", id);
        Ok(())
    }

    /// Record delivery progress reported by the server after a deliver call
    pub fn record_delivery(&mut self, contract: Contract) -> Result<()> {
        let tracked = self
            .contracts
            .get_mut(&contract.id)
            .ok_or_else(|| FleetError::UnknownContract(contract.id.clone()))?;
        if tracked.status != ContractStatus::Accepted {
            return Err(FleetError::ContractTransition {
                id: contract.id.clone(),
                from: tracked.status,
                to: ContractStatus::Accepted,
            });
        }
        let mut contract = contract;
        merge_progress(&mut contract, &tracked.contract);
        info!(
            "📦 Contract {}: {} units still required",
            contract.id,
            contract.remaining_units()
        );
        tracked.contract = contract;
        Ok(())
    }

    pub fn mark_fulfilled(&mut self, contract: Contract) -> Result<()> {
        let id = contract.id.clone();
        self.transition(contract, ContractStatus::Fulfilled)?;
        info!("🎉 Contract {} fulfilled", id);
        Ok(())
    }

    /// Expire contracts whose acceptance or delivery deadline has passed
    pub fn expire_overdue(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut expired = Vec::new();
        for (id, tracked) in self.contracts.iter_mut() {
            let deadline = match tracked.status {
                ContractStatus::Offered => tracked.contract.accept_deadline(),
                ContractStatus::Accepted => tracked.contract.delivery_deadline(),
                _ => None,
            };
            if deadline.is_some_and(|d| d <= now) {
                tracked.status = ContractStatus::Expired;
                expired.push(id.clone());
            }
        }
        for id in &expired {
            warn!("⌛ Contract {} expired", id);
        }
        expired.sort();
        expired
    }

    pub fn status(&self, id: &str) -> Option<ContractStatus> {
        self.contracts.get(id).map(|t| t.status)
    }

    pub fn get(&self, id: &str) -> Option<&TrackedContract> {
        self.contracts.get(id)
    }

    pub fn all(&self) -> Vec<&TrackedContract> {
        let mut all: Vec<&TrackedContract> = self.contracts.values().collect();
        all.sort_by(|a, b| a.contract.id.cmp(&b.contract.id));
        all
    }

    pub fn active(&self) -> Vec<&TrackedContract> {
        self.with_status(ContractStatus::Accepted)
    }

    pub fn offered(&self) -> Vec<&TrackedContract> {
        self.with_status(ContractStatus::Offered)
    }

    fn with_status(&self, status: ContractStatus) -> Vec<&TrackedContract> {
        self.all().into_iter().filter(|t| t.status == status).collect()
    }

    pub fn remaining(&self, id: &str, good: &str) -> i32 {
        self.contracts
            .get(id)
            .and_then(|t| t.contract.delivery_for(good))
            .map(|d| d.remaining())
            .unwrap_or(0)
    }

    pub fn is_complete(&self, id: &str) -> bool {
        self.contracts
            .get(id)
            .is_some_and(|t| t.contract.all_delivered())
    }

    /// Goods still owed on accepted contracts
    pub fn delivery_needs(&self) -> Vec<DeliveryNeed> {
        let mut needs = Vec::new();
        for tracked in self.active() {
            let contract = &tracked.contract;
            let required: i32 = contract.terms.deliver.iter().map(|d| d.units_required).sum();
            let unit_payment = if required > 0 {
                contract.terms.payment.on_fulfilled / required as i64
            } else {
                0
            };
            for item in &contract.terms.deliver {
                if item.remaining() > 0 {
                    needs.push(DeliveryNeed {
                        contract_id: contract.id.clone(),
                        good: item.trade_symbol.clone(),
                        destination: item.destination_symbol.clone(),
                        remaining: item.remaining(),
                        unit_payment,
                    });
                }
            }
        }
        needs
    }

    /// Goods reserved for accepted contracts; liquidation leaves these aboard
    pub fn reserved_goods(&self) -> Vec<String> {
        let mut goods: Vec<String> = self.delivery_needs().into_iter().map(|n| n.good).collect();
        goods.sort();
        goods.dedup();
        goods
    }

    /// Accept when the payout beats the estimated cost of sourcing and hauling the goods
    pub fn evaluate_offer(
        &self,
        contract: &Contract,
        analyzer: &MarketAnalyzer,
        fleet_capacity: i32,
        now: DateTime<Utc>,
    ) -> OfferEvaluation {
        let payout = contract.total_payment();
        let units = contract.remaining_units();

        let goods_cost: i64 = contract
            .terms
            .deliver
            .iter()
            .map(|item| {
                let unit_price = analyzer
                    .cheapest_buy(&item.trade_symbol, now)
                    .map(|(_, quote)| quote.purchase_price)
                    .unwrap_or(self.config.unknown_good_price);
                unit_price * item.remaining() as i64
            })
            .sum();
        let capacity = fleet_capacity.max(1);
        let trips = ((units + capacity - 1) / capacity).max(1);
        let fuel_cost = fuel_credits(trips * self.config.fuel_per_trip, analyzer.fuel_price_estimate());
        let estimated_cost = goods_cost + fuel_cost;

        let (accept, reason) = if contract.remote_status(now) != ContractStatus::Offered {
            (false, "no longer open for acceptance".to_string())
        } else if self.active().len() >= self.config.max_active {
            (false, format!("already {} active contract(s)", self.active().len()))
        } else if payout < self.config.min_payout {
            (false, format!("payout {} below minimum {}", payout, self.config.min_payout))
        } else if payout <= estimated_cost {
            (false, format!("payout {} does not cover cost {}", payout, estimated_cost))
        } else {
            (true, format!("payout {} exceeds cost {}", payout, estimated_cost))
        };

        OfferEvaluation {
            contract_id: contract.id.clone(),
            payout,
            estimated_cost,
            accept,
            reason,
        }
    }
}
