use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::client::RateGate;
use crate::error::ApiError;
use crate::models::*;

const PAGE_LIMIT: u32 = 20;

/// Every remote operation the fleet needs from the game.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn get_agent(&self) -> Result<Agent, ApiError>;

    async fn list_ships(&self) -> Result<Vec<Ship>, ApiError>;
    async fn get_ship(&self, ship_symbol: &str) -> Result<Ship, ApiError>;

    async fn list_waypoints(&self, system_symbol: &str) -> Result<Vec<Waypoint>, ApiError>;
    async fn get_market(&self, system_symbol: &str, waypoint_symbol: &str) -> Result<Market, ApiError>;
    async fn get_shipyard(&self, system_symbol: &str, waypoint_symbol: &str) -> Result<Shipyard, ApiError>;

    async fn list_contracts(&self) -> Result<Vec<Contract>, ApiError>;
    async fn accept_contract(&self, contract_id: &str) -> Result<ContractAcceptData, ApiError>;
    async fn negotiate_contract(&self, ship_symbol: &str) -> Result<Contract, ApiError>;
    async fn deliver_contract(
        &self,
        contract_id: &str,
        ship_symbol: &str,
        trade_symbol: &str,
        units: i32,
    ) -> Result<DeliverCargoData, ApiError>;
    async fn fulfill_contract(&self, contract_id: &str) -> Result<FulfillContractData, ApiError>;

    async fn orbit_ship(&self, ship_symbol: &str) -> Result<ShipNav, ApiError>;
    async fn dock_ship(&self, ship_symbol: &str) -> Result<ShipNav, ApiError>;
    async fn navigate_ship(&self, ship_symbol: &str, waypoint_symbol: &str) -> Result<NavigationData, ApiError>;
    async fn refuel_ship(&self, ship_symbol: &str) -> Result<RefuelData, ApiError>;

    async fn purchase_cargo(&self, ship_symbol: &str, trade_symbol: &str, units: i32) -> Result<TradeData, ApiError>;
    async fn sell_cargo(&self, ship_symbol: &str, trade_symbol: &str, units: i32) -> Result<TradeData, ApiError>;

    async fn create_survey(&self, ship_symbol: &str) -> Result<SurveyData, ApiError>;
    async fn extract_resources(&self, ship_symbol: &str, survey: Option<&Survey>) -> Result<ExtractionData, ApiError>;

    async fn purchase_ship(&self, ship_type: &str, waypoint_symbol: &str) -> Result<ShipPurchaseData, ApiError>;
}

/// reqwest-backed client for the SpaceTraders v2 API
#[derive(Clone)]
pub struct SpaceTradersClient {
    client: reqwest::Client,
    base_url: String,
    gate: Arc<RateGate>,
}

impl SpaceTradersClient {
    pub fn new(token: &str, base_url: &str, timeout: Duration, gate: Arc<RateGate>) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|_| ApiError::Unauthorized {
            status: 0,
            message: "agent token contains invalid header characters".to_string(),
        })?;
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gate,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request through the rate gate and return the raw success body
    async fn request_text(&self, method: Method, url: &str, body: Option<&Value>) -> Result<String, ApiError> {
        self.gate.acquire().await;
        debug!("🌐 {} {}", method, url);

        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        trace!(status = status.as_u16(), body = %text, "api response");

        if status.is_success() {
            self.gate.on_success().await;
            return Ok(text);
        }

        let error = ApiError::from_response(status.as_u16(), &text);
        if let ApiError::RateLimited {
            retry_after,
            limit_burst,
            limit_per_second,
        } = &error
        {
            self.gate
                .on_rate_limited(*retry_after, *limit_burst, *limit_per_second)
                .await;
        }
        debug!("❌ {} {} failed: {}", method, url, error);
        Err(error)
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let text = self.request_text(method, &url, body.as_ref()).await?;
        let envelope: ApiResponse<T> = serde_json::from_str(&text)?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Walk every page of a listing endpoint
    async fn paginate<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut page = 1;

        loop {
            let url = format!("{}{}{}page={}&limit={}", self.base_url, path, separator, page, PAGE_LIMIT);
            let text = self.request_text(Method::GET, &url, None).await?;
            let listing: Paginated<T> = serde_json::from_str(&text)?;
            let fetched = listing.data.len();
            items.extend(listing.data);
            if fetched == 0 || !listing.meta.has_more() {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl GameApi for SpaceTradersClient {
    async fn get_agent(&self) -> Result<Agent, ApiError> {
        self.get("/my/agent").await
    }

    async fn list_ships(&self) -> Result<Vec<Ship>, ApiError> {
        self.paginate("/my/ships").await
    }

    async fn get_ship(&self, ship_symbol: &str) -> Result<Ship, ApiError> {
        self.get(&format!("/my/ships/{}", ship_symbol)).await
    }

    async fn list_waypoints(&self, system_symbol: &str) -> Result<Vec<Waypoint>, ApiError> {
        self.paginate(&format!("/systems/{}/waypoints", system_symbol)).await
    }

    async fn get_market(&self, system_symbol: &str, waypoint_symbol: &str) -> Result<Market, ApiError> {
        self.get(&format!("/systems/{}/waypoints/{}/market", system_symbol, waypoint_symbol))
            .await
    }

    async fn get_shipyard(&self, system_symbol: &str, waypoint_symbol: &str) -> Result<Shipyard, ApiError> {
        self.get(&format!("/systems/{}/waypoints/{}/shipyard", system_symbol, waypoint_symbol))
            .await
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, ApiError> {
        self.paginate("/my/contracts").await
    }

    async fn accept_contract(&self, contract_id: &str) -> Result<ContractAcceptData, ApiError> {
        self.post(&format!("/my/contracts/{}/accept", contract_id), json!({}))
            .await
    }

    async fn negotiate_contract(&self, ship_symbol: &str) -> Result<Contract, ApiError> {
        let data: NegotiateContractData = self
            .post(&format!("/my/ships/{}/negotiate/contract", ship_symbol), json!({}))
            .await?;
        Ok(data.contract)
    }

    async fn deliver_contract(
        &self,
        contract_id: &str,
        ship_symbol: &str,
        trade_symbol: &str,
        units: i32,
    ) -> Result<DeliverCargoData, ApiError> {
        let payload = json!({
            "shipSymbol": ship_symbol,
            "tradeSymbol": trade_symbol,
            "units": units
        });
        self.post(&format!("/my/contracts/{}/deliver", contract_id), payload)
            .await
    }

    async fn fulfill_contract(&self, contract_id: &str) -> Result<FulfillContractData, ApiError> {
        self.post(&format!("/my/contracts/{}/fulfill", contract_id), json!({}))
            .await
    }

    async fn orbit_ship(&self, ship_symbol: &str) -> Result<ShipNav, ApiError> {
        let data: OrbitData = self
            .post(&format!("/my/ships/{}/orbit", ship_symbol), json!({}))
            .await?;
        Ok(data.nav)
    }

    async fn dock_ship(&self, ship_symbol: &str) -> Result<ShipNav, ApiError> {
        let data: OrbitData = self
            .post(&format!("/my/ships/{}/dock", ship_symbol), json!({}))
            .await?;
        Ok(data.nav)
    }

    async fn navigate_ship(&self, ship_symbol: &str, waypoint_symbol: &str) -> Result<NavigationData, ApiError> {
        self.post(
            &format!("/my/ships/{}/navigate", ship_symbol),
            json!({ "waypointSymbol": waypoint_symbol }),
        )
        .await
    }

    async fn refuel_ship(&self, ship_symbol: &str) -> Result<RefuelData, ApiError> {
        self.post(&format!("/my/ships/{}/refuel", ship_symbol), json!({}))
            .await
    }

    async fn purchase_cargo(&self, ship_symbol: &str, trade_symbol: &str, units: i32) -> Result<TradeData, ApiError> {
        self.post(
            &format!("/my/ships/{}/purchase", ship_symbol),
            json!({ "symbol": trade_symbol, "units": units }),
        )
        .await
    }

    async fn sell_cargo(&self, ship_symbol: &str, trade_symbol: &str, units: i32) -> Result<TradeData, ApiError> {
        self.post(
            &format!("/my/ships/{}/sell", ship_symbol),
            json!({ "symbol": trade_symbol, "units": units }),
        )
        .await
    }

    async fn create_survey(&self, ship_symbol: &str) -> Result<SurveyData, ApiError> {
        self.post(&format!("/my/ships/{}/survey", ship_symbol), json!({}))
            .await
    }

    async fn extract_resources(&self, ship_symbol: &str, survey: Option<&Survey>) -> Result<ExtractionData, ApiError> {
        match survey {
            Some(survey) => {
                self.post(
                    &format!("/my/ships/{}/extract/survey", ship_symbol),
                    serde_json::to_value(survey)?,
                )
                .await
            }
            None => {
                self.post(&format!("/my/ships/{}/extract", ship_symbol), json!({}))
                    .await
            }
        }
    }

    async fn purchase_ship(&self, ship_type: &str, waypoint_symbol: &str) -> Result<ShipPurchaseData, ApiError> {
        self.post(
            "/my/ships",
            json!({ "shipType": ship_type, "waypointSymbol": waypoint_symbol }),
        )
        .await
    }
}
