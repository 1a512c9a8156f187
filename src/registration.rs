// Agent registration - symbol generation and the unauthenticated /register call
use std::time::Duration;

use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::models::{ApiResponse, RegisterData};

pub const DEFAULT_FACTION: &str = "COSMIC";

/// Agent symbols are capped by the game at 14 characters
pub const MAX_SYMBOL_LEN: usize = 14;

pub const SYMBOL_PREFIXES: [&str; 14] = [
    "NOVA", "STAR", "VOID", "NEBULA", "SOLAR", "LUNAR", "COSMIC", "ASTRO", "ORBIT", "COMET", "METEOR", "SPACE",
    "GALAXY", "QUASAR",
];

const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// PREFIX_XXXX with a random space-themed prefix and alphanumeric suffix
pub fn generate_agent_symbol<R: Rng>(rng: &mut R) -> String {
    let prefix = SYMBOL_PREFIXES[rng.gen_range(0..SYMBOL_PREFIXES.len())];
    let suffix_len = 4.min(MAX_SYMBOL_LEN - prefix.len() - 1);
    let suffix: String = (0..suffix_len)
        .map(|_| SUFFIX_CHARS[rng.gen_range(0..SUFFIX_CHARS.len())] as char)
        .collect();
    format!("{}_{}", prefix, suffix)
}

pub fn registration_body(symbol: &str, faction: &str) -> Value {
    json!({
        "symbol": symbol.to_uppercase(),
        "faction": faction.to_uppercase(),
    })
}

pub async fn register_agent(base_url: &str, symbol: &str, faction: &str) -> Result<RegisterData, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let url = format!("{}/register", base_url.trim_end_matches('/'));

    info!("📝 Registering agent {} with faction {}", symbol, faction);
    let response = client
        .post(&url)
        .header(CONTENT_TYPE, "application/json")
        .json(&registration_body(symbol, faction))
        .send()
        .await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::from_response(status.as_u16(), &text));
    }

    let envelope: ApiResponse<RegisterData> = serde_json::from_str(&text)?;
    info!(
        "✅ Registered {} at {} with {} credits",
        envelope.data.agent.symbol, envelope.data.agent.headquarters, envelope.data.agent.credits
    );
    Ok(envelope.data)
}
