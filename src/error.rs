// Error types for the API gateway and the fleet control loop
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::models::ContractStatus;

/// Coarse recovery class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wait the server-specified delay, then retry
    RateLimited,
    /// Network or 5xx, retry with backoff
    Transient,
    /// Ship busy, cooldown or game-rule rejection; reschedule
    Conflict,
    /// Authentication failure; halt automation
    Fatal,
}

/// Game API error codes that carry a cooldown payload.
pub const COOLDOWN_CONFLICT_CODE: u32 = 4000;
/// Survey exhausted or expired.
pub const SURVEY_EXHAUSTED_CODES: [u32; 2] = [4221, 4224];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        limit_burst: Option<u32>,
        limit_per_second: Option<f64>,
    },

    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("conflict ({code}): {message}")]
    Conflict {
        code: u32,
        message: String,
        cooldown: Option<Duration>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Transient(_) => ErrorKind::Transient,
            ApiError::Unauthorized { .. } => ErrorKind::Fatal,
            ApiError::Conflict { .. } | ApiError::NotFound(_) | ApiError::Decode(_) => {
                ErrorKind::Conflict
            }
        }
    }

    /// Cooldown carried by a conflict, if the server reported one.
    pub fn cooldown(&self) -> Option<Duration> {
        match self {
            ApiError::Conflict { cooldown, .. } => *cooldown,
            _ => None,
        }
    }

    pub fn code(&self) -> Option<u32> {
        match self {
            ApiError::Conflict { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_survey_exhausted(&self) -> bool {
        self.code()
            .map(|code| SURVEY_EXHAUSTED_CODES.contains(&code))
            .unwrap_or(false)
    }

    /// Classify a non-success HTTP response.
    ///
    /// The body is expected to follow `{"error": {"code", "message", "data"}}` but
    /// anything unparseable still maps onto a kind by status alone.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();
        let error = parsed.as_ref().and_then(|v| v.get("error"));
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_u64)
            .map(|c| c as u32)
            .unwrap_or(status as u32);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());
        let data = error.and_then(|e| e.get("data"));

        match status {
            429 => {
                let retry_after = data
                    .and_then(|d| d.get("retryAfter"))
                    .and_then(Value::as_f64)
                    .filter(|secs| *secs > 0.0)
                    .map(Duration::from_secs_f64)
                    .unwrap_or(Duration::from_secs(1));
                ApiError::RateLimited {
                    retry_after,
                    limit_burst: data
                        .and_then(|d| d.get("limitBurst"))
                        .and_then(Value::as_u64)
                        .map(|b| b as u32),
                    limit_per_second: data
                        .and_then(|d| d.get("limitPerSecond"))
                        .and_then(Value::as_f64),
                }
            }
            401 | 403 => ApiError::Unauthorized { status, message },
            404 => ApiError::NotFound(message),
            500..=599 => ApiError::Transient(format!("{}: {}", status, message)),
            _ => {
                let cooldown = data
                    .and_then(|d| d.get("cooldown"))
                    .and_then(|c| c.get("remainingSeconds"))
                    .and_then(Value::as_f64)
                    .filter(|secs| *secs > 0.0)
                    .map(Duration::from_secs_f64);
                ApiError::Conflict {
                    code,
                    message,
                    cooldown,
                }
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("token error: {0}")]
    Token(String),

    #[error("cargo overflow on {ship}: {requested} units requested, {free} free")]
    CargoOverflow {
        ship: String,
        requested: i32,
        free: i32,
    },

    #[error("ship {0} already has an active task")]
    ShipBusy(String),

    #[error("unknown ship {0}")]
    UnknownShip(String),

    #[error("contract {id} cannot move from {from:?} to {to:?}")]
    ContractTransition {
        id: String,
        from: ContractStatus,
        to: ContractStatus,
    },

    #[error("unknown contract {0}")]
    UnknownContract(String),

    #[error("automation halted: {0}")]
    Halted(String),
}

impl FleetError {
    /// Whether the control loop must halt.
    pub fn is_fatal(&self) -> bool {
        match self {
            FleetError::Api(e) => e.kind() == ErrorKind::Fatal,
            FleetError::Halted(_) => true,
            _ => false,
        }
    }
}

pub type Result<T, E = FleetError> = std::result::Result<T, E>;
