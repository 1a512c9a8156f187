use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Token bucket shared by every request the fleet makes.
///
/// A 429 pauses the whole gate for the server's retry-after scaled by a
/// multiplier that grows with consecutive rate-limits and resets on success.
pub struct RateGate {
    state: Mutex<GateState>,
    backoff_growth: f64,
    max_backoff_multiplier: f64,
}

struct GateState {
    tokens: f64,
    burst: f64,
    per_second: f64,
    last_refill: Instant,
    paused_until: Option<Instant>,
    backoff_multiplier: f64,
    request_count: u64,
}

impl GateState {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.per_second).min(self.burst);
            self.last_refill = now;
        }
    }
}

impl RateGate {
    pub fn new(config: &RateLimitConfig) -> Self {
        let burst = config.burst.max(1) as f64;
        Self {
            state: Mutex::new(GateState {
                tokens: burst,
                burst,
                per_second: config.per_second.max(f64::EPSILON),
                last_refill: Instant::now(),
                paused_until: None,
                backoff_multiplier: 1.0,
                request_count: 0,
            }),
            backoff_growth: config.backoff_growth,
            max_backoff_multiplier: config.max_backoff_multiplier,
        }
    }

    pub fn shared(config: &RateLimitConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Wait until a request may be sent and take one token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                match state.paused_until {
                    Some(until) if until > now => until - now,
                    _ => {
                        state.paused_until = None;
                        state.refill(now);
                        if state.tokens >= 1.0 {
                            state.tokens -= 1.0;
                            state.request_count += 1;
                            return;
                        }
                        Duration::from_secs_f64((1.0 - state.tokens) / state.per_second)
                    }
                }
            };
            debug!("🚦 Rate gate waiting {:?}", wait);
            sleep(wait).await;
        }
    }

    /// Pause the gate after a 429 and adopt any limits the server reported.
    pub async fn on_rate_limited(
        &self,
        retry_after: Duration,
        limit_burst: Option<u32>,
        limit_per_second: Option<f64>,
    ) -> Duration {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(burst) = limit_burst.filter(|b| *b > 0) {
            state.burst = burst as f64;
        }
        if let Some(per_second) = limit_per_second.filter(|p| *p > 0.0) {
            state.per_second = per_second;
        }

        let pause = retry_after.mul_f64(state.backoff_multiplier);
        let until = now + pause;
        state.paused_until = Some(state.paused_until.map_or(until, |current| current.max(until)));
        state.tokens = 0.0;
        state.last_refill = until;
        state.backoff_multiplier = (state.backoff_multiplier * self.backoff_growth).min(self.max_backoff_multiplier);

        warn!(
            "🛑 Rate limited: pausing {:.1}s (multiplier now {:.2})",
            pause.as_secs_f64(),
            state.backoff_multiplier
        );
        pause
    }

    pub async fn on_success(&self) {
        let mut state = self.state.lock().await;
        if state.backoff_multiplier > 1.0 {
            debug!("✅ Rate gate backoff reset");
        }
        state.backoff_multiplier = 1.0;
    }

    pub async fn backoff_multiplier(&self) -> f64 {
        self.state.lock().await.backoff_multiplier
    }

    pub async fn request_count(&self) -> u64 {
        self.state.lock().await.request_count
    }

    pub async fn limits(&self) -> (f64, f64) {
        let state = self.state.lock().await;
        (state.burst, state.per_second)
    }
}
