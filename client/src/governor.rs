use crate::envelope::QuotaTelemetry;
use std::sync::Mutex;
use thiserror::Error;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("daily quota remaining is below the emergency stop threshold")]
    EmergencyStop,

    #[error("acquire was cancelled")]
    Cancelled,
}

struct BucketState {
    /// Fractional tokens currently available. Starts at zero so the process cannot burst
    /// on startup.
    tokens: f64,
    last_refill: Instant,
    daily_remaining: Option<i64>,
}

/// Per-minute token bucket plus a best-effort daily remaining counter, per §4.2.
///
/// Capacity `C` and refill rate `R = C / 60` tokens/second. The bucket only ever clamps
/// *down* in response to observed headers -- optimistic headers never grant a burst.
pub struct RateGovernor {
    capacity: f64,
    refill_per_second: f64,
    emergency_stop_threshold: i64,
    state: Mutex<BucketState>,
}

impl RateGovernor {
    pub fn new(capacity_per_minute: u32, emergency_stop_threshold: i64) -> Self {
        let capacity = capacity_per_minute as f64;
        Self {
            capacity,
            refill_per_second: capacity / 60.0,
            emergency_stop_threshold,
            state: Mutex::new(BucketState {
                tokens: 0.0,
                last_refill: Instant::now(),
                daily_remaining: None,
            }),
        }
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = now;
    }

    fn emergency_stopped(&self, state: &BucketState) -> bool {
        state
            .daily_remaining
            .is_some_and(|remaining| remaining < self.emergency_stop_threshold)
    }

    /// Blocks until a token is available, subject to `cancel`. Fails immediately, without
    /// waiting, if the daily remaining counter has already crossed the emergency threshold.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), AcquireError> {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                self.refill_locked(&mut state);

                if self.emergency_stopped(&state) {
                    return Err(AcquireError::EmergencyStop);
                }

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }

                let deficit = 1.0 - state.tokens;
                Duration::from_secs_f64(deficit / self.refill_per_second)
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AcquireError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Updates the bucket and daily counter from observed response headers. Never raises
    /// the local estimates, only clamps them down.
    pub fn observe(&self, telemetry: QuotaTelemetry) {
        let mut state = self.state.lock().unwrap();
        self.refill_locked(&mut state);

        if let Some(minute_remaining) = telemetry.minute_remaining {
            state.tokens = state.tokens.min(minute_remaining as f64);
        }

        if let Some(observed_daily) = telemetry.daily_remaining {
            state.daily_remaining = Some(match state.daily_remaining {
                Some(current) => current.min(observed_daily),
                None => observed_daily,
            });
        }
    }

    /// Treats an envelope-level or HTTP rate-limit response identically to an observed
    /// per-minute remaining of zero.
    pub fn observe_rate_limited(&self) {
        let mut state = self.state.lock().unwrap();
        self.refill_locked(&mut state);
        state.tokens = 0.0;
    }

    pub fn daily_remaining(&self) -> Option<i64> {
        self.state.lock().unwrap().daily_remaining
    }

    pub fn is_emergency_stopped(&self) -> bool {
        let state = self.state.lock().unwrap();
        self.emergency_stopped(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clamps_down_but_never_up() {
        let gov = RateGovernor::new(300, 7500);
        {
            let mut state = gov.state.lock().unwrap();
            state.tokens = 250.0;
        }

        gov.observe(QuotaTelemetry {
            daily_limit: None,
            daily_remaining: None,
            minute_limit: None,
            minute_remaining: Some(10),
        });

        assert!(gov.state.lock().unwrap().tokens <= 10.0);

        gov.observe(QuotaTelemetry {
            daily_limit: None,
            daily_remaining: None,
            minute_limit: None,
            minute_remaining: Some(200),
        });

        // Optimistic header must not raise the estimate back up.
        assert!(gov.state.lock().unwrap().tokens <= 10.0);
    }

    #[tokio::test]
    async fn emergency_stop_blocks_acquire() {
        let gov = RateGovernor::new(300, 7500);
        gov.observe(QuotaTelemetry {
            daily_limit: None,
            daily_remaining: Some(7499),
            minute_limit: None,
            minute_remaining: None,
        });

        let cancel = CancellationToken::new();
        let result = gov.acquire(&cancel).await;
        assert!(matches!(result, Err(AcquireError::EmergencyStop)));
    }

    #[tokio::test]
    async fn acquire_ten_then_blocks() {
        let gov = RateGovernor::new(300, 7500);
        {
            let mut state = gov.state.lock().unwrap();
            state.tokens = 10.0;
        }

        let cancel = CancellationToken::new();
        for _ in 0..10 {
            gov.acquire(&cancel).await.unwrap();
        }

        let start = Instant::now();
        gov.acquire(&cancel).await.unwrap();
        // Refill rate is 5/s, so the 11th acquire should take roughly 200ms.
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
