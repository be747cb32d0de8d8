use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct EndpointState {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A per-endpoint circuit breaker: opens after `N` consecutive failures, goes half-open
/// after `cooldown`, and closes again on the first success seen while half-open.
pub struct CircuitBreaker {
    trip_threshold: u32,
    cooldown: Duration,
    endpoints: Mutex<HashMap<String, EndpointState>>,
}

impl CircuitBreaker {
    pub fn new(trip_threshold: u32, cooldown: Duration) -> Self {
        Self {
            trip_threshold,
            cooldown,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if a request to `endpoint` may be attempted right now.
    pub fn allow(&self, endpoint: &str) -> bool {
        let mut endpoints = self.endpoints.lock().unwrap();
        let entry = endpoints.entry(endpoint.to_string()).or_insert(EndpointState {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        });

        match entry.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = entry.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.cooldown {
                    entry.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, endpoint: &str) {
        let mut endpoints = self.endpoints.lock().unwrap();
        if let Some(entry) = endpoints.get_mut(endpoint) {
            entry.state = BreakerState::Closed;
            entry.consecutive_failures = 0;
            entry.opened_at = None;
        }
    }

    pub fn record_failure(&self, endpoint: &str) {
        let mut endpoints = self.endpoints.lock().unwrap();
        let entry = endpoints.entry(endpoint.to_string()).or_insert(EndpointState {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        });

        entry.consecutive_failures += 1;
        if entry.consecutive_failures >= self.trip_threshold {
            entry.state = BreakerState::Open;
            entry.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_and_half_opens_after_cooldown() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(10));
        assert!(breaker.allow("/fixtures"));
        breaker.record_failure("/fixtures");
        breaker.record_failure("/fixtures");
        assert!(breaker.allow("/fixtures"));
        breaker.record_failure("/fixtures");
        assert!(!breaker.allow("/fixtures"));

        std::thread::sleep(Duration::from_millis(15));
        assert!(breaker.allow("/fixtures"));
    }
}
