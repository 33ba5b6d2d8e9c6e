//! The degradation controller.
//!
//! A fixed-window circuit breaker over the whole pipeline: after
//! `threshold` consecutive failures it opens and every query takes the
//! cheap breaker window until the reset timeout passes. The reset is lazy,
//! checked on the next query rather than by a background task. One success
//! closes the accounting back to zero.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokengate_config::BreakerConfig;

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_since: Option<Instant>,
}

/// Snapshot of the breaker for callers and logs.
#[derive(Debug, Clone, Copy)]
pub struct BreakerStatus {
    pub open: bool,
    pub consecutive_failures: u32,
    /// Seconds until an open breaker auto-resets.
    pub remaining_secs: Option<u64>,
}

/// Thread-safe pipeline circuit breaker.
pub struct DegradationController {
    threshold: u32,
    timeout: Duration,
    state: Mutex<BreakerState>,
}

impl DegradationController {
    pub fn new(config: &BreakerConfig) -> Self {
        Self::with_timeout(config.threshold, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(threshold: u32, timeout: Duration) -> Self {
        Self {
            threshold,
            timeout,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Whether the breaker is open. Performs the lazy auto-reset when the
    /// timeout has passed.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        match state.open_since {
            Some(since) if since.elapsed() >= self.timeout => {
                tracing::info!("Breaker timeout elapsed, auto-resetting");
                *state = BreakerState::default();
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Count one pipeline failure; opens the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold && state.open_since.is_none() {
            state.open_since = Some(Instant::now());
            tracing::warn!(
                failures = state.consecutive_failures,
                timeout_secs = self.timeout.as_secs(),
                "Breaker opened"
            );
        }
    }

    /// Count one clean pipeline run.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.open_since.is_none() {
            state.consecutive_failures = 0;
        }
    }

    /// Close the breaker immediately, clearing all accounting.
    pub fn force_reset(&self) {
        *self.lock() = BreakerState::default();
        tracing::info!("Breaker force-reset");
    }

    pub fn status(&self) -> BreakerStatus {
        let state = self.lock();
        let remaining_secs = state
            .open_since
            .map(|since| self.timeout.saturating_sub(since.elapsed()).as_secs());
        BreakerStatus {
            open: state.open_since.is_some(),
            consecutive_failures: state.consecutive_failures,
            remaining_secs,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
