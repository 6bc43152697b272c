//! Token bucket throttle for exchange requests.
//!
//! One bucket is shared by every in-flight fetch so that the combined
//! request rate stays under the exchange's documented per-minute limit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Scale factor: tokens are tracked in thousandths so sub-token refill
/// amounts survive integer arithmetic.
const MILLI: u64 = 1000;

/// A token bucket throttle.
///
/// Holds up to one second's worth of requests as burst capacity and refills
/// continuously at `requests_per_minute / 60_000` tokens per millisecond.
#[derive(Debug)]
pub struct RateLimiter {
    /// Name for logging
    name: String,
    /// Configured sustained rate
    per_minute: u32,
    /// Bucket size in milli-tokens
    capacity_milli: u64,
    /// Available milli-tokens
    tokens_milli: AtomicU64,
    /// Last refill timestamp
    last_refill: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a throttle allowing `requests_per_minute` sustained requests.
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        let per_minute = requests_per_minute.max(1);
        // Burst window of one second, at least one whole token
        let burst = (u64::from(per_minute) / 60).max(1);
        let capacity_milli = burst * MILLI;

        Self {
            name: name.into(),
            per_minute,
            capacity_milli,
            tokens_milli: AtomicU64::new(capacity_milli),
            last_refill: Mutex::new(Instant::now()),
        }
    }

    /// Acquire one token, sleeping until one is available.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }

            // Sleep roughly one token's worth of time before rechecking
            let token_interval_ms = (60_000 / u64::from(self.per_minute)).clamp(10, 1000);

            debug!(
                limiter = %self.name,
                wait_ms = token_interval_ms,
                "Throttled, waiting for token"
            );

            tokio::time::sleep(Duration::from_millis(token_interval_ms)).await;
        }
    }

    /// Take one token if available, without waiting.
    pub fn try_acquire(&self) -> bool {
        self.refill();

        loop {
            let current = self.tokens_milli.load(Ordering::Relaxed);
            if current < MILLI {
                return false;
            }

            if self
                .tokens_milli
                .compare_exchange_weak(current, current - MILLI, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Credit tokens for the time elapsed since the last refill.
    fn refill(&self) {
        // try_lock: a contending caller's refill is just as good as ours
        let Ok(mut last_refill) = self.last_refill.try_lock() else {
            return;
        };

        let now = Instant::now();
        let elapsed_ms = now.duration_since(*last_refill).as_millis();

        // elapsed_ms * per_minute * MILLI / 60_000 milli-tokens, in u128 to
        // avoid overflow on long idle stretches
        let earned = (elapsed_ms * u128::from(self.per_minute) * u128::from(MILLI) / 60_000)
            .min(u128::from(self.capacity_milli)) as u64;

        if earned == 0 {
            // Keep the timestamp so fractional progress is not discarded
            return;
        }

        loop {
            let current = self.tokens_milli.load(Ordering::Relaxed);
            let next = (current + earned).min(self.capacity_milli);

            if current == next
                || self
                    .tokens_milli
                    .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
        }

        *last_refill = now;
    }

    /// Whole tokens currently available (monitoring and tests).
    pub fn available_tokens(&self) -> f64 {
        self.refill();
        self.tokens_milli.load(Ordering::Relaxed) as f64 / MILLI as f64
    }
}

/// Shared throttle handle, cloned into every fetch task.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Create a shared throttle.
pub fn shared_limiter(name: impl Into<String>, requests_per_minute: u32) -> SharedRateLimiter {
    Arc::new(RateLimiter::new(name, requests_per_minute))
}

// ============================================================================
// Tests
// ============================================================================
