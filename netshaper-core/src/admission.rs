//! Admission algorithms.
//!
//! The default [`AdmissionMode::Windowed`] algorithm charges every observed byte to an
//! ever-growing per-direction counter and treats the counter modulo the budget as the position
//! inside the current window. It is cheap and lock-free, but only approximates a rate limit: the
//! window drifts whenever rate or burst change, and mixed packet sizes can let more than one
//! budget's worth of bytes through a single window (see the tests below).
//!
//! [`AdmissionMode::TokenBucket`] is the alternative: a timestamp-refilled bucket whose capacity
//! is the budget and whose refill rate is the configured rate.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// The smallest budget ever used. Guards the modulo when both rate and burst are zero.
pub const MIN_BUDGET: u64 = 1;

/// How observed packets are admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdmissionMode {
    /// `(cumulative_bytes % budget) + len > budget` queues the packet.
    #[default]
    Windowed,
    /// A token bucket refilled at `rate` bytes per second, holding at most one budget.
    TokenBucket,
}

/// Computes the number of bytes a group may pass per interval: `rate * interval_ms / 1000 +
/// burst`, never less than [`MIN_BUDGET`].
pub fn window_budget(rate: u32, burst: u32, interval: Duration) -> u64 {
    let per_interval =
        u64::try_from(rate as u128 * interval.as_millis() / 1000).unwrap_or(u64::MAX);
    per_interval.saturating_add(burst as u64).max(MIN_BUDGET)
}

/// Returns `true` if a packet of `len` bytes does not fit the current window. `cumulative` is the
/// direction's byte counter after the packet was charged.
#[inline]
pub(crate) fn over_window(cumulative: u64, len: u64, budget: u64) -> bool {
    cumulative % budget + len > budget
}

#[derive(Debug)]
pub(crate) struct TokenBucket {
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    /// Available tokens, in bytes. `None` until the first packet, at which point the bucket
    /// starts full.
    tokens: Option<u64>,
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(BucketState { tokens: None, last_refill: Instant::now() }) }
    }

    /// Takes `len` tokens if available. `capacity` is re-evaluated on every call so that
    /// reconfiguration applies immediately.
    pub(crate) fn try_take(&self, len: u64, rate: u32, capacity: u64) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let tokens = state.refill(now, rate, capacity);

        if tokens >= len {
            state.tokens = Some(tokens - len);
            true
        } else {
            false
        }
    }
}

impl BucketState {
    fn refill(&mut self, now: Instant, rate: u32, capacity: u64) -> u64 {
        let Some(tokens) = self.tokens else {
            self.tokens = Some(capacity);
            self.last_refill = now;
            return capacity;
        };

        let elapsed = now.saturating_duration_since(self.last_refill);
        let added = (rate as u128 * elapsed.as_nanos() / 1_000_000_000) as u64;

        // Only move the refill mark forward when whole tokens were added, so slow rates still
        // accumulate across many short calls.
        if added > 0 {
            self.last_refill = now;
        }

        let tokens = tokens.saturating_add(added).min(capacity);
        self.tokens = Some(tokens);
        tokens
    }
}
