//! Exponential backoff with jitter, shared by the dial loop and transcript
//! retries: `delay_n = min(base * 2^n + rand[0, base), max)`. This policy
//! is load-bearing and tested on its own, so it draws jitter from `rand`
//! rather than a hand-rolled generator.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            // Bounded so a lazy-dial attempt fails with an `Unavailable`
            // error in finite time instead of retrying across an outage for
            // the lifetime of the turn; `0` remains available for callers
            // that want unlimited retries.
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 0-indexed: the delay before the first retry is
    /// `calculate_delay(0)`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential = self.base_delay_ms.saturating_mul(1u64 << attempt.min(32));
        let capped = exponential.min(self.max_delay_ms);
        let jitter = if self.base_delay_ms > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_ms)
        } else {
            0
        };
        Duration::from_millis(capped.saturating_add(jitter).min(self.max_delay_ms))
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}
