use std::time::Duration;

use crate::config::SyncConfig;

/// Exponential reconnect delays: `base * factor^(attempt - 1)`, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    factor: u32,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, factor: u32, cap: Duration) -> Self {
        Self {
            base,
            factor: factor.max(1),
            cap,
            attempt: 0,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.backoff_base, config.backoff_factor, config.backoff_cap)
    }

    /// Count one more failed attempt and return how long to wait before the next.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self
            .factor
            .checked_pow(self.attempt - 1)
            .and_then(|mult| self.base.checked_mul(mult))
            .unwrap_or(self.cap);
        delay.min(self.cap)
    }

    /// Failed attempts since the last successful link.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
