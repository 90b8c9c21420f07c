use std::time::Duration;

use chrono::NaiveDate;

/// Tuning for a portal's sync client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// First reconnect delay.
    pub backoff_base: Duration,
    /// Multiplier applied per failed attempt.
    pub backoff_factor: u32,
    /// Upper bound on any single reconnect delay.
    pub backoff_cap: Duration,
    /// Memories kept in the local gallery and fetched on resync.
    pub memory_limit: u32,
    /// Day the "days together" counter starts from.
    pub start_date: NaiveDate,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_millis(500),
            backoff_factor: 2,
            backoff_cap: Duration::from_secs(30),
            memory_limit: 50,
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }
}
