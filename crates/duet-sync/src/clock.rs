use chrono::{DateTime, NaiveDate, Timelike, Utc};

/// IST is UTC+05:30.
const IST_OFFSET_MINUTES: i64 = 5 * 60 + 30;

/// Whole days elapsed since `start` (taken as UTC midnight).
pub fn days_since(start: NaiveDate, now: DateTime<Utc>) -> i64 {
    let start = start.and_time(chrono::NaiveTime::MIN).and_utc();
    (now - start).num_days()
}

/// Nightly meteor window, evaluated on the IST wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelestialPhase {
    Clear,
    /// 23:40 to 23:54 IST.
    Inbound,
    /// 23:55 to 23:59 IST.
    Active,
}

impl CelestialPhase {
    pub fn at(now: DateTime<Utc>) -> Self {
        let ist = now.naive_utc() + chrono::Duration::minutes(IST_OFFSET_MINUTES);
        match (ist.hour(), ist.minute()) {
            (23, 55..=59) => CelestialPhase::Active,
            (23, 40..=54) => CelestialPhase::Inbound,
            _ => CelestialPhase::Clear,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CelestialPhase::Clear => "NO ACTIVITY DETECTED",
            CelestialPhase::Inbound => "METEOR INBOUND",
            CelestialPhase::Active => "METEOR SHOWER ACTIVE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn days_are_floored() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(days_since(start, utc("2023-01-01T23:59:59Z")), 0);
        assert_eq!(days_since(start, utc("2023-01-02T00:00:00Z")), 1);
        assert_eq!(days_since(start, utc("2024-01-01T12:00:00Z")), 365);
    }

    #[test]
    fn meteor_window_in_ist() {
        // 23:39 IST is 18:09 UTC
        assert_eq!(CelestialPhase::at(utc("2024-05-01T18:09:59Z")), CelestialPhase::Clear);
        assert_eq!(CelestialPhase::at(utc("2024-05-01T18:10:00Z")), CelestialPhase::Inbound);
        assert_eq!(CelestialPhase::at(utc("2024-05-01T18:24:59Z")), CelestialPhase::Inbound);
        assert_eq!(CelestialPhase::at(utc("2024-05-01T18:25:00Z")), CelestialPhase::Active);
        assert_eq!(CelestialPhase::at(utc("2024-05-01T18:29:59Z")), CelestialPhase::Active);
        // midnight IST
        assert_eq!(CelestialPhase::at(utc("2024-05-01T18:30:00Z")), CelestialPhase::Clear);
    }
}
