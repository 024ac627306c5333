//! Wall-clock abstraction so day boundaries can be simulated in tests

use std::sync::RwLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day used for the same-day redemption rule
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant until moved explicitly
#[derive(Debug)]
pub struct FixedClock {
    time: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(time),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        let mut guard = self.time.write().unwrap_or_else(|e| e.into_inner());
        *guard = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.time.write().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock_crosses_midnight() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 23, 59, 59).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());

        clock.advance(Duration::seconds(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }
}
