use time::{OffsetDateTime, UtcOffset};

/// Source of "now" for everything date-sensitive.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock, expressed in the offset that defines the users' calendar day.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }
}

#[cfg(test)]
pub use fixed::FixedClock;

#[cfg(test)]
mod fixed {
    use std::sync::Mutex;

    use time::{Duration, OffsetDateTime};

    use super::Clock;

    pub struct FixedClock(Mutex<OffsetDateTime>);

    impl FixedClock {
        pub fn new(at: OffsetDateTime) -> Self {
            Self(Mutex::new(at))
        }

        pub fn set(&self, at: OffsetDateTime) {
            *self.0.lock().unwrap() = at;
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{macros::datetime, Duration};

    #[test]
    fn system_clock_reports_configured_offset() {
        let ist = UtcOffset::from_hms(5, 30, 0).unwrap();
        assert_eq!(SystemClock::new(ist).now().offset(), ist);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(datetime!(2026-10-19 08:00 UTC));
        clock.advance(Duration::hours(4));
        assert_eq!(clock.now(), datetime!(2026-10-19 12:00 UTC));
        clock.set(datetime!(2026-10-20 00:00 UTC));
        assert_eq!(clock.now().date(), time::macros::date!(2026-10-20));
    }
}
