//! Manually advanced clock for tests and local demos.

use std::sync::{Mutex, PoisonError};

use crate::domain::foundation::Timestamp;
use crate::ports::Clock;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn at(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.plus_minutes(minutes);
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.plus_secs(secs);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Timestamp::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_only_when_told() {
        let clock = ManualClock::at(Timestamp::from_unix_secs(1_000));
        assert_eq!(clock.now().as_unix_secs(), 1_000);

        clock.advance_minutes(2);
        clock.advance_secs(5);
        assert_eq!(clock.now().as_unix_secs(), 1_125);

        clock.set(Timestamp::from_unix_secs(10));
        assert_eq!(clock.now().as_unix_secs(), 10);
    }
}
