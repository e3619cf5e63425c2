use std::{sync::Mutex, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};

use crate::Clock;

/// A clock whose time only moves when slept on, recording every sleep.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    /// Creates a new `FakeClock` frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(vec![]),
        }
    }

    /// Creates a new `FakeClock` frozen at a fixed instant.
    pub fn dummy() -> Self {
        Self::new("2025-01-01T00:00:00Z".parse().unwrap())
    }

    /// Retrieves the recorded sleeps.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Retrieves the sum of the recorded sleeps.
    pub fn total_slept(&self) -> Duration {
        self.sleeps().into_iter().sum()
    }
}

#[async_trait::async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::from_std(duration).unwrap();
    }
}
