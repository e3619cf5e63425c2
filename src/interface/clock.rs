use std::time::Duration;

use chrono::{DateTime, Utc};

/// A source of time, able to suspend the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Clock: Sync + Send {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}
