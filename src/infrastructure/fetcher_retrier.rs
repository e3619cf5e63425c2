use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, warn};

use crate::{
    Clock, FetchError, PageFetcher, RepositoryFetcher, Response, RetryPolicy, RetryState,
    RetryStateMachine, SearchRepositoriesRequest,
};

/// A struct that retries a RepositoryFetcher, waiting out rate limits and backing off on transient failures.
pub struct FetcherRetrier {
    /// The fetcher to be retried.
    fetcher: Arc<dyn RepositoryFetcher>,

    /// The retry and backoff tuning.
    policy: RetryPolicy,

    /// The source of time used to wait between attempts.
    clock: Arc<dyn Clock>,

    /// No wait may end after this time.
    deadline: Option<DateTime<Utc>>,
}

impl FetcherRetrier {
    /// Creates a new `FetcherRetrier` instance with the given retry policy.
    pub fn new(
        fetcher: Arc<dyn RepositoryFetcher>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            policy,
            clock,
            deadline: None,
        }
    }

    /// Bounds every wait by the crawl deadline.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[async_trait::async_trait]
impl PageFetcher for FetcherRetrier {
    /// Fetches the page, retrying until it succeeds or the state machine gives up.
    async fn fetch_page(&self, request: &SearchRepositoriesRequest) -> Result<Response, FetchError> {
        let mut machine = RetryStateMachine::new(self.policy.clone());

        loop {
            let outcome = self.fetcher.fetch(request).await;
            match machine.on_outcome(outcome, self.clock.now(), self.deadline) {
                RetryState::Done(response) => return Ok(response),
                RetryState::Waiting(delay) => {
                    warn!(
                        "Fetch attempt #{} failed for {request}, retrying in {delay:?}",
                        machine.total_attempts()
                    );
                    self.clock.sleep(delay).await;
                }
                RetryState::GivingUp(e) => {
                    error!(
                        "Giving up fetching {request} after {} attempts: {e}",
                        machine.total_attempts()
                    );
                    return Err(e);
                }
                RetryState::Attempting => {}
            }
        }
    }
}
