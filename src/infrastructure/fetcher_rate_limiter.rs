use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use log::warn;

use crate::{Clock, FetchOutcome, RepositoryFetcher, SearchRepositoriesRequest};

/// This struct is responsible for pausing after a call that left the rate limit budget nearly exhausted.
pub struct FetcherRateLimitEnforcer {
    /// The fetcher to be rate limited.
    fetcher: Arc<dyn RepositoryFetcher>,

    /// The remaining budget under which the enforcer waits for the reset.
    reserve: i32,

    /// Added to the wait until the reset.
    safety_margin: Duration,

    /// The source of time used to wait for the reset.
    clock: Arc<dyn Clock>,

    /// No wait may end after this time.
    deadline: Option<DateTime<Utc>>,
}

impl FetcherRateLimitEnforcer {
    /// Creates a new `FetcherRateLimitEnforcer` instance with the given fetcher.
    pub fn new(
        fetcher: Arc<dyn RepositoryFetcher>,
        reserve: i32,
        safety_margin: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fetcher,
            reserve,
            safety_margin,
            clock,
            deadline: None,
        }
    }

    /// Bounds every wait by the crawl deadline.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn resumes_after_deadline(&self, wait: Duration) -> bool {
        match self.deadline {
            Some(deadline) => TimeDelta::from_std(wait)
                .map(|wait| self.clock.now() + wait > deadline)
                .unwrap_or(true),
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl RepositoryFetcher for FetcherRateLimitEnforcer {
    /// Enforce the rate limit on the fetcher requests.
    async fn fetch(&self, request: &SearchRepositoriesRequest) -> FetchOutcome {
        let outcome = self.fetcher.fetch(request).await;
        if let FetchOutcome::Success(response) = &outcome {
            let rate_limit = response.rate_limit();
            if rate_limit.is_nearly_exhausted(self.reserve) {
                let duration_until_reset =
                    rate_limit.duration_until_reset(self.clock.now()) + self.safety_margin;
                if self.resumes_after_deadline(duration_until_reset) {
                    // The next call hits the limit and the retrier gives up on the deadline.
                    warn!(
                        "Fetcher rate limit nearly exhausted ({rate_limit}), not waiting {duration_until_reset:?} past the crawl deadline"
                    );
                    return outcome;
                }
                warn!(
                    "Fetcher rate limit nearly exhausted ({rate_limit}), waiting for {duration_until_reset:?}"
                );
                self.clock.sleep(duration_until_reset).await;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        FakeClock, FetchError, FetcherRateLimit, FetcherRetrier, MockRepositoryFetcher, Page,
        PageFetcher, RateLimitKind, RateLimitSignal, Response, RetryPolicy, TransientKind,
    };

    use super::*;

    fn enforcer_returning(outcome: FetchOutcome, clock: Arc<FakeClock>) -> FetcherRateLimitEnforcer {
        let mut mock_fetcher = MockRepositoryFetcher::new();
        mock_fetcher
            .expect_fetch()
            .returning(move |_| outcome.clone())
            .times(1);

        FetcherRateLimitEnforcer::new(Arc::new(mock_fetcher), 10, Duration::from_secs(5), clock)
    }

    #[tokio::test]
    async fn fetch_rate_limit_not_exhausted() {
        let clock = Arc::new(FakeClock::dummy());
        let outcome = FetchOutcome::Success(Response::new(
            Page::default(),
            FetcherRateLimit {
                limit: 1000,
                remaining: 100,
                cost: 1,
                reset_at: clock.now() + TimeDelta::seconds(60),
            },
        ));
        let enforcer = enforcer_returning(outcome.clone(), clock.clone());

        let fetched = enforcer.fetch(&SearchRepositoriesRequest::dummy()).await;

        assert_eq!(outcome, fetched);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn fetch_rate_limit_nearly_exhausted_waits_until_reset() {
        let clock = Arc::new(FakeClock::dummy());
        let outcome = FetchOutcome::Success(Response::new(
            Page::default(),
            FetcherRateLimit {
                limit: 1000,
                remaining: 5,
                cost: 1,
                reset_at: clock.now() + TimeDelta::seconds(60),
            },
        ));
        let enforcer = enforcer_returning(outcome.clone(), clock.clone());

        let fetched = enforcer.fetch(&SearchRepositoriesRequest::dummy()).await;

        assert_eq!(outcome, fetched);
        assert_eq!(vec![Duration::from_secs(65)], clock.sleeps());
    }

    #[tokio::test]
    async fn fetch_failure_is_passed_through_without_waiting() {
        let clock = Arc::new(FakeClock::dummy());
        let outcome = FetchOutcome::transient(TransientKind::Network, "connection reset");
        let enforcer = enforcer_returning(outcome.clone(), clock.clone());

        let fetched = enforcer.fetch(&SearchRepositoriesRequest::dummy()).await;

        assert_eq!(outcome, fetched);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn fetch_rate_limit_nearly_exhausted_waits_until_reset_before_deadline() {
        let clock = Arc::new(FakeClock::dummy());
        let outcome = FetchOutcome::Success(Response::new(
            Page::default(),
            FetcherRateLimit {
                limit: 1000,
                remaining: 5,
                cost: 1,
                reset_at: clock.now() + TimeDelta::seconds(60),
            },
        ));
        let enforcer = enforcer_returning(outcome.clone(), clock.clone())
            .with_deadline(clock.now() + TimeDelta::seconds(600));

        let fetched = enforcer.fetch(&SearchRepositoriesRequest::dummy()).await;

        assert_eq!(outcome, fetched);
        assert_eq!(vec![Duration::from_secs(65)], clock.sleeps());
    }

    #[tokio::test]
    async fn fetch_rate_limit_nearly_exhausted_does_not_wait_past_deadline() {
        let clock = Arc::new(FakeClock::dummy());
        let outcome = FetchOutcome::Success(Response::new(
            Page::default(),
            FetcherRateLimit {
                limit: 5000,
                remaining: 1,
                cost: 1,
                reset_at: clock.now() + TimeDelta::seconds(3600),
            },
        ));
        let enforcer = enforcer_returning(outcome.clone(), clock.clone())
            .with_deadline(clock.now() + TimeDelta::seconds(60));

        let fetched = enforcer.fetch(&SearchRepositoriesRequest::dummy()).await;

        assert_eq!(outcome, fetched);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn crawl_deadline_bounds_enforcer_and_retrier_waits() {
        let clock = Arc::new(FakeClock::dummy());
        let reset_at = clock.now() + TimeDelta::seconds(3600);
        let deadline = clock.now() + TimeDelta::seconds(60);
        let fetcher = {
            let mut seq = mockall::Sequence::new();
            let mut fetcher = MockRepositoryFetcher::new();
            fetcher
                .expect_fetch()
                .returning(move |_| {
                    FetchOutcome::Success(Response::new(
                        Page::default(),
                        FetcherRateLimit {
                            limit: 5000,
                            remaining: 1,
                            cost: 1,
                            reset_at,
                        },
                    ))
                })
                .times(1)
                .in_sequence(&mut seq);
            fetcher
                .expect_fetch()
                .returning(move |_| {
                    FetchOutcome::RateLimited(RateLimitSignal {
                        kind: RateLimitKind::Primary,
                        resume_at: Some(reset_at),
                        retry_after: None,
                        message: "API rate limit exceeded".to_string(),
                    })
                })
                .times(1)
                .in_sequence(&mut seq);

            fetcher
        };
        let enforcer = FetcherRateLimitEnforcer::new(
            Arc::new(fetcher),
            10,
            Duration::from_secs(5),
            clock.clone(),
        )
        .with_deadline(deadline);
        let retrier = FetcherRetrier::new(
            Arc::new(enforcer),
            RetryPolicy {
                jitter_ratio: 0.0,
                ..RetryPolicy::default()
            },
            clock.clone(),
        )
        .with_deadline(deadline);

        retrier
            .fetch_page(&SearchRepositoriesRequest::dummy())
            .await
            .unwrap();
        let error = retrier
            .fetch_page(&SearchRepositoriesRequest::dummy())
            .await
            .expect_err("Expected deadline to be exceeded");

        assert!(matches!(error, FetchError::DeadlineExceeded { .. }));
        assert!(clock.sleeps().is_empty());
        assert!(clock.now() <= deadline);
    }
}
