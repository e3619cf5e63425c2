use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::{FetchError, FetchOutcome, RateLimitSignal, Response, TransientKind};

/// Tuning of the retry/backoff state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// The number of consecutive transient failures after which a page is given up.
    pub max_transient_attempts: u32,

    /// The number of malformed responses tolerated before the schema mismatch is deemed fatal.
    pub max_malformed_responses: u32,

    /// The first backoff delay.
    pub backoff_floor: Duration,

    /// The largest backoff delay.
    pub backoff_ceiling: Duration,

    /// Added to every wait derived from the API hints.
    pub safety_margin: Duration,

    /// Relative spread applied to backoff delays, `0.0` disables jitter.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_attempts: 5,
            max_malformed_responses: 1,
            backoff_floor: Duration::from_secs(1),
            backoff_ceiling: Duration::from_secs(60),
            safety_margin: Duration::from_secs(5),
            jitter_ratio: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Computes the exponential backoff delay before the `retry`-th retry (starting at 1), without jitter.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.backoff_floor
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
            .min(self.backoff_ceiling)
    }

    /// Spreads `delay` randomly by the jitter ratio, never above the ceiling.
    pub fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 {
            return delay;
        }
        let factor = 1.0 + self.jitter_ratio * (rand::random::<f64>() * 2.0 - 1.0);

        delay.mul_f64(factor.max(0.0)).min(self.backoff_ceiling)
    }
}

/// The states of a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// A call is about to be issued.
    Attempting,

    /// The call must be issued again after the given wait.
    Waiting(Duration),

    /// The page cannot be fetched.
    GivingUp(FetchError),

    /// The page was fetched.
    Done(Response),
}

/// The retry/backoff state machine, entered fresh for each page fetch.
#[derive(Debug)]
pub struct RetryStateMachine {
    policy: RetryPolicy,
    state: RetryState,
    total_attempts: u32,
    transient_failures: u32,
    malformed_responses: u32,
    rate_limited_backoffs: u32,
}

impl RetryStateMachine {
    /// Creates a new `RetryStateMachine` in the attempting state.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Attempting,
            total_attempts: 0,
            transient_failures: 0,
            malformed_responses: 0,
            rate_limited_backoffs: 0,
        }
    }

    /// Retrieves the current state.
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Retrieves the number of outcomes observed.
    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    /// Transitions on the outcome of the last call observed at `now`.
    pub fn on_outcome(
        &mut self,
        outcome: FetchOutcome,
        now: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
    ) -> RetryState {
        self.total_attempts += 1;
        let state = match outcome {
            FetchOutcome::Success(response) => RetryState::Done(response),
            FetchOutcome::Fatal(message) => RetryState::GivingUp(FetchError::Fatal(message)),
            FetchOutcome::RateLimited(signal) => {
                self.transient_failures = 0;
                RetryState::Waiting(self.rate_limit_wait(&signal, now))
            }
            FetchOutcome::Transient { kind, message } => self.on_transient(kind, message),
        };
        self.state = Self::enforce_deadline(state, now, deadline);

        self.state.clone()
    }

    fn on_transient(&mut self, kind: TransientKind, message: String) -> RetryState {
        self.transient_failures += 1;
        if kind == TransientKind::MalformedResponse {
            self.malformed_responses += 1;
            if self.malformed_responses > self.policy.max_malformed_responses {
                return RetryState::GivingUp(FetchError::MalformedResponse {
                    attempts: self.malformed_responses,
                    message,
                });
            }
        }
        if self.transient_failures >= self.policy.max_transient_attempts {
            return RetryState::GivingUp(FetchError::RetriesExhausted {
                attempts: self.transient_failures,
                kind,
                message,
            });
        }

        RetryState::Waiting(
            self.policy
                .jittered(self.policy.backoff_delay(self.transient_failures)),
        )
    }

    fn rate_limit_wait(&mut self, signal: &RateLimitSignal, now: DateTime<Utc>) -> Duration {
        if let Some(resume_at) = signal.resume_at {
            return (resume_at - now).to_std().unwrap_or(Duration::ZERO) + self.policy.safety_margin;
        }
        if let Some(retry_after) = signal.retry_after {
            return retry_after + self.policy.safety_margin;
        }
        self.rate_limited_backoffs += 1;

        self.policy
            .jittered(self.policy.backoff_delay(self.rate_limited_backoffs))
    }

    fn enforce_deadline(
        state: RetryState,
        now: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
    ) -> RetryState {
        match (state, deadline) {
            (RetryState::Waiting(wait), Some(deadline)) => {
                let resumes_after_deadline = TimeDelta::from_std(wait)
                    .map(|wait_delta| now + wait_delta > deadline)
                    .unwrap_or(true);
                if resumes_after_deadline {
                    RetryState::GivingUp(FetchError::DeadlineExceeded { wait })
                } else {
                    RetryState::Waiting(wait)
                }
            }
            (state, _) => state,
        }
    }
}
